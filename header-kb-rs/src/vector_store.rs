// header-kb-rs/src/vector_store.rs
// Qdrant-backed vector index over column-header strings.
//
// Point ids are the positional offsets of a bulk load, so re-ingesting the
// same corpus overwrites instead of duplicating. The human-readable id
// ("header_<offset>") and the raw header text travel in the point payload.

use std::sync::Arc;

use qdrant_client::client::{Payload, QdrantClient};
use qdrant_client::qdrant::{
    vectors_config::Config, with_payload_selector::SelectorOptions, CreateCollection, Distance,
    PointStruct, SearchPoints, VectorParams, VectorsConfig, WithPayloadSelector,
};

use crate::embedding::{EmbeddingError, EmbeddingFunction};

/// Chunk size for bulk loads; bounds peak memory during ingestion.
pub const UPSERT_BATCH_SIZE: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum HeaderStoreError {
    #[error("failed to connect to vector index: {0}")]
    Connect(String),

    #[error("vector index error: {0}")]
    Index(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Stable string identifier for the header at a given bulk-load offset.
pub fn header_id(offset: usize) -> String {
    format!("header_{}", offset)
}

pub struct HeaderStore {
    client: QdrantClient,
    collection_name: String,
    vector_size: usize,
    embedder: Arc<dyn EmbeddingFunction>,
}

impl HeaderStore {
    pub fn connect(
        url: &str,
        collection_name: &str,
        vector_size: usize,
        embedder: Arc<dyn EmbeddingFunction>,
    ) -> Result<Self, HeaderStoreError> {
        log::info!("Connecting to Qdrant at {}", url);
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| HeaderStoreError::Connect(e.to_string()))?;

        Ok(Self {
            client,
            collection_name: collection_name.to_string(),
            vector_size,
            embedder,
        })
    }

    /// Create the collection if it does not exist yet (cosine distance).
    pub async fn ensure_collection(&self) -> Result<(), HeaderStoreError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| HeaderStoreError::Index(e.to_string()))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection_name);

        if !exists {
            log::info!("Creating Qdrant collection: {}", self.collection_name);
            let create = CreateCollection {
                collection_name: self.collection_name.clone(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: self.vector_size as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            };
            self.client
                .create_collection(&create)
                .await
                .map_err(|e| HeaderStoreError::Index(e.to_string()))?;
        }

        Ok(())
    }

    /// Number of header entries currently stored.
    pub async fn count(&self) -> Result<u64, HeaderStoreError> {
        let info = self
            .client
            .collection_info(&self.collection_name)
            .await
            .map_err(|e| HeaderStoreError::Index(e.to_string()))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    /// Best-effort bulk load. Headers are embedded and upserted in chunks of
    /// [`UPSERT_BATCH_SIZE`]; a failing chunk is logged and skipped so the
    /// remaining chunks still land. Returns the number of headers stored.
    pub async fn upsert_headers(&self, headers: &[String]) -> usize {
        let mut stored = 0;

        for (batch_index, chunk) in headers.chunks(UPSERT_BATCH_SIZE).enumerate() {
            let base_offset = batch_index * UPSERT_BATCH_SIZE;

            let embeddings = match self.embedder.embed(chunk).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    log::error!("Failed to embed batch {}: {}", batch_index + 1, e);
                    continue;
                }
            };

            let mut points = Vec::with_capacity(chunk.len());
            for (j, (header, embedding)) in chunk.iter().zip(embeddings).enumerate() {
                let offset = base_offset + j;
                let payload: Payload = match serde_json::json!({
                    "id": header_id(offset),
                    "text": header,
                })
                .try_into()
                {
                    Ok(payload) => payload,
                    Err(e) => {
                        log::warn!("Skipping header at offset {}: {}", offset, e);
                        continue;
                    }
                };
                points.push(PointStruct::new(offset as u64, embedding, payload));
            }

            match self
                .client
                .upsert_points(&self.collection_name, None, points, None)
                .await
            {
                Ok(_) => {
                    stored += chunk.len();
                    log::info!(
                        "Inserted batch {} with {} headers.",
                        batch_index + 1,
                        chunk.len()
                    );
                }
                Err(e) => {
                    log::error!("Failed to upsert batch {}: {}", batch_index + 1, e);
                }
            }
        }

        log::info!("Done. Stored {} headers in the vector index.", stored);
        stored
    }

    /// Top-k most similar header texts for a query string.
    /// Degrades to an empty list on any index or embedding failure; callers
    /// treat retrieval as best-effort context enrichment.
    pub async fn query(&self, text: &str, k: usize) -> Vec<String> {
        match self.try_query(text, k).await {
            Ok(headers) => headers,
            Err(e) => {
                log::error!("Error querying headers from the vector index: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_query(&self, text: &str, k: usize) -> Result<Vec<String>, HeaderStoreError> {
        let embeddings = self.embedder.embed(&[text.to_string()]).await?;
        let query_vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| HeaderStoreError::Index("empty embedding response".to_string()))?;

        let search = SearchPoints {
            collection_name: self.collection_name.clone(),
            vector: query_vector,
            limit: k as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let response = self
            .client
            .search_points(&search)
            .await
            .map_err(|e| HeaderStoreError::Index(e.to_string()))?;

        let headers: Vec<String> = response
            .result
            .into_iter()
            .filter_map(|point| match point.payload.get("text") {
                Some(value) => match value.kind.as_ref() {
                    Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
                    _ => None,
                },
                None => None,
            })
            .collect();

        log::info!("Found {} relevant headers.", headers.len());
        Ok(headers)
    }
}

// header-kb-rs/src/bin/ingest_headers.rs
// Offline bulk load: extract the distinct column headers from the tabular
// corpus and upsert them into the header vector index.
//
// Usage: ingest-headers [tables.jsonl]
// Defaults to <DATA_PATH>/train.tables.jsonl.

use std::path::PathBuf;
use std::sync::Arc;

use config_rs::Settings;
use header_kb::embedding::HttpEmbeddingClient;
use header_kb::ingest::{extract_unique_headers_from_file, save_headers};
use header_kb::vector_store::HeaderStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env();

    let input_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&settings.data_path).join("train.tables.jsonl"));

    log::info!("Extracting unique headers from {}", input_path.display());
    let headers = extract_unique_headers_from_file(&input_path)?;
    log::info!("Extracted {} unique headers", headers.len());

    let staging_path = PathBuf::from(&settings.data_path).join("unique_headers.txt");
    save_headers(&headers, &staging_path)?;
    log::info!("Saved header list to {}", staging_path.display());

    let embedder = Arc::new(HttpEmbeddingClient::new(
        &settings.embedding_api_url,
        &settings.embedding_model,
        settings.llm_timeout_secs,
    ));

    let store = HeaderStore::connect(
        &settings.qdrant_url,
        &settings.qdrant_collection,
        settings.vector_size,
        embedder,
    )?;
    store.ensure_collection().await?;

    let stored = store.upsert_headers(&headers).await;
    log::info!(
        "Ingestion run complete: {}/{} headers stored",
        stored,
        headers.len()
    );

    Ok(())
}

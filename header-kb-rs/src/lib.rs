// header-kb-rs/src/lib.rs
// Column-header knowledge base: a Qdrant-backed vector index over the
// distinct column headers of a tabular corpus, plus the ingestion pipeline
// that populates it and the retrieval service that queries it.

pub mod embedding;
pub mod ingest;
pub mod retrieval;
pub mod vector_store;

pub use embedding::{EmbeddingError, EmbeddingFunction, HttpEmbeddingClient};
pub use retrieval::{HeaderRetriever, MAX_HEADERS};
pub use vector_store::{HeaderStore, HeaderStoreError, UPSERT_BATCH_SIZE};

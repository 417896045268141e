// header-kb-rs/src/retrieval.rs
// Retrieval service: top-k semantically similar headers for a question.

use async_trait::async_trait;

use crate::vector_store::HeaderStore;

/// Global cap on retrieved headers, independent of what a caller requests.
/// Bounds prompt size for the downstream generation step.
pub const MAX_HEADERS: usize = 10;

/// Best-effort header retrieval. Implementations never fail: any index
/// error degrades to an empty list.
#[async_trait]
pub trait HeaderRetriever: Send + Sync {
    async fn relevant_headers(&self, question: &str, top_k: usize) -> Vec<String>;
}

#[async_trait]
impl HeaderRetriever for HeaderStore {
    async fn relevant_headers(&self, question: &str, top_k: usize) -> Vec<String> {
        let effective_k = top_k.min(MAX_HEADERS);
        if effective_k == 0 {
            return Vec::new();
        }
        self.query(question, effective_k).await
    }
}

// llm-service-rs/src/generate.rs
// Text-to-SQL generation service. Retrieval is best-effort context
// enrichment and never fails the request; the model invocation itself is a
// hard dependency and its errors propagate to the caller.

use std::sync::Arc;

use async_trait::async_trait;

use header_kb::retrieval::HeaderRetriever;

use crate::disambiguate::Disambiguate;
use crate::llm_client::{LlmClient, LlmError};
use crate::prompt::{build_table_str, render_prompt, IS_TOO_VAGUE_MESSAGE};

/// Output-length budget for one SQL generation.
pub const MAX_NEW_TOKENS: u32 = 100;

/// Causal text-completion model. The raw output may echo the input prompt
/// ahead of the continuation.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str, max_new_tokens: u32) -> Result<String, LlmError>;
}

#[async_trait]
impl CompletionModel for LlmClient {
    async fn complete(&self, prompt: &str, max_new_tokens: u32) -> Result<String, LlmError> {
        LlmClient::complete(self, prompt, max_new_tokens).await
    }
}

pub struct SqlGenerator {
    model: Arc<dyn CompletionModel>,
    retriever: Arc<dyn HeaderRetriever>,
    /// Optional disambiguation pre-pass; disabled by default via config.
    disambiguator: Option<Arc<dyn Disambiguate>>,
}

impl SqlGenerator {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        retriever: Arc<dyn HeaderRetriever>,
        disambiguator: Option<Arc<dyn Disambiguate>>,
    ) -> Self {
        Self {
            model,
            retriever,
            disambiguator,
        }
    }

    /// Convert a natural-language question into the model's SQL-bearing
    /// continuation.
    pub async fn generate_sql(
        &self,
        question: &str,
        top_k_headers: usize,
    ) -> Result<String, LlmError> {
        // A question already flagged as too vague short-circuits without a
        // model call.
        if question == IS_TOO_VAGUE_MESSAGE {
            return Ok(question.to_string());
        }

        let mut question = question.to_string();

        if let Some(disambiguator) = &self.disambiguator {
            let headers = self
                .retriever
                .relevant_headers(&question, top_k_headers)
                .await;
            let result = disambiguator.disambiguate(&question, &headers).await;
            if result.is_too_vague {
                log::warn!("Question flagged as too vague during disambiguation");
                return Ok(IS_TOO_VAGUE_MESSAGE.to_string());
            }
            question = result.disambiguated_text;
        }

        let headers = self
            .retriever
            .relevant_headers(&question, top_k_headers)
            .await;
        log::info!("Relevant headers: {:?}", headers);

        let table_str = build_table_str(&headers);
        let prompt = render_prompt(&table_str, &question);

        let raw = self.model.complete(&prompt, MAX_NEW_TOKENS).await?;

        // Local runtimes echo the prompt verbatim ahead of the continuation;
        // strip exactly that prefix when present.
        let continuation = raw.strip_prefix(prompt.as_str()).unwrap_or(&raw);
        Ok(continuation.trim().to_string())
    }
}

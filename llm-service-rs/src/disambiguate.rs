// llm-service-rs/src/disambiguate.rs
// Disambiguation service: one structured-prediction call that rewrites a
// vague question into a schema-aware, SQL-friendly form. Failures never
// reach the caller; the original question is the fallback.

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm_client::{ChatMessage, LlmClient, LlmError};

const DISAMBIGUATION_MAX_TOKENS: u32 = 512;

const DISAMBIGUATION_INSTRUCTIONS: &str = "Disambiguate the text to prepare it to be used to generate an SQL query by

1- fixing its grammar
2- using the relevant table headers if necessary
3- making sure the text is in a question format or an instruction
4- changing the wording to be sql friendly, e.g., replacing \"show me\" with \"select\"
5- clarifying any ambiguity in the text without adding any extra information

Even if the text is too ambiguous to be corrected, try your best to rewrite it in a question format or an instruction.

Respond with a single JSON object and nothing else:
{\"disambiguated_text\": \"<the text that is ready to be used to generate an SQL query>\", \"is_too_vague\": <true if the text cannot be used to generate an sql query without additional context, false otherwise>}";

#[derive(Debug, Clone, Deserialize)]
pub struct Disambiguation {
    pub disambiguated_text: String,
    pub is_too_vague: bool,
}

/// Chat-completion call shape used for structured prediction.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, LlmError>;
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, LlmError> {
        let messages = [
            ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ];
        self.chat_complete(&messages, max_tokens).await
    }
}

/// Infallible disambiguation seam; the generator and the gateway depend on
/// this trait rather than on a concrete model client.
#[async_trait]
pub trait Disambiguate: Send + Sync {
    async fn disambiguate(&self, question: &str, relevant_headers: &[String]) -> Disambiguation;
}

pub struct Disambiguator {
    model: std::sync::Arc<dyn ChatModel>,
}

impl Disambiguator {
    pub fn new(model: std::sync::Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Disambiguate for Disambiguator {
    async fn disambiguate(&self, question: &str, relevant_headers: &[String]) -> Disambiguation {
        let user = format!(
            "Text: {}\nRelevant headers from the database: {}",
            question,
            relevant_headers.join(", ")
        );

        match self
            .model
            .chat(DISAMBIGUATION_INSTRUCTIONS, &user, DISAMBIGUATION_MAX_TOKENS)
            .await
        {
            Ok(raw) => match parse_disambiguation(&raw) {
                Some(result) => result,
                None => {
                    log::error!("Unparseable disambiguation output, falling back: {}", raw);
                    fallback(question)
                }
            },
            Err(e) => {
                log::error!("Failed to disambiguate question: {}", e);
                fallback(question)
            }
        }
    }
}

fn fallback(question: &str) -> Disambiguation {
    Disambiguation {
        disambiguated_text: question.to_string(),
        is_too_vague: false,
    }
}

/// Parse the model output into a [`Disambiguation`]. Tolerates prose or
/// code fences around the JSON object by retrying on the outermost braces.
fn parse_disambiguation(raw: &str) -> Option<Disambiguation> {
    let trimmed = raw.trim();
    if let Ok(parsed) = serde_json::from_str::<Disambiguation>(trimmed) {
        return Some(parsed);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Disambiguation>(&trimmed[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FixedChatModel(Result<String, ()>);

    #[async_trait]
    impl ChatModel for FixedChatModel {
        async fn chat(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(LlmError::Network("connection refused".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_parses_clean_json() {
        let model = Arc::new(FixedChatModel(Ok(
            r#"{"disambiguated_text": "Select all names from users", "is_too_vague": false}"#
                .to_string(),
        )));
        let result = Disambiguator::new(model)
            .disambiguate("show me stuff", &["name".to_string()])
            .await;
        assert_eq!(result.disambiguated_text, "Select all names from users");
        assert!(!result.is_too_vague);
    }

    #[tokio::test]
    async fn test_parses_fenced_json() {
        let raw = "Here you go:\n```json\n{\"disambiguated_text\": \"Count the rows\", \"is_too_vague\": false}\n```";
        let model = Arc::new(FixedChatModel(Ok(raw.to_string())));
        let result = Disambiguator::new(model).disambiguate("how many", &[]).await;
        assert_eq!(result.disambiguated_text, "Count the rows");
    }

    #[tokio::test]
    async fn test_garbage_output_falls_back_to_original() {
        let model = Arc::new(FixedChatModel(Ok("sorry, I cannot help".to_string())));
        let result = Disambiguator::new(model)
            .disambiguate("original question", &[])
            .await;
        assert_eq!(result.disambiguated_text, "original question");
        assert!(!result.is_too_vague);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_original() {
        let model = Arc::new(FixedChatModel(Err(())));
        let result = Disambiguator::new(model)
            .disambiguate("original question", &["id".to_string()])
            .await;
        assert_eq!(result.disambiguated_text, "original question");
        assert!(!result.is_too_vague);
    }

    #[tokio::test]
    async fn test_headers_reach_the_model() {
        struct CapturingModel;

        #[async_trait]
        impl ChatModel for CapturingModel {
            async fn chat(
                &self,
                _system: &str,
                user: &str,
                _max_tokens: u32,
            ) -> Result<String, LlmError> {
                assert!(user.contains("id, name, email"));
                Ok(r#"{"disambiguated_text": "ok", "is_too_vague": false}"#.to_string())
            }
        }

        let headers = vec!["id".to_string(), "name".to_string(), "email".to_string()];
        Disambiguator::new(Arc::new(CapturingModel))
            .disambiguate("q", &headers)
            .await;
    }
}

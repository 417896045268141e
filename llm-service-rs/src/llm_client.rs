// llm-service-rs/src/llm_client.rs
//
// HTTP client for OpenAI-compatible model runtimes (LM Studio, Ollama,
// hosted APIs). Two call shapes:
// - `complete`: raw text completion; local runtimes echo the prompt ahead
//   of the continuation, which the generation service strips.
// - `chat`: chat completion, used for structured prediction calls.
//
// Transient failures (server errors, network failures, rate limits,
// timeouts) are retried with exponential backoff and jitter; client-side
// errors are not.
//
// Configuration (.env / environment):
// - LLM_API_URL, LLM_MODEL, LLM_API_KEY
// - LLM_MAX_RETRIES, LLM_INITIAL_RETRY_DELAY_MS, LLM_MAX_RETRY_DELAY_MS
// - LLM_TIMEOUT_SECS

use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use config_rs::Settings;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    // Non-retryable: requires intervention, retrying will not help.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("parse error: {0}")]
    Parse(String),

    // Retryable with backoff.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unknown error: {0}")]
    Unknown(String),
}

fn is_retryable(error: &LlmError) -> bool {
    matches!(
        error,
        LlmError::Server(_) | LlmError::Network(_) | LlmError::RateLimited(_) | LlmError::Timeout(_)
    )
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    max_retries: u32,
    initial_retry_delay_ms: u64,
    max_retry_delay_ms: u64,
    timeout: Duration,
}

impl LlmClient {
    /// Client for the text-to-SQL generator model.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.llm_api_url,
            &settings.model_text2sql_id,
            &settings.llm_api_key,
            settings.llm_max_retries,
            settings.llm_initial_retry_delay_ms,
            settings.llm_max_retry_delay_ms,
            settings.llm_timeout_secs,
        )
    }

    /// Client for the general-purpose chat model used by structured
    /// prediction calls such as disambiguation.
    pub fn chat_from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.llm_api_url,
            &settings.llm_model,
            &settings.llm_api_key,
            settings.llm_max_retries,
            settings.llm_initial_retry_delay_ms,
            settings.llm_max_retry_delay_ms,
            settings.llm_timeout_secs,
        )
    }

    pub fn new(
        api_base: &str,
        model: &str,
        api_key: &str,
        max_retries: u32,
        initial_retry_delay_ms: u64,
        max_retry_delay_ms: u64,
        timeout_secs: u64,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_retries,
            initial_retry_delay_ms,
            max_retry_delay_ms,
            timeout,
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_retry_delay_ms))
            .with_max_interval(Duration::from_millis(self.max_retry_delay_ms))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(Duration::from_secs(120)))
            .with_randomization_factor(0.5)
            .build()
    }

    /// Raw text completion against `/completions`. Returns the raw output,
    /// echoed prompt included when the runtime echoes.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let url = format!("{}/completions", self.api_base);
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            max_tokens,
            temperature: 0.0,
        };

        self.with_retries(|| async {
            let response = self.send(&url, &request).await?;
            let data: CompletionResponse = response
                .json()
                .await
                .map_err(|e| LlmError::Parse(format!("failed to parse response: {}", e)))?;

            if let Some(usage) = &data.usage {
                log::info!("Completion finished. Used {} tokens", usage.total_tokens);
            }

            data.choices
                .into_iter()
                .next()
                .map(|c| c.text)
                .ok_or_else(|| LlmError::Parse("no choices returned in response".to_string()))
        })
        .await
    }

    /// Chat completion against `/chat/completions`.
    pub async fn chat_complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature: 0.0,
        };

        self.with_retries(|| async {
            let response = self.send(&url, &request).await?;
            let data: ChatCompletionResponse = response
                .json()
                .await
                .map_err(|e| LlmError::Parse(format!("failed to parse response: {}", e)))?;

            if let Some(usage) = &data.usage {
                log::info!("Chat completion finished. Used {} tokens", usage.total_tokens);
            }

            data.choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| LlmError::Parse("no choices returned in response".to_string()))
        })
        .await
    }

    /// Run one request shape through the retry loop.
    async fn with_retries<F, Fut>(&self, attempt_fn: F) -> Result<String, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<String, LlmError>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempt > 1 {
                log::info!("Retry attempt {} for model request", attempt);
            }

            match attempt_fn().await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if !is_retryable(&err) || attempt > self.max_retries {
                        log::error!("Model request failed after {} attempts: {}", attempt, err);
                        return Err(err);
                    }

                    match backoff.next_backoff() {
                        Some(delay) => {
                            log::warn!("Retryable error: {}. Retrying in {:?}", err, delay);
                            // Jitter keeps concurrent callers from retrying in lockstep.
                            let jitter = rand::thread_rng().gen_range(0..=200);
                            tokio::time::sleep(delay + Duration::from_millis(jitter)).await;
                        }
                        None => {
                            log::error!("Exceeded maximum backoff time: {}", err);
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Send one HTTP request and classify transport/status failures.
    async fn send<T: Serialize>(
        &self,
        url: &str,
        request_body: &T,
    ) -> Result<reqwest::Response, LlmError> {
        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = match builder.json(request_body).send().await {
            Ok(resp) => resp,
            Err(err) => {
                return if err.is_timeout() {
                    Err(LlmError::Timeout(self.timeout))
                } else if err.is_connect() {
                    Err(LlmError::Network(format!("connection failed: {}", err)))
                } else {
                    Err(LlmError::Network(err.to_string()))
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return match status.as_u16() {
                400 | 401 | 403 => Err(LlmError::InvalidRequest(format!("{}: {}", status, text))),
                404 => Err(LlmError::ModelNotAvailable(format!("{}: {}", status, text))),
                429 => Err(LlmError::RateLimited(text)),
                500 | 502 | 503 | 504 => Err(LlmError::Server(format!("{}: {}", status, text))),
                _ => Err(LlmError::Unknown(format!("{}: {}", status, text))),
            };
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&LlmError::Server("502".to_string())));
        assert!(is_retryable(&LlmError::Network("refused".to_string())));
        assert!(is_retryable(&LlmError::RateLimited("slow down".to_string())));
        assert!(is_retryable(&LlmError::Timeout(Duration::from_secs(60))));

        assert!(!is_retryable(&LlmError::InvalidRequest("bad".to_string())));
        assert!(!is_retryable(&LlmError::Parse("bad json".to_string())));
        assert!(!is_retryable(&LlmError::ModelNotAvailable("gone".to_string())));
    }

    #[test]
    fn test_api_base_is_normalized() {
        let client = LlmClient::new("http://localhost:1234/v1/", "m", "", 3, 10, 100, 60);
        assert_eq!(client.api_base, "http://localhost:1234/v1");
    }

    #[test]
    fn test_clients_from_settings_pick_their_models() {
        let settings = test_settings();

        let completion = LlmClient::from_settings(&settings);
        assert_eq!(completion.model, "nerzid/qwen2.5-3B-4bit-text2sql");

        let chat = LlmClient::chat_from_settings(&settings);
        assert_eq!(chat.model, "qwen3-4b");
    }

    fn test_settings() -> Settings {
        Settings {
            service_host: "0.0.0.0".to_string(),
            service_port: 8000,
            static_dir: "static".to_string(),
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_collection: "headers".to_string(),
            vector_size: 384,
            feedback_backend: config_rs::FeedbackBackend::File,
            feedback_store_path: "data/feedback_queue.ndjson".to_string(),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_db: 0,
            llm_model: "qwen3-4b".to_string(),
            llm_api_url: "http://localhost:1234/v1".to_string(),
            llm_api_key: String::new(),
            llm_max_retries: 3,
            llm_initial_retry_delay_ms: 10,
            llm_max_retry_delay_ms: 100,
            llm_timeout_secs: 60,
            embedding_api_url: "http://localhost:1234/v1".to_string(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            detector_api_url: "http://localhost:8080".to_string(),
            model_text2sql_id: "nerzid/qwen2.5-3B-4bit-text2sql".to_string(),
            data_path: "data".to_string(),
            curated_base_path: "data/curated_base.jsonl".to_string(),
            trainer_api_url: "http://localhost:7000".to_string(),
            enable_disambiguation: false,
        }
    }
}

//! config-rs/lib.rs
//! Shared configuration utilities for consistent service configuration.
//! Every recognized option is environment-driven with a sane default.

use std::env;
use std::net::SocketAddr;

/// Backend used for the durable feedback queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackBackend {
    Redis,
    File,
}

/// Full service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    // HTTP surface
    pub service_host: String,
    pub service_port: u16,
    pub static_dir: String,

    // Header vector index
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub vector_size: usize,

    // Feedback queue
    pub feedback_backend: FeedbackBackend,
    pub feedback_store_path: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,

    // Model runtime (OpenAI-compatible endpoint). `llm_model` is the
    // general-purpose chat model used for disambiguation; the text-to-SQL
    // generator uses `model_text2sql_id`.
    pub llm_model: String,
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_max_retries: u32,
    pub llm_initial_retry_delay_ms: u64,
    pub llm_max_retry_delay_ms: u64,
    pub llm_timeout_secs: u64,

    // Embedding encoder
    pub embedding_api_url: String,
    pub embedding_model: String,

    // AI-text detector
    pub detector_api_url: String,

    // Text-to-SQL generator identity (also the fine-tune base model)
    pub model_text2sql_id: String,

    // Data paths
    pub data_path: String,
    pub curated_base_path: String,

    // Offline training runner
    pub trainer_api_url: String,

    // Feature toggles
    pub enable_disambiguation: bool,
}

impl Settings {
    /// Read the full configuration from the process environment.
    /// Never panics: malformed values fall back to defaults with a warning.
    pub fn from_env() -> Self {
        let data_path = get_env_str("DATA_PATH", "data");
        let curated_base_default = format!("{}/curated_base.jsonl", data_path);
        let feedback_store_default = format!("{}/feedback_queue.ndjson", data_path);

        Self {
            service_host: get_env_str("SERVICE_HOST", "0.0.0.0"),
            service_port: get_env_parsed("SERVICE_PORT", 8000),
            static_dir: get_env_str("STATIC_DIR", "static"),

            qdrant_url: get_env_str("QDRANT_URL", "http://localhost:6334"),
            qdrant_collection: get_env_str("QDRANT_COLLECTION", "headers"),
            vector_size: get_env_parsed("VECTOR_SIZE", 384),

            feedback_backend: match get_env_str("FEEDBACK_BACKEND", "file").as_str() {
                "redis" => FeedbackBackend::Redis,
                "file" => FeedbackBackend::File,
                other => {
                    log::warn!("Unknown FEEDBACK_BACKEND '{}', using file backend", other);
                    FeedbackBackend::File
                }
            },
            feedback_store_path: get_env_str("FEEDBACK_STORE_PATH", &feedback_store_default),
            redis_host: get_env_str("REDIS_HOST", "localhost"),
            redis_port: get_env_parsed("REDIS_PORT", 6379),
            redis_db: get_env_parsed("REDIS_DB", 0),

            llm_model: get_env_str("LLM_MODEL", "qwen3-4b"),
            llm_api_url: get_env_str("LLM_API_URL", "http://localhost:1234/v1"),
            llm_api_key: get_env_str("LLM_API_KEY", ""),
            llm_max_retries: get_env_parsed("LLM_MAX_RETRIES", 3),
            llm_initial_retry_delay_ms: get_env_parsed("LLM_INITIAL_RETRY_DELAY_MS", 1000),
            llm_max_retry_delay_ms: get_env_parsed("LLM_MAX_RETRY_DELAY_MS", 30000),
            llm_timeout_secs: get_env_parsed("LLM_TIMEOUT_SECS", 60),

            embedding_api_url: get_env_str("EMBEDDING_API_URL", "http://localhost:1234/v1"),
            embedding_model: get_env_str("EMBEDDING_MODEL", "all-MiniLM-L6-v2"),

            detector_api_url: get_env_str("DETECTOR_API_URL", "http://localhost:8080"),

            model_text2sql_id: get_env_str(
                "MODEL_TEXT2SQL_ID",
                "nerzid/qwen2.5-3B-4bit-text2sql",
            ),

            curated_base_path: get_env_str("CURATED_BASE_PATH", &curated_base_default),
            data_path,

            trainer_api_url: get_env_str("TRAINER_API_URL", "http://localhost:7000"),

            enable_disambiguation: get_env_bool("ENABLE_DISAMBIGUATION", false),
        }
    }

    /// Socket address the HTTP surface binds to.
    pub fn bind_address(&self) -> SocketAddr {
        let addr = format!("{}:{}", self.service_host, self.service_port);
        addr.parse().unwrap_or_else(|_| {
            log::warn!(
                "Invalid bind address '{}', falling back to 0.0.0.0:8000",
                addr
            );
            "0.0.0.0:8000".parse().expect("static fallback address")
        })
    }

    /// Redis connection URL for the feedback queue backend.
    pub fn redis_url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.redis_host, self.redis_port, self.redis_db
        )
    }
}

/// Read a string environment variable with a default.
pub fn get_env_str(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read a parseable environment variable with a default.
/// Malformed values log a warning and fall back.
pub fn get_env_parsed<T: std::str::FromStr + Copy + std::fmt::Display>(
    name: &str,
    default: T,
) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            log::warn!("Invalid value in {}, using default {}", name, default);
            default
        }),
        Err(_) => default,
    }
}

/// Read a boolean toggle. Truthy values: 1, true, yes, on (case-insensitive).
pub fn get_env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) => {
            let v = val.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "yes" | "on")
        }
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_parsed() {
        std::env::set_var("TEST_CFG_PORT", "9000");
        assert_eq!(get_env_parsed("TEST_CFG_PORT", 8000u16), 9000);

        std::env::set_var("TEST_CFG_PORT_BAD", "not-a-port");
        assert_eq!(get_env_parsed("TEST_CFG_PORT_BAD", 8000u16), 8000);

        std::env::remove_var("TEST_CFG_PORT_MISSING");
        assert_eq!(get_env_parsed("TEST_CFG_PORT_MISSING", 8000u16), 8000);
    }

    #[test]
    fn test_get_env_bool() {
        std::env::set_var("TEST_CFG_FLAG", "yes");
        assert!(get_env_bool("TEST_CFG_FLAG", false));

        std::env::set_var("TEST_CFG_FLAG", "off");
        assert!(!get_env_bool("TEST_CFG_FLAG", true));

        std::env::remove_var("TEST_CFG_FLAG_MISSING");
        assert!(get_env_bool("TEST_CFG_FLAG_MISSING", true));
    }

    #[test]
    fn test_redis_url() {
        std::env::remove_var("REDIS_HOST");
        std::env::remove_var("REDIS_PORT");
        std::env::remove_var("REDIS_DB");
        let settings = Settings::from_env();
        assert_eq!(settings.redis_url(), "redis://localhost:6379/0");
    }
}

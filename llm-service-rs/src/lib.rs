// llm-service-rs/src/lib.rs
// Model-facing services: the HTTP client for OpenAI-compatible model
// runtimes, prompt assembly, the text-to-SQL generation service, the
// disambiguation pre-pass, and the AI-text detector client.

pub mod detector;
pub mod disambiguate;
pub mod generate;
pub mod llm_client;
pub mod prompt;

pub use detector::{AiTextDetector, DetectAiText, DetectorError};
pub use disambiguate::{ChatModel, Disambiguate, Disambiguation, Disambiguator};
pub use generate::{CompletionModel, SqlGenerator, MAX_NEW_TOKENS};
pub use llm_client::{LlmClient, LlmError};
pub use prompt::{build_table_str, render_prompt, IS_TOO_VAGUE_MESSAGE};

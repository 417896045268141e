// llm-service-rs/src/detector.rs
// AI-generated-text detector: a stock text-classification pipeline behind
// an HTTP request/response contract. Long inputs are chunked and the
// per-chunk predictions combined by confidence-weighted voting.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Character budget per classification call, a conservative proxy for the
/// classifier's 512-token window.
const MAX_CHUNK_CHARS: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("network error: {0}")]
    Network(String),

    #[error("detector endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Detection seam for the HTTP surface; the production implementation is
/// [`AiTextDetector`].
#[async_trait]
pub trait DetectAiText: Send + Sync {
    async fn is_ai_generated(&self, text: &str) -> Result<bool, DetectorError>;
}

pub struct AiTextDetector {
    client: Client,
    api_url: String,
}

#[async_trait]
impl DetectAiText for AiTextDetector {
    async fn is_ai_generated(&self, text: &str) -> Result<bool, DetectorError> {
        AiTextDetector::is_ai_generated(self, text).await
    }
}

impl AiTextDetector {
    pub fn new(api_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Classify whether `text` is AI-generated. Detection is a hard
    /// dependency of its endpoint: failures propagate.
    pub async fn is_ai_generated(&self, text: &str) -> Result<bool, DetectorError> {
        let mut predictions = Vec::new();

        for chunk in chunk_text(text, MAX_CHUNK_CHARS) {
            let top = self.classify(&chunk).await?;
            log::info!(
                "Chunk: {}... -> {} ({:.2})",
                &chunk.chars().take(100).collect::<String>(),
                top.label,
                top.score
            );
            predictions.push(top);
        }

        Ok(aggregate_predictions(&predictions))
    }

    /// One classification call; returns the highest-scoring label.
    async fn classify(&self, chunk: &str) -> Result<LabelScore, DetectorError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&ClassifyRequest { inputs: chunk })
            .send()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        // Standard text-classification serving shape: one list of
        // label/score pairs per input.
        let parsed: Vec<Vec<LabelScore>> = response
            .json()
            .await
            .map_err(|e| DetectorError::Parse(e.to_string()))?;

        parsed
            .into_iter()
            .next()
            .and_then(|scores| {
                scores.into_iter().max_by(|a, b| {
                    a.score
                        .partial_cmp(&b.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
            })
            .ok_or_else(|| DetectorError::Parse("empty classification response".to_string()))
    }
}

/// Split text into chunks of at most `max_chars` characters, on char
/// boundaries.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

/// Majority vote weighted by confidence: sum the scores of AI-labelled
/// chunks against human-labelled ones. Ties count as AI.
fn aggregate_predictions(predictions: &[LabelScore]) -> bool {
    let mut ai_score = 0.0f32;
    let mut human_score = 0.0f32;

    for prediction in predictions {
        let label = prediction.label.to_lowercase();
        if label.contains("ai") || label.contains("fake") {
            ai_score += prediction.score;
        } else if label.contains("human") || label.contains("real") {
            human_score += prediction.score;
        }
    }

    ai_score >= human_score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label: &str, score: f32) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn test_chunk_text_respects_budget() {
        let text = "a".repeat(4500);
        let chunks = chunk_text(&text, 2000);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2000);
        assert_eq!(chunks[2].len(), 500);
    }

    #[test]
    fn test_chunk_text_handles_multibyte() {
        let text = "héllo wörld".repeat(10);
        let chunks = chunk_text(&text, 7);
        assert_eq!(chunks.join(""), text);
    }

    #[test]
    fn test_aggregation_weighted_vote() {
        let predictions = vec![
            prediction("AI", 0.9),
            prediction("Human", 0.6),
            prediction("Human", 0.2),
        ];
        assert!(aggregate_predictions(&predictions));

        let predictions = vec![prediction("AI", 0.4), prediction("Human", 0.9)];
        assert!(!aggregate_predictions(&predictions));
    }

    #[test]
    fn test_aggregation_maps_detector_label_scheme() {
        // roberta-openai-detector style labels.
        let predictions = vec![prediction("Fake", 0.8), prediction("Real", 0.3)];
        assert!(aggregate_predictions(&predictions));
    }

    #[test]
    fn test_empty_predictions_count_as_ai_tie() {
        assert!(aggregate_predictions(&[]));
    }
}

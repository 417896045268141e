// finetune-rs/src/backend.rs
// Training backend abstraction. The dataset-merging and formatting logic
// lives in this crate; which optimization library executes the fit step is
// an implementation detail behind this trait. The production backend
// drives a remote training-runner service over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::dataset::ChatTrainingRecord;

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("network error: {0}")]
    Network(String),

    #[error("training runner returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),
}

/// Parameter-efficient fine-tuning settings for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Hyperparameters {
    pub lora_r: u32,
    pub lora_alpha: u32,
    pub lora_dropout: f64,
    pub max_seq_length: u32,
    pub per_device_train_batch_size: u32,
    pub gradient_accumulation_steps: u32,
    pub warmup_steps: u32,
    pub max_steps: u32,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub seed: u64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            lora_r: 16,
            lora_alpha: 32,
            lora_dropout: 0.05,
            max_seq_length: 2048,
            per_device_train_batch_size: 2,
            gradient_accumulation_steps: 4,
            warmup_steps: 5,
            max_steps: 30,
            learning_rate: 2e-4,
            weight_decay: 0.01,
            seed: 3407,
        }
    }
}

#[async_trait]
pub trait TrainingBackend: Send + Sync {
    /// Upload the formatted dataset; returns a dataset handle.
    async fn prepare_dataset(&self, records: &[ChatTrainingRecord]) -> Result<String, TrainError>;

    /// Run one fine-tuning pass; returns an artifact handle. Blocks until
    /// the run completes or fails; there is no partial-checkpoint recovery.
    async fn fit(
        &self,
        base_model_id: &str,
        dataset_id: &str,
        hyperparameters: &Hyperparameters,
    ) -> Result<String, TrainError>;

    /// Publish the trained artifact under a version tag; returns the
    /// published model identifier.
    async fn publish_version(
        &self,
        artifact_id: &str,
        version_tag: &str,
    ) -> Result<String, TrainError>;
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    model_id: String,
}

pub struct HttpTrainingBackend {
    client: Client,
    api_base: String,
}

impl HttpTrainingBackend {
    pub fn new(api_base: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, TrainError> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TrainError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrainError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| TrainError::Parse(e.to_string()))
    }
}

#[async_trait]
impl TrainingBackend for HttpTrainingBackend {
    async fn prepare_dataset(&self, records: &[ChatTrainingRecord]) -> Result<String, TrainError> {
        let body = serde_json::json!({ "records": records });
        let response: IdResponse = self.post_json("/datasets", &body).await?;
        log::info!("Prepared training dataset {}", response.id);
        Ok(response.id)
    }

    async fn fit(
        &self,
        base_model_id: &str,
        dataset_id: &str,
        hyperparameters: &Hyperparameters,
    ) -> Result<String, TrainError> {
        let body = serde_json::json!({
            "base_model": base_model_id,
            "dataset_id": dataset_id,
            "hyperparameters": hyperparameters,
        });
        let response: IdResponse = self.post_json("/fine-tunes", &body).await?;
        log::info!("Fine-tuning run {} completed", response.id);
        Ok(response.id)
    }

    async fn publish_version(
        &self,
        artifact_id: &str,
        version_tag: &str,
    ) -> Result<String, TrainError> {
        let body = serde_json::json!({ "version_tag": version_tag });
        let path = format!("/models/{}/publish", artifact_id);
        let response: PublishResponse = self.post_json(&path, &body).await?;
        log::info!(
            "Published model {} with tag {}",
            response.model_id,
            version_tag
        );
        Ok(response.model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hyperparameters() {
        let hp = Hyperparameters::default();
        assert_eq!(hp.lora_r, 16);
        assert_eq!(hp.lora_alpha, 32);
        assert_eq!(hp.max_steps, 30);
        assert_eq!(hp.seed, 3407);
    }

    #[test]
    fn test_hyperparameters_serialize_for_the_runner() {
        let hp = Hyperparameters::default();
        let value = serde_json::to_value(&hp).unwrap();
        assert_eq!(value["lora_r"], 16);
        assert_eq!(value["learning_rate"], 2e-4);
    }
}

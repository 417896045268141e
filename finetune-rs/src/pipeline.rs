// finetune-rs/src/pipeline.rs
// The fine-tuning run itself: feedback snapshot -> merged dataset ->
// chat-format records -> backend fit -> published version. Any failure
// after dataset assembly aborts the whole run; nothing partial is
// published.

use std::path::Path;

use chrono::Utc;

use feedback::{FeedbackQueue, QueueError, TASK_TEXT2SQL};

use crate::backend::{Hyperparameters, TrainError, TrainingBackend};
use crate::dataset::{
    examples_from_feedback, format_example, load_curated_base, merge_and_shuffle, sample_base,
};

#[derive(Debug, thiserror::Error)]
pub enum FineTuneError {
    #[error("feedback queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("failed to load curated base corpus: {0}")]
    BaseCorpus(#[from] std::io::Error),

    #[error("training backend error: {0}")]
    Backend(#[from] TrainError),
}

/// Execute one fine-tuning run against a point-in-time snapshot of the
/// feedback queue. Returns the published version tag, or `None` when
/// there was no feedback to learn from (the run is then a no-op).
pub async fn run(
    base_model_id: &str,
    queue: &dyn FeedbackQueue,
    backend: &dyn TrainingBackend,
    curated_base_path: &Path,
) -> Result<Option<String>, FineTuneError> {
    let feedback_rows = queue.fetch_all(TASK_TEXT2SQL).await?;
    let feedback_examples = examples_from_feedback(&feedback_rows);
    if feedback_examples.is_empty() {
        log::info!("No feedback available for fine-tuning.");
        return Ok(None);
    }
    log::info!(
        "Collected {} training examples from {} feedback rows",
        feedback_examples.len(),
        feedback_rows.len()
    );

    let base = load_curated_base(curated_base_path)?;
    let base_slice = sample_base(base);
    log::info!("Sampled {} curated base examples", base_slice.len());

    let merged = merge_and_shuffle(feedback_examples, base_slice);
    let records: Vec<_> = merged.iter().map(format_example).collect();

    let version_tag = format!("v{}", Utc::now().date_naive());
    let hyperparameters = Hyperparameters::default();

    let dataset_id = backend.prepare_dataset(&records).await?;
    let artifact_id = backend
        .fit(base_model_id, &dataset_id, &hyperparameters)
        .await?;
    let model_id = backend.publish_version(&artifact_id, &version_tag).await?;

    log::info!("Model {} published with tag {}", model_id, version_tag);
    Ok(Some(version_tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ChatTrainingRecord;
    use async_trait::async_trait;
    use feedback::FeedbackRecord;
    use serde_json::json;
    use std::io::Write as _;
    use std::sync::Mutex;

    struct InMemoryQueue(Vec<FeedbackRecord>);

    #[async_trait]
    impl FeedbackQueue for InMemoryQueue {
        async fn enqueue(&self, _record: &FeedbackRecord) -> Result<(), QueueError> {
            unimplemented!("read-only test queue");
        }

        async fn fetch_all(&self, task: &str) -> Result<Vec<FeedbackRecord>, QueueError> {
            Ok(self.0.iter().filter(|r| r.task == task).cloned().collect())
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<String>>,
        fail_fit: bool,
    }

    #[async_trait]
    impl TrainingBackend for RecordingBackend {
        async fn prepare_dataset(
            &self,
            records: &[ChatTrainingRecord],
        ) -> Result<String, TrainError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("prepare:{}", records.len()));
            Ok("dataset-1".to_string())
        }

        async fn fit(
            &self,
            base_model_id: &str,
            dataset_id: &str,
            _hp: &Hyperparameters,
        ) -> Result<String, TrainError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("fit:{}:{}", base_model_id, dataset_id));
            if self.fail_fit {
                return Err(TrainError::Endpoint {
                    status: 500,
                    body: "trainer crashed".to_string(),
                });
            }
            Ok("artifact-1".to_string())
        }

        async fn publish_version(
            &self,
            artifact_id: &str,
            version_tag: &str,
        ) -> Result<String, TrainError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("publish:{}:{}", artifact_id, version_tag));
            Ok("model-v1".to_string())
        }
    }

    fn feedback_record(question: &str) -> FeedbackRecord {
        FeedbackRecord::try_new(
            json!({"question": question, "table_str": "id (text)"}),
            "query=SELECT 1".to_string(),
            true,
            None,
            Some(TASK_TEXT2SQL.to_string()),
            None,
        )
        .unwrap()
    }

    fn curated_base_file(rows: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..rows {
            writeln!(
                file,
                r#"{{"question": "base {}", "sql": "SELECT {}", "table_str": "id (text)"}}"#,
                i, i
            )
            .unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_empty_feedback_is_a_noop() {
        let queue = InMemoryQueue(Vec::new());
        let backend = RecordingBackend::default();
        let base = curated_base_file(10);

        let result = run("base-model", &queue, &backend, base.path())
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_run_publishes_date_tagged_version() {
        let queue = InMemoryQueue(vec![feedback_record("q1"), feedback_record("q2")]);
        let backend = RecordingBackend::default();
        let base = curated_base_file(10);

        let tag = run("base-model", &queue, &backend, base.path())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tag, format!("v{}", Utc::now().date_naive()));

        let calls = backend.calls.lock().unwrap();
        // 2 feedback examples + 30% of 10 base rows = 5 records.
        assert_eq!(calls[0], "prepare:5");
        assert_eq!(calls[1], "fit:base-model:dataset-1");
        assert_eq!(calls[2], format!("publish:artifact-1:{}", tag));
    }

    #[tokio::test]
    async fn test_fit_failure_aborts_without_publish() {
        let queue = InMemoryQueue(vec![feedback_record("q1")]);
        let backend = RecordingBackend {
            fail_fit: true,
            ..Default::default()
        };
        let base = curated_base_file(4);

        let result = run("base-model", &queue, &backend, base.path()).await;
        assert!(matches!(result, Err(FineTuneError::Backend(_))));

        let calls = backend.calls.lock().unwrap();
        assert!(calls.iter().all(|c| !c.starts_with("publish")));
    }

    #[tokio::test]
    async fn test_missing_base_corpus_fails_the_run() {
        let queue = InMemoryQueue(vec![feedback_record("q1")]);
        let backend = RecordingBackend::default();

        let result = run(
            "base-model",
            &queue,
            &backend,
            Path::new("/nonexistent/curated_base.jsonl"),
        )
        .await;
        assert!(matches!(result, Err(FineTuneError::BaseCorpus(_))));
    }
}

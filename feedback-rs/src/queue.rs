// feedback-rs/src/queue.rs
// Durable FIFO feedback queue. Two backends behind one trait: a Redis
// list (shared deployments) and an append-only NDJSON file (single-node).
// Enqueue is a single atomic append per record; fetch reads a
// point-in-time snapshot without removing anything.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use config_rs::{FeedbackBackend, Settings};

use crate::record::FeedbackRecord;

const REDIS_QUEUE_KEY: &str = "feedback_queue";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[async_trait]
pub trait FeedbackQueue: Send + Sync {
    /// Append one record; atomic and ordering-preserving.
    async fn enqueue(&self, record: &FeedbackRecord) -> Result<(), QueueError>;

    /// Read every stored record for a task, oldest first. Unparseable
    /// entries are skipped with a warning.
    async fn fetch_all(&self, task: &str) -> Result<Vec<FeedbackRecord>, QueueError>;
}

/// Construct the queue backend selected by configuration.
pub async fn queue_from_settings(
    settings: &Settings,
) -> Result<Arc<dyn FeedbackQueue>, QueueError> {
    match settings.feedback_backend {
        FeedbackBackend::Redis => {
            let queue = RedisFeedbackQueue::connect(&settings.redis_url()).await?;
            Ok(Arc::new(queue))
        }
        FeedbackBackend::File => {
            let queue = FileBackedFeedbackQueue::new(PathBuf::from(&settings.feedback_store_path))?;
            Ok(Arc::new(queue))
        }
    }
}

fn parse_line(line: &str) -> Option<FeedbackRecord> {
    match serde_json::from_str::<FeedbackRecord>(line) {
        Ok(record) => Some(record),
        Err(err) => {
            log::warn!("Skipping malformed feedback row: {}", err);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Redis list backend
// ---------------------------------------------------------------------------

pub struct RedisFeedbackQueue {
    manager: redis::aio::ConnectionManager,
    key: String,
}

impl RedisFeedbackQueue {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        log::info!("Connecting feedback queue to Redis at {}", url);
        let client = redis::Client::open(url)?;
        let manager = client.get_tokio_connection_manager().await?;
        Ok(Self {
            manager,
            key: REDIS_QUEUE_KEY.to_string(),
        })
    }
}

#[async_trait]
impl FeedbackQueue for RedisFeedbackQueue {
    async fn enqueue(&self, record: &FeedbackRecord) -> Result<(), QueueError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.manager.clone();
        conn.rpush::<_, _, ()>(&self.key, payload).await?;
        Ok(())
    }

    async fn fetch_all(&self, task: &str) -> Result<Vec<FeedbackRecord>, QueueError> {
        let mut conn = self.manager.clone();
        let raw: Vec<String> = conn.lrange(&self.key, 0, -1).await?;

        Ok(raw
            .iter()
            .filter_map(|line| parse_line(line))
            .filter(|record| record.task == task)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Append-only NDJSON file backend
// ---------------------------------------------------------------------------

pub struct FileBackedFeedbackQueue {
    path: PathBuf,
}

impl FileBackedFeedbackQueue {
    /// Eagerly creates the parent directory so a misconfigured path fails
    /// at startup instead of on the first enqueue.
    pub fn new(path: PathBuf) -> Result<Self, QueueError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FeedbackQueue for FileBackedFeedbackQueue {
    async fn enqueue(&self, record: &FeedbackRecord) -> Result<(), QueueError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .write(true)
            .open(self.path())
            .await?;

        let line = serde_json::to_string(record)?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        Ok(())
    }

    async fn fetch_all(&self, task: &str) -> Result<Vec<FeedbackRecord>, QueueError> {
        if !self.path().exists() {
            return Ok(Vec::new());
        }

        let mut file = fs::File::open(self.path()).await?;
        let mut buf = String::new();
        file.read_to_string(&mut buf).await?;

        Ok(buf
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(parse_line)
            .filter(|record| record.task == task)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{TASK_AI_DETECTOR, TASK_TEXT2SQL};
    use serde_json::json;

    fn record(question: &str, sql: &str) -> FeedbackRecord {
        FeedbackRecord::try_new(
            json!({"question": question, "table_str": "id (text)"}),
            sql.to_string(),
            true,
            None,
            Some(TASK_TEXT2SQL.to_string()),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_file_queue_preserves_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue =
            FileBackedFeedbackQueue::new(dir.path().join("feedback_queue.ndjson")).unwrap();

        queue.enqueue(&record("first", "query=SELECT 1")).await.unwrap();
        queue.enqueue(&record("second", "query=SELECT 2")).await.unwrap();
        queue.enqueue(&record("third", "query=SELECT 3")).await.unwrap();

        let rows = queue.fetch_all(TASK_TEXT2SQL).await.unwrap();
        let questions: Vec<&str> = rows
            .iter()
            .map(|r| r.input.get("question").unwrap().as_str().unwrap())
            .collect();
        assert_eq!(questions, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_file_queue_filters_by_task() {
        let dir = tempfile::tempdir().unwrap();
        let queue =
            FileBackedFeedbackQueue::new(dir.path().join("feedback_queue.ndjson")).unwrap();

        queue.enqueue(&record("q", "query=SELECT 1")).await.unwrap();
        let detector = FeedbackRecord::try_new(
            json!({"text": "sample"}),
            "true".to_string(),
            false,
            Some("false".to_string()),
            Some(TASK_AI_DETECTOR.to_string()),
            None,
        )
        .unwrap();
        queue.enqueue(&detector).await.unwrap();

        assert_eq!(queue.fetch_all(TASK_TEXT2SQL).await.unwrap().len(), 1);
        assert_eq!(queue.fetch_all(TASK_AI_DETECTOR).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_queue_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback_queue.ndjson");
        let queue = FileBackedFeedbackQueue::new(path.clone()).unwrap();

        queue.enqueue(&record("good", "query=SELECT 1")).await.unwrap();
        tokio::fs::write(
            &path,
            format!(
                "{}\nnot json\n",
                serde_json::to_string(&record("good", "query=SELECT 1")).unwrap()
            ),
        )
        .await
        .unwrap();

        let rows = queue.fetch_all(TASK_TEXT2SQL).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_from_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileBackedFeedbackQueue::new(dir.path().join("never_written.ndjson")).unwrap();
        assert!(queue.fetch_all(TASK_TEXT2SQL).await.unwrap().is_empty());
    }
}

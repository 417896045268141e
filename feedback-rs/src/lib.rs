// feedback-rs/src/lib.rs
// User-correction feedback: the validated record model and the durable
// FIFO queue it is appended to. Records are written once and never
// mutated; the fine-tuning job reads them without removing them.

pub mod queue;
pub mod record;

pub use queue::{
    queue_from_settings, FeedbackQueue, FileBackedFeedbackQueue, QueueError, RedisFeedbackQueue,
};
pub use record::{FeedbackError, FeedbackRecord, TASK_AI_DETECTOR, TASK_TEXT2SQL};

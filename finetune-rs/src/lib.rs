// finetune-rs/src/lib.rs
// Offline feedback-aggregation and fine-tuning pipeline. Runs out of band
// from the serving path: it reads a point-in-time snapshot of the feedback
// queue, merges it with a sampled slice of the curated base corpus, and
// drives a parameter-efficient fine-tuning pass through a training
// backend, producing a date-tagged model version.

pub mod backend;
pub mod dataset;
pub mod pipeline;

pub use backend::{HttpTrainingBackend, Hyperparameters, TrainError, TrainingBackend};
pub use dataset::{ChatTrainingRecord, TrainingExample};
pub use pipeline::{run, FineTuneError};

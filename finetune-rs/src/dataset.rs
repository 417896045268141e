// finetune-rs/src/dataset.rs
// Training-set assembly: feedback-derived examples, the sampled curated
// base slice, and the chat-format records fed to the trainer. All
// shuffles are seeded so a run is reproducible.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use feedback::FeedbackRecord;
use llm_service::prompt::render_prompt;

/// Fraction of the curated base corpus mixed in as a stabilizing anchor so
/// fine-tuning does not overfit to recent feedback alone.
pub const BASE_SAMPLE_FRACTION: f64 = 0.3;

/// Seed for the curated-base sampling shuffle.
pub const BASE_SHUFFLE_SEED: u64 = 42;

/// Seed for the merged-dataset shuffle that interleaves provenance.
pub const MERGE_SHUFFLE_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub question: String,
    pub sql: String,
    pub table_str: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// One chat-formatted training record: the serving prompt as the user
/// turn, the target response as the assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTrainingRecord {
    pub messages: Vec<ChatTurn>,
}

/// Derive training examples from stored feedback. The effective correct
/// output is already resolved on the record; rows whose input payload does
/// not carry `{question, table_str}` are skipped with a warning, never
/// fatal to the batch.
pub fn examples_from_feedback(records: &[FeedbackRecord]) -> Vec<TrainingExample> {
    let mut examples = Vec::new();

    for record in records {
        let question = record.input.get("question").and_then(|v| v.as_str());
        let table_str = record.input.get("table_str").and_then(|v| v.as_str());

        match (question, table_str) {
            (Some(question), Some(table_str)) if !record.correct_output.trim().is_empty() => {
                examples.push(TrainingExample {
                    question: question.to_string(),
                    sql: record.correct_output.clone(),
                    table_str: table_str.to_string(),
                });
            }
            _ => {
                log::warn!("Skipping malformed feedback row (input: {})", record.input);
            }
        }
    }

    examples
}

/// Load the curated base corpus: line-delimited JSON records with
/// `question`, `sql` and `table_str`. Malformed lines are skipped with a
/// warning.
pub fn load_curated_base(path: &Path) -> std::io::Result<Vec<TrainingExample>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut examples = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TrainingExample>(&line) {
            Ok(example) => examples.push(example),
            Err(e) => {
                log::warn!("Skipping malformed base row at line {}: {}", line_no + 1, e);
            }
        }
    }

    Ok(examples)
}

/// Deterministically shuffle the base corpus and keep the anchor fraction.
pub fn sample_base(mut base: Vec<TrainingExample>) -> Vec<TrainingExample> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(BASE_SHUFFLE_SEED);
    base.shuffle(&mut rng);
    let keep = (base.len() as f64 * BASE_SAMPLE_FRACTION) as usize;
    base.truncate(keep);
    base
}

/// Concatenate feedback-derived examples with the base slice and shuffle
/// the combined set to interleave example provenance.
pub fn merge_and_shuffle(
    feedback: Vec<TrainingExample>,
    base: Vec<TrainingExample>,
) -> Vec<TrainingExample> {
    let mut merged = feedback;
    merged.extend(base);
    let mut rng = rand::rngs::StdRng::seed_from_u64(MERGE_SHUFFLE_SEED);
    merged.shuffle(&mut rng);
    merged
}

/// Format one example with the same instruction template used at
/// inference time, so the training distribution matches serving.
pub fn format_example(example: &TrainingExample) -> ChatTrainingRecord {
    let prompt = render_prompt(&example.table_str, &example.question);
    ChatTrainingRecord {
        messages: vec![
            ChatTurn {
                role: "user".to_string(),
                content: prompt,
            },
            ChatTurn {
                role: "assistant".to_string(),
                content: format!("query={}", example.sql),
            },
        ],
    }
}

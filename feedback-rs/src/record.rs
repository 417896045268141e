// feedback-rs/src/record.rs
// Validated feedback record. Validation happens at construction so that
// everything reaching the queue is already well-formed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TASK_TEXT2SQL: &str = "text2sql";
pub const TASK_AI_DETECTOR: &str = "ai-detector";

const RECOGNIZED_TASKS: &[&str] = &[TASK_TEXT2SQL, TASK_AI_DETECTOR];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FeedbackError {
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Invalid task: {0}")]
    UnsupportedTask(String),

    #[error("Missing correct_output for incorrect prediction")]
    MissingCorrectOutput,

    #[error("Invalid input payload: {0}")]
    InvalidInput(String),
}

/// One stored correction/confirmation event tied to one prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub input: serde_json::Value,
    pub prediction: String,
    pub is_correct: bool,
    /// Always resolvable: the prediction itself when correct, an explicit
    /// correction otherwise.
    pub correct_output: String,
    pub task: String,
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Validate and normalize raw feedback fields into a record.
    ///
    /// - `input`, `task` and `prediction` are required; the task must be
    ///   one of the recognized set.
    /// - For text2sql the input payload is reduced to exactly
    ///   `{question, table_str}`; extraneous keys are discarded.
    /// - When the prediction is marked correct, the prediction itself is
    ///   the effective correction, even if a divergent `correct_output`
    ///   was supplied. Otherwise an explicit correction is required.
    pub fn try_new(
        input: serde_json::Value,
        prediction: String,
        is_correct: bool,
        correct_output: Option<String>,
        task: Option<String>,
        model: Option<String>,
    ) -> Result<Self, FeedbackError> {
        let has_input = match &input {
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::Null => false,
            _ => true,
        };
        if !has_input {
            return Err(FeedbackError::MissingField("input"));
        }

        let task = match task {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(FeedbackError::MissingField("task")),
        };

        if prediction.trim().is_empty() {
            return Err(FeedbackError::MissingField("prediction"));
        }

        if !RECOGNIZED_TASKS.contains(&task.as_str()) {
            return Err(FeedbackError::UnsupportedTask(task));
        }

        let input = if task == TASK_TEXT2SQL {
            normalize_text2sql_input(&input)?
        } else {
            input
        };

        let correct_output = if is_correct {
            prediction.clone()
        } else {
            match correct_output {
                Some(c) if !c.trim().is_empty() => c,
                _ => return Err(FeedbackError::MissingCorrectOutput),
            }
        };

        Ok(Self {
            input,
            prediction,
            is_correct,
            correct_output,
            task,
            model,
            timestamp: Utc::now(),
        })
    }
}

/// Reduce a text2sql input payload to exactly `{question, table_str}`.
fn normalize_text2sql_input(
    input: &serde_json::Value,
) -> Result<serde_json::Value, FeedbackError> {
    let question = input
        .get("question")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FeedbackError::InvalidInput("missing question".to_string()))?;
    let table_str = input
        .get("table_str")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FeedbackError::InvalidInput("missing table_str".to_string()))?;

    Ok(serde_json::json!({
        "question": question,
        "table_str": table_str,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text2sql_input() -> serde_json::Value {
        json!({
            "question": "Show me all user names",
            "table_str": "id (text) | name (text)",
        })
    }

    #[test]
    fn test_correct_prediction_needs_no_correction() {
        let record = FeedbackRecord::try_new(
            text2sql_input(),
            "query=SELECT name FROM users".to_string(),
            true,
            None,
            Some(TASK_TEXT2SQL.to_string()),
            None,
        )
        .unwrap();

        assert_eq!(record.correct_output, "query=SELECT name FROM users");
    }

    #[test]
    fn test_correct_prediction_wins_over_divergent_correction() {
        let record = FeedbackRecord::try_new(
            text2sql_input(),
            "query=SELECT name FROM users".to_string(),
            true,
            Some("query=SELECT * FROM users".to_string()),
            Some(TASK_TEXT2SQL.to_string()),
            None,
        )
        .unwrap();

        assert_eq!(record.correct_output, "query=SELECT name FROM users");
    }

    #[test]
    fn test_incorrect_prediction_requires_correction() {
        let result = FeedbackRecord::try_new(
            json!({"text": "some text"}),
            "true".to_string(),
            false,
            None,
            Some(TASK_AI_DETECTOR.to_string()),
            None,
        );
        assert_eq!(result.unwrap_err(), FeedbackError::MissingCorrectOutput);
    }

    #[test]
    fn test_text2sql_input_is_normalized() {
        let input = json!({
            "question": "How many rows?",
            "table_str": "id (text)",
            "session_id": "abc-123",
            "debug": true,
        });

        let record = FeedbackRecord::try_new(
            input,
            "query=SELECT COUNT(*) FROM t".to_string(),
            true,
            None,
            Some(TASK_TEXT2SQL.to_string()),
            Some("qwen2.5-3B".to_string()),
        )
        .unwrap();

        let keys: Vec<&String> = record.input.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["question", "table_str"]);
    }

    #[test]
    fn test_text2sql_input_missing_fields_rejected() {
        let result = FeedbackRecord::try_new(
            json!({"question": "only a question"}),
            "query=SELECT 1".to_string(),
            true,
            None,
            Some(TASK_TEXT2SQL.to_string()),
            None,
        );
        assert!(matches!(result, Err(FeedbackError::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_task_rejected() {
        let result = FeedbackRecord::try_new(
            json!({"text": "hello"}),
            "p".to_string(),
            true,
            None,
            Some("summarization".to_string()),
            None,
        );
        assert!(matches!(result, Err(FeedbackError::UnsupportedTask(_))));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = FeedbackRecord::try_new(
            json!({}),
            "p".to_string(),
            true,
            None,
            Some(TASK_AI_DETECTOR.to_string()),
            None,
        )
        .unwrap_err();
        assert_eq!(err, FeedbackError::MissingField("input"));

        let err = FeedbackRecord::try_new(
            json!({"text": "hello"}),
            "p".to_string(),
            true,
            None,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, FeedbackError::MissingField("task"));

        let err = FeedbackRecord::try_new(
            json!({"text": "hello"}),
            "".to_string(),
            true,
            None,
            Some(TASK_AI_DETECTOR.to_string()),
            None,
        )
        .unwrap_err();
        assert_eq!(err, FeedbackError::MissingField("prediction"));
    }
}

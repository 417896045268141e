// header-kb-rs/src/ingest.rs
// Header ingestion pipeline: extract the distinct column headers from a
// line-delimited JSON corpus of tables and stage them for bulk load.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract the set of unique header strings from a JSONL file of tables
/// (one `{"header": [...]}` object per line). Returns them sorted so the
/// bulk-load offsets, and therefore the point ids, are deterministic.
/// Unparseable lines are skipped with a warning.
pub fn extract_unique_headers_from_file(jsonl_path: &Path) -> Result<Vec<String>, IngestError> {
    let file = File::open(jsonl_path)?;
    let reader = BufReader::new(file);

    let mut unique_headers = BTreeSet::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let table: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Skipping malformed table row at line {}: {}", line_no + 1, e);
                continue;
            }
        };
        if let Some(headers) = table.get("header").and_then(|h| h.as_array()) {
            for header in headers {
                if let Some(text) = header.as_str() {
                    unique_headers.insert(text.to_string());
                }
            }
        }
    }

    Ok(unique_headers.into_iter().collect())
}

/// Write headers to a plain-text file, one per line.
pub fn save_headers(headers: &[String], output_path: &Path) -> Result<(), IngestError> {
    let mut file = File::create(output_path)?;
    for header in headers {
        writeln!(file, "{}", header)?;
    }
    Ok(())
}

/// Load a previously saved header file, skipping blank lines.
pub fn load_headers(path: &Path) -> Result<Vec<String>, IngestError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut headers = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            headers.push(trimmed.to_string());
        }
    }
    Ok(headers)
}

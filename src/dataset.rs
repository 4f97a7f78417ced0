//! Corpus Loading
//!
//! Reads question/answer rows exported from the authoring spreadsheet and
//! partitions them into tiers by their `Level` column.
//!
//! Two layouts are accepted:
//! 1. JSON: a single array of row objects
//! 2. JSON Lines (`.jsonl`): one row object per line
//!
//! ```json
//! {"UID": "Q-001", "Parent": "", "Level": "A",
//!  "Well-formed questions": "...", "Well-formed answers": "..."}
//! ```

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

use crate::corpus::{Corpus, Record, Tier, TIER_COUNT};

/// Dataset loading errors.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid row at {path}:{line}: {source}")]
    Row {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One spreadsheet row
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TableRow {
    #[serde(rename = "UID", alias = "id", deserialize_with = "cell_text")]
    pub id: String,

    #[serde(rename = "Parent", alias = "parent_id", default, deserialize_with = "cell_text")]
    pub parent: String,

    #[serde(rename = "Level", alias = "level", default, deserialize_with = "cell_text")]
    pub level: String,

    #[serde(
        rename = "Well-formed questions",
        alias = "question",
        default,
        deserialize_with = "cell_text"
    )]
    pub question: String,

    #[serde(
        rename = "Well-formed answers",
        alias = "answer",
        default,
        deserialize_with = "cell_text"
    )]
    pub answer: String,
}

impl TableRow {
    pub fn tier(&self) -> Option<Tier> {
        Tier::from_label(&self.level)
    }

    pub fn into_record(self) -> Record {
        Record::new(self.id, self.parent, self.question, self.answer)
    }
}

/// Spreadsheet cells arrive as strings, numbers or nulls.
fn cell_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    })
}

/// Partition rows into tiers, dropping rows with an unknown level.
pub fn partition_rows(rows: impl IntoIterator<Item = TableRow>) -> Corpus {
    let mut tiers: [Vec<Record>; TIER_COUNT] = Default::default();
    let mut dropped = 0usize;
    for row in rows {
        match row.tier() {
            Some(tier) => tiers[tier.index()].push(row.into_record()),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "skipped rows with unrecognized level");
    }
    Corpus::new(tiers)
}

/// Parse a JSON array of rows
pub fn rows_from_json<R: Read>(reader: R, path: &str) -> Result<Vec<TableRow>, DatasetError> {
    serde_json::from_reader(reader).map_err(|source| DatasetError::Json {
        path: path.to_string(),
        source,
    })
}

/// Parse JSON Lines rows, skipping blank lines
pub fn rows_from_jsonl<R: BufRead>(reader: R, path: &str) -> Result<Vec<TableRow>, DatasetError> {
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Io {
            path: path.to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|source| DatasetError::Row {
            path: path.to_string(),
            line: idx + 1,
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Load a corpus from a `.json` or `.jsonl` file.
pub fn load_corpus(path: &Path) -> Result<Corpus, DatasetError> {
    let path_str = path.display().to_string();
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path_str.clone(),
        source,
    })?;
    let reader = BufReader::new(file);
    let is_jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jsonl"));
    let rows = if is_jsonl {
        rows_from_jsonl(reader, &path_str)?
    } else {
        rows_from_json(reader, &path_str)?
    };
    tracing::debug!(path = %path_str, rows = rows.len(), "loaded corpus rows");
    Ok(partition_rows(rows))
}

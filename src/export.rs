//! Conversation Export
//!
//! Writes generated conversations either as one pretty-printed JSON array
//! (4-space indent) or as JSON Lines. Non-ASCII text is written as-is.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::conversation::ConversationRecord;

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize conversations: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Output file layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Single pretty-printed JSON array
    #[default]
    Json,
    /// One compact record per line
    JsonLines,
}

impl ExportFormat {
    /// JSON Lines for `.jsonl` paths, JSON otherwise
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => Self::JsonLines,
            _ => Self::Json,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonLines => "jsonl",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Ok(Self::JsonLines),
            other => Err(format!("unknown export format '{}' (expected json or jsonl)", other)),
        }
    }
}

/// Serialize conversations as an indented JSON array.
pub fn to_json_writer<W: Write>(
    writer: W,
    conversations: &[ConversationRecord],
) -> Result<(), ExportError> {
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(writer, formatter);
    conversations.serialize(&mut ser)?;
    Ok(())
}

/// Serialize conversations one per line.
pub fn to_jsonl_writer<W: Write>(
    mut writer: W,
    conversations: &[ConversationRecord],
) -> Result<(), ExportError> {
    for record in conversations {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    }
    Ok(())
}

/// Write conversations to `path` in the given format.
pub fn write_conversations(
    path: &Path,
    conversations: &[ConversationRecord],
    format: ExportFormat,
) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    match format {
        ExportFormat::Json => to_json_writer(&mut writer, conversations)?,
        ExportFormat::JsonLines => to_jsonl_writer(&mut writer, conversations)?,
    }
    writer.flush().map_err(io_err)?;
    tracing::info!(
        path = %path.display(),
        conversations = conversations.len(),
        format = format.name(),
        "wrote conversations"
    );
    Ok(())
}

/// Write conversations as a pretty-printed JSON array.
pub fn write_json(path: &Path, conversations: &[ConversationRecord]) -> Result<(), ExportError> {
    write_conversations(path, conversations, ExportFormat::Json)
}

/// Write conversations as JSON Lines.
pub fn write_jsonl(path: &Path, conversations: &[ConversationRecord]) -> Result<(), ExportError> {
    write_conversations(path, conversations, ExportFormat::JsonLines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ConversationRecord> {
        vec![ConversationRecord {
            instruction: "Sei un assistente.".to_string(),
            input: "Quanto costa?".to_string(),
            output: "Cinque euro (5€).".to_string(),
            history: vec![["你好".to_string(), "您好！".to_string()]],
        }]
    }

    #[test]
    fn test_json_layout() {
        let mut buf = Vec::new();
        to_json_writer(&mut buf, &records()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("[\n    {\n        \"instruction\""));
        assert!(text.contains("你好"));
        assert!(text.contains("5€"));
        assert!(!text.contains("\\u"));

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["history"][0][1], "您好！");
        assert_eq!(parsed[0]["input"], "Quanto costa?");
    }

    #[test]
    fn test_jsonl_layout() {
        let mut data = records();
        data.push(ConversationRecord {
            instruction: "x".to_string(),
            input: "q".to_string(),
            output: "a".to_string(),
            history: Vec::new(),
        });
        let mut buf = Vec::new();
        to_jsonl_writer(&mut buf, &data).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: ConversationRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.history.len(), 0);
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(ExportFormat::from_path(Path::new("out.jsonl")), ExportFormat::JsonLines);
        assert_eq!(ExportFormat::from_path(Path::new("out.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("out")), ExportFormat::Json);
        assert_eq!("JSONL".parse::<ExportFormat>(), Ok(ExportFormat::JsonLines));
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.json");
        write_json(&path, &records()).unwrap();
        let loaded: Vec<ConversationRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, records());

        let bad = dir.path().join("missing").join("out.json");
        assert!(matches!(write_json(&bad, &records()), Err(ExportError::Io { .. })));
    }
}

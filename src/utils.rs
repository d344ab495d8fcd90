//! Output formatting shared by the command-line tool

#[cfg(feature = "display")]
use crate::database::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unified output format for all commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON (single line)
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
    /// JSON Lines format (one JSON object per line)
    JsonLine,
}

impl OutputFormat {
    /// Check if this is a JSON variant
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty | Self::JsonLine)
    }

    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty", "json-line"]
    }

    /// Render serializable items as JSON in this format
    ///
    /// Returns `None` for the table formats.
    pub fn render_json<T: Serialize>(&self, items: &[T]) -> Option<serde_json::Result<String>> {
        match self {
            Self::Json => Some(serde_json::to_string(items)),
            Self::JsonPretty => Some(serde_json::to_string_pretty(items)),
            Self::JsonLine => Some(
                items
                    .iter()
                    .map(serde_json::to_string)
                    .collect::<serde_json::Result<Vec<_>>>()
                    .map(|lines| lines.join("\n")),
            ),
            Self::Table | Self::Markdown => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
            Self::JsonLine => write!(f, "json-line"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "json-line" | "jsonline" | "jsonl" | "ndjson" => Ok(Self::JsonLine),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Build a table of query records, using the first record's columns as header
#[cfg(feature = "display")]
pub fn records_table(records: &[Record]) -> tabled::Table {
    let mut builder = tabled::builder::Builder::default();
    if let Some(first) = records.first() {
        builder.push_record(first.columns().iter().cloned());
    }
    for record in records {
        builder.push_record(record.values().iter().map(display_value));
    }
    builder.build()
}

/// Render a SQLite value for table output
pub fn display_value(value: &rusqlite::types::Value) -> String {
    use rusqlite::types::Value;
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("MD".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert_eq!("ndjson".parse::<OutputFormat>(), Ok(OutputFormat::JsonLine));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_output_format_display_round_trips() {
        for name in OutputFormat::all_names() {
            let format: OutputFormat = name.parse().unwrap();
            assert_eq!(format.to_string(), *name);
        }
    }

    #[test]
    fn test_render_json_lines() {
        let items = vec![serde_json::json!({"a": 1}), serde_json::json!({"a": 2})];

        let rendered = OutputFormat::JsonLine.render_json(&items).unwrap().unwrap();
        assert_eq!(rendered, "{\"a\":1}\n{\"a\":2}");
        assert!(OutputFormat::Table.render_json(&items).is_none());
    }

    #[test]
    fn test_display_value() {
        use rusqlite::types::Value;
        assert_eq!(display_value(&Value::Null), "NULL");
        assert_eq!(display_value(&Value::Integer(42)), "42");
        assert_eq!(display_value(&Value::Text("ada".to_string())), "ada");
        assert_eq!(display_value(&Value::Blob(vec![1, 2, 3])), "<3 bytes>");
    }
}

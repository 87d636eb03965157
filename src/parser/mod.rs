//! Event file parsing
//!
//! Loads classified events from CSV or JSON files for import into storage
//! or for one-off detection runs.
//!
//! # CSV
//!
//! A header row is required. `timestamp` is mandatory; `category` (alias
//! `taxonomy`, `hltp`), `source`, `language`, `title` and `text` are
//! optional. Empty cells are treated as missing.
//!
//! # JSON
//!
//! An array of objects with the same field names.

pub mod csv;

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::analytics::{BurstError, BurstResult};
use crate::models::NewEvent;

/// Errors that can occur while reading event files
#[derive(Error, Debug)]
pub enum ParseError {
    /// File could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required column absent from the CSV header
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Row with the wrong shape
    #[error("Line {line}: {message}")]
    InvalidRow { line: usize, message: String },

    /// Timestamp that matches no accepted format
    #[error("Line {line}: {source}")]
    Timestamp {
        line: usize,
        #[source]
        source: BurstError,
    },

    /// CSV the reader could not decode
    #[error("Invalid CSV: {0}")]
    Csv(#[from] ::csv::Error),

    /// Malformed JSON document
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File extension not recognised
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
}

/// Event file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(ParseError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Parse a timestamp in one of the accepted formats
///
/// Accepted: RFC 3339 (`2024-03-01T12:00:00Z`), `%Y-%m-%d %H:%M:%S`,
/// `%Y-%m-%dT%H:%M:%S` and `%Y-%m-%d`. Values without an offset are taken
/// as UTC; a bare date is midnight UTC.
pub fn parse_timestamp(value: &str) -> BurstResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(BurstError::MalformedTimestamp(value.to_string()))
}

/// Parse CSV event data
pub fn parse_csv_events(input: &str) -> Result<Vec<NewEvent>, ParseError> {
    let records = csv::read_records(input)?;
    let mut rows = records.into_iter();

    let Some((_, header)) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns = CsvColumns::from_header(&header)?;

    let mut events = Vec::new();
    for (line, fields) in rows {
        if fields.len() != header.len() {
            return Err(ParseError::InvalidRow {
                line,
                message: format!("expected {} fields, found {}", header.len(), fields.len()),
            });
        }

        let cell = |idx: Option<usize>| {
            idx.map(|i| fields[i].trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let timestamp = parse_timestamp(&fields[columns.timestamp])
            .map_err(|source| ParseError::Timestamp { line, source })?;

        events.push(NewEvent {
            timestamp: Some(timestamp),
            taxonomy: cell(columns.category),
            source: cell(columns.source),
            language: cell(columns.language),
            title: cell(columns.title),
            text: cell(columns.text),
            is_relevant: true,
            confidence: None,
        });
    }

    Ok(events)
}

/// Column positions resolved from a CSV header
struct CsvColumns {
    timestamp: usize,
    category: Option<usize>,
    source: Option<usize>,
    language: Option<usize>,
    title: Option<usize>,
    text: Option<usize>,
}

impl CsvColumns {
    fn from_header(header: &[String]) -> Result<Self, ParseError> {
        let find = |names: &[&str]| {
            header
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };

        Ok(Self {
            timestamp: find(&["timestamp"])
                .ok_or_else(|| ParseError::MissingColumn("timestamp".to_string()))?,
            category: find(&["category", "taxonomy", "hltp"]),
            source: find(&["source"]),
            language: find(&["language"]),
            title: find(&["title"]),
            text: find(&["text"]),
        })
    }
}

#[derive(Debug, Deserialize)]
struct JsonEvent {
    timestamp: String,
    #[serde(default, alias = "taxonomy", alias = "hltp")]
    category: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    is_relevant: Option<bool>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Parse JSON event data
pub fn parse_json_events(input: &str) -> Result<Vec<NewEvent>, ParseError> {
    let raw: Vec<JsonEvent> = serde_json::from_str(input)?;

    raw.into_iter()
        .enumerate()
        .map(|(idx, e)| {
            let timestamp = parse_timestamp(&e.timestamp).map_err(|source| {
                ParseError::Timestamp {
                    line: idx + 1,
                    source,
                }
            })?;

            Ok(NewEvent {
                timestamp: Some(timestamp),
                taxonomy: e.category.filter(|c| !c.trim().is_empty()),
                source: e.source,
                language: e.language,
                title: e.title,
                text: e.text,
                is_relevant: e.is_relevant.unwrap_or(true),
                confidence: e.confidence,
            })
        })
        .collect()
}

/// Load events from a CSV or JSON file
pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<NewEvent>, ParseError> {
    let path = path.as_ref();
    let format = InputFormat::from_path(path)?;
    let input = std::fs::read_to_string(path)?;

    let events = match format {
        InputFormat::Csv => parse_csv_events(&input)?,
        InputFormat::Json => parse_json_events(&input)?,
    };

    tracing::info!(path = %path.display(), count = events.len(), "Loaded events");
    Ok(events)
}

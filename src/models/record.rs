use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Log severity level, ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Check if this level indicates a failure condition
    pub fn is_error(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Critical)
    }
}

/// A metadata value attached to a log record.
///
/// Metadata is a typed variant rather than an untyped map: producers attach
/// strings, numbers, booleans or an explicit null, and the engine renders a
/// canonical text form for tokenization and filter comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    /// Canonical text rendering used for indexing and comparison
    pub fn as_text(&self) -> String {
        match self {
            MetadataValue::Null => "null".to_string(),
            MetadataValue::Bool(b) => b.to_string(),
            MetadataValue::Integer(i) => i.to_string(),
            MetadataValue::Float(f) => f.to_string(),
            MetadataValue::String(s) => s.clone(),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// One structured log event.
///
/// Records are owned by the producer and treated as immutable by the engine:
/// both halves hold their own copies and never mutate them. The id must be
/// unique per record; timestamps need not be monotonic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    /// Unique identifier
    pub id: Uuid,

    /// Event timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Severity level
    pub level: LogLevel,

    /// Human-readable message
    pub message: String,

    /// Typed metadata attached by the producer
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,

    /// Source file that emitted the record
    pub file: String,

    /// Function that emitted the record
    pub function: String,

    /// Source line number
    pub line: u32,
}

impl LogRecord {
    /// Create a new record with a generated id and the current timestamp
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            metadata: HashMap::new(),
            file: String::new(),
            function: String::new(),
            line: 0,
        }
    }

    /// Override the generated id
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Override the event timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the source location
    pub fn with_source(
        mut self,
        file: impl Into<String>,
        function: impl Into<String>,
        line: u32,
    ) -> Self {
        self.file = file.into();
        self.function = function.into();
        self.line = line;
        self
    }

    /// Check if the record is at error severity or above
    pub fn is_error(&self) -> bool {
        self.level.is_error()
    }

    /// Basename of the source file, used for facet counting
    pub fn file_basename(&self) -> &str {
        self.file.rsplit(['/', '\\']).next().unwrap_or(&self.file)
    }
}

//! Core data model shared by both engine halves.

mod record;

pub use record::{LogLevel, LogRecord, MetadataValue};

//! Error types for the engine.
//!
//! The engine is designed to never fail terminally on bad input: malformed
//! regexes simply fail to match, empty result sets are values, and pattern
//! extraction produces output for any string. The failable surface is
//! configuration validation at construction time, plus lookups of saved
//! searches by id.

use thiserror::Error;

/// Errors surfaced by engine construction and saved-search lookups.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration rejected at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A saved search id that does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(err: validator::ValidationErrors) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

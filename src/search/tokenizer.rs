//! Text tokenization for the inverted index.
//!
//! Tokens are lowercase, purely alphanumeric, and at least two characters
//! long; everything else is a split boundary. The same rule is applied to
//! record messages, metadata values, file names and function names, and to
//! query terms at lookup time, so both sides of the index agree.

use crate::models::LogRecord;

/// Minimum token length; shorter fragments are discarded
const MIN_TOKEN_LEN: usize = 2;

/// Split text into normalized tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect()
}

/// Collect every searchable token of a record: message, metadata values,
/// source file and function name.
pub fn record_tokens(record: &LogRecord) -> Vec<String> {
    let mut tokens = tokenize(&record.message);

    for value in record.metadata.values() {
        tokens.extend(tokenize(&value.as_text()));
    }

    tokens.extend(tokenize(&record.file));
    tokens.extend(tokenize(&record.function));
    tokens
}

//! Canonical pattern extraction.
//!
//! A message is collapsed into a template by replacing variable substrings
//! with placeholders, so "user 42 logged in" and "user 99 logged in" share
//! the pattern "user <NUM> logged in". Substitutions run in a fixed order;
//! the order is part of the observable behavior. The generic number rule
//! runs before the dotted-IPv4 and timestamp rules, so digits inside quads
//! and timestamps have already decayed to `<NUM>` by the time those rules
//! run (see the extraction-order note in DESIGN.md).

use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered substitution table. Order matters and must not be rearranged.
static SUBSTITUTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
            )
            .expect("uuid pattern is valid"),
            "<UUID>",
        ),
        (
            Regex::new(r"\b\d+\b").expect("number pattern is valid"),
            "<NUM>",
        ),
        (
            Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 pattern is valid"),
            "<IP>",
        ),
        (
            Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .expect("email pattern is valid"),
            "<EMAIL>",
        ),
        (
            Regex::new(r"0[xX][0-9a-fA-F]+").expect("hex pattern is valid"),
            "<HEX>",
        ),
        (
            Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}")
                .expect("timestamp pattern is valid"),
            "<TIMESTAMP>",
        ),
    ]
});

/// Collapse a message into its canonical pattern
pub fn extract_pattern(message: &str) -> String {
    let mut pattern = message.to_string();
    for (regex, placeholder) in SUBSTITUTIONS.iter() {
        pattern = regex.replace_all(&pattern, *placeholder).into_owned();
    }
    pattern
}

//! Query grammar: free-text terms, quoted phrases, and field filters.
//!
//! Parsing happens in three passes over a working copy of the raw string,
//! and the order matters: field filters are extracted and removed first,
//! then quoted phrases, and only the residue is split into bare terms. A
//! later pass never sees text consumed by an earlier one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// `field:value` or `field:"quoted value"`
static FIELD_FILTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?P<field>[A-Za-z_][A-Za-z0-9_]*):(?:"(?P<quoted>[^"]*)"|(?P<bare>\S+))"#)
        .expect("field filter regex is valid")
});

/// `"quoted phrase"`
static PHRASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?P<phrase>[^"]*)""#).expect("phrase regex is valid"));

/// A single query term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Term text with any `+`/`-` prefix stripped
    pub text: String,

    /// Term was prefixed with `+`: it must match
    pub required: bool,

    /// Term was prefixed with `-`: it must not match
    pub excluded: bool,

    /// Term came from a quoted phrase
    pub is_phrase: bool,
}

impl Term {
    fn bare(text: String) -> Self {
        Self {
            text,
            required: false,
            excluded: false,
            is_phrase: false,
        }
    }

    fn phrase(text: String) -> Self {
        Self {
            text,
            required: false,
            excluded: false,
            is_phrase: true,
        }
    }
}

/// Comparison operator of a field filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

impl FilterOp {
    /// Compare a record field value against the filter value. Ordering
    /// operators compare lexicographically.
    pub fn compare(&self, field_value: &str, filter_value: &str, case_sensitive: bool) -> bool {
        let (lhs, rhs) = if case_sensitive {
            (field_value.to_string(), filter_value.to_string())
        } else {
            (field_value.to_lowercase(), filter_value.to_lowercase())
        };

        match self {
            FilterOp::Equals => lhs == rhs,
            FilterOp::NotEquals => lhs != rhs,
            FilterOp::Contains => lhs.contains(&rhs),
            FilterOp::GreaterThan => lhs > rhs,
            FilterOp::LessThan => lhs < rhs,
            FilterOp::GreaterOrEqual => lhs >= rhs,
            FilterOp::LessOrEqual => lhs <= rhs,
        }
    }
}

/// A constraint on a record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    /// Field name, resolved against level/file/function/line/metadata
    pub field: String,

    /// Comparison operator; filters parsed from a query string always
    /// carry [`FilterOp::Equals`]
    pub op: FilterOp,

    /// Value to compare against
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// A parsed query, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// The raw query string as typed
    pub raw: String,

    /// Terms in extraction order: phrases first, then bare terms
    pub terms: Vec<Term>,

    /// Field filters in extraction order
    pub filters: Vec<FieldFilter>,
}

impl ParsedQuery {
    /// Parse a raw query string
    pub fn parse(raw: &str) -> Self {
        let mut filters = Vec::new();
        let mut terms = Vec::new();

        // Pass 1: field filters, removed from the working string
        let mut working = raw.to_string();
        for caps in FIELD_FILTER_RE.captures_iter(&working) {
            let field = caps["field"].to_string();
            let value = caps
                .name("quoted")
                .or_else(|| caps.name("bare"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            filters.push(FieldFilter::new(field, FilterOp::Equals, value));
        }
        working = FIELD_FILTER_RE.replace_all(&working, " ").into_owned();

        // Pass 2: quoted phrases, removed from the working string
        for caps in PHRASE_RE.captures_iter(&working) {
            let phrase = caps["phrase"].trim().to_string();
            if !phrase.is_empty() {
                terms.push(Term::phrase(phrase));
            }
        }
        working = PHRASE_RE.replace_all(&working, " ").into_owned();

        // Pass 3: whitespace split with +/- prefixes
        for token in working.split_whitespace() {
            if let Some(stripped) = token.strip_prefix('+') {
                if !stripped.is_empty() {
                    terms.push(Term {
                        required: true,
                        ..Term::bare(stripped.to_string())
                    });
                }
            } else if let Some(stripped) = token.strip_prefix('-') {
                if !stripped.is_empty() {
                    terms.push(Term {
                        excluded: true,
                        ..Term::bare(stripped.to_string())
                    });
                }
            } else {
                terms.push(Term::bare(token.to_string()));
            }
        }

        Self {
            raw: raw.to_string(),
            terms,
            filters,
        }
    }

    /// Add a programmatically constructed field filter
    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Whether the query carries any terms at all
    pub fn has_terms(&self) -> bool {
        !self.terms.is_empty()
    }

    /// Number of non-excluded terms, the scoring denominator
    pub fn non_excluded_count(&self) -> usize {
        self.terms.iter().filter(|t| !t.excluded).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_grammar() {
        let query = ParsedQuery::parse(r#"+error -debug "connection reset" level:warning"#);

        assert_eq!(
            query.filters,
            vec![FieldFilter::new("level", FilterOp::Equals, "warning")]
        );

        let required: Vec<&str> = query
            .terms
            .iter()
            .filter(|t| t.required)
            .map(|t| t.text.as_str())
            .collect();
        let excluded: Vec<&str> = query
            .terms
            .iter()
            .filter(|t| t.excluded)
            .map(|t| t.text.as_str())
            .collect();
        let phrases: Vec<&str> = query
            .terms
            .iter()
            .filter(|t| t.is_phrase)
            .map(|t| t.text.as_str())
            .collect();

        assert_eq!(required, vec!["error"]);
        assert_eq!(excluded, vec!["debug"]);
        assert_eq!(phrases, vec!["connection reset"]);
        assert_eq!(query.terms.len(), 3);
    }

    #[test]
    fn test_quoted_field_value() {
        let query = ParsedQuery::parse(r#"host:"db primary" timeout"#);

        assert_eq!(
            query.filters,
            vec![FieldFilter::new("host", FilterOp::Equals, "db primary")]
        );
        assert_eq!(query.terms, vec![Term::bare("timeout".to_string())]);
    }

    #[test]
    fn test_bare_prefixes_skipped() {
        let query = ParsedQuery::parse("+ - ok");

        assert_eq!(query.terms, vec![Term::bare("ok".to_string())]);
    }

    #[test]
    fn test_empty_query() {
        let query = ParsedQuery::parse("");

        assert!(!query.has_terms());
        assert!(query.filters.is_empty());
        assert_eq!(query.non_excluded_count(), 0);
    }

    #[test]
    fn test_phrase_not_mistaken_for_terms() {
        let query = ParsedQuery::parse(r#""disk full""#);

        assert_eq!(query.terms.len(), 1);
        assert!(query.terms[0].is_phrase);
        assert_eq!(query.terms[0].text, "disk full");
    }

    #[test]
    fn test_non_excluded_count() {
        let query = ParsedQuery::parse("+a1 -b2 c3");
        assert_eq!(query.non_excluded_count(), 2);
    }

    #[test]
    fn test_ordering_comparisons() {
        assert!(FilterOp::GreaterThan.compare("beta", "alpha", true));
        assert!(FilterOp::LessOrEqual.compare("alpha", "alpha", true));
        assert!(FilterOp::Contains.compare("Connection Reset", "reset", false));
        assert!(!FilterOp::Contains.compare("Connection Reset", "reset", true));
    }
}

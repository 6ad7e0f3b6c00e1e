//! Full-text search over indexed records.
//!
//! Records are tokenized into an in-memory inverted index and queried with
//! a small grammar: free-text terms, `+required` and `-excluded` prefixes,
//! `"quoted phrases"`, and `field:value` filters. Results carry relevance
//! scores, optional highlighting, and facet counts over the full matched
//! set; executed queries feed a recency-ordered history that backs prefix
//! suggestions alongside the indexed tokens.

pub mod engine;
pub mod query;
pub mod saved;
pub mod store;
pub mod tokenizer;

pub use engine::{
    Facets, HighlightMarkers, SearchEngine, SearchHit, SearchOptions, SearchResponse, SortField,
    SortOrder,
};
pub use query::{FieldFilter, FilterOp, ParsedQuery, Term};
pub use saved::{QueryHistory, SavedSearch, SavedSearchStore};
pub use store::{InvertedIndex, RecordStore};
pub use tokenizer::{record_tokens, tokenize};

//! Search execution: candidate pre-filtering, matching, scoring,
//! highlighting, faceting, sorting and pagination.
//!
//! The index pre-filter is an optimization only: every candidate is
//! re-verified against the live record content before it can match, so
//! stale posting entries for evicted records are filtered out here.

use chrono::{DateTime, Local, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::error::{EngineError, Result};
use crate::models::{LogLevel, LogRecord};
use crate::search::query::{ParsedQuery, Term};
use crate::search::saved::{QueryHistory, SavedSearch, SavedSearchStore};
use crate::search::store::RecordStore;
use crate::search::tokenizer::tokenize;

/// Maximum number of suggestions returned for a prefix
const SUGGESTION_LIMIT: usize = 10;

/// Relevance boost applied to error-and-above records
const ERROR_LEVEL_BOOST: f64 = 1.2;

/// Sort order for search results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Field to sort results by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortField {
    Timestamp,
    Level,
    Message,
    Relevance,
}

/// Markers wrapped around matched terms in highlighted messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HighlightMarkers {
    pub prefix: String,
    pub suffix: String,
}

impl Default for HighlightMarkers {
    fn default() -> Self {
        Self {
            prefix: "**".to_string(),
            suffix: "**".to_string(),
        }
    }
}

/// Search options applied on top of the parsed query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Restrict to these levels
    pub levels: Option<HashSet<LogLevel>>,

    /// Inclusive lower timestamp bound
    pub start: Option<DateTime<Utc>>,

    /// Inclusive upper timestamp bound
    pub end: Option<DateTime<Utc>>,

    /// Restrict to these source files (full paths)
    pub source_files: Option<HashSet<String>>,

    /// Restrict to these function names
    pub functions: Option<HashSet<String>>,

    /// Require these metadata key/value pairs to be present and equal
    pub metadata: HashMap<String, String>,

    /// Compare terms and filter values case-sensitively
    pub case_sensitive: bool,

    /// Treat term text as regular expressions; invalid patterns simply
    /// fail to match
    pub use_regex: bool,

    /// Wrap matched terms in the result messages when set
    pub highlight: Option<HighlightMarkers>,

    /// Sort field
    pub sort_field: SortField,

    /// Sort direction
    pub sort_order: SortOrder,

    /// Number of leading results to drop
    pub offset: usize,

    /// Maximum number of results to return after the offset
    pub limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            levels: None,
            start: None,
            end: None,
            source_files: None,
            functions: None,
            metadata: HashMap::new(),
            case_sensitive: false,
            use_regex: false,
            highlight: None,
            sort_field: SortField::Relevance,
            sort_order: SortOrder::Descending,
            offset: 0,
            limit: None,
        }
    }
}

impl SearchOptions {
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = Some(levels.into_iter().collect());
        self
    }

    pub fn with_time_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_source_files(mut self, files: impl IntoIterator<Item = String>) -> Self {
        self.source_files = Some(files.into_iter().collect());
        self
    }

    pub fn with_functions(mut self, functions: impl IntoIterator<Item = String>) -> Self {
        self.functions = Some(functions.into_iter().collect());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_regex(mut self, use_regex: bool) -> Self {
        self.use_regex = use_regex;
        self
    }

    pub fn with_highlight(mut self, markers: HighlightMarkers) -> Self {
        self.highlight = Some(markers);
        self
    }

    pub fn with_sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A single matched record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched record
    pub record: LogRecord,

    /// Relevance score in `[0, 1]`
    pub score: f64,

    /// Message with matched terms wrapped, when highlighting is enabled
    pub highlighted: Option<String>,

    /// Terms that matched this record
    pub matched_terms: Vec<String>,
}

/// Count breakdowns over the full matched set, computed before pagination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facets {
    /// Matches per level
    pub level_counts: HashMap<LogLevel, u64>,

    /// Matches per source file basename
    pub source_counts: HashMap<String, u64>,

    /// Matches per local hour of day
    pub hour_counts: HashMap<u32, u64>,

    /// Matches per metadata key present
    pub metadata_key_counts: HashMap<String, u64>,
}

/// Search results plus execution metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matched records after sorting and pagination
    pub hits: Vec<SearchHit>,

    /// Total number of matches before pagination
    pub total_hits: usize,

    /// The raw query that was executed
    pub query: String,

    /// Facets over the full matched set
    pub facets: Facets,

    /// Search execution time
    pub elapsed: Duration,
}

/// The search half of the engine: bounded record store, inverted index,
/// query history and saved searches.
#[derive(Debug)]
pub struct SearchEngine {
    store: RecordStore,
    history: QueryHistory,
    saved: SavedSearchStore,
}

impl SearchEngine {
    /// Create an engine from a validated configuration
    pub fn new(config: SearchConfig) -> Result<Self> {
        validator::Validate::validate(&config).map_err(EngineError::from)?;

        Ok(Self {
            store: RecordStore::new(config.max_records),
            history: QueryHistory::new(config.history_size),
            saved: SavedSearchStore::new(),
        })
    }

    /// Index a record
    pub fn index(&mut self, record: LogRecord) {
        self.store.insert(record);
    }

    /// Number of live records in the store
    pub fn record_count(&self) -> usize {
        self.store.len()
    }

    /// Number of distinct indexed tokens
    pub fn token_count(&self) -> usize {
        self.store.index().token_count()
    }

    /// Execute a raw query string against the index
    pub fn search(&mut self, raw: &str, options: &SearchOptions) -> SearchResponse {
        let query = ParsedQuery::parse(raw);
        let response = self.execute(&query, options);
        self.history.record(raw);
        response
    }

    /// Execute an already-parsed query (programmatic filters included)
    pub fn search_parsed(&mut self, query: &ParsedQuery, options: &SearchOptions) -> SearchResponse {
        let response = self.execute(query, options);
        self.history.record(&query.raw);
        response
    }

    /// Register a saved search
    pub fn save_search(&mut self, name: impl Into<String>, query: impl Into<String>) -> Uuid {
        self.saved.save(name, query)
    }

    /// Snapshot of the saved searches, oldest first
    pub fn saved_searches(&self) -> Vec<SavedSearch> {
        self.saved.list()
    }

    /// Delete a saved search
    pub fn delete_saved(&mut self, id: &Uuid) -> bool {
        self.saved.delete(id)
    }

    /// Execute a saved search, bumping its usage bookkeeping
    pub fn run_saved(&mut self, id: &Uuid, options: &SearchOptions) -> Result<SearchResponse> {
        let query = {
            let saved = self
                .saved
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound(format!("saved search {id}")))?;
            saved.touch();
            saved.query.clone()
        };

        Ok(self.search(&query, options))
    }

    /// Executed queries, most recent first
    pub fn query_history(&self) -> Vec<String> {
        self.history.entries().cloned().collect()
    }

    /// Query suggestions for a prefix: history entries first (most recent
    /// first), then indexed tokens in alphabetical order, deduplicated,
    /// capped at ten.
    pub fn suggestions(&self, prefix: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for entry in self.history.entries() {
            if out.len() >= SUGGESTION_LIMIT {
                return out;
            }
            if entry.starts_with(prefix) && seen.insert(entry.clone()) {
                out.push(entry.clone());
            }
        }

        for token in self.store.index().tokens_with_prefix(&prefix.to_lowercase()) {
            if out.len() >= SUGGESTION_LIMIT {
                break;
            }
            if seen.insert(token.clone()) {
                out.push(token);
            }
        }

        out
    }

    fn execute(&self, query: &ParsedQuery, options: &SearchOptions) -> SearchResponse {
        let started = Instant::now();

        let candidates = self.candidate_ids(query);

        // Candidates are walked in store insertion order so that repeated
        // searches over the same data produce identical orderings.
        let mut matched: Vec<SearchHit> = self
            .store
            .iter()
            .filter(|record| candidates.contains(&record.id))
            .filter(|record| Self::passes_filters(record, query, options))
            .filter_map(|record| Self::score_record(record, query, options))
            .collect();

        let facets = Self::compute_facets(&matched);
        let total_hits = matched.len();

        Self::sort_hits(&mut matched, options);

        let paginated: Vec<SearchHit> = matched
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();

        let elapsed = started.elapsed();
        tracing::debug!(
            query = %query.raw,
            total_hits,
            returned = paginated.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "search executed"
        );

        SearchResponse {
            hits: paginated,
            total_hits,
            query: query.raw.clone(),
            facets,
            elapsed,
        }
    }

    /// Candidate pre-filter: intersect posting sets for required terms,
    /// union them for optional terms; with no usable terms every live
    /// record is a candidate.
    fn candidate_ids(&self, query: &ParsedQuery) -> HashSet<Uuid> {
        let positive: Vec<&Term> = query.terms.iter().filter(|t| !t.excluded).collect();
        if positive.is_empty() {
            return self.store.ids().collect();
        }

        let mut required: Option<HashSet<Uuid>> = None;
        let mut optional: HashSet<Uuid> = HashSet::new();
        let mut any_unindexable = false;

        for term in positive {
            match self.term_postings(term) {
                Some(ids) => {
                    if term.required {
                        required = Some(match required {
                            Some(acc) => acc.intersection(&ids).copied().collect(),
                            None => ids,
                        });
                    } else {
                        optional.extend(ids);
                    }
                }
                // Terms too short to ever be indexed cannot narrow the
                // candidate set
                None => any_unindexable = true,
            }
        }

        match required {
            Some(required) => required,
            None if any_unindexable => self.store.ids().collect(),
            None => optional,
        }
    }

    /// Posting-set approximation for one term: the intersection of the
    /// posting sets of its normalized tokens. `None` when the term yields
    /// no indexable token.
    fn term_postings(&self, term: &Term) -> Option<HashSet<Uuid>> {
        let tokens = tokenize(&term.text);
        if tokens.is_empty() {
            return None;
        }

        let mut ids: Option<HashSet<Uuid>> = None;
        for token in &tokens {
            let postings: HashSet<Uuid> = self
                .store
                .index()
                .lookup(token)
                .cloned()
                .unwrap_or_default();
            ids = Some(match ids {
                Some(acc) => acc.intersection(&postings).copied().collect(),
                None => postings,
            });
        }
        ids
    }

    /// Hard filters, each a reject: levels, time range, source files,
    /// functions, metadata equality, then the query's field filters.
    fn passes_filters(record: &LogRecord, query: &ParsedQuery, options: &SearchOptions) -> bool {
        if let Some(ref levels) = options.levels {
            if !levels.contains(&record.level) {
                return false;
            }
        }

        if let Some(start) = options.start {
            if record.timestamp < start {
                return false;
            }
        }
        if let Some(end) = options.end {
            if record.timestamp > end {
                return false;
            }
        }

        if let Some(ref files) = options.source_files {
            if !files.contains(&record.file) {
                return false;
            }
        }

        if let Some(ref functions) = options.functions {
            if !functions.contains(&record.function) {
                return false;
            }
        }

        for (key, expected) in &options.metadata {
            match record.metadata.get(key) {
                Some(value) if value.as_text() == *expected => {}
                _ => return false,
            }
        }

        for filter in &query.filters {
            match Self::resolve_field(record, &filter.field) {
                Some(value) => {
                    if !filter.op.compare(&value, &filter.value, options.case_sensitive) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        true
    }

    /// Resolve a filter field name against the record
    fn resolve_field(record: &LogRecord, field: &str) -> Option<String> {
        match field {
            "level" => Some(record.level.to_string()),
            "file" | "source" => Some(record.file.clone()),
            "function" => Some(record.function.clone()),
            "line" => Some(record.line.to_string()),
            "message" => Some(record.message.clone()),
            _ => record.metadata.get(field).map(|v| v.as_text()),
        }
    }

    /// Term scoring; `None` rejects the record.
    fn score_record(
        record: &LogRecord,
        query: &ParsedQuery,
        options: &SearchOptions,
    ) -> Option<SearchHit> {
        if !query.has_terms() {
            return Some(SearchHit {
                record: record.clone(),
                score: 1.0,
                highlighted: options
                    .highlight
                    .as_ref()
                    .map(|_| record.message.clone()),
                matched_terms: Vec::new(),
            });
        }

        let mut raw_score = 0.0;
        let mut matched_terms: Vec<String> = Vec::new();

        for term in &query.terms {
            let is_match = Self::term_matches(&record.message, term, options);

            if term.excluded {
                if is_match {
                    return None;
                }
                continue;
            }

            if term.required && !is_match {
                return None;
            }

            if is_match {
                raw_score += if term.required { 1.0 } else { 0.5 };
                matched_terms.push(term.text.clone());
            }
        }

        if matched_terms.is_empty() {
            return None;
        }

        let mut score = raw_score / query.non_excluded_count() as f64;
        if record.level >= LogLevel::Error {
            score *= ERROR_LEVEL_BOOST;
        }
        let score = score.min(1.0);

        let highlighted = options
            .highlight
            .as_ref()
            .map(|markers| Self::highlight(&record.message, &matched_terms, markers, options));

        Some(SearchHit {
            record: record.clone(),
            score,
            highlighted,
            matched_terms,
        })
    }

    /// Match one term against the message text
    fn term_matches(message: &str, term: &Term, options: &SearchOptions) -> bool {
        if options.use_regex {
            let pattern = if options.case_sensitive {
                term.text.clone()
            } else {
                format!("(?i){}", term.text)
            };
            // A malformed pattern fails to match rather than erroring
            return Regex::new(&pattern)
                .map(|re| re.is_match(message))
                .unwrap_or(false);
        }

        if options.case_sensitive {
            message.contains(&term.text)
        } else {
            message.to_lowercase().contains(&term.text.to_lowercase())
        }
    }

    /// Wrap every occurrence of each matched term. Longer terms are
    /// wrapped first so a short term's markers cannot split a longer
    /// overlapping match.
    fn highlight(
        message: &str,
        matched_terms: &[String],
        markers: &HighlightMarkers,
        options: &SearchOptions,
    ) -> String {
        let mut terms: Vec<&String> = matched_terms.iter().collect();
        terms.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));

        let mut result = message.to_string();
        for term in terms {
            let pattern = if options.case_sensitive {
                regex::escape(term)
            } else {
                format!("(?i){}", regex::escape(term))
            };
            if let Ok(re) = Regex::new(&pattern) {
                let replacement = format!("{}$0{}", markers.prefix, markers.suffix);
                result = re.replace_all(&result, replacement.as_str()).into_owned();
            }
        }
        result
    }

    /// Facets over the full matched set
    fn compute_facets(hits: &[SearchHit]) -> Facets {
        let mut facets = Facets::default();

        for hit in hits {
            let record = &hit.record;
            *facets.level_counts.entry(record.level).or_insert(0) += 1;
            *facets
                .source_counts
                .entry(record.file_basename().to_string())
                .or_insert(0) += 1;
            let hour = record.timestamp.with_timezone(&Local).hour();
            *facets.hour_counts.entry(hour).or_insert(0) += 1;
            for key in record.metadata.keys() {
                *facets.metadata_key_counts.entry(key.clone()).or_insert(0) += 1;
            }
        }

        facets
    }

    fn sort_hits(hits: &mut [SearchHit], options: &SearchOptions) {
        hits.sort_by(|a, b| {
            let ordering = match options.sort_field {
                SortField::Timestamp => a.record.timestamp.cmp(&b.record.timestamp),
                SortField::Level => a.record.level.cmp(&b.record.level),
                SortField::Message => a.record.message.cmp(&b.record.message),
                SortField::Relevance => a.score.total_cmp(&b.score),
            };
            match options.sort_order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
    }
}

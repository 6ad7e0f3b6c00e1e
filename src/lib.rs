//! loglens: in-memory log-intelligence engine.
//!
//! Turns a stream of structured [`LogRecord`] values into:
//!
//! - a searchable full-text index with a small query language: boolean,
//!   required and excluded terms, quoted phrases, `field:value` filters,
//!   relevance scoring, highlighting, facets, saved searches and
//!   suggestions ([`search`]);
//! - a live aggregation and anomaly-detection layer that groups similar
//!   messages into canonical patterns and flags statistical deviations
//!   against trailing baselines ([`analysis`]).
//!
//! # Architecture
//!
//! ```text
//!                ┌──► SearchEngine    (store ─ index ─ query ─ results)
//!  LogRecord ────┤
//!                └──► AnalyticsEngine (patterns ─ aggregates ─ anomalies)
//! ```
//!
//! The two halves share only the record type and may run as independent
//! engines; [`LogIntelligence`] bundles one of each behind separate locks
//! for callers that want a single synchronously-queryable handle. All
//! state is in memory; the engine performs no network or disk access.
//!
//! # Example
//!
//! ```
//! use loglens::{EngineConfig, LogIntelligence, LogLevel, LogRecord, SearchOptions};
//!
//! let engine = LogIntelligence::new(EngineConfig::default()).unwrap();
//!
//! engine.ingest(LogRecord::new(LogLevel::Error, "db timeout on node 3"));
//! engine.ingest(LogRecord::new(LogLevel::Info, "request served"));
//!
//! let results = engine.search("+db timeout", &SearchOptions::default());
//! assert_eq!(results.total_hits, 1);
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod models;
pub mod search;

pub use analysis::{
    AggregatedEntry, AnalyticsEngine, Anomaly, AnomalyKind, AnomalySeverity, LogStatistics,
    PatternStat, TimeSeriesPoint,
};
pub use config::{AggregationConfig, AnomalyConfig, EngineConfig, SearchConfig};
pub use error::{EngineError, Result};
pub use models::{LogLevel, LogRecord, MetadataValue};
pub use search::{
    Facets, HighlightMarkers, SearchEngine, SearchHit, SearchOptions, SearchResponse, SortField,
    SortOrder,
};

use chrono::Duration;
use parking_lot::Mutex;
use uuid::Uuid;

/// Both engine halves behind one handle.
///
/// Each half sits behind its own mutex, so the search index and the
/// aggregation state can be read and written independently while every
/// individual operation stays serialized: a read never observes a
/// partially-updated index or aggregate.
#[derive(Debug)]
pub struct LogIntelligence {
    search: Mutex<SearchEngine>,
    analytics: Mutex<AnalyticsEngine>,
}

impl LogIntelligence {
    /// Construct both halves from one validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        let config = config.validated()?;

        Ok(Self {
            search: Mutex::new(SearchEngine::new(config.search)?),
            analytics: Mutex::new(AnalyticsEngine::new(config.aggregation, config.anomaly)?),
        })
    }

    /// Feed a record to both halves, returning anomalies detected for it
    pub fn ingest(&self, record: LogRecord) -> Vec<Anomaly> {
        let anomalies = self.analytics.lock().process(&record);
        self.search.lock().index(record);
        anomalies
    }

    /// Execute a query against the index
    pub fn search(&self, raw: &str, options: &SearchOptions) -> SearchResponse {
        self.search.lock().search(raw, options)
    }

    /// Query suggestions for a prefix
    pub fn suggestions(&self, prefix: &str) -> Vec<String> {
        self.search.lock().suggestions(prefix)
    }

    /// Register a saved search
    pub fn save_search(&self, name: impl Into<String>, query: impl Into<String>) -> Uuid {
        self.search.lock().save_search(name, query)
    }

    /// Snapshot of the saved searches
    pub fn saved_searches(&self) -> Vec<search::SavedSearch> {
        self.search.lock().saved_searches()
    }

    /// Delete a saved search
    pub fn delete_saved(&self, id: &Uuid) -> bool {
        self.search.lock().delete_saved(id)
    }

    /// Execute a saved search, bumping its usage bookkeeping
    pub fn run_saved(&self, id: &Uuid, options: &SearchOptions) -> Result<SearchResponse> {
        self.search.lock().run_saved(id, options)
    }

    /// Number of live records in the search store
    pub fn record_count(&self) -> usize {
        self.search.lock().record_count()
    }

    /// Windowed aggregation statistics
    pub fn statistics(&self, window: Duration) -> LogStatistics {
        self.analytics.lock().statistics(window)
    }

    /// Per-minute volume series over the trailing window
    pub fn time_series(&self, window: Duration) -> Vec<TimeSeriesPoint> {
        self.analytics.lock().time_series(window)
    }

    /// Snapshot of the pattern buckets
    pub fn aggregated_entries(&self) -> Vec<AggregatedEntry> {
        self.analytics.lock().entries()
    }

    /// The `n` most frequent pattern buckets
    pub fn top_patterns(&self, n: usize) -> Vec<AggregatedEntry> {
        self.analytics.lock().top_patterns(n)
    }

    /// Stored anomalies at or above the given severity
    pub fn anomalies(&self, min_severity: AnomalySeverity) -> Vec<Anomaly> {
        self.analytics.lock().anomalies(min_severity)
    }
}

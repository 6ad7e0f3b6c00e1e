//! Engine configuration.
//!
//! Configuration is validated once, at engine construction; runtime
//! operations never re-validate. Defaults match the behavior described in
//! the module docs, so `EngineConfig::default()` is always valid.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{EngineError, Result};

/// Configuration for the search half of the engine
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    /// Maximum number of records held in the store; oldest are dropped
    /// first once the ceiling is exceeded
    #[validate(range(min = 1, message = "max_records must be at least 1"))]
    pub max_records: usize,

    /// Maximum number of entries kept in the query history
    #[validate(range(min = 1, message = "history_size must be at least 1"))]
    pub history_size: usize,

    /// Ceiling applied to any per-query result limit
    #[validate(range(min = 1, message = "max_results must be at least 1"))]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            history_size: 100,
            max_results: 1_000,
        }
    }
}

impl SearchConfig {
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Configuration for the aggregation half of the engine
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AggregationConfig {
    /// Maximum number of distinct pattern buckets; least-recently-seen
    /// buckets are evicted once the ceiling is exceeded
    #[validate(range(min = 1, message = "max_patterns must be at least 1"))]
    pub max_patterns: usize,

    /// Number of patterns reported by windowed statistics
    #[validate(range(min = 1, message = "top_patterns must be at least 1"))]
    pub top_patterns: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_patterns: 1_000,
            top_patterns: 10,
        }
    }
}

impl AggregationConfig {
    pub fn with_max_patterns(mut self, max_patterns: usize) -> Self {
        self.max_patterns = max_patterns;
        self
    }

    pub fn with_top_patterns(mut self, top_patterns: usize) -> Self {
        self.top_patterns = top_patterns;
        self
    }
}

/// Configuration for the anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnomalyConfig {
    /// Trailing window used to compute baseline statistics, in seconds.
    /// The baseline is recomputed once more than a quarter of this window
    /// has elapsed since the previous computation.
    #[validate(range(min = 60, message = "baseline_window_secs must be at least 60"))]
    pub baseline_window_secs: u64,

    /// Deviation ratio above which a spike is reported
    #[validate(range(min = 1.0, message = "spike_threshold must be at least 1.0"))]
    pub spike_threshold: f64,

    /// Window within which same-kind anomalies are suppressed, in seconds
    #[validate(range(min = 1, message = "dedupe_window_secs must be at least 1"))]
    pub dedupe_window_secs: u64,

    /// Hours after which stored anomalies are pruned
    #[validate(range(min = 1, message = "retention_hours must be at least 1"))]
    pub retention_hours: u64,

    /// Number of records that must be processed before new-pattern
    /// anomalies are reported (cold-start guard)
    pub cold_start_records: u64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            baseline_window_secs: 3_600,
            spike_threshold: 3.0,
            dedupe_window_secs: 300,
            retention_hours: 24,
            cold_start_records: 100,
        }
    }
}

impl AnomalyConfig {
    pub fn with_baseline_window_secs(mut self, secs: u64) -> Self {
        self.baseline_window_secs = secs;
        self
    }

    pub fn with_spike_threshold(mut self, threshold: f64) -> Self {
        self.spike_threshold = threshold;
        self
    }

    pub fn with_dedupe_window_secs(mut self, secs: u64) -> Self {
        self.dedupe_window_secs = secs;
        self
    }

    pub fn with_cold_start_records(mut self, records: u64) -> Self {
        self.cold_start_records = records;
        self
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Search half configuration
    #[validate(nested)]
    #[serde(default)]
    pub search: SearchConfig,

    /// Aggregation configuration
    #[validate(nested)]
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Anomaly detector configuration
    #[validate(nested)]
    #[serde(default)]
    pub anomaly: AnomalyConfig,
}

impl EngineConfig {
    /// Validate the configuration, returning it on success
    pub fn validated(self) -> Result<Self> {
        Validate::validate(&self).map_err(EngineError::from)?;
        Ok(self)
    }
}

//! Pattern aggregation and windowed volume statistics.
//!
//! Every processed record is folded into the bucket for its canonical
//! pattern; buckets are evicted least-recently-seen-first under
//! pattern-count pressure. A per-minute histogram feeds volume statistics
//! and the anomaly detector's spike checks.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::analysis::pattern::extract_pattern;
use crate::config::AggregationConfig;
use crate::error::{EngineError, Result};
use crate::models::{LogLevel, LogRecord};

/// Maximum number of raw sample records retained per bucket
const SAMPLE_CAP: usize = 5;

/// Horizon beyond which per-minute histogram buckets are dropped
const HISTOGRAM_RETENTION_HOURS: i64 = 24;

/// One pattern bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedEntry {
    /// Unique identifier
    pub id: Uuid,

    /// Canonical pattern string
    pub pattern: String,

    /// Level of the record that created the bucket
    pub level: LogLevel,

    /// Number of records folded into this bucket
    pub count: u64,

    /// Timestamp of the first record seen
    pub first_seen: DateTime<Utc>,

    /// Timestamp of the most recent record seen
    pub last_seen: DateTime<Utc>,

    /// Source files observed for this pattern
    pub source_files: HashSet<String>,

    /// Bounded list of raw sample records
    pub samples: Vec<LogRecord>,

    /// Metadata keys observed for this pattern
    pub metadata_keys: HashSet<String>,
}

impl AggregatedEntry {
    fn new(pattern: String, record: &LogRecord) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            pattern,
            level: record.level,
            count: 0,
            first_seen: record.timestamp,
            last_seen: record.timestamp,
            source_files: HashSet::new(),
            samples: Vec::new(),
            metadata_keys: HashSet::new(),
        };
        entry.fold(record);
        entry
    }

    fn fold(&mut self, record: &LogRecord) {
        self.count += 1;
        if record.timestamp > self.last_seen {
            self.last_seen = record.timestamp;
        }
        if !record.file.is_empty() {
            self.source_files.insert(record.file.clone());
        }
        if self.samples.len() < SAMPLE_CAP {
            self.samples.push(record.clone());
        }
        self.metadata_keys
            .extend(record.metadata.keys().cloned());
    }
}

/// One pattern's share of a statistics window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStat {
    pub pattern: String,
    pub count: u64,
    /// Share of the window total, in percent
    pub percentage: f64,
}

/// Windowed statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStatistics {
    /// Records counted in the window
    pub total_count: u64,

    /// Counts by bucket level
    pub level_counts: HashMap<LogLevel, u64>,

    /// Counts by source file
    pub source_counts: HashMap<String, u64>,

    /// Mean records per minute over the window
    pub avg_per_minute: f64,

    /// Highest single-minute record count in the window
    pub peak_per_minute: u64,

    /// Most frequent patterns, largest first
    pub top_patterns: Vec<PatternStat>,

    /// Share of error-and-above records, in `[0, 1]`
    pub error_rate: f64,
}

/// One point of the per-minute volume series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: u64,
}

/// Outcome of folding one record, consumed by the anomaly detector
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Canonical pattern of the record
    pub pattern: String,

    /// The record created a new bucket
    pub new_pattern: bool,

    /// Record count of the current minute, this record included
    pub current_minute_count: u64,
}

/// Aggregates records into pattern buckets
#[derive(Debug)]
pub struct LogAggregator {
    entries: HashMap<String, AggregatedEntry>,
    minute_counts: BTreeMap<DateTime<Utc>, u64>,
    config: AggregationConfig,
}

impl LogAggregator {
    /// Create an aggregator from a validated configuration
    pub fn new(config: AggregationConfig) -> Result<Self> {
        validator::Validate::validate(&config).map_err(EngineError::from)?;

        Ok(Self {
            entries: HashMap::new(),
            minute_counts: BTreeMap::new(),
            config,
        })
    }

    /// Fold a record into its pattern bucket
    pub fn process(&mut self, record: &LogRecord) -> ProcessOutcome {
        let pattern = extract_pattern(&record.message);

        let new_pattern = !self.entries.contains_key(&pattern);
        if new_pattern {
            self.entries
                .insert(pattern.clone(), AggregatedEntry::new(pattern.clone(), record));
        } else if let Some(entry) = self.entries.get_mut(&pattern) {
            entry.fold(record);
        }

        let current_minute_count = self.bump_minute(record.timestamp);
        self.evict_over_limit();

        ProcessOutcome {
            pattern,
            new_pattern,
            current_minute_count,
        }
    }

    /// Whether a bucket for this pattern currently exists
    pub fn has_pattern(&self, pattern: &str) -> bool {
        self.entries.contains_key(pattern)
    }

    /// Number of distinct pattern buckets
    pub fn pattern_count(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of all buckets, most recently seen first
    pub fn entries(&self) -> Vec<AggregatedEntry> {
        let mut all: Vec<AggregatedEntry> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        all
    }

    /// The `n` most frequent buckets, largest first
    pub fn top_patterns(&self, n: usize) -> Vec<AggregatedEntry> {
        let mut all: Vec<AggregatedEntry> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pattern.cmp(&b.pattern)));
        all.truncate(n);
        all
    }

    /// Windowed statistics over buckets seen within the trailing window
    pub fn statistics(&self, window: Duration) -> LogStatistics {
        let cutoff = Utc::now() - window;

        let in_window: Vec<&AggregatedEntry> = self
            .entries
            .values()
            .filter(|e| e.last_seen >= cutoff)
            .collect();

        let total_count: u64 = in_window.iter().map(|e| e.count).sum();

        let mut level_counts: HashMap<LogLevel, u64> = HashMap::new();
        let mut source_counts: HashMap<String, u64> = HashMap::new();
        for entry in &in_window {
            *level_counts.entry(entry.level).or_insert(0) += entry.count;
            for file in &entry.source_files {
                *source_counts.entry(file.clone()).or_insert(0) += entry.count;
            }
        }

        let window_minutes = window.num_minutes().max(1) as f64;
        let minute_total: u64 = self
            .minute_counts
            .range(cutoff..)
            .map(|(_, count)| *count)
            .sum();
        let avg_per_minute = minute_total as f64 / window_minutes;
        let peak_per_minute = self
            .minute_counts
            .range(cutoff..)
            .map(|(_, count)| *count)
            .max()
            .unwrap_or(0);

        let mut ranked: Vec<&AggregatedEntry> = in_window.clone();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pattern.cmp(&b.pattern)));
        let top_patterns: Vec<PatternStat> = ranked
            .iter()
            .take(self.config.top_patterns)
            .map(|e| PatternStat {
                pattern: e.pattern.clone(),
                count: e.count,
                percentage: if total_count > 0 {
                    e.count as f64 / total_count as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        let error_count: u64 = in_window
            .iter()
            .filter(|e| e.level.is_error())
            .map(|e| e.count)
            .sum();
        let error_rate = if total_count > 0 {
            error_count as f64 / total_count as f64
        } else {
            0.0
        };

        LogStatistics {
            total_count,
            level_counts,
            source_counts,
            avg_per_minute,
            peak_per_minute,
            top_patterns,
            error_rate,
        }
    }

    /// Per-minute volume over the trailing window, oldest first
    pub fn time_series(&self, window: Duration) -> Vec<TimeSeriesPoint> {
        let cutoff = Utc::now() - window;
        self.minute_counts
            .range(cutoff..)
            .map(|(timestamp, value)| TimeSeriesPoint {
                timestamp: *timestamp,
                value: *value,
            })
            .collect()
    }

    fn bump_minute(&mut self, timestamp: DateTime<Utc>) -> u64 {
        let minute = timestamp
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(timestamp);
        let count = self.minute_counts.entry(minute).or_insert(0);
        *count += 1;
        let current = *count;

        // Drop histogram buckets past the retention horizon
        let horizon = Utc::now() - Duration::hours(HISTOGRAM_RETENTION_HOURS);
        while let Some((&oldest, _)) = self.minute_counts.iter().next() {
            if oldest < horizon {
                self.minute_counts.remove(&oldest);
            } else {
                break;
            }
        }

        current
    }

    /// Evict least-recently-seen buckets until back under the limit
    fn evict_over_limit(&mut self) {
        if self.entries.len() <= self.config.max_patterns {
            return;
        }

        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|(pattern, entry)| (pattern.clone(), entry.last_seen))
            .collect();
        by_age.sort_by(|a, b| a.1.cmp(&b.1));

        let excess = self.entries.len() - self.config.max_patterns;
        for (pattern, _) in by_age.into_iter().take(excess) {
            self.entries.remove(&pattern);
            tracing::debug!(pattern = %pattern, "pattern bucket evicted");
        }
    }
}

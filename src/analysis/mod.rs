//! Aggregation and anomaly detection over the record stream.
//!
//! Records are collapsed into canonical patterns ("user 42 logged in" and
//! "user 99 logged in" share one bucket), buckets track counts, spans and
//! samples, and each record is checked against baseline statistics for
//! volume spikes, error spikes and previously unseen patterns.

pub mod aggregator;
pub mod anomaly;
pub mod engine;
pub mod pattern;
pub mod similarity;

pub use aggregator::{
    AggregatedEntry, LogAggregator, LogStatistics, PatternStat, ProcessOutcome, TimeSeriesPoint,
};
pub use anomaly::{Anomaly, AnomalyDetector, AnomalyKind, AnomalySeverity, Baseline};
pub use engine::AnalyticsEngine;
pub use pattern::extract_pattern;
pub use similarity::{levenshtein, similarity};

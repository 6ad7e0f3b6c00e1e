//! The analysis half of the engine: aggregation plus anomaly detection
//! over one record stream.

use chrono::Duration;

use crate::analysis::aggregator::{
    AggregatedEntry, LogAggregator, LogStatistics, TimeSeriesPoint,
};
use crate::analysis::anomaly::{Anomaly, AnomalyDetector, AnomalySeverity, Baseline};
use crate::config::{AggregationConfig, AnomalyConfig};
use crate::error::Result;
use crate::models::LogRecord;

/// Aggregates records into pattern buckets and checks each one against
/// baseline statistics. Anomalies detected for a record are returned
/// synchronously from [`process`](AnalyticsEngine::process).
#[derive(Debug)]
pub struct AnalyticsEngine {
    aggregator: LogAggregator,
    detector: AnomalyDetector,
}

impl AnalyticsEngine {
    /// Create an engine from validated configuration sections
    pub fn new(aggregation: AggregationConfig, anomaly: AnomalyConfig) -> Result<Self> {
        Ok(Self {
            aggregator: LogAggregator::new(aggregation)?,
            detector: AnomalyDetector::new(anomaly)?,
        })
    }

    /// Fold a record into its pattern bucket and run anomaly detection,
    /// returning the anomalies recorded for this record.
    pub fn process(&mut self, record: &LogRecord) -> Vec<Anomaly> {
        if self.detector.baseline_due(chrono::Utc::now()) {
            let stats = self.aggregator.statistics(self.detector.baseline_window());
            self.detector
                .set_baseline(stats.avg_per_minute, stats.error_rate);
        }

        let outcome = self.aggregator.process(record);
        self.detector.observe(record, &outcome)
    }

    /// Windowed statistics snapshot
    pub fn statistics(&self, window: Duration) -> LogStatistics {
        self.aggregator.statistics(window)
    }

    /// Per-minute volume over the trailing window
    pub fn time_series(&self, window: Duration) -> Vec<TimeSeriesPoint> {
        self.aggregator.time_series(window)
    }

    /// Snapshot of all pattern buckets, most recently seen first
    pub fn entries(&self) -> Vec<AggregatedEntry> {
        self.aggregator.entries()
    }

    /// The `n` most frequent pattern buckets
    pub fn top_patterns(&self, n: usize) -> Vec<AggregatedEntry> {
        self.aggregator.top_patterns(n)
    }

    /// Number of distinct pattern buckets
    pub fn pattern_count(&self) -> usize {
        self.aggregator.pattern_count()
    }

    /// Stored anomalies at or above the given severity, oldest first
    pub fn anomalies(&self, min_severity: AnomalySeverity) -> Vec<Anomaly> {
        self.detector.anomalies(min_severity)
    }

    /// Current baseline statistics, if computed
    pub fn baseline(&self) -> Option<&Baseline> {
        self.detector.baseline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;

    fn engine() -> AnalyticsEngine {
        AnalyticsEngine::new(
            AggregationConfig::default(),
            AnomalyConfig::default().with_cold_start_records(0),
        )
        .unwrap()
    }

    #[test]
    fn test_process_groups_and_counts() {
        let mut engine = engine();
        engine.process(&LogRecord::new(LogLevel::Info, "user 42 logged in"));
        engine.process(&LogRecord::new(LogLevel::Info, "user 99 logged in"));

        assert_eq!(engine.pattern_count(), 1);
        assert_eq!(engine.entries()[0].count, 2);
    }

    #[test]
    fn test_baseline_computed_on_first_record() {
        let mut engine = engine();
        assert!(engine.baseline().is_none());

        engine.process(&LogRecord::new(LogLevel::Info, "boot"));
        assert!(engine.baseline().is_some());
    }

    #[test]
    fn test_new_pattern_anomaly_from_process() {
        let mut engine = engine();

        // First record installs an empty baseline, so its own new pattern
        // is reported.
        let detected = engine.process(&LogRecord::new(LogLevel::Info, "first pattern"));
        assert_eq!(detected.len(), 1);
        assert_eq!(
            detected[0].kind,
            crate::analysis::anomaly::AnomalyKind::NewPattern
        );
    }
}

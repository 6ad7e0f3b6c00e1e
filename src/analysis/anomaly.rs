//! Baseline-driven anomaly detection.
//!
//! The detector compares each processed record against baseline statistics
//! computed over a trailing window, and stores the anomalies it emits.
//! Same-kind anomalies within the dedupe window are suppressed; stored
//! anomalies are pruned once they exceed the retention horizon.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::analysis::aggregator::ProcessOutcome;
use crate::config::AnomalyConfig;
use crate::error::{EngineError, Result};
use crate::models::LogRecord;

/// Window for the trailing error count used by the error-spike rule
const ERROR_WINDOW_SECS: i64 = 60;

/// Kind of detected deviation.
///
/// Built-in rules emit `VolumeSpike`, `ErrorSpike` and `NewPattern`; the
/// remaining kinds are part of the public vocabulary for callers that
/// record their own observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnomalyKind {
    VolumeSpike,
    VolumeDrop,
    ErrorSpike,
    NewPattern,
    PatternDisappearance,
    LatencyIncrease,
    UnusualSource,
}

/// Severity of a detected anomaly, ordered least to most severe
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A detected deviation from baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    /// Unique identifier
    pub id: Uuid,

    /// Kind of deviation
    pub kind: AnomalyKind,

    /// Severity
    pub severity: AnomalySeverity,

    /// Human-readable description
    pub description: String,

    /// Detection timestamp
    pub detected_at: DateTime<Utc>,

    /// Records that triggered the detection
    pub related_records: Vec<Uuid>,

    /// Baseline comparison value
    pub baseline_value: f64,

    /// Observed value
    pub actual_value: f64,
}

impl Anomaly {
    fn new(
        kind: AnomalyKind,
        severity: AnomalySeverity,
        description: String,
        related_records: Vec<Uuid>,
        baseline_value: f64,
        actual_value: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            description,
            detected_at: Utc::now(),
            related_records,
            baseline_value,
            actual_value,
        }
    }

    /// Deviation from baseline in percent; zero when no baseline value
    /// exists to compare against.
    pub fn deviation_percent(&self) -> f64 {
        if self.baseline_value == 0.0 {
            return 0.0;
        }
        (self.actual_value - self.baseline_value) / self.baseline_value * 100.0
    }
}

/// Reference statistics computed over the trailing baseline window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    /// Mean records per minute
    pub entries_per_minute: f64,

    /// Share of error-and-above records in `[0, 1]`
    pub error_rate: f64,

    /// When the baseline was computed
    pub computed_at: DateTime<Utc>,
}

/// Detects deviations from baseline statistics
#[derive(Debug)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
    baseline: Option<Baseline>,
    last_recompute: Option<DateTime<Utc>>,
    anomalies: Vec<Anomaly>,
    error_timestamps: VecDeque<DateTime<Utc>>,
    total_processed: u64,
}

impl AnomalyDetector {
    /// Create a detector from a validated configuration
    pub fn new(config: AnomalyConfig) -> Result<Self> {
        validator::Validate::validate(&config).map_err(EngineError::from)?;

        Ok(Self {
            config,
            baseline: None,
            last_recompute: None,
            anomalies: Vec::new(),
            error_timestamps: VecDeque::new(),
            total_processed: 0,
        })
    }

    /// Trailing window the baseline is computed over
    pub fn baseline_window(&self) -> Duration {
        Duration::seconds(self.config.baseline_window_secs as i64)
    }

    /// Whether the baseline is due for recomputation: more than a quarter
    /// of the baseline window has elapsed since the last one.
    pub fn baseline_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_recompute {
            Some(last) => {
                now - last > Duration::seconds(self.config.baseline_window_secs as i64 / 4)
            }
            None => true,
        }
    }

    /// Install freshly computed baseline statistics
    pub fn set_baseline(&mut self, entries_per_minute: f64, error_rate: f64) {
        let now = Utc::now();
        self.baseline = Some(Baseline {
            entries_per_minute,
            error_rate,
            computed_at: now,
        });
        self.last_recompute = Some(now);
        tracing::debug!(
            entries_per_minute,
            error_rate,
            "baseline statistics recomputed"
        );
    }

    /// Current baseline, if one has been computed
    pub fn baseline(&self) -> Option<&Baseline> {
        self.baseline.as_ref()
    }

    /// Run the detection rules for one processed record, returning the
    /// anomalies recorded (after dedupe suppression).
    pub fn observe(&mut self, record: &LogRecord, outcome: &ProcessOutcome) -> Vec<Anomaly> {
        self.total_processed += 1;

        let now = Utc::now();
        if record.is_error() {
            self.error_timestamps.push_back(now);
        }
        let error_cutoff = now - Duration::seconds(ERROR_WINDOW_SECS);
        while matches!(self.error_timestamps.front(), Some(ts) if *ts < error_cutoff) {
            self.error_timestamps.pop_front();
        }

        let mut detected = Vec::new();

        if let Some(anomaly) = self.check_volume_spike(record, outcome) {
            detected.extend(self.record_anomaly(anomaly));
        }
        if let Some(anomaly) = self.check_error_spike(record) {
            detected.extend(self.record_anomaly(anomaly));
        }
        if let Some(anomaly) = self.check_new_pattern(record, outcome) {
            detected.extend(self.record_anomaly(anomaly));
        }

        detected
    }

    /// Stored anomalies at or above the given severity, oldest first
    pub fn anomalies(&self, min_severity: AnomalySeverity) -> Vec<Anomaly> {
        let mut matching: Vec<Anomaly> = self
            .anomalies
            .iter()
            .filter(|a| a.severity >= min_severity)
            .cloned()
            .collect();
        matching.sort_by_key(|a| a.detected_at);
        matching
    }

    fn check_volume_spike(&self, record: &LogRecord, outcome: &ProcessOutcome) -> Option<Anomaly> {
        let baseline = self.baseline.as_ref()?;
        if baseline.entries_per_minute <= 0.0 {
            return None;
        }

        let ratio = outcome.current_minute_count as f64 / baseline.entries_per_minute;
        if ratio <= self.config.spike_threshold {
            return None;
        }

        let severity = if ratio > 2.0 * self.config.spike_threshold {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        };

        Some(Anomaly::new(
            AnomalyKind::VolumeSpike,
            severity,
            format!(
                "record volume {} in the current minute is {:.1}x the baseline of {:.1}/min",
                outcome.current_minute_count, ratio, baseline.entries_per_minute
            ),
            vec![record.id],
            baseline.entries_per_minute,
            outcome.current_minute_count as f64,
        ))
    }

    fn check_error_spike(&self, record: &LogRecord) -> Option<Anomaly> {
        if !record.is_error() {
            return None;
        }

        let baseline = self.baseline.as_ref()?;
        let expected_errors = baseline.error_rate * baseline.entries_per_minute;
        if expected_errors <= 0.0 {
            return None;
        }

        let recent_errors = self.error_timestamps.len() as f64;
        if recent_errors / expected_errors <= self.config.spike_threshold {
            return None;
        }

        Some(Anomaly::new(
            AnomalyKind::ErrorSpike,
            AnomalySeverity::High,
            format!(
                "{} errors in the trailing minute against an expected {:.2}/min",
                recent_errors as u64, expected_errors
            ),
            vec![record.id],
            expected_errors,
            recent_errors,
        ))
    }

    fn check_new_pattern(&self, record: &LogRecord, outcome: &ProcessOutcome) -> Option<Anomaly> {
        if !outcome.new_pattern {
            return None;
        }
        self.baseline.as_ref()?;
        if self.total_processed <= self.config.cold_start_records {
            return None;
        }

        let severity = if record.is_error() {
            AnomalySeverity::Medium
        } else {
            AnomalySeverity::Low
        };

        Some(Anomaly::new(
            AnomalyKind::NewPattern,
            severity,
            format!("new log pattern observed: {}", outcome.pattern),
            vec![record.id],
            0.0,
            1.0,
        ))
    }

    /// Store an anomaly unless a same-kind anomaly exists within the
    /// dedupe window; prune expired anomalies on every insertion.
    fn record_anomaly(&mut self, anomaly: Anomaly) -> Option<Anomaly> {
        let now = Utc::now();

        let retention_cutoff = now - Duration::hours(self.config.retention_hours as i64);
        self.anomalies.retain(|a| a.detected_at >= retention_cutoff);

        let dedupe_cutoff = now - Duration::seconds(self.config.dedupe_window_secs as i64);
        let duplicate = self
            .anomalies
            .iter()
            .any(|a| a.kind == anomaly.kind && a.detected_at >= dedupe_cutoff);
        if duplicate {
            tracing::debug!(kind = %anomaly.kind, "anomaly suppressed as duplicate");
            return None;
        }

        tracing::info!(
            kind = %anomaly.kind,
            severity = %anomaly.severity,
            description = %anomaly.description,
            "anomaly detected"
        );
        self.anomalies.push(anomaly.clone());
        Some(anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(AnomalyConfig::default().with_cold_start_records(0)).unwrap()
    }

    fn outcome(pattern: &str, new_pattern: bool, current_minute_count: u64) -> ProcessOutcome {
        ProcessOutcome {
            pattern: pattern.to_string(),
            new_pattern,
            current_minute_count,
        }
    }

    #[test]
    fn test_no_baseline_no_spike() {
        let mut det = detector();
        let record = LogRecord::new(LogLevel::Info, "burst");

        let detected = det.observe(&record, &outcome("burst", false, 1_000));
        assert!(detected.is_empty());
    }

    #[test]
    fn test_volume_spike_severities() {
        let mut det = detector();
        det.set_baseline(10.0, 0.0);

        // Ratio 4x with threshold 3: medium.
        let record = LogRecord::new(LogLevel::Info, "burst");
        let detected = det.observe(&record, &outcome("burst", false, 40));
        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].kind, AnomalyKind::VolumeSpike);
        assert_eq!(detected[0].severity, AnomalySeverity::Medium);
        assert!((detected[0].deviation_percent() - 300.0).abs() < 1e-9);

        // Ratio above 2x threshold: high, but suppressed as a duplicate
        // within the dedupe window.
        let detected = det.observe(&record, &outcome("burst", false, 100));
        assert!(detected.is_empty());
    }

    #[test]
    fn test_volume_spike_high_severity() {
        let mut det = detector();
        det.set_baseline(10.0, 0.0);

        let record = LogRecord::new(LogLevel::Info, "burst");
        let detected = det.observe(&record, &outcome("burst", false, 100));
        assert_eq!(detected[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_error_spike() {
        let mut det = detector();
        det.set_baseline(10.0, 0.01);

        // Expected errors 0.1/min; a single error already exceeds 3x.
        let record = LogRecord::new(LogLevel::Error, "db down");
        let detected = det.observe(&record, &outcome("db down", false, 1));

        assert_eq!(detected.len(), 1);
        assert_eq!(detected[0].kind, AnomalyKind::ErrorSpike);
        assert_eq!(detected[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_new_pattern_cold_start_guard() {
        let mut det =
            AnomalyDetector::new(AnomalyConfig::default().with_cold_start_records(100)).unwrap();
        det.set_baseline(10.0, 0.0);

        let record = LogRecord::new(LogLevel::Info, "fresh pattern");
        let detected = det.observe(&record, &outcome("fresh pattern", true, 1));
        assert!(detected.is_empty());
    }

    #[test]
    fn test_new_pattern_severity_tracks_level() {
        let mut det = detector();
        det.set_baseline(10.0, 0.0);

        let info = LogRecord::new(LogLevel::Info, "pattern a");
        let detected = det.observe(&info, &outcome("pattern a", true, 1));
        assert_eq!(detected[0].kind, AnomalyKind::NewPattern);
        assert_eq!(detected[0].severity, AnomalySeverity::Low);
    }

    #[test]
    fn test_same_kind_dedupe() {
        let mut det = detector();
        det.set_baseline(10.0, 0.0);

        let record = LogRecord::new(LogLevel::Info, "burst");
        det.observe(&record, &outcome("burst", false, 40));
        det.observe(&record, &outcome("burst", false, 41));

        assert_eq!(det.anomalies(AnomalySeverity::Low).len(), 1);
    }

    #[test]
    fn test_severity_filter() {
        let mut det = detector();
        det.set_baseline(10.0, 0.0);

        let info = LogRecord::new(LogLevel::Info, "pattern b");
        det.observe(&info, &outcome("pattern b", true, 1));

        assert_eq!(det.anomalies(AnomalySeverity::Low).len(), 1);
        assert!(det.anomalies(AnomalySeverity::Medium).is_empty());
    }

    #[test]
    fn test_baseline_due_schedule() {
        let mut det = detector();
        let now = Utc::now();

        assert!(det.baseline_due(now));
        det.set_baseline(1.0, 0.0);
        assert!(!det.baseline_due(Utc::now()));

        // Past a quarter of the window it is due again.
        let later = Utc::now() + Duration::seconds(901);
        assert!(det.baseline_due(later));
    }
}

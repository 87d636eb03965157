//! Temporal burst detection
//!
//! Detects intervals where event counts rise significantly above their
//! baseline. The pipeline is:
//!
//! 1. Bucket timestamps into a zero-filled series ([`super::bucketing`])
//! 2. Estimate a burst-free baseline per bucket ([`super::baseline`])
//! 3. Flag buckets whose standard score exceeds the sensitivity
//! 4. Merge flagged buckets into intervals and score them
//!
//! # Threshold test
//!
//! A bucket *qualifies* when `(count - baseline) / scale > sensitivity`.
//! A bucket is *elevated* when `count > baseline`. Qualifying buckets are
//! merged into one interval when they are adjacent or separated only by
//! elevated buckets; every interval starts and ends on a qualifying bucket.
//!
//! Because the baseline and the elevated runs do not depend on the
//! sensitivity, raising the sensitivity can only drop intervals or shrink
//! them, never add or split them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

use super::baseline::{Baseline, BaselineMethod};
use super::bucketing::{bucket_timestamps, BucketSeries, DateRange, DEFAULT_MAX_BUCKETS};
use super::granularity::Granularity;
use super::summary::BurstStatistics;

/// Validation errors for burst detection input
///
/// These are caller mistakes. An input that simply contains no bursts is
/// not an error and yields an empty interval list.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BurstError {
    #[error("Sensitivity must be within [{min}, {max}], got {value}")]
    InvalidSensitivity { value: f64, min: f64, max: f64 },

    #[error("Unknown granularity '{0}': expected day, week, month or year")]
    InvalidGranularity(String),

    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Span needs more than {limit} buckets")]
    TooManyBuckets { limit: usize },

    #[error("Date arithmetic left the representable calendar")]
    DateOverflow,

    #[error("Invalid smoothing: {0}")]
    InvalidSmoothing(String),

    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),
}

impl BurstError {
    /// Short machine-readable label, used as a metric label and in API errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSensitivity { .. } => "invalid_sensitivity",
            Self::InvalidGranularity(_) => "invalid_granularity",
            Self::MalformedTimestamp(_) => "malformed_timestamp",
            Self::InvalidDateRange { .. } => "invalid_date_range",
            Self::TooManyBuckets { .. } => "too_many_buckets",
            Self::DateOverflow => "date_overflow",
            Self::InvalidSmoothing(_) => "invalid_smoothing",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

/// Result type for burst detection operations
pub type BurstResult<T> = Result<T, BurstError>;

/// Standard-score threshold a bucket must exceed to qualify as bursting
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Sensitivity(f64);

impl Sensitivity {
    /// Smallest accepted value
    pub const MIN: f64 = 0.0;

    /// Largest accepted value
    pub const MAX: f64 = 10.0;

    /// Default threshold (two standard deviations)
    pub const DEFAULT: f64 = 2.0;

    /// Create a validated sensitivity
    ///
    /// Values outside `[MIN, MAX]` and NaN are rejected, never clamped.
    pub fn new(value: f64) -> BurstResult<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(BurstError::InvalidSensitivity {
                value,
                min: Self::MIN,
                max: Self::MAX,
            });
        }
        Ok(Self(value))
    }

    /// Raw threshold value
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<f64> for Sensitivity {
    type Error = BurstError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sensitivity> for f64 {
    fn from(sensitivity: Sensitivity) -> Self {
        sensitivity.0
    }
}

/// Tunables for the detector that are not per-query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum number of buckets in the series
    pub min_buckets: usize,

    /// Minimum number of buckets holding at least one event
    pub min_populated_buckets: usize,

    /// Upper bound on buckets per series
    pub max_buckets: usize,

    /// Baseline estimation strategy
    pub baseline: BaselineMethod,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_buckets: 3,
            min_populated_buckets: 2,
            max_buckets: DEFAULT_MAX_BUCKETS,
            baseline: BaselineMethod::Global,
        }
    }
}

impl DetectorConfig {
    /// Validate configuration values
    pub fn validate(&self) -> BurstResult<()> {
        if self.min_buckets == 0 {
            return Err(BurstError::InvalidConfig(
                "min_buckets must be greater than 0".to_string(),
            ));
        }
        if self.min_populated_buckets == 0 {
            return Err(BurstError::InvalidConfig(
                "min_populated_buckets must be greater than 0".to_string(),
            ));
        }
        if self.max_buckets < self.min_buckets {
            return Err(BurstError::InvalidConfig(format!(
                "max_buckets ({}) must be at least min_buckets ({})",
                self.max_buckets, self.min_buckets
            )));
        }
        if let BaselineMethod::MovingWindow { half_width: 0 } = self.baseline {
            return Err(BurstError::InvalidConfig(
                "moving window half_width must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A contiguous run of buckets flagged as bursting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstInterval {
    /// Taxonomy category, for category-scoped detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Start of the first bucket
    pub start: NaiveDate,

    /// End of the last bucket (exclusive)
    pub end: NaiveDate,

    /// Number of buckets covered
    pub duration_buckets: usize,

    /// Start of the bucket with the highest count
    pub peak_start: NaiveDate,

    /// Highest bucket count inside the interval
    pub peak_count: u64,

    /// Expected count at the peak bucket
    pub baseline: f64,

    /// Peak count relative to the baseline (floored at one event)
    pub magnitude: f64,

    /// Standard score of the peak bucket
    pub z_score: f64,

    /// Sum of `count - baseline` over the interval
    pub total_excess: f64,

    /// Peak-to-mean strength weighted by dispersion inside the interval
    pub strength: f64,
}

impl BurstInterval {
    /// Check whether two intervals share any day
    #[must_use]
    pub fn overlaps(&self, other: &BurstInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check whether a date falls inside the interval
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Detector output for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstReport {
    /// Bucket width used
    pub granularity: Granularity,

    /// Threshold used
    pub sensitivity: f64,

    /// Baseline strategy used
    pub baseline_method: BaselineMethod,

    /// Bursts ordered by start
    pub intervals: Vec<BurstInterval>,

    /// Full per-bucket count series
    pub series: BucketSeries,

    /// Summary statistics over `intervals`
    pub summary: BurstStatistics,
}

impl BurstReport {
    /// Check if no bursts were found
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Total number of buckets covered by bursts
    #[must_use]
    pub fn burst_buckets(&self) -> usize {
        self.intervals.iter().map(|i| i.duration_buckets).sum()
    }

    /// Intervals ordered by magnitude (descending), ties by start (ascending)
    #[must_use]
    pub fn ranked(&self) -> Vec<&BurstInterval> {
        let mut ranked: Vec<&BurstInterval> = self.intervals.iter().collect();
        ranked.sort_by(|a, b| {
            b.magnitude
                .total_cmp(&a.magnitude)
                .then_with(|| a.start.cmp(&b.start))
        });
        ranked
    }

    /// Attach a category label to every interval
    #[must_use]
    pub fn with_category(mut self, category: &str) -> Self {
        for interval in &mut self.intervals {
            interval.category = Some(category.to_string());
        }
        self
    }
}

/// Burst detector
///
/// Stateless apart from its configuration; one instance can serve any number
/// of concurrent queries.
#[derive(Debug, Clone, Default)]
pub struct BurstDetector {
    config: DetectorConfig,
}

impl BurstDetector {
    /// Create a detector with a validated configuration
    pub fn new(config: DetectorConfig) -> BurstResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Detector configuration
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect bursts in raw event timestamps
    ///
    /// # Arguments
    /// * `timestamps` - Event times, in any order
    /// * `granularity` - Bucket width
    /// * `sensitivity` - Standard-score threshold
    /// * `range` - Optional inclusive span overriding the data extent
    pub fn detect(
        &self,
        timestamps: &[DateTime<Utc>],
        granularity: Granularity,
        sensitivity: Sensitivity,
        range: Option<DateRange>,
    ) -> BurstResult<BurstReport> {
        let series = bucket_timestamps(timestamps, granularity, range, self.config.max_buckets)?;
        Ok(self.detect_series(series, sensitivity))
    }

    /// Detect bursts in an already bucketed series
    #[must_use]
    pub fn detect_series(&self, series: BucketSeries, sensitivity: Sensitivity) -> BurstReport {
        let intervals = self.find_intervals(&series, sensitivity);
        let summary = BurstStatistics::from_intervals(&intervals);

        tracing::debug!(
            granularity = %series.granularity,
            buckets = series.len(),
            events = series.total_events,
            sensitivity = sensitivity.value(),
            bursts = intervals.len(),
            "Burst detection finished"
        );

        BurstReport {
            granularity: series.granularity,
            sensitivity: sensitivity.value(),
            baseline_method: self.config.baseline,
            intervals,
            series,
            summary,
        }
    }

    fn find_intervals(&self, series: &BucketSeries, sensitivity: Sensitivity) -> Vec<BurstInterval> {
        if series.len() < self.config.min_buckets
            || series.populated() < self.config.min_populated_buckets
        {
            return Vec::new();
        }

        let counts: Vec<f64> = series.buckets.iter().map(|b| b.count as f64).collect();
        let Some(baseline) = Baseline::estimate(&counts, self.config.baseline) else {
            return Vec::new();
        };

        let threshold = sensitivity.value();
        let elevated = |i: usize| counts[i] > baseline.expected[i];
        let qualifies = |i: usize| baseline.z_score(i, counts[i]) > threshold;

        let n = counts.len();
        let mut intervals = Vec::new();
        let mut i = 0;

        while i < n {
            if !elevated(i) {
                i += 1;
                continue;
            }

            let run_start = i;
            while i < n && elevated(i) {
                i += 1;
            }

            let first = (run_start..i).find(|&j| qualifies(j));
            let last = (run_start..i).rev().find(|&j| qualifies(j));
            if let (Some(first), Some(last)) = (first, last) {
                intervals.push(build_interval(series, &counts, &baseline, first, last));
            }
        }

        intervals
    }
}

/// Score the interval covering buckets `first..=last`
fn build_interval(
    series: &BucketSeries,
    counts: &[f64],
    baseline: &Baseline,
    first: usize,
    last: usize,
) -> BurstInterval {
    let mut peak = first;
    for j in first..=last {
        if counts[j] > counts[peak] {
            peak = j;
        }
    }

    let expected_at_peak = baseline.expected[peak];
    let total_excess = (first..=last)
        .map(|j| counts[j] - baseline.expected[j])
        .sum();

    BurstInterval {
        category: None,
        start: series.buckets[first].start,
        end: series.buckets[last].end,
        duration_buckets: last - first + 1,
        peak_start: series.buckets[peak].start,
        peak_count: series.buckets[peak].count,
        baseline: expected_at_peak,
        magnitude: counts[peak] / expected_at_peak.max(1.0),
        z_score: baseline.z_score(peak, counts[peak]),
        total_excess,
        strength: burst_strength(&counts[first..=last]),
    }
}

/// Strength of a burst from the counts inside it
///
/// `(peak / mean - 1) * (1 + cv)`, where `cv` is the coefficient of
/// variation. Zero for a single bucket or a zero mean.
#[must_use]
pub fn burst_strength(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mean = values.mean();
    if mean <= 0.0 {
        return 0.0;
    }

    let peak = values.iter().copied().fold(f64::MIN, f64::max);
    let cv = if values.len() > 1 {
        values.std_dev() / mean
    } else {
        0.0
    };

    ((peak / mean - 1.0) * (1.0 + cv)).max(0.0)
}

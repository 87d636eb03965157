//! Summary statistics over detected bursts

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::burst::BurstInterval;

/// Aggregate figures for a set of burst intervals
///
/// All fields are zero when there are no bursts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurstStatistics {
    /// Number of intervals
    pub total_bursts: usize,

    /// Mean interval length in buckets
    pub average_duration: f64,

    /// Mean interval magnitude
    pub average_magnitude: f64,

    /// Buckets covered by all intervals together
    pub total_burst_buckets: usize,

    /// Largest magnitude
    pub max_magnitude: f64,

    /// Smallest magnitude
    pub min_magnitude: f64,

    /// Population standard deviation of interval lengths
    pub std_duration: f64,

    /// Population standard deviation of magnitudes
    pub std_magnitude: f64,
}

impl BurstStatistics {
    /// Compute statistics for a list of intervals
    #[must_use]
    pub fn from_intervals(intervals: &[BurstInterval]) -> Self {
        if intervals.is_empty() {
            return Self::default();
        }

        let durations: Vec<f64> = intervals
            .iter()
            .map(|i| i.duration_buckets as f64)
            .collect();
        let magnitudes: Vec<f64> = intervals.iter().map(|i| i.magnitude).collect();

        Self {
            total_bursts: intervals.len(),
            average_duration: durations.iter().mean(),
            average_magnitude: magnitudes.iter().mean(),
            total_burst_buckets: intervals.iter().map(|i| i.duration_buckets).sum(),
            max_magnitude: magnitudes.iter().copied().fold(f64::MIN, f64::max),
            min_magnitude: magnitudes.iter().copied().fold(f64::MAX, f64::min),
            std_duration: durations.iter().population_std_dev(),
            std_magnitude: magnitudes.iter().population_std_dev(),
        }
    }
}

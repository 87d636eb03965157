//! Baseline estimation for burst detection
//!
//! The baseline is the count a bucket would be expected to have without a
//! burst. It is estimated in two steps:
//!
//! 1. A screening pass flags buckets above `mean + 1.5 * std` of the whole
//!    series. Screened buckets never contribute to the baseline.
//! 2. The expected count and spread are computed from the unscreened buckets,
//!    either over the whole series (`Global`) or over a centred window
//!    (`MovingWindow`).
//!
//! Screening does not depend on the detection sensitivity.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Screening threshold in standard deviations above the series mean
pub const SCREEN_SIGMA: f64 = 1.5;

/// Variance at or below this is treated as a flat series
const ZERO_VARIANCE_EPSILON: f64 = 1e-12;

/// Baseline estimation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BaselineMethod {
    /// One baseline for the whole series
    #[default]
    Global,

    /// Per-bucket baseline over `[i - half_width, i + half_width]`
    MovingWindow { half_width: usize },
}

impl BaselineMethod {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::MovingWindow { .. } => "moving_window",
        }
    }
}

/// Per-bucket expected counts and spreads
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    /// Expected count per bucket
    pub expected: Vec<f64>,

    /// Spread used to normalise the excess of each bucket (always >= 1)
    pub scale: Vec<f64>,

    /// Buckets excluded from the baseline by the screening pass
    pub screened: Vec<bool>,
}

impl Baseline {
    /// Estimate the baseline for a count series
    ///
    /// Returns `None` for an empty or flat series; such a series never bursts.
    #[must_use]
    pub fn estimate(counts: &[f64], method: BaselineMethod) -> Option<Self> {
        if counts.is_empty() {
            return None;
        }

        let mean = counts.mean();
        let std_dev = counts.population_std_dev();
        if !(std_dev * std_dev > ZERO_VARIANCE_EPSILON) {
            return None;
        }

        let cutoff = mean + SCREEN_SIGMA * std_dev;
        let screened: Vec<bool> = counts.iter().map(|&c| c > cutoff).collect();

        let clean: Vec<f64> = counts
            .iter()
            .zip(&screened)
            .filter(|&(_, &s)| !s)
            .map(|(&c, _)| c)
            .collect();
        // The minimum never exceeds the mean, so `clean` is non-empty
        let global = if clean.is_empty() {
            SampleStats::of(counts)
        } else {
            SampleStats::of(&clean)
        };

        let (expected, scale) = match method {
            BaselineMethod::Global => {
                let scale = noise_floor(global.mean, global.std_dev);
                (vec![global.mean; counts.len()], vec![scale; counts.len()])
            }
            BaselineMethod::MovingWindow { half_width } => {
                let n = counts.len();
                let mut expected = Vec::with_capacity(n);
                let mut scale = Vec::with_capacity(n);

                for i in 0..n {
                    let lo = i.saturating_sub(half_width);
                    let hi = (i + half_width).min(n - 1);
                    let window: Vec<f64> = (lo..=hi)
                        .filter(|&j| !screened[j])
                        .map(|j| counts[j])
                        .collect();

                    let stats = if window.is_empty() {
                        global
                    } else {
                        SampleStats::of(&window)
                    };
                    expected.push(stats.mean);
                    scale.push(noise_floor(stats.mean, stats.std_dev));
                }

                (expected, scale)
            }
        };

        Some(Self {
            expected,
            scale,
            screened,
        })
    }

    /// Standard score of `count` against the baseline of bucket `index`
    #[must_use]
    pub fn z_score(&self, index: usize, count: f64) -> f64 {
        (count - self.expected[index]) / self.scale[index]
    }
}

/// Mean and population standard deviation of a non-empty sample
#[derive(Debug, Clone, Copy)]
struct SampleStats {
    mean: f64,
    std_dev: f64,
}

impl SampleStats {
    fn of(values: &[f64]) -> Self {
        Self {
            mean: values.mean(),
            std_dev: values.population_std_dev(),
        }
    }
}

/// Spread floored at the counting noise of the expected value
///
/// Never below `sqrt(expected)`, and never below one event.
fn noise_floor(expected: f64, std_dev: f64) -> f64 {
    std_dev.max(expected.max(1.0).sqrt())
}

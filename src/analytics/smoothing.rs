//! Chart smoothing for bucket series
//!
//! Smoothing only affects what is drawn; detection always runs on the raw
//! counts.

use serde::{Deserialize, Serialize};

use super::burst::{BurstError, BurstResult};

/// Smoothing applied to a count series for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// Centred rolling mean over `window` buckets; edges use a truncated window
    Rolling { window: usize },

    /// Exponentially weighted mean with `alpha = 2 / (span + 1)`
    Exponential { span: usize },
}

impl SmoothingMethod {
    /// Validate the window or span
    pub fn validate(&self) -> BurstResult<()> {
        match self {
            Self::Rolling { window: 0 } => Err(BurstError::InvalidSmoothing(
                "rolling window must be greater than 0".to_string(),
            )),
            Self::Exponential { span: 0 } => Err(BurstError::InvalidSmoothing(
                "exponential span must be greater than 0".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Smooth a series of counts
    pub fn apply(&self, counts: &[u64]) -> BurstResult<Vec<f64>> {
        self.validate()?;
        let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();

        Ok(match *self {
            Self::Rolling { window } => rolling_mean(&values, window),
            Self::Exponential { span } => exponential_mean(&values, span),
        })
    }
}

fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let before = (window - 1) / 2;
    let after = window - 1 - before;

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n - 1);
            let slice = &values[lo..=hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

fn exponential_mean(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut smoothed = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &x in values {
        let y = match prev {
            Some(p) => alpha * x + (1.0 - alpha) * p,
            None => x,
        };
        smoothed.push(y);
        prev = Some(y);
    }

    smoothed
}

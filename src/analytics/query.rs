//! Burst queries against an event repository
//!
//! A [`BurstQuery`] bundles everything a dashboard view selects: filters,
//! granularity, sensitivity and whether to break results down by category.
//! [`run_query`] pulls matching events from storage and runs detection.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::burst::{BurstDetector, BurstReport, Sensitivity};
use super::category::{detect_by_category, CategoryBursts};
use super::granularity::Granularity;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::FilterSet;
use crate::storage::EventRepository;

/// Parameters of one burst analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurstQuery {
    /// Event selection
    #[serde(default)]
    pub filters: FilterSet,

    /// Bucket width
    #[serde(default)]
    pub granularity: Granularity,

    /// Standard-score threshold
    #[serde(default)]
    pub sensitivity: Sensitivity,

    /// Also run detection separately for every category
    #[serde(default)]
    pub per_category: bool,
}

impl BurstQuery {
    /// Create a query without category breakdown
    pub fn new(filters: FilterSet, granularity: Granularity, sensitivity: Sensitivity) -> Self {
        Self {
            filters,
            granularity,
            sensitivity,
            per_category: false,
        }
    }

    /// Enable or disable the per-category breakdown
    #[must_use]
    pub fn with_per_category(mut self, per_category: bool) -> Self {
        self.per_category = per_category;
        self
    }
}

/// Result of a burst query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstAnalysis {
    /// Query that produced this analysis
    pub query: BurstQuery,

    /// Detection over all matching events
    pub overall: BurstReport,

    /// Per-category detection, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<CategoryBursts>,

    /// Events that matched the filters
    pub matched_events: u64,

    /// When the analysis was computed
    pub generated_at: DateTime<Utc>,
}

/// Fetch events for `query` and run burst detection on them
///
/// The filter set's date range, when present, also fixes the bucketed span,
/// so quiet stretches at either end count towards the baseline.
pub fn run_query(
    repo: &dyn EventRepository,
    detector: &BurstDetector,
    query: &BurstQuery,
) -> Result<BurstAnalysis> {
    let started = Instant::now();
    let granularity = query.granularity;
    let range = query.filters.date_range;

    let events = repo.fetch_events(&query.filters)?;
    let timestamps: Vec<DateTime<Utc>> = events.iter().map(|e| e.timestamp).collect();

    let detected = detector
        .detect(&timestamps, granularity, query.sensitivity, range)
        .and_then(|overall| {
            let categories = if query.per_category {
                Some(detect_by_category(
                    detector,
                    &events,
                    granularity,
                    query.sensitivity,
                    range,
                )?)
            } else {
                None
            };
            Ok((overall, categories))
        });

    let (overall, categories) = match detected {
        Ok(result) => result,
        Err(e) => {
            metrics::record_validation_error(e.kind());
            tracing::warn!(error = %e, "Burst query rejected");
            return Err(Error::Validation(e));
        }
    };

    let bursts = overall.intervals.len() + categories.as_ref().map_or(0, |c| c.total_bursts());
    metrics::record_detection(
        granularity.as_str(),
        bursts,
        started.elapsed().as_secs_f64(),
    );

    tracing::info!(
        granularity = %granularity,
        sensitivity = query.sensitivity.value(),
        events = events.len(),
        bursts = overall.intervals.len(),
        per_category = query.per_category,
        "Burst query completed"
    );

    Ok(BurstAnalysis {
        query: query.clone(),
        overall,
        categories,
        matched_events: events.len() as u64,
        generated_at: Utc::now(),
    })
}

//! Category-scoped burst detection
//!
//! Each taxonomy category is detected independently: its events are bucketed
//! over the category's own span (or the explicit range, if given), so the
//! result for a category is identical to running the detector on that
//! category's events alone.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bucketing::DateRange;
use super::burst::{BurstDetector, BurstInterval, BurstReport, BurstResult, Sensitivity};
use super::granularity::Granularity;
use crate::models::Event;

/// Burst reports keyed by category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBursts {
    /// One report per category, in category order
    pub reports: BTreeMap<String, BurstReport>,

    /// Events skipped because they carry no category
    pub uncategorized: u64,
}

impl CategoryBursts {
    /// Number of categories analysed
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Check if no category was analysed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Total bursts across categories
    #[must_use]
    pub fn total_bursts(&self) -> usize {
        self.reports.values().map(|r| r.intervals.len()).sum()
    }

    /// All intervals across categories, ordered by magnitude (descending),
    /// then start, then category
    #[must_use]
    pub fn ranked(&self) -> Vec<&BurstInterval> {
        let mut ranked: Vec<&BurstInterval> = self
            .reports
            .values()
            .flat_map(|r| r.intervals.iter())
            .collect();
        ranked.sort_by(|a, b| {
            b.magnitude
                .total_cmp(&a.magnitude)
                .then_with(|| a.start.cmp(&b.start))
                .then_with(|| a.category.cmp(&b.category))
        });
        ranked
    }
}

/// Run detection separately for every category present in `events`
pub fn detect_by_category(
    detector: &BurstDetector,
    events: &[Event],
    granularity: Granularity,
    sensitivity: Sensitivity,
    range: Option<DateRange>,
) -> BurstResult<CategoryBursts> {
    let mut grouped: BTreeMap<&str, Vec<DateTime<Utc>>> = BTreeMap::new();
    let mut uncategorized = 0u64;

    for event in events {
        match event.category.as_deref() {
            Some(category) => grouped.entry(category).or_default().push(event.timestamp),
            None => uncategorized += 1,
        }
    }

    let mut reports = BTreeMap::new();
    for (category, timestamps) in grouped {
        let report = detector
            .detect(&timestamps, granularity, sensitivity, range)?
            .with_category(category);
        reports.insert(category.to_string(), report);
    }

    tracing::debug!(
        categories = reports.len(),
        uncategorized,
        "Category burst detection finished"
    );

    Ok(CategoryBursts {
        reports,
        uncategorized,
    })
}

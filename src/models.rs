// Core data structures for cogwar analytics

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::DateRange;

/// Separator between levels of a taxonomy path
pub const TAXONOMY_SEPARATOR: &str = " - ";

/// Filter value meaning "no restriction"
pub const ALL: &str = "ALL";

/// A classified text chunk placed in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Chunk identifier
    pub id: i64,

    /// Publication time of the parent record
    pub timestamp: DateTime<Utc>,

    /// Top-level taxonomy category, if classified
    pub category: Option<String>,

    /// Originating source (outlet, platform)
    pub source: Option<String>,

    /// Document language
    pub language: Option<String>,
}

/// Event to be inserted into storage
///
/// `taxonomy` holds the full classification path
/// (e.g. `"Information Warfare - Disinformation - Deepfakes"`); the top-level
/// category is derived from it on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub taxonomy: Option<String>,
    pub source: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    #[serde(default = "default_relevant")]
    pub is_relevant: bool,
    pub confidence: Option<f64>,
}

fn default_relevant() -> bool {
    true
}

/// Top level of a taxonomy path
///
/// `"A - B - C"` becomes `"A"`. Blank input yields `None`.
#[must_use]
pub fn top_level_category(path: &str) -> Option<String> {
    let head = path.split(TAXONOMY_SEPARATOR).next()?.trim();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

/// Dashboard filter selection
///
/// An empty list, or a list containing `"ALL"`, places no restriction on that
/// dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub languages: Vec<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl FilterSet {
    /// Filter set without restrictions
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Active values of a dimension, or `None` when unrestricted
    #[must_use]
    pub fn active(values: &[String]) -> Option<&[String]> {
        if values.is_empty() || values.iter().any(|v| v == ALL) {
            None
        } else {
            Some(values)
        }
    }

    /// Check whether an event passes every filter
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        dimension_matches(&self.sources, event.source.as_deref())
            && dimension_matches(&self.languages, event.language.as_deref())
            && dimension_matches(&self.categories, event.category.as_deref())
            && self
                .date_range
                .map_or(true, |r| r.contains(event.timestamp.date_naive()))
    }

    /// Normalise the lists so equal selections compare and hash equal
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for values in [&mut self.sources, &mut self.languages, &mut self.categories] {
            if FilterSet::active(values).is_none() {
                values.clear();
            } else {
                values.sort();
                values.dedup();
            }
        }
        self
    }
}

fn dimension_matches(filter: &[String], value: Option<&str>) -> bool {
    match FilterSet::active(filter) {
        None => true,
        Some(allowed) => value.is_some_and(|v| allowed.iter().any(|a| a == v)),
    }
}

/// Earliest and latest event dates in a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// Filter options available in the data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub sources: Vec<String>,
    pub languages: Vec<String>,
    pub categories: Vec<String>,
    pub date_bounds: Option<DateBounds>,
    pub total_events: u64,
}

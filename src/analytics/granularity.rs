//! Bucket width for temporal aggregation
//!
//! Buckets are aligned to calendar boundaries so that the same date always
//! lands in the same bucket regardless of the queried span:
//! - `Day`: the calendar day (UTC)
//! - `Week`: ISO week, starting on Monday
//! - `Month`: first day of the month
//! - `Year`: 1 January

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::burst::BurstError;

/// Time granularity used to bucket events
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl Granularity {
    /// All supported granularities, finest first
    pub const ALL: [Granularity; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Start of the bucket containing `date`
    ///
    /// Returns `None` only when the bucket start would fall before the
    /// earliest representable date.
    #[must_use]
    pub fn truncate(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => Some(date),
            Self::Week => {
                let offset = u64::from(date.weekday().num_days_from_monday());
                date.checked_sub_days(Days::new(offset))
            }
            Self::Month => date.with_day(1),
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }

    /// Start of the bucket following the one that starts at `start`
    ///
    /// `start` must already be aligned (see [`Granularity::truncate`]).
    #[must_use]
    pub fn next_start(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => start.checked_add_days(Days::new(1)),
            Self::Week => start.checked_add_days(Days::new(7)),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = BurstError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "year" | "yearly" => Ok(Self::Year),
            _ => Err(BurstError::InvalidGranularity(s.to_string())),
        }
    }
}

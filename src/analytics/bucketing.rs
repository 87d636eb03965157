//! Time bucketing of event timestamps
//!
//! Buckets partition the queried span into contiguous, calendar-aligned,
//! half-open windows `[start, end)`. Empty windows are kept with a zero count.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::burst::BurstError;
use super::granularity::Granularity;

/// Default upper bound on buckets generated for a single series
pub const DEFAULT_MAX_BUCKETS: usize = 100_000;

/// Inclusive calendar date range used to override the bucketed span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First day of the range (inclusive)
    pub start: NaiveDate,

    /// Last day of the range (inclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a validated range
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BurstError> {
        if start > end {
            return Err(BurstError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Check whether a date falls inside the range
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A single fixed-width time window with its event count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// First day covered by the bucket
    pub start: NaiveDate,

    /// First day after the bucket (exclusive)
    pub end: NaiveDate,

    /// Number of events inside the bucket
    pub count: u64,
}

impl Bucket {
    /// Check whether a date falls inside this bucket
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Zero-filled count series over a contiguous span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSeries {
    /// Bucket width
    pub granularity: Granularity,

    /// Buckets in chronological order
    pub buckets: Vec<Bucket>,

    /// Number of timestamps handed to the bucketer
    pub total_events: u64,

    /// Timestamps dropped because they fell outside an explicit range
    pub out_of_range: u64,
}

impl BucketSeries {
    /// Series with no buckets
    #[must_use]
    pub fn empty(granularity: Granularity) -> Self {
        Self {
            granularity,
            buckets: Vec::new(),
            total_events: 0,
            out_of_range: 0,
        }
    }

    /// Build a series from pre-bucketed counts
    ///
    /// `first_start` is aligned to the granularity before use, so any day
    /// inside the first bucket is accepted.
    pub fn from_counts(
        granularity: Granularity,
        first_start: NaiveDate,
        counts: &[u64],
    ) -> Result<Self, BurstError> {
        let mut start = granularity
            .truncate(first_start)
            .ok_or(BurstError::DateOverflow)?;
        let mut buckets = Vec::with_capacity(counts.len());

        for &count in counts {
            let end = granularity
                .next_start(start)
                .ok_or(BurstError::DateOverflow)?;
            buckets.push(Bucket { start, end, count });
            start = end;
        }

        Ok(Self {
            granularity,
            buckets,
            total_events: counts.iter().sum(),
            out_of_range: 0,
        })
    }

    /// Number of buckets
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Check if the series has no buckets
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket counts in chronological order
    #[must_use]
    pub fn counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.count).collect()
    }

    /// Number of buckets holding at least one event
    #[must_use]
    pub fn populated(&self) -> usize {
        self.buckets.iter().filter(|b| b.count > 0).count()
    }

    /// Sum of all bucket counts
    #[must_use]
    pub fn bucketed_events(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    /// Covered span as `[first start, last end)`
    #[must_use]
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.buckets.first(), self.buckets.last()) {
            (Some(first), Some(last)) => Some((first.start, last.end)),
            _ => None,
        }
    }
}

/// Bucket event timestamps at the given granularity
///
/// Without `range` the span runs from the earliest to the latest timestamp;
/// with it, the span is the range and timestamps outside it are counted in
/// [`BucketSeries::out_of_range`] instead of a bucket. Input order does not
/// matter.
pub fn bucket_timestamps(
    timestamps: &[DateTime<Utc>],
    granularity: Granularity,
    range: Option<DateRange>,
    max_buckets: usize,
) -> Result<BucketSeries, BurstError> {
    let mut dates: Vec<NaiveDate> = timestamps.iter().map(DateTime::date_naive).collect();
    dates.sort_unstable();

    let (span_start, span_end) = match (range, dates.first(), dates.last()) {
        (Some(r), _, _) => (r.start, r.end),
        (None, Some(&first), Some(&last)) => (first, last),
        _ => return Ok(BucketSeries::empty(granularity)),
    };

    let mut buckets = bucket_span(granularity, span_start, span_end, max_buckets)?;

    let mut out_of_range = 0u64;
    for date in &dates {
        if *date < span_start || *date > span_end {
            out_of_range += 1;
            continue;
        }
        // first bucket start <= span_start <= date, so the index is >= 1
        let idx = buckets.partition_point(|b| b.start <= *date) - 1;
        buckets[idx].count += 1;
    }

    Ok(BucketSeries {
        granularity,
        buckets,
        total_events: dates.len() as u64,
        out_of_range,
    })
}

/// Generate empty, contiguous buckets covering `[span_start, span_end]`
fn bucket_span(
    granularity: Granularity,
    span_start: NaiveDate,
    span_end: NaiveDate,
    max_buckets: usize,
) -> Result<Vec<Bucket>, BurstError> {
    let first = granularity
        .truncate(span_start)
        .ok_or(BurstError::DateOverflow)?;

    let mut buckets = Vec::new();
    let mut start = first;
    while start <= span_end {
        if buckets.len() >= max_buckets {
            return Err(BurstError::TooManyBuckets { limit: max_buckets });
        }
        let end = granularity
            .next_start(start)
            .ok_or(BurstError::DateOverflow)?;
        buckets.push(Bucket {
            start,
            end,
            count: 0,
        });
        start = end;
    }

    Ok(buckets)
}

//! Temporal burst analytics for classified events
//!
//! - [`granularity`] - calendar-aligned bucket widths
//! - [`bucketing`] - zero-filled count series
//! - [`baseline`] - burst-free expected counts
//! - [`burst`] - the detector and its result types
//! - [`category`] - independent detection per taxonomy category
//! - [`summary`] - aggregate statistics over bursts
//! - [`smoothing`] - display smoothing for charts
//! - [`query`] - repository-backed burst queries

pub mod baseline;
pub mod bucketing;
pub mod burst;
pub mod category;
pub mod granularity;
pub mod query;
pub mod smoothing;
pub mod summary;

pub use baseline::{Baseline, BaselineMethod};
pub use bucketing::{bucket_timestamps, Bucket, BucketSeries, DateRange, DEFAULT_MAX_BUCKETS};
pub use burst::{
    burst_strength, BurstDetector, BurstError, BurstInterval, BurstReport, BurstResult,
    DetectorConfig, Sensitivity,
};
pub use category::{detect_by_category, CategoryBursts};
pub use granularity::Granularity;
pub use query::{run_query, BurstAnalysis, BurstQuery};
pub use smoothing::SmoothingMethod;
pub use summary::BurstStatistics;

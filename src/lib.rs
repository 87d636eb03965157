//! cogwar - Temporal burst analytics for classified text chunks
//!
//! Finds periods in which documents about a cognitive warfare category
//! appear far more often than usual, and serves the results to a dashboard.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`analytics`] - Bucketing, baselines and the burst detector
//! - [`models`] - Events and filter sets
//! - [`storage`] - Event repository (SQLite, in-memory)
//! - [`parser`] - CSV and JSON event files
//! - [`export`] - CSV and JSON output of results
//! - [`cache`] - Result cache for repeated queries
//! - [`dashboard`] - HTTP API for the dashboard
//! - [`metrics`] - Prometheus metrics
//! - [`config`] - Configuration management and settings
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use cogwar::analytics::{BurstDetector, Granularity, Sensitivity};
//! use cogwar::parser::load_events;
//!
//! fn main() -> anyhow::Result<()> {
//!     let events = load_events("events.csv")?;
//!     let timestamps: Vec<_> = events.iter().filter_map(|e| e.timestamp).collect();
//!
//!     let report = BurstDetector::default().detect(
//!         &timestamps,
//!         Granularity::Month,
//!         Sensitivity::new(2.0)?,
//!         None,
//!     )?;
//!     for interval in report.ranked() {
//!         println!("{} .. {}: x{:.1}", interval.start, interval.end, interval.magnitude);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analytics::{
        run_query, BurstAnalysis, BurstDetector, BurstInterval, BurstQuery, BurstReport,
        Granularity, Sensitivity,
    };
    pub use crate::config::Config;
    pub use crate::error::{CogwarErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{Event, FilterSet, NewEvent};
    pub use crate::storage::{EventRepository, SharedEventRepository};
}

// Direct re-exports for convenience
pub use models::{Event, FilterSet, NewEvent};

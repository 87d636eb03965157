//! HTTP dashboard for burst analytics
//!
//! Serves the data a timeline dashboard needs: filter options, detected
//! bursts, chart series and downloadable exports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │          Dashboard Server           │
//! │                                     │
//! │  ┌──────────────────────────────┐   │
//! │  │        REST API              │   │
//! │  │  GET  /api/health            │   │
//! │  │  GET  /api/filters           │   │
//! │  │  GET  /api/bursts            │   │
//! │  │  GET  /api/series            │   │
//! │  │  GET  /api/export            │   │
//! │  │  GET  /metrics               │   │
//! │  └──────────────┬───────────────┘   │
//! │                 │                   │
//! │  ┌──────────────▼───────────────┐   │
//! │  │  Result cache -> run_query   │   │
//! │  └──────────────┬───────────────┘   │
//! │                 │                   │
//! │  ┌──────────────▼───────────────┐   │
//! │  │      Event repository        │   │
//! │  └──────────────────────────────┘   │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cogwar::dashboard::DashboardServer;
//!
//! let server = DashboardServer::new(config, repo)?;
//! server.start_with_shutdown(shutdown_signal()).await?;
//! ```

pub mod api;
pub mod server;

// Re-export main types
pub use api::{create_router, AnalysisParams, ApiError, ApiResponse, ErrorResponse};
pub use server::{AppState, DashboardServer, ServerError, ServerInfo};

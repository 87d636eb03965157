//! REST API handlers for the dashboard server
//!
//! All analysis endpoints share the same query parameters:
//!
//! | Parameter      | Example              | Default                  |
//! |----------------|----------------------|--------------------------|
//! | `granularity`  | `week`               | configured granularity   |
//! | `sensitivity`  | `2.5`                | configured sensitivity   |
//! | `sources`      | `lens,parlamint`     | all                      |
//! | `languages`    | `en,sl`              | all                      |
//! | `categories`   | `Cyber`              | all                      |
//! | `start`, `end` | `2024-01-31`         | data extent              |
//! | `per_category` | `true`               | `false`                  |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analytics::{
    run_query, Bucket, BurstAnalysis, BurstError, BurstInterval, BurstQuery, DateRange,
    Granularity, Sensitivity, SmoothingMethod,
};
use crate::cache::CacheStats;
use crate::error::{CogwarErrorTrait, Error};
use crate::export::{self, ExportFormat, ExportTarget};
use crate::metrics;
use crate::models::{DateBounds, FilterOptions, FilterSet};
use crate::parser::parse_timestamp;

use super::server::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub category: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            category: category.into(),
        }
    }
}

/// Handler error mapped to an HTTP status
///
/// Validation and parsing failures are the caller's fault (400); everything
/// else is a server failure (500).
#[derive(Debug)]
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self.0, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ErrorResponse::new(self.0.to_string(), self.0.category().as_str());
        (status, Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// Bursts response
#[derive(Debug, Serialize)]
pub struct BurstsResponse<'a> {
    /// Full analysis
    #[serde(flatten)]
    pub analysis: &'a BurstAnalysis,

    /// All intervals (overall first, then per category) by magnitude
    pub ranked: Vec<&'a BurstInterval>,
}

/// Series response for charts
#[derive(Debug, Serialize)]
pub struct SeriesResponse<'a> {
    pub granularity: Granularity,
    pub buckets: &'a [Bucket],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothed: Option<Vec<f64>>,
    pub intervals: &'a [BurstInterval],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<&'a str, &'a [Bucket]>,
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Analysis parameters shared by the analysis endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisParams {
    pub granularity: Option<String>,
    pub sensitivity: Option<f64>,
    pub sources: Option<String>,
    pub languages: Option<String>,
    pub categories: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub per_category: bool,
}

impl AnalysisParams {
    /// Resolve into a validated query
    ///
    /// A range given on one side only is completed from `bounds`; without
    /// data the open side is dropped.
    pub fn to_query(
        &self,
        default_granularity: Granularity,
        default_sensitivity: Sensitivity,
        bounds: Option<DateBounds>,
    ) -> Result<BurstQuery, BurstError> {
        let granularity = match self.granularity.as_deref() {
            Some(g) if !g.trim().is_empty() => g.parse()?,
            _ => default_granularity,
        };
        let sensitivity = match self.sensitivity {
            Some(s) => Sensitivity::new(s)?,
            None => default_sensitivity,
        };

        let start = self.start.as_deref().map(parse_date).transpose()?;
        let end = self.end.as_deref().map(parse_date).transpose()?;
        let date_range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
            (Some(start), None) => match bounds {
                Some(b) => Some(DateRange::new(start, b.max.max(start))?),
                None => None,
            },
            (None, Some(end)) => match bounds {
                Some(b) => Some(DateRange::new(b.min.min(end), end)?),
                None => None,
            },
            (None, None) => None,
        };

        let filters = FilterSet {
            sources: split_list(self.sources.as_deref()),
            languages: split_list(self.languages.as_deref()),
            categories: split_list(self.categories.as_deref()),
            date_range,
        };

        Ok(BurstQuery::new(filters, granularity, sensitivity).with_per_category(self.per_category))
    }

    fn has_open_range(&self) -> bool {
        self.start.is_some() != self.end.is_some()
    }
}

/// Export parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub target: ExportTarget,
}

/// Chart smoothing parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmoothingParams {
    /// `rolling` or `exponential`
    pub smoothing: Option<String>,
    /// Window (rolling) or span (exponential)
    pub window: Option<usize>,
}

impl SmoothingParams {
    fn method(&self) -> Result<Option<SmoothingMethod>, BurstError> {
        let window = self.window.unwrap_or(3);
        match self.smoothing.as_deref().map(str::trim) {
            None | Some("") | Some("none") => Ok(None),
            Some("rolling") => Ok(Some(SmoothingMethod::Rolling { window })),
            Some("exponential") | Some("ewm") => Ok(Some(SmoothingMethod::Exponential { span: window })),
            Some(other) => Err(BurstError::InvalidSmoothing(format!(
                "unknown smoothing method '{other}'"
            ))),
        }
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_date(value: &str) -> Result<NaiveDate, BurstError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .or_else(|_| parse_timestamp(value).map(|t| t.date_naive()))
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/filters", get(get_filters))
        .route("/api/bursts", get(get_bursts))
        .route("/api/series", get(get_series))
        .route("/api/export", get(export_results))
        .route("/metrics", get(prometheus_metrics))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// Record request count and latency per route
async fn track_requests(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let response = next.run(req).await;
    metrics::record_api_request(
        &endpoint,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Run (or fetch from cache) the analysis described by `params`
async fn analyse(state: &AppState, params: AnalysisParams) -> Result<Arc<BurstAnalysis>, ApiError> {
    let state = state.clone();
    let analysis = tokio::task::spawn_blocking(move || -> crate::error::Result<_> {
        let bounds = if params.has_open_range() {
            state.repo.date_bounds()?
        } else {
            None
        };
        let query = params
            .to_query(state.default_granularity, state.default_sensitivity, bounds)
            .inspect_err(|e| metrics::record_validation_error(e.kind()))?;

        state.cache.get_or_compute(&query, || {
            run_query(state.repo.as_ref(), &state.detector, &query)
        })
    })
    .await
    .map_err(|e| Error::with_source("Analysis task failed", e))??;

    Ok(analysis)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cache: state.cache.stats(),
    }))
}

/// Available filter values
async fn get_filters(State(state): State<AppState>) -> Result<Json<ApiResponse<FilterOptions>>, ApiError> {
    let repo = state.repo.clone();
    let options = tokio::task::spawn_blocking(move || repo.filter_options())
        .await
        .map_err(|e| Error::with_source("Filter task failed", e))??;

    Ok(Json(ApiResponse::success(options)))
}

/// Detected bursts
async fn get_bursts(
    State(state): State<AppState>,
    Query(params): Query<AnalysisParams>,
) -> Result<Response, ApiError> {
    let analysis = analyse(&state, params).await?;

    let mut ranked: Vec<&BurstInterval> = analysis.overall.ranked();
    if let Some(categories) = &analysis.categories {
        ranked.extend(categories.ranked());
    }

    Ok(Json(ApiResponse::success(BurstsResponse {
        analysis: &analysis,
        ranked,
    }))
    .into_response())
}

/// Bucket series for charts
async fn get_series(
    State(state): State<AppState>,
    Query(params): Query<AnalysisParams>,
    Query(smoothing): Query<SmoothingParams>,
) -> Result<Response, ApiError> {
    let method = smoothing
        .method()
        .inspect_err(|e| metrics::record_validation_error(e.kind()))?;
    let analysis = analyse(&state, params).await?;
    let overall = &analysis.overall;

    let smoothed = match method {
        Some(method) => Some(method.apply(&overall.series.counts())?),
        None => None,
    };

    let categories = analysis
        .categories
        .as_ref()
        .map(|c| {
            c.reports
                .iter()
                .map(|(name, report)| (name.as_str(), report.series.buckets.as_slice()))
                .collect()
        })
        .unwrap_or_default();

    Ok(Json(ApiResponse::success(SeriesResponse {
        granularity: overall.granularity,
        buckets: &overall.series.buckets,
        smoothed,
        intervals: &overall.intervals,
        categories,
    }))
    .into_response())
}

/// Downloadable CSV or JSON export
async fn export_results(
    State(state): State<AppState>,
    Query(params): Query<AnalysisParams>,
    Query(export_params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let analysis = analyse(&state, params).await?;
    let format = export_params.format;

    let body = export::render_analysis(&analysis, format, export_params.target)?;

    let filename = format!("cogwar-bursts.{}", format.extension());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Prometheus metrics endpoint
async fn prometheus_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

//! Prometheus metrics for burst analytics and the dashboard API
//!
//! This module provides metrics tracking for:
//! - Detection: runs, bursts found, duration, validation errors
//! - Result cache: hits, misses, entries
//! - Dashboard API: requests by endpoint and status, latency
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for detection metrics
struct AnalyticsMetrics {
    detections: CounterVec,
    bursts_found: CounterVec,
    detection_duration: HistogramVec,
    validation_errors: CounterVec,
}

/// Container for dashboard metrics
struct DashboardMetrics {
    cache_lookups: CounterVec,
    cache_entries: Gauge,
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

/// Global storage for detection metrics
static ANALYTICS_METRICS: OnceLock<AnalyticsMetrics> = OnceLock::new();

/// Global storage for dashboard metrics
static DASHBOARD_METRICS: OnceLock<DashboardMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, errors are logged and subsequent
/// metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = cogwar::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let analytics = AnalyticsMetrics {
        detections: register_counter_vec!(
            "cogwar_detections_total",
            "Total burst detection runs by granularity",
            &["granularity"]
        )?,
        bursts_found: register_counter_vec!(
            "cogwar_bursts_found_total",
            "Total burst intervals found by granularity",
            &["granularity"]
        )?,
        detection_duration: register_histogram_vec!(
            "cogwar_detection_duration_seconds",
            "Time spent answering a burst query in seconds",
            &["granularity"],
            vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        )?,
        validation_errors: register_counter_vec!(
            "cogwar_validation_errors_total",
            "Total rejected queries by error kind",
            &["kind"]
        )?,
    };

    let dashboard = DashboardMetrics {
        cache_lookups: register_counter_vec!(
            "cogwar_cache_lookups_total",
            "Result cache lookups by outcome",
            &["outcome"]
        )?,
        cache_entries: register_gauge!(
            "cogwar_cache_entries",
            "Number of analyses held in the result cache"
        )?,
        api_requests: register_counter_vec!(
            "cogwar_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "cogwar_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
        )?,
    };

    ANALYTICS_METRICS
        .set(analytics)
        .map_err(|_| "Analytics metrics already initialized")?;
    DASHBOARD_METRICS
        .set(dashboard)
        .map_err(|_| "Dashboard metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ANALYTICS_METRICS.get().is_some() && DASHBOARD_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a completed detection run
pub fn record_detection(granularity: &str, bursts: usize, duration_secs: f64) {
    let Some(m) = ANALYTICS_METRICS.get() else {
        return;
    };

    m.detections.with_label_values(&[granularity]).inc();
    if bursts > 0 {
        m.bursts_found
            .with_label_values(&[granularity])
            .inc_by(bursts as f64);
    }
    m.detection_duration
        .with_label_values(&[granularity])
        .observe(duration_secs);
}

/// Record a rejected query
pub fn record_validation_error(kind: &str) {
    if let Some(m) = ANALYTICS_METRICS.get() {
        m.validation_errors.with_label_values(&[kind]).inc();
    }
}

/// Record a result cache lookup
pub fn record_cache_lookup(hit: bool) {
    if let Some(m) = DASHBOARD_METRICS.get() {
        let outcome = if hit { "hit" } else { "miss" };
        m.cache_lookups.with_label_values(&[outcome]).inc();
    }
}

/// Update the result cache size
pub fn update_cache_entries(entries: usize) {
    if let Some(m) = DASHBOARD_METRICS.get() {
        m.cache_entries.set(entries as f64);
    }
}

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = DASHBOARD_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

// ============================================================================
// Tests
// ============================================================================

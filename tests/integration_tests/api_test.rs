//! Dashboard API tests
//!
//! Drives the router directly with `tower::ServiceExt::oneshot`; no socket
//! is bound.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use cogwar::config::Config;
use cogwar::dashboard::{create_router, AppState, DashboardServer};
use cogwar::export::BucketExport;
use cogwar::parser::csv::read_records;

use crate::common::reference_repository;

fn app_state() -> AppState {
    AppState::new(&Config::default(), Arc::new(reference_repository())).unwrap()
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), content_type)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body, _) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// Read Endpoints
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (status, body) = get_json(create_router(app_state()), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["data"]["cache"]["hits"], 0);
}

#[tokio::test]
async fn test_filters() {
    let (status, body) = get_json(create_router(app_state()), "/api/filters").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["sources"], serde_json::json!(["lens", "parlamint"]));
    assert_eq!(data["languages"], serde_json::json!(["en", "sl"]));
    assert_eq!(
        data["categories"],
        serde_json::json!(["Cyber", "Information Warfare"])
    );
    assert_eq!(data["date_bounds"]["min"], "2024-01-01");
    assert_eq!(data["date_bounds"]["max"], "2024-01-09");
    assert_eq!(data["total_events"], 49 + 18);
}

#[tokio::test]
async fn test_bursts_with_breakdown() {
    let (status, body) = get_json(
        create_router(app_state()),
        "/api/bursts?granularity=day&sensitivity=2&per_category=true",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["matched_events"], 67);
    assert_eq!(data["overall"]["granularity"], "day");
    assert_eq!(data["overall"]["intervals"].as_array().unwrap().len(), 1);
    assert_eq!(data["overall"]["intervals"][0]["start"], "2024-01-05");
    assert_eq!(data["overall"]["intervals"][0]["end"], "2024-01-07");

    let reports = &data["categories"]["reports"];
    assert_eq!(reports["Cyber"]["intervals"][0]["category"], "Cyber");
    assert_eq!(reports["Cyber"]["intervals"][0]["magnitude"], 22.0);
    assert!(reports["Information Warfare"]["intervals"]
        .as_array()
        .unwrap()
        .is_empty());

    // Ranked view: overall first, then categories
    let ranked = data["ranked"].as_array().unwrap();
    assert_eq!(ranked.len(), 2);
    assert!(ranked[0]["category"].is_null());
    assert_eq!(ranked[1]["category"], "Cyber");
}

#[tokio::test]
async fn test_bursts_with_filters() {
    let app = create_router(app_state());

    let (status, body) = get_json(
        app.clone(),
        "/api/bursts?granularity=day&sources=parlamint",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["matched_events"], 18);
    assert!(body["data"]["overall"]["intervals"]
        .as_array()
        .unwrap()
        .is_empty());

    let (status, body) = get_json(
        app,
        "/api/bursts?granularity=day&categories=Cyber,ALL&start=2024-01-04",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Open-ended range runs to the last event
    assert_eq!(body["data"]["overall"]["series"]["buckets"].as_array().unwrap().len(), 6);
    assert_eq!(body["data"]["query"]["filters"]["date_range"]["end"], "2024-01-09");
}

#[tokio::test]
async fn test_series_with_smoothing() {
    let (status, body) = get_json(
        create_router(app_state()),
        "/api/series?granularity=day&smoothing=rolling&window=3&per_category=true",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    let buckets = data["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 9);
    assert_eq!(buckets[5]["count"], 24);
    assert_eq!(data["smoothed"].as_array().unwrap().len(), 9);
    assert_eq!(data["intervals"].as_array().unwrap().len(), 1);
    assert_eq!(data["categories"]["Cyber"].as_array().unwrap().len(), 9);
}

#[tokio::test]
async fn test_repeated_queries_hit_cache() {
    let state = app_state();
    let app = create_router(state.clone());

    for _ in 0..3 {
        let (status, _) = get_json(app.clone(), "/api/bursts?granularity=week").await;
        assert_eq!(status, StatusCode::OK);
    }

    let stats = state.cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.entries, 1);
}

// ============================================================================
// Export Endpoint
// ============================================================================

#[tokio::test]
async fn test_export_csv_intervals() {
    let (status, body, content_type) = get(
        create_router(app_state()),
        "/api/export?granularity=day&format=csv&target=intervals&per_category=true",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/csv; charset=utf-8"));

    let records = read_records(std::str::from_utf8(&body).unwrap()).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].1[0], "");
    assert_eq!(records[2].1[0], "Cyber");
    assert_eq!(records[2].1[11], "day");
}

#[tokio::test]
async fn test_export_json_buckets() {
    let (status, body, content_type) = get(
        create_router(app_state()),
        "/api/export?granularity=day&format=json&target=buckets",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));

    let export: BucketExport = serde_json::from_slice(&body).unwrap();
    assert_eq!(export.overall.len(), 9);
    assert_eq!(export.overall.bucketed_events(), 67);
    assert!(export.categories.is_empty());
}

#[tokio::test]
async fn test_bucket_exports_carry_same_rows() {
    let app = create_router(app_state());
    let query = "/api/export?granularity=day&target=buckets&per_category=true";

    let (_, csv, _) = get(app.clone(), &format!("{query}&format=csv")).await;
    let (_, json, _) = get(app, &format!("{query}&format=json")).await;

    let csv_rows = read_records(std::str::from_utf8(&csv).unwrap()).unwrap().len() - 1;
    let export: BucketExport = serde_json::from_slice(&json).unwrap();

    assert_eq!(export.categories["Cyber"].len(), 9);
    assert_eq!(export.bucket_count(), csv_rows);
}

// ============================================================================
// Error Responses
// ============================================================================

#[tokio::test]
async fn test_validation_errors_are_bad_requests() {
    let app = create_router(app_state());

    for uri in [
        "/api/bursts?sensitivity=42",
        "/api/bursts?sensitivity=-0.5",
        "/api/bursts?granularity=hourly",
        "/api/bursts?start=2024-02-01&end=2024-01-01",
        "/api/bursts?start=someday&end=2024-01-01",
        "/api/series?smoothing=rolling&window=0",
        "/api/series?smoothing=median",
    ] {
        let (status, body) = get_json(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], false, "{uri}");
        assert!(
            matches!(body["category"].as_str(), Some("validation" | "parsing" | "config")),
            "{uri}: {body}"
        );
    }
}

#[tokio::test]
async fn test_unparsable_parameters_rejected() {
    let (status, _, _) = get(create_router(app_state()), "/api/bursts?sensitivity=high").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(create_router(app_state()), "/api/export?format=xlsx").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _, _) = get(create_router(app_state()), "/api/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_server_router_has_layers() {
    let server = DashboardServer::new(Config::default(), Arc::new(reference_repository())).unwrap();
    let app = server.build_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, "http://dashboard.local")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let _ = cogwar::metrics::init_metrics();
    let app = create_router(app_state());

    let (status, _) = get_json(app.clone(), "/api/bursts?granularity=day").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, content_type) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/plain"));

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("cogwar_detections_total"));
    assert!(text.contains("cogwar_api_requests_total"));
}

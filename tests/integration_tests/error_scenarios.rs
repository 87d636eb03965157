//! Error scenario tests
//!
//! Failures from each layer, and how they surface through the query
//! pipeline and the dashboard API.

use std::io::Write;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt;

use cogwar::analytics::{run_query, BurstDetector, BurstError, BurstQuery, Granularity, Sensitivity};
use cogwar::config::{CacheConfig, Config};
use cogwar::dashboard::{create_router, AppState};
use cogwar::error::{CogwarErrorTrait, Error, ErrorCategory};
use cogwar::models::FilterSet;
use cogwar::parser::{load_events, ParseError};
use cogwar::storage::{EventRepository, SqliteEventRepository};

use crate::common::{daily_events, reference_repository, REFERENCE_DAILY_COUNTS};

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = create_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// SQLite database whose first stored publication date has been overwritten
fn corrupted_database(dir: &TempDir) -> SqliteEventRepository {
    let path = dir.path().join("cogwar.db");
    let repo = SqliteEventRepository::new(&path).unwrap();
    repo.insert_events(&daily_events(&REFERENCE_DAILY_COUNTS, "Cyber"))
        .unwrap();

    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE records SET publication_date = 'last tuesday' WHERE record_id = 1",
        [],
    )
    .unwrap();
    repo
}

// ============================================================================
// Input Files
// ============================================================================

#[test]
fn test_malformed_csv_file() {
    let file = temp_file(".csv", "timestamp,category\n2024-01-01,Cyber\n2024-13-01,Cyber\n");

    let err = Error::from(load_events(file.path()).unwrap_err());
    assert_eq!(err.category(), ErrorCategory::Parsing);
    assert!(err.is_client_error());
    assert!(err.to_string().contains("Line 3"), "{err}");
}

#[test]
fn test_malformed_json_file() {
    let file = temp_file(".json", "[{\"timestamp\": \"2024-01-01\"");
    assert!(matches!(load_events(file.path()), Err(ParseError::Json(_))));
}

#[test]
fn test_unsupported_and_missing_files() {
    let file = temp_file(".parquet", "PAR1");
    let err = Error::from(load_events(file.path()).unwrap_err());
    assert_eq!(err.category(), ErrorCategory::Parsing);

    let err = Error::from(load_events("/nonexistent/events.csv").unwrap_err());
    assert_eq!(err.category(), ErrorCategory::Storage);
    assert!(!err.is_client_error());
}

// ============================================================================
// Storage
// ============================================================================

#[test]
fn test_corrupt_stored_timestamp() {
    let dir = TempDir::new().unwrap();
    let repo = corrupted_database(&dir);

    let err = repo.fetch_events(&FilterSet::all()).unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(err.to_string().contains("last tuesday"));

    let query = BurstQuery::new(FilterSet::all(), Granularity::Day, Sensitivity::default());
    let err = run_query(&repo, &BurstDetector::default(), &query).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Storage);
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let dir = TempDir::new().unwrap();
    let repo = corrupted_database(&dir);
    let state = AppState::new(&Config::default(), Arc::new(repo)).unwrap();

    let (status, body) = get_json(state.clone(), "/api/bursts?granularity=day").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["category"], "storage");

    // Failed analyses are not cached
    assert!(state.cache.is_empty());
}

// ============================================================================
// Detection Limits
// ============================================================================

#[test]
fn test_bucket_limit_through_pipeline() {
    let repo = reference_repository();
    let mut config = Config::default();
    config.analysis.max_buckets = 5;
    let detector = config.analysis.detector().unwrap();

    let query = BurstQuery::new(FilterSet::all(), Granularity::Day, Sensitivity::default());
    match run_query(&repo, &detector, &query) {
        Err(Error::Validation(BurstError::TooManyBuckets { limit })) => assert_eq!(limit, 5),
        other => panic!("unexpected result: {other:?}"),
    }

    // Coarser buckets fit under the same limit
    let query = BurstQuery::new(FilterSet::all(), Granularity::Month, Sensitivity::default());
    assert!(run_query(&repo, &detector, &query).is_ok());
}

#[tokio::test]
async fn test_bucket_limit_is_bad_request() {
    let mut config = Config::default();
    config.analysis.max_buckets = 5;
    let state = AppState::new(&config, Arc::new(reference_repository())).unwrap();

    let (status, body) = get_json(state, "/api/bursts?granularity=day").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["category"], "validation");
    assert!(body["error"].as_str().unwrap().contains('5'));
}

#[test]
fn test_invalid_analysis_config_rejected() {
    let mut config = Config::default();
    config.analysis.max_buckets = 1;
    assert!(config.analysis.detector().is_err());
    assert!(AppState::new(&config, Arc::new(reference_repository())).is_err());

    let mut config = Config::default();
    config.analysis.default_sensitivity = 12.0;
    assert!(AppState::new(&config, Arc::new(reference_repository())).is_err());
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test]
async fn test_disabled_cache_recomputes() {
    let mut config = Config::default();
    config.cache = CacheConfig {
        enabled: false,
        ..Default::default()
    };
    let state = AppState::new(&config, Arc::new(reference_repository())).unwrap();
    assert!(!state.cache.is_enabled());

    for _ in 0..2 {
        let (status, body) = get_json(state.clone(), "/api/bursts?granularity=day").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["matched_events"], 67);
    }

    let stats = state.cache.stats();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.entries, 0);
}

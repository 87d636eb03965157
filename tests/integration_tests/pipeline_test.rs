//! Pipeline integration tests
//!
//! Event file → SQLite → burst query → export, with a persistent database
//! in a temporary directory.

use cogwar::analytics::{run_query, BurstAnalysis, BurstDetector, BurstQuery, Granularity, Sensitivity};
use cogwar::cache::ResultCache;
use cogwar::config::CacheConfig;
use cogwar::export::{render_analysis, ExportFormat, ExportTarget, INTERVAL_HEADER};
use cogwar::models::FilterSet;
use cogwar::parser::{csv::read_records, load_events};
use cogwar::storage::{EventRepository, SqliteEventRepository};
use tempfile::TempDir;

use crate::common::{daily_events, REFERENCE_DAILY_COUNTS};

fn day_query(filters: FilterSet) -> BurstQuery {
    BurstQuery::new(filters, Granularity::Day, Sensitivity::default())
}

fn seeded_database(dir: &TempDir) -> SqliteEventRepository {
    let repo = SqliteEventRepository::new(dir.path().join("db").join("cogwar.db")).unwrap();
    repo.insert_events(&daily_events(&REFERENCE_DAILY_COUNTS, "Cyber - Intrusion - Defacement"))
        .unwrap();
    repo.insert_events(&daily_events(&[3; 9], "Information Warfare - Propaganda"))
        .unwrap();
    repo
}

#[test]
fn test_import_fixture_into_sqlite() {
    let dir = TempDir::new().unwrap();
    let repo = SqliteEventRepository::new(dir.path().join("cogwar.db")).unwrap();

    let events = load_events("tests/fixtures/events.csv").unwrap();
    assert_eq!(repo.insert_events(&events).unwrap(), 5);

    let options = repo.filter_options().unwrap();
    assert_eq!(options.total_events, 5);
    assert_eq!(options.sources, vec!["lens", "parlamint"]);
    assert_eq!(options.languages, vec!["en", "sl"]);
    assert_eq!(
        options.categories,
        vec!["Cyber", "Information Warfare", "Psychological Operations"]
    );
    let bounds = options.date_bounds.unwrap();
    assert_eq!(bounds.min, crate::common::date(2024, 1, 3));
    assert_eq!(bounds.max, crate::common::date(2024, 3, 5));
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db").join("cogwar.db");
    let expected = {
        let repo = seeded_database(&dir);
        repo.count().unwrap()
    };

    let reopened = SqliteEventRepository::new(&path).unwrap();
    assert_eq!(reopened.count().unwrap(), expected);
    assert_eq!(expected, 49 + 27);
}

#[test]
fn test_query_over_sqlite_matches_mock() {
    let dir = TempDir::new().unwrap();
    let sqlite = seeded_database(&dir);
    let mock = cogwar::storage::MockEventRepository::new();
    mock.insert_events(&daily_events(&REFERENCE_DAILY_COUNTS, "Cyber - Intrusion - Defacement"))
        .unwrap();
    mock.insert_events(&daily_events(&[3; 9], "Information Warfare - Propaganda"))
        .unwrap();

    let detector = BurstDetector::default();
    let query = day_query(FilterSet::all()).with_per_category(true);
    let from_sqlite = run_query(&sqlite, &detector, &query).unwrap();
    let from_mock = run_query(&mock, &detector, &query).unwrap();

    assert_eq!(from_sqlite.overall, from_mock.overall);
    assert_eq!(from_sqlite.categories, from_mock.categories);
    assert_eq!(from_sqlite.matched_events, 76);
}

#[test]
fn test_category_filter_and_breakdown() {
    let dir = TempDir::new().unwrap();
    let repo = seeded_database(&dir);
    let detector = BurstDetector::default();

    let cyber_only = day_query(FilterSet {
        categories: vec!["Cyber".to_string()],
        ..Default::default()
    });
    let analysis = run_query(&repo, &detector, &cyber_only).unwrap();
    assert_eq!(analysis.matched_events, 49);
    assert_eq!(analysis.overall.intervals.len(), 1);
    assert_eq!(analysis.overall.intervals[0].peak_count, 22);

    let background = day_query(FilterSet {
        categories: vec!["Information Warfare".to_string()],
        ..Default::default()
    });
    assert!(run_query(&repo, &detector, &background)
        .unwrap()
        .overall
        .is_empty());

    let breakdown = run_query(&repo, &detector, &day_query(FilterSet::all()).with_per_category(true))
        .unwrap()
        .categories
        .unwrap();
    assert_eq!(breakdown.reports["Cyber"].intervals.len(), 1);
    assert!(breakdown.reports["Information Warfare"].is_empty());
}

#[test]
fn test_export_round_trip() {
    let dir = TempDir::new().unwrap();
    let repo = seeded_database(&dir);
    let query = day_query(FilterSet::all()).with_per_category(true);
    let analysis = run_query(&repo, &BurstDetector::default(), &query).unwrap();

    let csv = render_analysis(&analysis, ExportFormat::Csv, ExportTarget::Intervals).unwrap();
    let path = dir.path().join("bursts.csv");
    std::fs::write(&path, &csv).unwrap();

    let records = read_records(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(records[0].1, INTERVAL_HEADER);
    assert_eq!(records.len(), 1 + 2);

    let overall = &analysis.overall.intervals[0];
    let row = &records[1].1;
    assert_eq!(row[1], overall.start.to_string());
    assert_eq!(row[7].parse::<f64>().unwrap(), overall.magnitude);
    assert_eq!(row[9].parse::<f64>().unwrap(), overall.total_excess);

    let json = render_analysis(&analysis, ExportFormat::Json, ExportTarget::Intervals).unwrap();
    let back: BurstAnalysis = serde_json::from_str(&json).unwrap();
    assert_eq!(back, analysis);
}

#[test]
fn test_cached_pipeline() {
    let dir = TempDir::new().unwrap();
    let repo = seeded_database(&dir);
    let detector = BurstDetector::default();
    let cache = ResultCache::new(&CacheConfig::default());

    let mut query = day_query(FilterSet {
        sources: vec!["lens".to_string()],
        ..Default::default()
    });
    let first = cache
        .get_or_compute(&query, || run_query(&repo, &detector, &query))
        .unwrap();

    // Same selection written differently hits the cache
    query.filters.sources = vec!["lens".to_string(), "lens".to_string()];
    let second = cache
        .get_or_compute(&query, || panic!("should be cached"))
        .unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(cache.stats().hits, 1);
}

//! Common test utilities

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use cogwar::models::NewEvent;
use cogwar::storage::{EventRepository, MockEventRepository};

/// Daily counts of the reference burst: quiet, two hot days, quiet
pub const REFERENCE_DAILY_COUNTS: [usize; 9] = [1, 1, 1, 1, 20, 22, 1, 1, 1];

/// First day used by the generators
pub fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Create a relevant event with default metadata
pub fn create_test_event(timestamp: DateTime<Utc>, taxonomy: &str) -> NewEvent {
    NewEvent {
        timestamp: Some(timestamp),
        taxonomy: Some(taxonomy.to_string()),
        source: Some("lens".to_string()),
        language: Some("en".to_string()),
        title: Some(format!("{taxonomy} at {timestamp}")),
        is_relevant: true,
        ..Default::default()
    }
}

/// Timestamps with `counts[i]` events on day `i` after [`origin`]
pub fn daily_timestamps(counts: &[usize]) -> Vec<DateTime<Utc>> {
    counts
        .iter()
        .enumerate()
        .flat_map(|(day, &n)| std::iter::repeat(origin() + Duration::days(day as i64)).take(n))
        .collect()
}

/// Events with `counts[i]` events on day `i`, all in one category
pub fn daily_events(counts: &[usize], taxonomy: &str) -> Vec<NewEvent> {
    daily_timestamps(counts)
        .into_iter()
        .map(|t| create_test_event(t, taxonomy))
        .collect()
}

/// Mock repository holding the reference burst in "Cyber" plus a flat
/// background in "Information Warfare" from another source
pub fn reference_repository() -> MockEventRepository {
    let repo = MockEventRepository::new();
    repo.insert_events(&daily_events(&REFERENCE_DAILY_COUNTS, "Cyber - Intrusion"))
        .unwrap();

    let background: Vec<NewEvent> = daily_events(&[2; 9], "Information Warfare - Propaganda")
        .into_iter()
        .map(|mut e| {
            e.source = Some("parlamint".to_string());
            e.language = Some("sl".to_string());
            e
        })
        .collect();
    repo.insert_events(&background).unwrap();
    repo
}

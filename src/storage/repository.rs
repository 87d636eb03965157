//! Repository Pattern for Event Storage
//!
//! This module provides trait-based repository abstractions to decouple
//! burst analytics from storage implementations, enabling:
//! - Easy testing with mock implementations
//! - Swappable storage backends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Analytics / Dashboard                    │
//! │                 (run_query, HTTP handlers)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      EventRepository                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  ┌───────────┴───────────┐
//!                  ▼                       ▼
//!         ┌─────────────────┐     ┌─────────────────┐
//!         │     SQLite      │     │      Mock       │
//!         │  Implementation │     │ Implementation  │
//!         └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Data model
//!
//! Storage mirrors the classification warehouse: `records` (documents),
//! `chunks` (text segments of a record) and `chunk_classifications` (one
//! taxonomy verdict per chunk and model). An *event* is a relevant
//! classification whose record has a publication date.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection};

use crate::error::{Error, Result};
use crate::models::{top_level_category, DateBounds, Event, FilterOptions, FilterSet, NewEvent};
use crate::parser::parse_timestamp;

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository for classified events
pub trait EventRepository: Send + Sync {
    /// Store one classified chunk, returning its chunk id
    fn insert_event(&self, event: &NewEvent) -> Result<i64>;

    /// Store many classified chunks
    fn insert_events(&self, events: &[NewEvent]) -> Result<usize> {
        for event in events {
            self.insert_event(event)?;
        }
        Ok(events.len())
    }

    /// Events passing the filter set, ordered by time then id
    fn fetch_events(&self, filters: &FilterSet) -> Result<Vec<Event>>;

    /// Distinct sources across all records
    fn sources(&self) -> Result<Vec<String>>;

    /// Distinct languages across all records
    fn languages(&self) -> Result<Vec<String>>;

    /// Distinct top-level categories across events
    fn categories(&self) -> Result<Vec<String>>;

    /// Earliest and latest event dates
    fn date_bounds(&self) -> Result<Option<DateBounds>>;

    /// Number of events
    fn count(&self) -> Result<u64>;

    /// Everything the dashboard needs to populate its filter controls
    fn filter_options(&self) -> Result<FilterOptions> {
        Ok(FilterOptions {
            sources: self.sources()?,
            languages: self.languages()?,
            categories: self.categories()?,
            date_bounds: self.date_bounds()?,
            total_events: self.count()?,
        })
    }
}

// ============================================================================
// SQLite Implementation
// ============================================================================

const EVENTS_QUERY: &str = r#"
    SELECT c.chunk_id, r.publication_date, cc."HLTP", r.original_source, r.language
    FROM chunk_classifications cc
    JOIN chunks c ON cc.chunk_id = c.chunk_id
    JOIN records r ON c.record_id = r.record_id
    WHERE cc.is_relevant = 1 AND r.publication_date IS NOT NULL
"#;

/// SQLite implementation of EventRepository
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteEventRepository {
    conn: Mutex<Connection>,
}

impl SqliteEventRepository {
    /// Create a new SQLite repository
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::storage("SQLite connection mutex poisoned"))
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS records (
                    record_id INTEGER PRIMARY KEY,
                    original_source TEXT,
                    title TEXT,
                    publication_date TEXT,
                    language TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_records_source
                    ON records(original_source);

                CREATE INDEX IF NOT EXISTS idx_records_publication_date
                    ON records(publication_date);

                CREATE TABLE IF NOT EXISTS chunks (
                    chunk_id INTEGER PRIMARY KEY,
                    record_id INTEGER NOT NULL
                        REFERENCES records(record_id) ON DELETE CASCADE,
                    chunk_text TEXT NOT NULL DEFAULT ''
                );

                CREATE INDEX IF NOT EXISTS idx_chunks_record
                    ON chunks(record_id);

                CREATE TABLE IF NOT EXISTS chunk_classifications (
                    id INTEGER PRIMARY KEY,
                    chunk_id INTEGER NOT NULL
                        REFERENCES chunks(chunk_id) ON DELETE CASCADE,
                    is_relevant INTEGER NOT NULL,
                    "HLTP" TEXT,
                    "2nd_level_TE" TEXT,
                    "3rd_level_TE" TEXT,
                    confidence REAL,
                    model TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_classifications_chunk
                    ON chunk_classifications(chunk_id);
                "#,
        )?;

        Ok(())
    }

    fn insert_with(conn: &Connection, event: &NewEvent) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let published = event
            .timestamp
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true));
        let levels: Vec<&str> = event
            .taxonomy
            .as_deref()
            .map(|t| t.split(crate::models::TAXONOMY_SEPARATOR).map(str::trim).collect())
            .unwrap_or_default();

        conn.execute(
            "INSERT INTO records (original_source, title, publication_date, language, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![event.source, event.title, published, event.language, now],
        )?;
        let record_id = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO chunks (record_id, chunk_text) VALUES (?1, ?2)",
            params![record_id, event.text.as_deref().unwrap_or("")],
        )?;
        let chunk_id = conn.last_insert_rowid();

        conn.execute(
            r#"
                INSERT INTO chunk_classifications
                    (chunk_id, is_relevant, "HLTP", "2nd_level_TE", "3rd_level_TE",
                     confidence, model, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            params![
                chunk_id,
                event.is_relevant,
                event.taxonomy,
                levels.get(1).copied(),
                levels.get(2).copied(),
                event.confidence,
                "import",
                now
            ],
        )?;

        Ok(chunk_id)
    }

    fn distinct_column(&self, sql: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

impl EventRepository for SqliteEventRepository {
    fn insert_event(&self, event: &NewEvent) -> Result<i64> {
        let conn = self.lock()?;
        Self::insert_with(&conn, event)
    }

    fn insert_events(&self, events: &[NewEvent]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for event in events {
            Self::insert_with(&tx, event)?;
        }
        tx.commit()?;

        tracing::debug!(count = events.len(), "Inserted events");
        Ok(events.len())
    }

    fn fetch_events(&self, filters: &FilterSet) -> Result<Vec<Event>> {
        let mut sql = EVENTS_QUERY.to_string();
        let mut values: Vec<String> = Vec::new();

        if let Some(sources) = FilterSet::active(&filters.sources) {
            sql.push_str(&format!(
                " AND r.original_source IN ({})",
                placeholders(sources.len())
            ));
            values.extend(sources.iter().cloned());
        }
        if let Some(languages) = FilterSet::active(&filters.languages) {
            sql.push_str(&format!(
                " AND r.language IN ({})",
                placeholders(languages.len())
            ));
            values.extend(languages.iter().cloned());
        }
        if let Some(range) = filters.date_range {
            sql.push_str(
                " AND substr(r.publication_date, 1, 10) >= ? AND substr(r.publication_date, 1, 10) <= ?",
            );
            values.push(range.start.format("%Y-%m-%d").to_string());
            values.push(range.end.format("%Y-%m-%d").to_string());
        }
        sql.push_str(" ORDER BY r.publication_date, c.chunk_id");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (id, published, taxonomy, source, language) in rows {
            let event = Event {
                id,
                timestamp: parse_stored_timestamp(&published)?,
                category: taxonomy.as_deref().and_then(top_level_category),
                source,
                language,
            };
            // Category filters apply to the derived top-level category
            if filters.matches(&event) {
                events.push(event);
            }
        }

        tracing::debug!(count = events.len(), "Fetched events");
        Ok(events)
    }

    fn sources(&self) -> Result<Vec<String>> {
        self.distinct_column(
            "SELECT DISTINCT original_source FROM records
             WHERE original_source IS NOT NULL ORDER BY original_source",
        )
    }

    fn languages(&self) -> Result<Vec<String>> {
        self.distinct_column(
            "SELECT DISTINCT language FROM records
             WHERE language IS NOT NULL ORDER BY language",
        )
    }

    fn categories(&self) -> Result<Vec<String>> {
        let paths = self.distinct_column(
            r#"
                SELECT DISTINCT cc."HLTP"
                FROM chunk_classifications cc
                JOIN chunks c ON cc.chunk_id = c.chunk_id
                JOIN records r ON c.record_id = r.record_id
                WHERE cc.is_relevant = 1
                  AND r.publication_date IS NOT NULL
                  AND cc."HLTP" IS NOT NULL
                "#,
        )?;

        let categories: BTreeSet<String> = paths
            .iter()
            .filter_map(|p| top_level_category(p))
            .collect();
        Ok(categories.into_iter().collect())
    }

    fn date_bounds(&self) -> Result<Option<DateBounds>> {
        let conn = self.lock()?;
        let bounds: (Option<String>, Option<String>) = conn.query_row(
                r#"
                    SELECT MIN(r.publication_date), MAX(r.publication_date)
                    FROM chunk_classifications cc
                    JOIN chunks c ON cc.chunk_id = c.chunk_id
                    JOIN records r ON c.record_id = r.record_id
                    WHERE cc.is_relevant = 1 AND r.publication_date IS NOT NULL
                    "#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

        match bounds {
            (Some(min), Some(max)) => Ok(Some(DateBounds {
                min: parse_stored_timestamp(&min)?.date_naive(),
                max: parse_stored_timestamp(&max)?.date_naive(),
            })),
            _ => Ok(None),
        }
    }

    fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            r#"
                SELECT COUNT(*)
                FROM chunk_classifications cc
                JOIN chunks c ON cc.chunk_id = c.chunk_id
                JOIN records r ON c.record_id = r.record_id
                WHERE cc.is_relevant = 1 AND r.publication_date IS NOT NULL
                "#,
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Stored dates are RFC 3339 when imported here, and plain `YYYY-MM-DD`
/// in warehouses populated elsewhere
fn parse_stored_timestamp(value: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(value)
        .map_err(|e| Error::storage(format!("Invalid stored publication date '{value}': {e}")))
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

/// In-memory mock implementation of EventRepository
///
/// Useful for testing without database dependencies.
pub struct MockEventRepository {
    events: RwLock<Vec<(i64, NewEvent)>>,
}

impl MockEventRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Create a mock repository holding `events`
    pub fn with_events(events: &[NewEvent]) -> Result<Self> {
        let repo = Self::new();
        repo.insert_events(events)?;
        Ok(repo)
    }

    /// Get the number of stored chunks (relevant or not)
    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all records
    pub fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<(i64, NewEvent)>>> {
        self.events
            .read()
            .map_err(|_| Error::storage("mock repository lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<(i64, NewEvent)>>> {
        self.events
            .write()
            .map_err(|_| Error::storage("mock repository lock poisoned"))
    }

    fn all_events(&self) -> Result<Vec<Event>> {
        let stored = self.read()?;
        let mut events: Vec<Event> = stored
            .iter()
            .filter(|(_, e)| e.is_relevant)
            .filter_map(|(id, e)| {
                e.timestamp.map(|timestamp| Event {
                    id: *id,
                    timestamp,
                    category: e.taxonomy.as_deref().and_then(top_level_category),
                    source: e.source.clone(),
                    language: e.language.clone(),
                })
            })
            .collect();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(events)
    }
}

impl Default for MockEventRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRepository for MockEventRepository {
    fn insert_event(&self, event: &NewEvent) -> Result<i64> {
        let mut stored = self.write()?;
        let id = stored.len() as i64 + 1;
        stored.push((id, event.clone()));
        Ok(id)
    }

    fn fetch_events(&self, filters: &FilterSet) -> Result<Vec<Event>> {
        Ok(self
            .all_events()?
            .into_iter()
            .filter(|e| filters.matches(e))
            .collect())
    }

    fn sources(&self) -> Result<Vec<String>> {
        let stored = self.read()?;
        let sources: BTreeSet<String> = stored
            .iter()
            .filter_map(|(_, e)| e.source.clone())
            .collect();
        Ok(sources.into_iter().collect())
    }

    fn languages(&self) -> Result<Vec<String>> {
        let stored = self.read()?;
        let languages: BTreeSet<String> = stored
            .iter()
            .filter_map(|(_, e)| e.language.clone())
            .collect();
        Ok(languages.into_iter().collect())
    }

    fn categories(&self) -> Result<Vec<String>> {
        let categories: BTreeSet<String> = self
            .all_events()?
            .into_iter()
            .filter_map(|e| e.category)
            .collect();
        Ok(categories.into_iter().collect())
    }

    fn date_bounds(&self) -> Result<Option<DateBounds>> {
        let events = self.all_events()?;
        Ok(match (events.first(), events.last()) {
            (Some(first), Some(last)) => Some(DateBounds {
                min: first.timestamp.date_naive(),
                max: last.timestamp.date_naive(),
            }),
            _ => None,
        })
    }

    fn count(&self) -> Result<u64> {
        Ok(self.all_events()?.len() as u64)
    }
}

// ============================================================================
// Shared Repository Types
// ============================================================================

/// Thread-safe shared repository wrapper
pub type SharedEventRepository = Arc<dyn EventRepository>;

/// Create a shared SQLite repository
pub fn create_sqlite_repository(path: impl AsRef<Path>) -> Result<SharedEventRepository> {
    let repo = SqliteEventRepository::new(path)?;
    Ok(Arc::new(repo))
}

/// Create a shared mock repository
pub fn create_mock_repository() -> SharedEventRepository {
    Arc::new(MockEventRepository::new())
}

// ============================================================================
// Tests
// ============================================================================

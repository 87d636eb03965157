pub mod detect;
pub mod import;
pub mod serve;

// Re-export command functions for convenience
pub use detect::{detect, series, DetectParams, OutputFormat, SeriesParams};
pub use import::{filters, import};
pub use serve::serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use cogwar::config::Config;
use cogwar::parser::load_events;
use cogwar::storage::{open_repository, EventRepository, SharedEventRepository, SqliteEventRepository};

/// Repository for a command: an event file loaded into memory, or the
/// configured database
pub(crate) fn open_events(config: &Config, input: Option<&Path>) -> Result<SharedEventRepository> {
    match input {
        Some(path) => {
            let events = load_events(path)
                .with_context(|| format!("Failed to load events from {}", path.display()))?;
            let repo = SqliteEventRepository::in_memory()?;
            let inserted = repo.insert_events(&events)?;
            tracing::info!(path = %path.display(), events = inserted, "Loaded event file");
            Ok(Arc::new(repo))
        }
        None => open_repository(&config.database).with_context(|| {
            format!(
                "Failed to open database {}",
                config.database.sqlite_path.display()
            )
        }),
    }
}

//! Event storage
//!
//! SQLite persistence for classified chunks behind the [`EventRepository`]
//! trait, with an in-memory implementation for tests.

pub mod repository;

pub use repository::{
    create_mock_repository, create_sqlite_repository, EventRepository, MockEventRepository,
    SharedEventRepository, SqliteEventRepository,
};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Open the repository described by the configuration
pub fn open_repository(config: &DatabaseConfig) -> Result<SharedEventRepository> {
    create_sqlite_repository(&config.sqlite_path)
}

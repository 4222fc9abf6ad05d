//! Storage module for persisting harvest data
//!
//! This module owns the durable state of the harvester:
//! - The product dataset (append-only)
//! - The per-site seen-URL ledger used for deduplication across runs
//! - The run log and run history
//!
//! Two backends implement [`Storage`]: flat files (CSV dataset, text ledger
//! and log) and a single SQLite database.

mod files;
mod lock;
mod schema;
mod sqlite;
mod traits;

pub use files::FileStorage;
pub use lock::RunLock;
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::{OutputConfig, StorageBackend};
use std::path::Path;

/// Opens the backend selected in the output configuration
///
/// # Returns
///
/// * `Ok(Box<dyn Storage + Send>)` - Backend ready for use
/// * `Err(StorageError)` - The directory or database could not be opened
pub fn open_storage(output: &OutputConfig) -> StorageResult<Box<dyn Storage + Send>> {
    match output.backend {
        StorageBackend::Files => {
            tracing::debug!("Using file storage in {}", output.directory);
            Ok(Box::new(FileStorage::open(Path::new(&output.directory))?))
        }
        StorageBackend::Sqlite => {
            tracing::debug!("Using SQLite storage at {}", output.database_path);
            Ok(Box::new(SqliteStorage::new(Path::new(&output.database_path))?))
        }
    }
}

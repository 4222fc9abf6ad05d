//! Storage traits and error types
//!
//! A backend holds the three durable artifacts of the harvester: the
//! product dataset, the seen-URL ledger and the run log (plus run history).
//! Everything is append-only except for `reset`.

use crate::model::ProductRecord;
use crate::output::RunRecord;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt {file}: {message}")]
    Corrupt { file: String, message: String },

    #[error("Run {run_id} is already recorded")]
    DuplicateRun { run_id: String },

    /// Another process holds the run lock for these sites (empty: the whole storage)
    #[error("Storage is locked by another run")]
    Busy { sites: Vec<String> },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Backends are used by one writer at a time; the orchestrator serializes
/// access behind a mutex.
pub trait Storage {
    // ===== Seen-URL ledger =====

    /// Loads every `(site, url)` ledger entry
    fn load_seen(&self) -> StorageResult<Vec<(String, String)>>;

    /// Appends ledger entries for one site
    ///
    /// URLs already in the ledger for that site are skipped, so repeating
    /// an append is harmless. Returns the number of entries written.
    fn append_seen(&mut self, site: &str, urls: &[String]) -> StorageResult<usize>;

    // ===== Dataset =====

    /// Appends records to the dataset
    fn append_records(&mut self, records: &[ProductRecord]) -> StorageResult<()>;

    /// Loads the whole dataset in append order
    fn load_records(&self) -> StorageResult<Vec<ProductRecord>>;

    // ===== Run log =====

    /// Appends one line to the run log
    fn append_log(&mut self, line: &str) -> StorageResult<()>;

    /// Reads the run log in append order
    fn read_log(&self) -> StorageResult<Vec<String>>;

    /// Persists a finished run record
    ///
    /// Fails with [`StorageError::DuplicateRun`] when a run with the same id
    /// is already recorded.
    fn record_run(&mut self, run: &RunRecord) -> StorageResult<()>;

    /// Loads recorded runs, oldest first
    fn load_runs(&self) -> StorageResult<Vec<RunRecord>>;

    // ===== Maintenance =====

    /// Clears the dataset, the ledger, the log and the run history
    fn reset(&mut self) -> StorageResult<()>;

    /// Path the cross-process run locks are derived from
    ///
    /// `None` for storage no other process can open, such as an in-memory
    /// database.
    fn lock_base(&self) -> Option<PathBuf> {
        None
    }
}

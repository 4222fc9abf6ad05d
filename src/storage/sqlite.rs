//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::ProductRecord;
use crate::output::RunRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use std::path::{Path, PathBuf};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Opens or creates the database file and its schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }
}

impl Storage for SqliteStorage {
    fn load_seen(&self) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT site, url FROM seen_urls ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn append_seen(&mut self, site: &str, urls: &[String]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO seen_urls (site, url, seen_at) VALUES (?1, ?2, ?3)",
            )?;
            for url in urls {
                written += stmt.execute(params![site, url, now])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn append_records(&mut self, records: &[ProductRecord]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO products (site, url, title, price, original_price, description, location,
                                       image_urls, category, vendor_name, vendor_location, attributes, scrape_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.site,
                    record.url,
                    record.title,
                    record.price,
                    record.original_price,
                    record.description,
                    record.location,
                    serde_json::to_string(&record.image_urls)?,
                    record.category,
                    record.vendor_name,
                    record.vendor_location,
                    serde_json::to_string(&record.attributes)?,
                    record.scrape_date,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_records(&self) -> StorageResult<Vec<ProductRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT site, url, title, price, original_price, description, location,
                    image_urls, category, vendor_name, vendor_location, attributes, scrape_date
             FROM products ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                ProductRecord {
                    site: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    price: row.get(3)?,
                    original_price: row.get(4)?,
                    description: row.get(5)?,
                    location: row.get(6)?,
                    category: row.get(8)?,
                    vendor_name: row.get(9)?,
                    vendor_location: row.get(10)?,
                    scrape_date: row.get(12)?,
                    ..ProductRecord::default()
                },
                row.get::<_, String>(7)?,
                row.get::<_, String>(11)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, images, attributes) = row?;
            record.image_urls = serde_json::from_str(&images)?;
            record.attributes = serde_json::from_str(&attributes)?;
            records.push(record);
        }
        Ok(records)
    }

    fn append_log(&mut self, line: &str) -> StorageResult<()> {
        self.conn
            .execute("INSERT INTO run_log (line) VALUES (?1)", params![line])?;
        Ok(())
    }

    fn read_log(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT line FROM run_log ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn record_run(&mut self, run: &RunRecord) -> StorageResult<()> {
        let inserted = self.conn.execute(
            "INSERT INTO runs (run_id, started_at, finished_at, status, config_hash, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run.run_id,
                run.started_at.to_rfc3339(),
                run.finished_at.map(|t| t.to_rfc3339()),
                run.status.as_str(),
                run.config_hash,
                serde_json::to_string(run)?,
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StorageError::DuplicateRun {
                    run_id: run.run_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_runs(&self) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT summary FROM runs ORDER BY started_at, run_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(serde_json::from_str(&row?)?);
        }
        Ok(runs)
    }

    fn lock_base(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn reset(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            BEGIN;
            DELETE FROM products;
            DELETE FROM seen_urls;
            DELETE FROM run_log;
            DELETE FROM runs;
            COMMIT;
        ",
        )?;
        Ok(())
    }
}

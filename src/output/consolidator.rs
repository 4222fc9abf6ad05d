//! Merges a site's harvested records into the persisted dataset
//!
//! Ordering matters: records are appended first and the seen-URL ledger is
//! flushed second. A crash in between leaves URLs unrecorded, so they are
//! fetched again next run; the dataset may then hold a repeated record but
//! never misses one.

use crate::model::ProductRecord;
use crate::state::DedupStore;
use crate::storage::{Storage, StorageResult};
use chrono::{Local, NaiveDate};

/// What one consolidation wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub records_written: usize,
    pub ledger_entries_written: usize,
}

/// Stamps records with the run's scrape date and persists them
#[derive(Debug, Clone)]
pub struct Consolidator {
    scrape_date: String,
}

impl Consolidator {
    /// Uses `date` as the scrape date of every record
    pub fn new(date: NaiveDate) -> Self {
        Self {
            scrape_date: date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Uses the local calendar date
    pub fn for_today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn scrape_date(&self) -> &str {
        &self.scrape_date
    }

    /// Appends `records` for `site`, then flushes the site's pending ledger entries
    ///
    /// When the append fails nothing is flushed, and the pending entries stay
    /// in `dedup`.
    pub fn consolidate(
        &self,
        site: &str,
        mut records: Vec<ProductRecord>,
        dedup: &mut DedupStore,
        storage: &mut dyn Storage,
    ) -> StorageResult<ConsolidationReport> {
        for record in &mut records {
            record.scrape_date = Some(self.scrape_date.clone());
        }

        storage.append_records(&records)?;
        let ledger_entries_written = dedup.flush(site, storage)?;

        tracing::info!(
            "Consolidated {}: {} records, {} ledger entries",
            site,
            records.len(),
            ledger_entries_written
        );

        Ok(ConsolidationReport {
            records_written: records.len(),
            ledger_entries_written,
        })
    }
}

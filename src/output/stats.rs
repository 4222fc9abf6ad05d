//! Statistics over the persisted dataset
//!
//! This module provides functionality for summarizing what the harvester
//! has accumulated so far: records and ledger entries per site, and the
//! most recent run.

use super::RunRecord;
use crate::storage::{Storage, StorageResult};
use std::collections::BTreeMap;

/// Per-site totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteStatistics {
    /// Rows in the dataset
    pub records: usize,

    /// Entries in the seen-URL ledger
    pub seen_urls: usize,

    /// Most recent scrape date among the site's records
    pub last_scrape_date: Option<String>,
}

/// Dataset statistics summary
#[derive(Debug, Clone)]
pub struct DatasetStatistics {
    pub total_records: usize,
    pub total_seen_urls: usize,
    pub sites: BTreeMap<String, SiteStatistics>,
    pub runs: usize,
    pub last_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<DatasetStatistics> {
    let records = storage.load_records()?;
    let seen = storage.load_seen()?;
    let runs = storage.load_runs()?;

    let mut sites: BTreeMap<String, SiteStatistics> = BTreeMap::new();
    for record in &records {
        let entry = sites.entry(record.site.clone()).or_default();
        entry.records += 1;
        if record.scrape_date > entry.last_scrape_date {
            entry.last_scrape_date = record.scrape_date.clone();
        }
    }
    for (site, _) in &seen {
        sites.entry(site.clone()).or_default().seen_urls += 1;
    }

    Ok(DatasetStatistics {
        total_records: records.len(),
        total_seen_urls: seen.len(),
        sites,
        runs: runs.len(),
        last_run: runs.into_iter().last(),
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Dataset Statistics ===\n");

    println!("Overview:");
    println!("  Records: {}", stats.total_records);
    println!("  Seen URLs: {}", stats.total_seen_urls);
    println!("  Runs recorded: {}", stats.runs);
    println!();

    if !stats.sites.is_empty() {
        println!("By Site:");
        for (site, s) in &stats.sites {
            println!(
                "  {}: {} records, {} seen URLs, last scraped {}",
                site,
                s.records,
                s.seen_urls,
                s.last_scrape_date.as_deref().unwrap_or("never")
            );
        }
        println!();
    }

    if let Some(run) = &stats.last_run {
        println!("Last Run ({}):", run.run_id);
        println!("  Started: {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("  Status: {}", run.status);
        if let Some(secs) = run.duration_secs() {
            println!("  Duration: {}s", secs);
        }
        println!(
            "  Items: {} new, {} duplicate, {} failed",
            run.items_new(),
            run.items_duplicate(),
            run.item_failures()
        );
    }
}

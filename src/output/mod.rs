//! Output module: consolidation, run records and dataset statistics
//!
//! This module handles:
//! - Merging harvested records into the dataset and flushing the ledger
//! - Recording run lifecycle and per-site error summaries
//! - Summarizing the accumulated dataset

mod consolidator;
mod run_log;
pub mod stats;

pub use consolidator::{ConsolidationReport, Consolidator};
pub use run_log::{RunLog, RunRecord, RunStatus, SiteSummary};
pub use stats::{load_statistics, print_statistics, DatasetStatistics, SiteStatistics};

/// Prints a finished run to stdout
pub fn print_run_summary(run: &RunRecord) {
    println!("=== Run {} ===\n", run.run_id);
    println!("Status: {}", run.status);
    if let Some(secs) = run.duration_secs() {
        println!("Duration: {}s", secs);
    }
    println!();

    for site in &run.sites {
        if let Some(error) = &site.discovery_error {
            println!("  {}: skipped ({})", site.site, error);
            continue;
        }
        println!(
            "  {}: {} categories, {} pages, {} new, {} duplicate, {} fetch failed, {} parse failed",
            site.site,
            site.categories,
            site.pages,
            site.items_new,
            site.items_duplicate,
            site.items_fetch_failed,
            site.items_parse_failed
        );
        if let Some(error) = &site.consolidation_error {
            println!("    consolidation failed: {}", error);
        }
    }
    for name in &run.unknown_sites {
        println!("  {}: not configured", name);
    }

    println!();
    println!(
        "Total: {} records written, {} item failures, {} site failures",
        run.records_written(),
        run.item_failures(),
        run.site_failures()
    );
}

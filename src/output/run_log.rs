//! Run lifecycle records and the append-only run log
//!
//! Every run produces one [`RunRecord`]. Its lifecycle events and error
//! summaries are written as plain text lines through [`RunLog`], and the
//! finished record itself is handed to storage with `record_run`.

use crate::storage::{Storage, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still in progress
    Running,
    /// Every site was processed without a site-level failure
    Completed,
    /// At least one site failed discovery or consolidation
    CompletedWithErrors,
    /// Cancelled before every site was processed
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "completed_with_errors" => Some(Self::CompletedWithErrors),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one site within a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub site: String,
    pub categories: usize,
    /// Categories whose walk ended on a listing page fetch failure
    pub categories_failed: usize,
    pub pages: u32,
    /// Unseen items that were fetched (parsed or not); fetch failures are counted apart
    pub items_new: usize,
    pub items_duplicate: usize,
    pub items_fetch_failed: usize,
    pub items_parse_failed: usize,
    /// Records appended to the dataset
    pub records_written: usize,
    pub discovery_error: Option<String>,
    pub consolidation_error: Option<String>,
}

impl SiteSummary {
    pub fn new(site: &str) -> Self {
        Self {
            site: site.to_string(),
            ..Self::default()
        }
    }

    /// Item-level failures, fetch and parse combined
    pub fn item_failures(&self) -> usize {
        self.items_fetch_failed + self.items_parse_failed
    }

    /// True when the site as a whole failed
    pub fn site_failed(&self) -> bool {
        self.discovery_error.is_some() || self.consolidation_error.is_some()
    }
}

/// Lifecycle and outcome of one `run_once` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// SHA-256 of the config file, when the run was started from one
    pub config_hash: Option<String>,
    pub sites: Vec<SiteSummary>,
    /// Requested site ids that matched no configured site
    pub unknown_sites: Vec<String>,
}

impl RunRecord {
    /// Starts a record in the `Running` state
    pub fn start(run_id: impl Into<String>, config_hash: Option<String>) -> Self {
        Self {
            run_id: run_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            config_hash,
            sites: Vec::new(),
            unknown_sites: Vec::new(),
        }
    }

    /// Stamps the end time and derives the final status
    pub fn finish(&mut self, cancelled: bool) {
        self.finished_at = Some(Utc::now());
        self.status = if cancelled {
            RunStatus::Cancelled
        } else if self.site_failures() > 0 {
            RunStatus::CompletedWithErrors
        } else {
            RunStatus::Completed
        };
    }

    pub fn site(&self, site: &str) -> Option<&SiteSummary> {
        self.sites.iter().find(|s| s.site == site)
    }

    pub fn items_new(&self) -> usize {
        self.sites.iter().map(|s| s.items_new).sum()
    }

    pub fn items_duplicate(&self) -> usize {
        self.sites.iter().map(|s| s.items_duplicate).sum()
    }

    pub fn item_failures(&self) -> usize {
        self.sites.iter().map(SiteSummary::item_failures).sum()
    }

    pub fn records_written(&self) -> usize {
        self.sites.iter().map(|s| s.records_written).sum()
    }

    pub fn site_failures(&self) -> usize {
        self.sites.iter().filter(|s| s.site_failed()).count()
    }

    /// Seconds between start and finish, if finished
    pub fn duration_secs(&self) -> Option<i64> {
        self.finished_at.map(|end| (end - self.started_at).num_seconds())
    }
}

/// Writes run lifecycle lines through a [`Storage`] backend
///
/// Lines are prefixed with a UTC timestamp and the run id.
pub struct RunLog<'a> {
    storage: &'a mut dyn Storage,
    run_id: &'a str,
}

impl<'a> RunLog<'a> {
    pub fn new(storage: &'a mut dyn Storage, run_id: &'a str) -> Self {
        Self { storage, run_id }
    }

    /// Appends one line
    pub fn write(&mut self, message: &str) -> StorageResult<()> {
        let line = format!(
            "{} [{}] {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            self.run_id,
            message
        );
        self.storage.append_log(&line)
    }

    pub fn run_started(&mut self, sites: &[String]) -> StorageResult<()> {
        self.write(&format!("run started for {}", sites.join(", ")))
    }

    /// Writes the per-site summary lines and the run totals
    pub fn run_finished(&mut self, run: &RunRecord) -> StorageResult<()> {
        for name in &run.unknown_sites {
            self.write(&format!("site {}: skipped, not configured", name))?;
        }
        for site in &run.sites {
            self.write(&site_line(site))?;
        }
        self.write(&format!(
            "run {}: {} new, {} duplicate, {} item failures, {} site failures, {} records written",
            run.status,
            run.items_new(),
            run.items_duplicate(),
            run.item_failures(),
            run.site_failures(),
            run.records_written()
        ))
    }
}

fn site_line(site: &SiteSummary) -> String {
    if let Some(error) = &site.discovery_error {
        return format!("site {}: discovery failed: {}", site.site, error);
    }

    let mut line = format!(
        "site {}: {} categories, {} pages, {} new, {} duplicate, {} fetch failed, {} parse failed, {} written",
        site.site,
        site.categories,
        site.pages,
        site.items_new,
        site.items_duplicate,
        site.items_fetch_failed,
        site.items_parse_failed,
        site.records_written
    );
    if site.categories_failed > 0 {
        line.push_str(&format!(", {} categories ended by page fetch failure", site.categories_failed));
    }
    if let Some(error) = &site.consolidation_error {
        line.push_str(&format!(", consolidation failed: {}", error));
    }
    line
}

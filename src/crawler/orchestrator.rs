//! Top-level harvest driver
//!
//! The orchestrator resolves the requested sites, walks each one's
//! categories, consolidates the site's records as soon as the site is done
//! and writes the run log. Sites are processed one after the other; a
//! failing site is recorded and skipped, it never ends the run.

use crate::adapters::AdapterRegistry;
use crate::config::{Config, SiteEntry};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::pool::ConcurrentFetchPool;
use crate::crawler::walker::PageWalker;
use crate::model::{ProductRecord, Site};
use crate::output::{Consolidator, RunLog, RunRecord, SiteSummary};
use crate::state::{DedupStore, WalkEnd};
use crate::storage::{open_storage, RunLock, Storage, StorageError};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Drives harvest runs over the configured sites
pub struct Orchestrator {
    config: Config,
    config_hash: Option<String>,
    registry: AdapterRegistry,
    fetcher: Arc<dyn Fetcher>,
    storage: Mutex<Box<dyn Storage + Send>>,
    active: Mutex<HashSet<String>>,
    cancel: CancellationToken,
}

/// Runs started by this process, across every orchestrator in it
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Site ids claimed by a run in progress; released on drop
struct ActiveSites<'a> {
    active: &'a Mutex<HashSet<String>>,
    sites: Vec<String>,
}

impl<'a> ActiveSites<'a> {
    fn claim(active: &'a Mutex<HashSet<String>>, sites: Vec<String>) -> Result<Self> {
        let mut claimed = active.lock().unwrap_or_else(PoisonError::into_inner);

        let mut busy: Vec<String> = sites.iter().filter(|s| claimed.contains(*s)).cloned().collect();
        if !busy.is_empty() {
            busy.sort();
            return Err(HarvestError::RunInProgress { sites: busy });
        }

        claimed.extend(sites.iter().cloned());
        Ok(Self { active, sites })
    }
}

impl Drop for ActiveSites<'_> {
    fn drop(&mut self) {
        let mut claimed = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        for site in &self.sites {
            claimed.remove(site);
        }
    }
}

/// Maps a held storage lock to [`HarvestError::RunInProgress`]
fn lock_error(e: StorageError) -> HarvestError {
    match e {
        StorageError::Busy { sites } => HarvestError::RunInProgress { sites },
        other => other.into(),
    }
}

impl Orchestrator {
    /// Creates an orchestrator from its collaborators
    pub fn new(
        config: Config,
        registry: AdapterRegistry,
        fetcher: Arc<dyn Fetcher>,
        storage: Box<dyn Storage + Send>,
    ) -> Self {
        Self {
            config,
            config_hash: None,
            registry,
            fetcher,
            storage: Mutex::new(storage),
            active: Mutex::new(HashSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an orchestrator with the HTTP fetcher, the built-in adapters
    /// and the storage backend named in the config
    pub fn from_config(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.crawler, &config.user_agent)?;
        let storage = open_storage(&config.output)?;
        Ok(Self::new(
            config,
            AdapterRegistry::with_builtin(),
            Arc::new(fetcher),
            storage,
        ))
    }

    /// Records the config file hash in every run started from now on
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops runs cooperatively between sites, categories and pages
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves every configured site against the adapter registry
    pub fn resolve_sites(&self) -> Vec<(String, Result<Site>)> {
        self.config
            .sites
            .iter()
            .map(|entry| {
                (
                    entry.id.clone(),
                    self.registry.resolve_site(entry, &self.config.crawler),
                )
            })
            .collect()
    }

    /// Gives synchronous access to the storage backend
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut dyn Storage) -> R) -> Result<R> {
        let mut storage = self.storage()?;
        Ok(f(&mut **storage))
    }

    fn storage(&self) -> Result<MutexGuard<'_, Box<dyn Storage + Send>>> {
        self.storage
            .lock()
            .map_err(|_| HarvestError::Internal("storage lock poisoned".to_string()))
    }

    /// Clears the dataset, the seen-URL ledger, the run log and run history
    ///
    /// Refused while any run is in progress, in this process or in another
    /// one using the same storage.
    pub fn reset(&self) -> Result<()> {
        // Held until the reset is done so no run can start halfway through
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.is_empty() {
            let mut sites: Vec<String> = active.iter().cloned().collect();
            sites.sort();
            return Err(HarvestError::RunInProgress { sites });
        }

        let mut storage = self.storage()?;
        let _lock = match storage.lock_base() {
            Some(base) => Some(RunLock::for_reset(&base).map_err(lock_error)?),
            None => None,
        };
        storage.reset()?;
        drop(storage);
        drop(active);
        tracing::info!("Dataset, ledger and log cleared");
        Ok(())
    }

    /// Runs one harvest over `sites` (ids or base URLs; empty means all)
    ///
    /// Returns [`HarvestError::RunInProgress`] without doing anything when
    /// another run holds one of the requested sites, whether that run is
    /// driven by this orchestrator or by another process on the same storage.
    pub async fn run_once(&self, sites: &[String]) -> Result<RunRecord> {
        let (entries, unknown) = self.select_sites(sites);
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let _claim = ActiveSites::claim(&self.active, ids.clone())?;
        let _lock = self.lock_sites(&ids)?;

        let run_id = self.next_run_id();
        let mut run = RunRecord::start(run_id.clone(), self.config_hash.clone());
        run.unknown_sites = unknown;

        tracing::info!("Run {} started for {} site(s)", run_id, ids.len());
        let mut dedup = {
            let mut storage = self.storage()?;
            if let Err(e) = RunLog::new(&mut **storage, &run_id).run_started(&ids) {
                tracing::warn!("Could not write run log: {}", e);
            }
            DedupStore::load(&**storage)?
        };

        let consolidator = Consolidator::for_today();
        let pool = ConcurrentFetchPool::from_config(Arc::clone(&self.fetcher), &self.config.crawler);

        for entry in entries {
            if self.cancel.is_cancelled() {
                tracing::info!("Run {} cancelled before site {}", run_id, entry.id);
                break;
            }

            let mut summary = SiteSummary::new(&entry.id);
            let records = match self.registry.resolve_site(entry, &self.config.crawler) {
                Ok(site) => self.harvest_site(&site, &pool, &mut dedup, &mut summary).await,
                Err(e) => {
                    tracing::warn!("Skipping site {}: {}", entry.id, e);
                    summary.discovery_error = Some(e.to_string());
                    Vec::new()
                }
            };

            if summary.discovery_error.is_none() {
                self.consolidate(&consolidator, &entry.id, records, &mut dedup, &mut summary);
            }
            run.sites.push(summary);
        }

        run.finish(self.cancel.is_cancelled());
        tracing::info!(
            "Run {} {}: {} new, {} item failures, {} site failures",
            run.run_id,
            run.status,
            run.items_new(),
            run.item_failures(),
            run.site_failures()
        );

        let mut storage = self.storage()?;
        if let Err(e) = RunLog::new(&mut **storage, &run_id).run_finished(&run) {
            tracing::warn!("Could not write run log: {}", e);
        }
        if let Err(e) = storage.record_run(&run) {
            tracing::warn!("Could not record run {}: {}", run.run_id, e);
        }

        Ok(run)
    }

    /// Takes the storage's cross-process lock for `ids`, if it has one
    fn lock_sites(&self, ids: &[String]) -> Result<Option<RunLock>> {
        let Some(base) = self.storage()?.lock_base() else {
            return Ok(None);
        };
        RunLock::for_sites(&base, ids).map(Some).map_err(lock_error)
    }

    /// Run ids are `{start time to the millisecond}-{pid}-{sequence}`, unique
    /// across processes sharing a storage
    fn next_run_id(&self) -> String {
        let seq = RUN_SEQ.fetch_add(1, Ordering::SeqCst);
        format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            std::process::id(),
            seq
        )
    }

    /// Matches requested names against site ids and base URLs
    fn select_sites(&self, requested: &[String]) -> (Vec<&SiteEntry>, Vec<String>) {
        if requested.is_empty() {
            return (self.config.sites.iter().collect(), Vec::new());
        }

        let mut selected: Vec<&SiteEntry> = Vec::new();
        let mut unknown = Vec::new();
        for name in requested {
            let wanted = name.trim_end_matches('/');
            let found = self
                .config
                .sites
                .iter()
                .find(|e| e.id == *name || e.base_url.trim_end_matches('/') == wanted);

            match found {
                Some(entry) if !selected.iter().any(|s| s.id == entry.id) => selected.push(entry),
                Some(_) => {}
                None => {
                    tracing::warn!("Unknown site '{}', skipping", name);
                    unknown.push(name.clone());
                }
            }
        }
        (selected, unknown)
    }

    /// Discovers and walks every category of one site
    async fn harvest_site(
        &self,
        site: &Site,
        pool: &ConcurrentFetchPool,
        dedup: &mut DedupStore,
        summary: &mut SiteSummary,
    ) -> Vec<ProductRecord> {
        tracing::info!("Harvesting {} with adapter {}", site.id, site.adapter.name());

        let categories = match site
            .adapter
            .discover_categories(self.fetcher.as_ref(), &site.id, &site.base_url)
            .await
        {
            Ok(categories) => categories,
            Err(e) => {
                tracing::warn!("Skipping site {}: {}", site.id, e);
                summary.discovery_error = Some(e.to_string());
                return Vec::new();
            }
        };
        summary.categories = categories.len();
        tracing::info!("{}: {} categories", site.id, categories.len());

        let walker = PageWalker::new(site, Arc::clone(&self.fetcher), pool, self.cancel.clone());
        let mut records = Vec::new();
        for category in &categories {
            if self.cancel.is_cancelled() {
                break;
            }

            let outcome = walker.walk(category, dedup).await;
            summary.pages += outcome.pages;
            summary.items_new += outcome.items_new;
            summary.items_duplicate += outcome.items_duplicate;
            summary.items_fetch_failed += outcome.items_fetch_failed;
            summary.items_parse_failed += outcome.items_parse_failed;
            if outcome.end == WalkEnd::Failed {
                summary.categories_failed += 1;
            }
            records.extend(outcome.records);
        }
        records
    }

    /// Persists a site's records and ledger entries, noting any failure
    fn consolidate(
        &self,
        consolidator: &Consolidator,
        site: &str,
        records: Vec<ProductRecord>,
        dedup: &mut DedupStore,
        summary: &mut SiteSummary,
    ) {
        let result = match self.storage() {
            Ok(mut storage) => consolidator
                .consolidate(site, records, dedup, &mut **storage)
                .map_err(HarvestError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => summary.records_written = report.records_written,
            Err(e) => {
                tracing::error!("Consolidation failed for {}: {}", site, e);
                summary.consolidation_error = Some(e.to_string());
            }
        }
    }
}

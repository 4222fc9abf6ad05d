//! Cross-run record of item URLs already processed
//!
//! The store is partitioned by site id: a URL seen on one site never hides
//! the same URL on another. Entries become visible to lookups as soon as
//! they are added, but only reach storage when the consolidator flushes
//! them after the dataset append.

use crate::storage::{Storage, StorageResult};
use std::collections::{HashMap, HashSet};

/// In-memory seen-URL set with per-site pending writes
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashMap<String, HashSet<String>>,
    pending: HashMap<String, Vec<String>>,
}

impl DedupStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every persisted entry
    pub fn load(storage: &dyn Storage) -> StorageResult<Self> {
        let mut store = Self::new();
        for (site, url) in storage.load_seen()? {
            store.seen.entry(site).or_default().insert(url);
        }
        tracing::debug!("Loaded {} seen URLs across {} sites", store.total(), store.seen.len());
        Ok(store)
    }

    /// Returns true if `url` was processed for `site`
    pub fn contains(&self, site: &str, url: &str) -> bool {
        self.seen.get(site).is_some_and(|urls| urls.contains(url))
    }

    /// Marks URLs as seen for `site` and stages them for persistence
    ///
    /// Returns how many of them were not already present.
    pub fn batch_add<I, S>(&mut self, site: &str, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let seen = self.seen.entry(site.to_string()).or_default();
        let pending = self.pending.entry(site.to_string()).or_default();

        let mut added = 0;
        for url in urls {
            let url = url.into();
            if seen.insert(url.clone()) {
                pending.push(url);
                added += 1;
            }
        }
        added
    }

    /// Entries of `site` added since the last successful flush
    pub fn pending(&self, site: &str) -> &[String] {
        self.pending.get(site).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Persists the pending entries of one site
    ///
    /// Pending entries are kept when the write fails so a later flush can
    /// retry them.
    pub fn flush(&mut self, site: &str, storage: &mut dyn Storage) -> StorageResult<usize> {
        let Some(pending) = self.pending.get(site) else {
            return Ok(0);
        };
        if pending.is_empty() {
            return Ok(0);
        }

        let written = storage.append_seen(site, pending)?;
        self.pending.remove(site);
        Ok(written)
    }

    /// Forgets every entry for every site
    pub fn reset(&mut self) {
        self.seen.clear();
        self.pending.clear();
    }

    /// Number of seen URLs for `site`
    pub fn len(&self, site: &str) -> usize {
        self.seen.get(site).map_or(0, HashSet::len)
    }

    /// Number of seen URLs across all sites
    pub fn total(&self) -> usize {
        self.seen.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

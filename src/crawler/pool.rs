//! Bounded-parallel item fetching
//!
//! One pool call handles the new items of one listing page. Each item runs
//! in its own task with a timeout; a failing, slow or panicking item is
//! counted and dropped without touching its siblings. The call returns once
//! every task has finished.

use crate::adapters::SiteAdapter;
use crate::config::CrawlerConfig;
use crate::crawler::fetcher::Fetcher;
use crate::model::{ItemRef, ProductRecord};
use crate::SiteError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Results of one pool call, in completion order
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// Records parsed successfully
    pub records: Vec<ProductRecord>,

    /// Listing URLs of the items behind `records`
    pub parsed: Vec<String>,

    /// Items whose page was retrieved but did not yield a record
    pub parse_failed: Vec<String>,

    /// Items that could not be retrieved (network, HTTP status, timeout)
    pub fetch_failed: Vec<String>,
}

impl PoolOutcome {
    /// Listing URLs that count as processed: parsed or permanently unparsable
    ///
    /// These are the URLs the walker saw on the listing page, whatever URL an
    /// adapter writes into the record. Fetch failures are left out so a later
    /// run tries them again.
    pub fn processed_urls(&self) -> impl Iterator<Item = &str> + '_ {
        self.parsed
            .iter()
            .chain(self.parse_failed.iter())
            .map(String::as_str)
    }

    /// Number of items that were parsed or found unparsable
    pub fn processed(&self) -> usize {
        self.parsed.len() + self.parse_failed.len()
    }
}

enum ItemOutcome {
    Record(ProductRecord),
    ParseFailed,
    FetchFailed,
}

/// Runs `fetch_item` for many items with at most N in flight
#[derive(Clone)]
pub struct ConcurrentFetchPool {
    fetcher: Arc<dyn Fetcher>,
    semaphore: Arc<Semaphore>,
    item_timeout: Duration,
}

impl ConcurrentFetchPool {
    pub fn new(fetcher: Arc<dyn Fetcher>, max_concurrent: usize, item_timeout: Duration) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            item_timeout,
        }
    }

    /// Creates a pool sized by `max-concurrent-fetches` and `item-timeout-secs`
    pub fn from_config(fetcher: Arc<dyn Fetcher>, config: &CrawlerConfig) -> Self {
        Self::new(
            fetcher,
            config.max_concurrent_fetches as usize,
            Duration::from_secs(config.item_timeout_secs),
        )
    }

    /// Fetches and parses every item, returning once all tasks are done
    pub async fn run(&self, adapter: Arc<dyn SiteAdapter>, site_id: &str, items: Vec<ItemRef>) -> PoolOutcome {
        let mut tasks = JoinSet::new();

        for item in items {
            let adapter = Arc::clone(&adapter);
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&self.semaphore);
            let site_id = site_id.to_string();
            let item_timeout = self.item_timeout;

            tasks.spawn(async move {
                let url = item.url.to_string();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (url, ItemOutcome::FetchFailed);
                };

                // The work runs in its own task so a panic surfaces as a JoinError
                let mut work = tokio::spawn(async move {
                    adapter.fetch_item(fetcher.as_ref(), &site_id, &item).await
                });

                let outcome = match tokio::time::timeout(item_timeout, &mut work).await {
                    Ok(Ok(Ok(Some(record)))) => ItemOutcome::Record(record),
                    Ok(Ok(Ok(None))) => {
                        tracing::debug!("No record parsed from {}", url);
                        ItemOutcome::ParseFailed
                    }
                    Ok(Ok(Err(SiteError::Parse { message, .. }))) => {
                        tracing::debug!("Parse failed for {}: {}", url, message);
                        ItemOutcome::ParseFailed
                    }
                    Ok(Ok(Err(e))) => {
                        tracing::warn!("Item fetch failed: {}", e);
                        ItemOutcome::FetchFailed
                    }
                    Ok(Err(join_error)) => {
                        tracing::warn!("Item task for {} panicked: {}", url, join_error);
                        ItemOutcome::ParseFailed
                    }
                    Err(_) => {
                        work.abort();
                        tracing::warn!("Item {} timed out after {:?}", url, item_timeout);
                        ItemOutcome::FetchFailed
                    }
                };
                (url, outcome)
            });
        }

        let mut result = PoolOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((url, ItemOutcome::Record(record))) => {
                    result.parsed.push(url);
                    result.records.push(record);
                }
                Ok((url, ItemOutcome::ParseFailed)) => result.parse_failed.push(url),
                Ok((url, ItemOutcome::FetchFailed)) => result.fetch_failed.push(url),
                // The wrapper itself only awaits; it cannot panic short of the runtime shutting down
                Err(e) => tracing::error!("Fetch pool task lost: {}", e),
            }
        }

        result
    }
}

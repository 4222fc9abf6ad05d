//! Pagination driver for one category
//!
//! The walker requests listing pages 1, 2, ... of a category, splits each
//! page into new and already-seen items, hands the new ones to the fetch
//! pool and records them in the dedup store once the pool returns. The
//! walk state after each page decides whether to continue.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::pool::ConcurrentFetchPool;
use crate::model::{Category, ItemRef, ProductRecord, Site};
use crate::state::{DedupStore, WalkEnd, WalkState};
use crate::SiteError;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one category walk produced
#[derive(Debug)]
pub struct CategoryOutcome {
    pub category: String,
    pub records: Vec<ProductRecord>,
    /// Listing pages fetched, the terminating empty or failed page included
    pub pages: u32,
    /// New items that were processed (parsed or unparsable); fetch failures
    /// are counted apart and stay new for the next run
    pub items_new: usize,
    pub items_duplicate: usize,
    pub items_fetch_failed: usize,
    pub items_parse_failed: usize,
    pub end: WalkEnd,
    /// The listing page failure that ended the walk, if any
    pub error: Option<SiteError>,
}

impl CategoryOutcome {
    fn new(category: &Category) -> Self {
        Self {
            category: category.name.clone(),
            records: Vec::new(),
            pages: 0,
            items_new: 0,
            items_duplicate: 0,
            items_fetch_failed: 0,
            items_parse_failed: 0,
            end: WalkEnd::Exhausted,
            error: None,
        }
    }
}

/// Walks the listing pages of a site's categories
pub struct PageWalker<'a> {
    site: &'a Site,
    fetcher: Arc<dyn Fetcher>,
    pool: &'a ConcurrentFetchPool,
    cancel: CancellationToken,
}

impl<'a> PageWalker<'a> {
    pub fn new(
        site: &'a Site,
        fetcher: Arc<dyn Fetcher>,
        pool: &'a ConcurrentFetchPool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            site,
            fetcher,
            pool,
            cancel,
        }
    }

    /// Walks one category until its walk state or the page cap ends it
    pub async fn walk(&self, category: &Category, dedup: &mut DedupStore) -> CategoryOutcome {
        let policy = self.site.policy;
        let adapter = &self.site.adapter;
        let mut outcome = CategoryOutcome::new(category);
        let mut page = 1;

        loop {
            if page > policy.max_pages {
                tracing::info!(
                    "{} / {}: page cap of {} reached",
                    self.site.id,
                    category.name,
                    policy.max_pages
                );
                outcome.end = WalkEnd::PageCap;
                break;
            }
            if self.cancel.is_cancelled() {
                outcome.end = WalkEnd::Cancelled;
                break;
            }

            let mut state = WalkState::Fetching;
            tracing::debug!("{} / {}: page {} ({})", self.site.id, category.name, page, state);

            let listed = match adapter.list_page_items(self.fetcher.as_ref(), category, page).await {
                Ok(items) => items,
                Err(e) => {
                    // A missing page may be the real end of results or a transient failure
                    tracing::warn!(
                        "{} / {}: pagination stopped at page {}: {}",
                        self.site.id,
                        category.name,
                        page,
                        e
                    );
                    outcome.pages += 1;
                    outcome.error = Some(e);
                    state = WalkState::Failed;
                    outcome.end = state.end_reason(&policy).unwrap_or(WalkEnd::Failed);
                    break;
                }
            };
            outcome.pages += 1;

            let listed = collapse_repeats(listed);
            let (fresh, seen): (Vec<ItemRef>, Vec<ItemRef>) = listed
                .iter()
                .cloned()
                .partition(|item| !dedup.contains(&self.site.id, item.url.as_str()));

            state = WalkState::after_listing(listed.len(), fresh.len());
            outcome.items_duplicate += seen.len();
            tracing::debug!(
                "{} / {}: page {} listed {} items, {} new ({})",
                self.site.id,
                category.name,
                page,
                listed.len(),
                fresh.len(),
                state
            );

            if state.dispatches_items() {
                let pooled = self
                    .pool
                    .run(Arc::clone(adapter), &self.site.id, fresh)
                    .await;

                // Barrier: the page's results are known, record what was processed
                dedup.batch_add(&self.site.id, pooled.processed_urls());

                outcome.items_new += pooled.processed();
                outcome.items_fetch_failed += pooled.fetch_failed.len();
                outcome.items_parse_failed += pooled.parse_failed.len();
                outcome.records.extend(pooled.records);
            }

            if let Some(end) = state.end_reason(&policy) {
                outcome.end = end;
                break;
            }
            page += 1;
        }

        tracing::info!(
            "{} / {}: {} pages, {} new, {} duplicate, ended {}",
            self.site.id,
            category.name,
            outcome.pages,
            outcome.items_new,
            outcome.items_duplicate,
            outcome.end
        );
        outcome
    }
}

/// Keeps the first occurrence of each item URL on a page
fn collapse_repeats(items: Vec<ItemRef>) -> Vec<ItemRef> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.url.clone()))
        .collect()
}

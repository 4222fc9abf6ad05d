//! Site adapters
//!
//! A [`SiteAdapter`] knows how one marketplace lays out its categories,
//! listing pages and item pages. The engine never branches on the site
//! itself; it only asks the adapter for URLs and parsed results.
//!
//! The three engine-facing operations (`discover_categories`,
//! `list_page_items`, `fetch_item`) are provided methods built on
//! synchronous hooks, so most adapters only supply URL builders and
//! `scraper` selectors. The hooks never see the network, which keeps them
//! testable against static HTML.

mod coinafrique;
pub mod extract;
mod iliko;
mod mtn;
mod registry;
mod selectors;

pub use coinafrique::CoinAfriqueAdapter;
pub use iliko::IlikoAdapter;
pub use mtn::MtnAdapter;
pub use registry::AdapterRegistry;
pub use selectors::SelectorAdapter;

use crate::crawler::fetcher::{fetch_page, Fetcher};
use crate::model::{Category, ItemRef, ProductRecord};
use crate::SiteError;
use async_trait::async_trait;
use url::Url;

/// Adapter name reserved for sites described entirely by CSS selectors
pub const SELECTORS_ADAPTER: &str = "selectors";

/// How a category walk reacts to pages and when it gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationPolicy {
    /// End the category on a page whose items were all seen before
    pub stop_on_duplicates: bool,

    /// Hard cap on pages walked per category
    pub max_pages: u32,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            stop_on_duplicates: false,
            max_pages: 300,
        }
    }
}

/// Site-specific knowledge consumed by the walker and the fetch pool
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Adapter name as used in the `adapter` config key
    fn name(&self) -> &str;

    /// Host patterns (`*.example.com` wildcards allowed) this adapter serves
    fn host_patterns(&self) -> &[&'static str] {
        &[]
    }

    /// Whether a page made only of already-seen items ends the category
    fn stop_on_duplicates(&self) -> bool {
        false
    }

    /// Adapter-specific page cap; `None` defers to the crawler default
    fn page_cap(&self) -> Option<u32> {
        None
    }

    /// URL of the page that lists the categories
    fn categories_url(&self, base_url: &Url) -> Result<Url, url::ParseError> {
        Ok(base_url.clone())
    }

    /// Extracts categories from the categories page
    fn parse_categories(&self, site_id: &str, html: &str, page_url: &Url) -> Vec<Category>;

    /// URL of listing page `page` (1-based) of a category
    fn page_url(&self, category: &Category, page: u32) -> Result<Url, url::ParseError>;

    /// Extracts item links from a listing page
    fn parse_listing(&self, html: &str, category: &Category, page_url: &Url) -> Vec<ItemRef>;

    /// Builds a record from an item page, or explains what was missing
    fn parse_item(&self, site_id: &str, html: &str, item: &ItemRef) -> Result<ProductRecord, SiteError>;

    /// Fetches the categories page and parses it
    ///
    /// Any failure, including a page that yields no categories, is a
    /// [`SiteError::Discovery`] and means the site is skipped for this run.
    async fn discover_categories(
        &self,
        fetcher: &dyn Fetcher,
        site_id: &str,
        base_url: &Url,
    ) -> Result<Vec<Category>, SiteError> {
        let discovery = |message: String| SiteError::Discovery {
            site: site_id.to_string(),
            message,
        };

        let url = self
            .categories_url(base_url)
            .map_err(|e| discovery(format!("bad categories URL: {}", e)))?;
        let response = fetch_page(fetcher, &url)
            .await
            .map_err(|e| discovery(e.to_string()))?;

        let categories = self.parse_categories(site_id, &response.body, &response.final_url);
        if categories.is_empty() {
            return Err(discovery(format!("no categories found at {}", url)));
        }

        Ok(categories)
    }

    /// Fetches one listing page of a category
    ///
    /// An empty result means there are no more pages.
    async fn list_page_items(
        &self,
        fetcher: &dyn Fetcher,
        category: &Category,
        page: u32,
    ) -> Result<Vec<ItemRef>, SiteError> {
        let url = self.page_url(category, page).map_err(|e| SiteError::PageFetch {
            url: category.url.to_string(),
            message: format!("cannot build page {} URL: {}", page, e),
        })?;
        let response = fetch_page(fetcher, &url).await?;
        Ok(self.parse_listing(&response.body, category, &response.final_url))
    }

    /// Fetches and parses one item page
    ///
    /// Returns `Ok(None)` when the page was retrieved but lacks the fields
    /// a record needs; network and HTTP failures are errors. Items that
    /// carry a record from their listing card are returned as they are.
    async fn fetch_item(
        &self,
        fetcher: &dyn Fetcher,
        site_id: &str,
        item: &ItemRef,
    ) -> Result<Option<ProductRecord>, SiteError> {
        if let Some(record) = &item.listed {
            return Ok(Some(record.clone()));
        }

        let response = fetch_page(fetcher, &item.url).await?;
        match self.parse_item(site_id, &response.body, item) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::debug!("{} ({})", e, e.kind());
                Ok(None)
            }
        }
    }
}

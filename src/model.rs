//! Core data model shared by adapters, the walker and storage backends

use crate::adapters::{PaginationPolicy, SiteAdapter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// A marketplace bound to the adapter that knows how to read it.
///
/// Immutable for the duration of a run.
#[derive(Clone)]
pub struct Site {
    /// Identifier used to partition the seen-URL ledger
    pub id: String,

    /// Root URL of the marketplace
    pub base_url: Url,

    /// Adapter resolved for this site
    pub adapter: Arc<dyn SiteAdapter>,

    /// Effective pagination policy (adapter default plus config overrides)
    pub policy: PaginationPolicy,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("id", &self.id)
            .field("base_url", &self.base_url.as_str())
            .field("adapter", &self.adapter.name())
            .field("policy", &self.policy)
            .finish()
    }
}

/// A listing category discovered on a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub site_id: String,
    pub name: String,
    pub url: Url,
}

/// An item link found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub url: Url,
    pub category: String,
    /// Record already complete on the listing page; no item page is fetched
    pub listed: Option<ProductRecord>,
}

impl ItemRef {
    pub fn new(url: Url, category: impl Into<String>) -> Self {
        Self {
            url,
            category: category.into(),
            listed: None,
        }
    }

    /// An item whose listing card already holds the whole record
    pub fn with_record(url: Url, record: ProductRecord) -> Self {
        Self {
            url,
            category: record.category.clone(),
            listed: Some(record),
        }
    }
}

/// One harvested product listing.
///
/// The schema is the union of what the supported sites expose; anything a
/// site does not publish stays `None` or empty. `url` identifies the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub site: String,
    pub url: String,
    pub title: String,
    pub price: Option<String>,
    /// Pre-discount price when the site shows a struck-through one
    pub original_price: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub image_urls: Vec<String>,
    pub category: String,
    pub vendor_name: Option<String>,
    pub vendor_location: Option<String>,
    pub attributes: BTreeMap<String, String>,
    /// `YYYY-MM-DD`, stamped at consolidation
    pub scrape_date: Option<String>,
}

impl ProductRecord {
    /// Starts a record for an item, leaving every optional field empty
    pub fn new(site: &str, item: &ItemRef, title: impl Into<String>) -> Self {
        Self {
            site: site.to_string(),
            url: item.url.to_string(),
            title: title.into(),
            category: item.category.clone(),
            ..Self::default()
        }
    }
}

//! Adapter lookup by name or by host

use super::{
    CoinAfriqueAdapter, IlikoAdapter, MtnAdapter, PaginationPolicy, SelectorAdapter, SiteAdapter, SELECTORS_ADAPTER,
};
use crate::config::{CrawlerConfig, SiteEntry};
use crate::model::Site;
use crate::url::{host_matches, site_host};
use crate::{ConfigError, HarvestError};
use std::sync::Arc;
use url::Url;

/// Known adapters, searched in registration order
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every adapter shipped with the crate
    pub fn with_builtin() -> Self {
        Self {
            adapters: vec![
                Arc::new(CoinAfriqueAdapter),
                Arc::new(IlikoAdapter),
                Arc::new(MtnAdapter),
            ],
        }
    }

    /// Adds an adapter; a later registration with the same name wins
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) -> Result<(), ConfigError> {
        for pattern in adapter.host_patterns() {
            validate_host_pattern(pattern)?;
        }
        self.adapters.retain(|a| a.name() != adapter.name());
        self.adapters.push(adapter);
        Ok(())
    }

    /// Looks an adapter up by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    /// Finds the adapter whose host patterns cover `url`
    pub fn resolve_for_url(&self, url: &Url) -> Option<Arc<dyn SiteAdapter>> {
        let host = site_host(url)?;
        self.adapters
            .iter()
            .find(|a| a.host_patterns().iter().any(|p| host_matches(p, &host)))
            .cloned()
    }

    /// Names of the registered adapters
    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Binds a configured site to its adapter and effective pagination policy
    ///
    /// The adapter is taken from the entry's `adapter` key when present,
    /// otherwise from the base URL host. Policy precedence is site override,
    /// then adapter default, then the crawler-wide page cap.
    pub fn resolve_site(&self, entry: &SiteEntry, crawler: &CrawlerConfig) -> Result<Site, HarvestError> {
        let base_url = Url::parse(&entry.base_url)?;

        let adapter: Arc<dyn SiteAdapter> = match entry.adapter.as_deref() {
            Some(SELECTORS_ADAPTER) => {
                let selectors = entry.selectors.clone().ok_or_else(|| HarvestError::UnknownAdapter {
                    site: entry.id.clone(),
                    adapter: SELECTORS_ADAPTER.to_string(),
                })?;
                Arc::new(SelectorAdapter::new(selectors))
            }
            Some(name) => self.get(name).ok_or_else(|| HarvestError::UnknownAdapter {
                site: entry.id.clone(),
                adapter: name.to_string(),
            })?,
            None => match (&entry.selectors, self.resolve_for_url(&base_url)) {
                (_, Some(adapter)) => adapter,
                (Some(selectors), None) => Arc::new(SelectorAdapter::new(selectors.clone())),
                (None, None) => {
                    return Err(HarvestError::UnknownAdapter {
                        site: entry.id.clone(),
                        adapter: format!("<none for host {}>", base_url.host_str().unwrap_or("?")),
                    })
                }
            },
        };

        let policy = PaginationPolicy {
            stop_on_duplicates: entry
                .stop_on_duplicates
                .unwrap_or_else(|| adapter.stop_on_duplicates()),
            max_pages: entry
                .max_pages
                .or_else(|| adapter.page_cap())
                .unwrap_or(crawler.max_pages),
        };

        Ok(Site {
            id: entry.id.clone(),
            base_url,
            adapter,
            policy,
        })
    }
}

fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);
    if host.is_empty() || host.contains('*') || host.contains('/') || host.contains(' ') {
        return Err(ConfigError::InvalidPattern(pattern.to_string()));
    }
    Ok(())
}

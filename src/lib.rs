//! Souk-Harvest: a marketplace listing harvester
//!
//! This crate drives any number of marketplace sites through category
//! discovery, paginated listing walks, bounded-parallel item fetching,
//! cross-run deduplication and append-only consolidation into one dataset.

pub mod adapters;
pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Souk-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Unknown adapter '{adapter}' for site {site}")]
    UnknownAdapter { site: String, adapter: String },

    /// `sites` is empty when the whole storage is held, e.g. by a reset
    #[error("A run is already in progress{}", busy_sites(sites))]
    RunInProgress { sites: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while driving one site.
///
/// The variant decides how far the failure propagates: a discovery failure
/// skips the whole site, a page fetch failure ends pagination for the
/// category (or drops the item when raised inside the fetch pool), and a
/// parse failure drops a single item.
#[derive(Debug, Clone, Error)]
pub enum SiteError {
    #[error("Category discovery failed for {site}: {message}")]
    Discovery { site: String, message: String },

    #[error("Page fetch failed for {url}: {message}")]
    PageFetch { url: String, message: String },

    #[error("Parse failed for {url}: {message}")]
    Parse { url: String, message: String },
}

impl SiteError {
    /// Short label used in logs and run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Discovery { .. } => "discovery",
            Self::PageFetch { .. } => "page_fetch",
            Self::Parse { .. } => "parse",
        }
    }
}

/// Errors returned by a [`crawler::Fetcher`]
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request timeout for {url}")]
    Timeout { url: String },
}

impl FetchError {
    /// The URL the failed request was made for
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Network { url, .. } | Self::Timeout { url } => url,
        }
    }
}

impl From<FetchError> for SiteError {
    fn from(err: FetchError) -> Self {
        SiteError::PageFetch {
            url: err.url().to_string(),
            message: err.to_string(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host pattern: {0}")]
    InvalidPattern(String),
}

fn busy_sites(sites: &[String]) -> String {
    if sites.is_empty() {
        String::new()
    } else {
        format!(" for site(s): {}", sites.join(", "))
    }
}

/// Result type alias for Souk-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use adapters::{AdapterRegistry, PaginationPolicy, SiteAdapter};
pub use config::Config;
pub use crawler::{Fetcher, HttpFetcher, Orchestrator};
pub use model::{Category, ItemRef, ProductRecord, Site};
pub use output::RunRecord;
pub use state::{DedupStore, WalkState};

use serde::Deserialize;

/// Main configuration structure for Souk-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(rename = "site", default)]
    pub sites: Vec<SiteEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of item pages fetched in parallel for one listing page
    #[serde(rename = "max-concurrent-fetches", default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: u32,

    /// Default pagination cap per category
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// HTTP timeout for a single request (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Upper bound for one item task in the fetch pool, fetch and parse included (seconds)
    #[serde(rename = "item-timeout-secs", default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,

    /// Extra attempts after a transient fetch failure (0 disables retry)
    #[serde(rename = "fetch-retries", default)]
    pub fetch_retries: u32,

    /// Delay between retry attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_pages: default_max_pages(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            item_timeout_secs: default_item_timeout_secs(),
            fetch_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default = "default_agent_version")]
    pub version: String,

    /// URL with information about the harvester
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            version: default_agent_version(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!("{}/{} (+{})", self.name, self.version, contact),
            None => format!("{}/{}", self.name, self.version),
        }
    }
}

/// Which persistence backend holds the dataset, ledger and log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// CSV dataset, line-delimited ledger, text log under `directory`
    #[default]
    Files,
    /// Single SQLite database at `database-path`
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the files backend
    #[serde(default = "default_output_directory")]
    pub directory: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: default_output_directory(),
            database_path: default_database_path(),
        }
    }
}

/// One marketplace to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Identifier used in the ledger, the dataset and on the command line
    pub id: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Adapter name; resolved from the base URL host when omitted
    #[serde(default)]
    pub adapter: Option<String>,

    /// Overrides the adapter's all-duplicates policy
    #[serde(rename = "stop-on-duplicates", default)]
    pub stop_on_duplicates: Option<bool>,

    /// Overrides the pagination cap
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Extraction rules for the `selectors` adapter
    #[serde(default)]
    pub selectors: Option<SelectorConfig>,
}

/// CSS selectors describing a site for the configurable adapter
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Path of the categories page relative to the base URL ("" = base URL)
    #[serde(rename = "categories-path", default)]
    pub categories_path: String,

    /// Anchors whose text is the category name and `href` its listing URL
    #[serde(rename = "category-link")]
    pub category_link: String,

    /// Drop the first matched category (often an "all" entry)
    #[serde(rename = "skip-first-category", default)]
    pub skip_first_category: bool,

    /// Keep at most this many categories (after the skip)
    #[serde(rename = "category-limit", default)]
    pub category_limit: Option<usize>,

    /// Listing page URL template with `{url}` (category URL) and `{page}`
    #[serde(rename = "page-template", default = "default_page_template")]
    pub page_template: String,

    /// Use the bare category URL for page 1
    #[serde(rename = "plain-first-page", default = "default_true")]
    pub plain_first_page: bool,

    /// Template for page 1 only, e.g. `{url}.html`; wins over `plain-first-page`
    #[serde(rename = "first-page-template", default)]
    pub first_page_template: Option<String>,

    /// Anchors pointing at item pages on a listing page
    #[serde(rename = "item-link")]
    pub item_link: String,

    pub title: String,

    #[serde(default)]
    pub price: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    /// `img` elements; `src` is collected
    #[serde(default)]
    pub images: Option<String>,

    #[serde(rename = "vendor-name", default)]
    pub vendor_name: Option<String>,

    #[serde(rename = "vendor-location", default)]
    pub vendor_location: Option<String>,
}

fn default_max_concurrent_fetches() -> u32 {
    5
}

fn default_max_pages() -> u32 {
    300
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_item_timeout_secs() -> u64 {
    60
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_agent_name() -> String {
    "souk-harvest".to_string()
}

fn default_agent_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_output_directory() -> String {
    "./files".to_string()
}

fn default_database_path() -> String {
    "./harvest.db".to_string()
}

fn default_page_template() -> String {
    "{url}?page={page}".to_string()
}

fn default_true() -> bool {
    true
}

//! HTTP fetcher implementation
//!
//! This module handles all network retrieval for the harvester:
//! - The `Fetcher` capability consumed by adapters
//! - Building the reqwest client with user agent and timeouts
//! - Optional bounded retry with a fixed delay
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Raw result of one retrieval
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,

    /// Final URL after redirects
    pub final_url: Url,

    /// Response body
    pub body: String,
}

impl FetchResponse {
    /// Returns true for 2xx responses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network retrieval capability
///
/// A response with any HTTP status is `Ok`; only transport failures are
/// errors. Use [`fetch_page`] when anything but 2xx should be a failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &Url) -> Result<FetchResponse, FetchError>;
}

/// Fetches a page and treats non-2xx statuses as [`FetchError::Status`]
pub async fn fetch_page(fetcher: &dyn Fetcher, url: &Url) -> Result<FetchResponse, FetchError> {
    let response = fetcher.get(url).await?;
    if !response.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status,
        });
    }
    Ok(response)
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `crawler` - Timeout settings
/// * `user_agent` - The user agent configuration
pub fn build_http_client(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.fetch_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.fetch_timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `Fetcher` backed by a reqwest client
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | 2xx, 3xx, 4xx | Returned as-is |
/// | HTTP 5xx | Retry up to `fetch-retries` times |
/// | Timeout / connection error | Retry up to `fetch-retries` times |
///
/// With the default `fetch-retries = 0` every request is attempted once.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler and user agent settings
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(crawler, user_agent)?,
            retries: crawler.fetch_retries,
            retry_delay: Duration::from_millis(crawler.retry_delay_ms),
        })
    }

    async fn get_once(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| classify_error(url, e))?;

        Ok(FetchResponse {
            status,
            final_url,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let mut attempt = 0;
        loop {
            let result = self.get_once(url).await;
            let transient = match &result {
                Ok(response) => response.status >= 500,
                Err(FetchError::Timeout { .. }) | Err(FetchError::Network { .. }) => true,
                Err(FetchError::Status { .. }) => false,
            };

            if !transient || attempt >= self.retries {
                return result;
            }

            attempt += 1;
            tracing::debug!(
                "Transient failure for {} (attempt {}/{}), retrying in {:?}",
                url,
                attempt,
                self.retries,
                self.retry_delay
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

fn classify_error(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

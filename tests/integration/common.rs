//! Fixture sites served from memory

use async_trait::async_trait;
use souk_harvest::config::{parse_config, Config};
use souk_harvest::crawler::FetchResponse;
use souk_harvest::storage::FileStorage;
use souk_harvest::{AdapterRegistry, FetchError, Fetcher, Orchestrator};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Serves pages from a mutable map; unknown URLs answer 404
#[derive(Clone, Default)]
pub struct MapFetcher {
    pages: Arc<Mutex<HashMap<String, (u16, String)>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    delay: Duration,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request sleeps for `delay` before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn page(&self, url: &str, body: impl Into<String>) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), (200, body.into()));
    }

    pub fn status(&self, url: &str, status: u16) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, String::new()));
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let (status, body) = self
            .pages
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(FetchResponse {
            status,
            final_url: url.clone(),
            body,
        })
    }
}

/// A `[[site]]` table for a selectors-driven fixture shop at `https://{host}`
pub fn shop_site(id: &str, host: &str, stop_on_duplicates: bool) -> String {
    format!(
        r#"
[[site]]
id = "{id}"
base-url = "https://{host}"
adapter = "selectors"
stop-on-duplicates = {stop_on_duplicates}

[site.selectors]
categories-path = "/categories"
category-link = "a.cat"
item-link = "a.item"
title = "h1"
price = "span.price"
location = "p.where"
"#
    )
}

/// Config with the given site tables and a small crawler section
pub fn config(sites: &[String], max_pages: u32) -> Config {
    let toml = format!(
        r#"
[crawler]
max-concurrent-fetches = 3
max-pages = {max_pages}
fetch-timeout-secs = 5
item-timeout-secs = 5
{}
"#,
        sites.join("\n")
    );
    parse_config(&toml).unwrap()
}

pub fn orchestrator(config: Config, fetcher: &MapFetcher, dir: &Path) -> Orchestrator {
    Orchestrator::new(
        config,
        AdapterRegistry::with_builtin(),
        Arc::new(fetcher.clone()),
        Box::new(FileStorage::open(dir).unwrap()),
    )
}

/// Builds the pages of one fixture shop inside a [`MapFetcher`]
pub struct Shop<'a> {
    fetcher: &'a MapFetcher,
    host: String,
}

impl<'a> Shop<'a> {
    pub fn new(fetcher: &'a MapFetcher, host: &str) -> Self {
        Self {
            fetcher,
            host: host.to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.host, path)
    }

    /// Categories page linking `/c/{name}` for each name
    pub fn categories(&self, names: &[&str]) {
        let links: String = names
            .iter()
            .map(|n| format!(r#"<li><a class="cat" href="/c/{n}">{n}</a></li>"#))
            .collect();
        self.fetcher
            .page(&self.url("/categories"), format!("<ul>{}</ul>", links));
    }

    /// Listing page `page` of a category, linking `/i/{slug}` per item
    pub fn listing(&self, category: &str, page: u32, slugs: &[&str]) {
        let links: String = slugs
            .iter()
            .map(|s| format!(r#"<div><a class="item" href="/i/{s}">{s}</a></div>"#))
            .collect();
        let url = if page == 1 {
            self.url(&format!("/c/{}", category))
        } else {
            self.url(&format!("/c/{}?page={}", category, page))
        };
        self.fetcher.page(&url, format!("<main>{}</main>", links));
    }

    /// Item page with a title and price
    pub fn item(&self, slug: &str) {
        self.fetcher.page(
            &self.item_url(slug),
            format!(
                r#"<h1>Item {slug}</h1><span class="price">{} FCFA</span><p class="where">Cotonou</p>"#,
                slug.len() * 1000
            ),
        );
    }

    /// Item page that is retrieved fine but has no title
    pub fn broken_item(&self, slug: &str) {
        self.fetcher
            .page(&self.item_url(slug), "<p>listing removed</p>");
    }

    pub fn item_url(&self, slug: &str) -> String {
        self.url(&format!("/i/{}", slug))
    }

    /// One category whose pages list `pages` and whose items all parse
    pub fn category_with_items(&self, category: &str, pages: &[&[&str]]) {
        for (i, slugs) in pages.iter().enumerate() {
            self.listing(category, i as u32 + 1, slugs);
            for slug in slugs.iter() {
                self.item(slug);
            }
        }
    }
}

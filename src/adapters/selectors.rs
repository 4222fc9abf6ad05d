//! Adapter driven entirely by CSS selectors from the config file

use super::extract;
use super::{SiteAdapter, SELECTORS_ADAPTER};
use crate::config::SelectorConfig;
use crate::model::{Category, ItemRef, ProductRecord};
use crate::url::fill_page_template;
use crate::SiteError;
use async_trait::async_trait;
use scraper::Html;
use url::Url;

/// A site described by a `[site.selectors]` table
///
/// Selectors are checked when the config is loaded; at crawl time a
/// selector that matches nothing simply yields nothing.
#[derive(Debug, Clone)]
pub struct SelectorAdapter {
    selectors: SelectorConfig,
}

impl SelectorAdapter {
    pub fn new(selectors: SelectorConfig) -> Self {
        Self { selectors }
    }

    fn optional(&self, doc: &Html, css: &Option<String>) -> Option<String> {
        css.as_deref().and_then(|css| extract::text(doc, css))
    }
}

#[async_trait]
impl SiteAdapter for SelectorAdapter {
    fn name(&self) -> &str {
        SELECTORS_ADAPTER
    }

    fn categories_url(&self, base_url: &Url) -> Result<Url, url::ParseError> {
        if self.selectors.categories_path.is_empty() {
            Ok(base_url.clone())
        } else {
            base_url.join(&self.selectors.categories_path)
        }
    }

    fn parse_categories(&self, site_id: &str, html: &str, page_url: &Url) -> Vec<Category> {
        let doc = Html::parse_document(html);
        let skip = usize::from(self.selectors.skip_first_category);
        let limit = self.selectors.category_limit.unwrap_or(usize::MAX);

        let mut categories: Vec<Category> = Vec::new();
        for (name, url) in extract::links_with_text(&doc, &self.selectors.category_link, page_url)
            .into_iter()
            .skip(skip)
        {
            if categories.len() >= limit {
                break;
            }
            if categories.iter().any(|c| c.url == url) {
                continue;
            }
            categories.push(Category {
                site_id: site_id.to_string(),
                name,
                url,
            });
        }
        categories
    }

    fn page_url(&self, category: &Category, page: u32) -> Result<Url, url::ParseError> {
        if page <= 1 {
            if let Some(first) = &self.selectors.first_page_template {
                return fill_page_template(first, &category.url, page);
            }
            if self.selectors.plain_first_page {
                return Ok(category.url.clone());
            }
        }
        fill_page_template(&self.selectors.page_template, &category.url, page)
    }

    fn parse_listing(&self, html: &str, category: &Category, page_url: &Url) -> Vec<ItemRef> {
        let doc = Html::parse_document(html);
        extract::links(&doc, &self.selectors.item_link, page_url)
            .into_iter()
            .map(|url| ItemRef::new(url, &category.name))
            .collect()
    }

    fn parse_item(&self, site_id: &str, html: &str, item: &ItemRef) -> Result<ProductRecord, SiteError> {
        let doc = Html::parse_document(html);
        let title = extract::text(&doc, &self.selectors.title).ok_or_else(|| SiteError::Parse {
            url: item.url.to_string(),
            message: format!("no match for title selector '{}'", self.selectors.title),
        })?;

        let mut record = ProductRecord::new(site_id, item, title);
        record.price = self.optional(&doc, &self.selectors.price);
        record.description = self.optional(&doc, &self.selectors.description);
        record.location = self.optional(&doc, &self.selectors.location);
        record.vendor_name = self.optional(&doc, &self.selectors.vendor_name);
        record.vendor_location = self.optional(&doc, &self.selectors.vendor_location);
        if let Some(images) = &self.selectors.images {
            record.image_urls = extract::image_sources(&doc, images, &item.url);
        }
        Ok(record)
    }
}

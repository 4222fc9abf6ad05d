//! Iliko marketplace (`iliko.bj`)

use super::extract;
use super::SiteAdapter;
use crate::model::{Category, ItemRef, ProductRecord};
use crate::SiteError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

const CATEGORY_CARD: &str = "div.card-header.mb-2.p-2.side-category-bar";
const ITEM_LINK: &str = "div.single-product-details div.text-left a";

const TITLE: &str = "div.details span";
const PRICE: &str = "div.details span.h3.font-weight-normal.text-accent";
const STRUCK_PRICE: &str = "div.details strike";
const CONDITION: &str = "span.gtm_ads_content_quality";
const RATING: &str = "span.d-inline-block.align-middle.mt-1.mr-md-2.mr-sm-0.pr-2";
const REVIEWS: &str = "span.font-for-tab.d-inline-block";
const VENDOR: &str = "div.ml-3 > span[style*='font-weight: 700']";
const IMAGE: &str = "div.details img";

/// Adapter for the Iliko shop
///
/// Category cards carry no link; the category id sits at the end of the
/// path in their `onclick` handler. Listings are ordered newest first, so
/// a page of already-seen products ends the category.
#[derive(Debug, Default)]
pub struct IlikoAdapter;

impl IlikoAdapter {
    pub const NAME: &'static str = "iliko";
}

#[async_trait]
impl SiteAdapter for IlikoAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn host_patterns(&self) -> &[&'static str] {
        &["iliko.bj"]
    }

    fn stop_on_duplicates(&self) -> bool {
        true
    }

    fn page_cap(&self) -> Option<u32> {
        Some(300)
    }

    fn categories_url(&self, base_url: &Url) -> Result<Url, url::ParseError> {
        base_url.join("/categories")
    }

    fn parse_categories(&self, site_id: &str, html: &str, page_url: &Url) -> Vec<Category> {
        let doc = Html::parse_document(html);
        let Ok(card) = Selector::parse(CATEGORY_CARD) else {
            return Vec::new();
        };

        let mut categories = Vec::new();
        for element in doc.select(&card) {
            let id = element.value().attr("onclick").and_then(category_id);
            let name = extract::element_text(element);
            let (Some(id), Some(name)) = (id, name) else {
                tracing::debug!("Skipping category card without id or name on {}", page_url);
                continue;
            };

            let Ok(mut url) = page_url.join("/products") else {
                continue;
            };
            url.query_pairs_mut()
                .append_pair("id", id)
                .append_pair("data_from", "category");

            categories.push(Category {
                site_id: site_id.to_string(),
                name,
                url,
            });
        }
        categories
    }

    fn page_url(&self, category: &Category, page: u32) -> Result<Url, url::ParseError> {
        let mut url = category.url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    fn parse_listing(&self, html: &str, category: &Category, page_url: &Url) -> Vec<ItemRef> {
        let doc = Html::parse_document(html);
        extract::links(&doc, ITEM_LINK, page_url)
            .into_iter()
            .map(|url| ItemRef::new(url, &category.name))
            .collect()
    }

    fn parse_item(&self, site_id: &str, html: &str, item: &ItemRef) -> Result<ProductRecord, SiteError> {
        let doc = Html::parse_document(html);
        let title = extract::text(&doc, TITLE).ok_or_else(|| SiteError::Parse {
            url: item.url.to_string(),
            message: "product details block not found".to_string(),
        })?;

        let mut record = ProductRecord::new(site_id, item, title);
        record.price = extract::text(&doc, PRICE);
        record.original_price = extract::text(&doc, STRUCK_PRICE);
        record.vendor_name = extract::text(&doc, VENDOR);
        record.image_urls = extract::image_sources(&doc, IMAGE, &item.url)
            .into_iter()
            .take(1)
            .collect();

        if let Some(condition) = extract::text(&doc, CONDITION) {
            record.attributes.insert("condition".to_string(), condition);
        }
        if let Some(rating) = extract::text(&doc, RATING) {
            record.attributes.insert("rating".to_string(), rating);
        }
        if let Some(reviews) = extract::text(&doc, REVIEWS) {
            let count = reviews.replace("Avis", "").trim().to_string();
            if !count.is_empty() {
                record.attributes.insert("reviews".to_string(), count);
            }
        }

        Ok(record)
    }
}

/// `location.href='https://www.iliko.bj/category/12'` -> `12`
fn category_id(onclick: &str) -> Option<&str> {
    let target = onclick.split('\'').nth(1)?;
    let id = target.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

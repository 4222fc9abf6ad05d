//! MTN online shop (`shop.mtn.bj`)

use super::extract;
use super::SiteAdapter;
use crate::crawler::fetcher::Fetcher;
use crate::model::{Category, ItemRef, ProductRecord};
use crate::url::resolve_link;
use crate::SiteError;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

const PRODUCT_CARD: &str =
    "div.product-card-container.product-item-card.col-lg-3.col-6:not(.highlighted-products)";
const PRODUCT_LINK: &str = "a.product-card.shawdow-card.h-100";
const TITLE: &str = "div.product-card-details h3";
const PRICE: &str = "div.product-card-pricing span.woocommerce-Price-amount";
const PROMO_PRICE: &str = "div.product-promo-price span.woocommerce-Price-amount";
const DISCOUNT: &str = "div.product-promotion-percentage";
const AVAILABILITY: &str = "div.alert.alert-danger.text-center.font-14.out-of-stock";
const CARD_CATEGORY: &str = "div.product-card-header-cat span";
const VENDOR: &str = "div.product-card-footer span:nth-of-type(2)";
const IMAGE: &str = "div.product-card-header-image img";

/// Name of the single category the shop front is walked as
const SHOP_FRONT: &str = "Boutique";

/// Adapter for the MTN shop
///
/// The shop has no category pages worth walking: every product sits on the
/// front page and its card carries all the fields a record needs. The front
/// page is walked as one category of one page, and records are built from
/// the cards without visiting product pages.
#[derive(Debug, Default)]
pub struct MtnAdapter;

impl MtnAdapter {
    pub const NAME: &'static str = "mtn";

    /// Builds a record from one product card
    fn parse_card(&self, site_id: &str, card: ElementRef<'_>, url: &Url, category: &str) -> Option<ProductRecord> {
        let title = first_text(card, TITLE)?;
        let price = first_text(card, PRICE);
        let promo = first_text(card, PROMO_PRICE);

        let item = ItemRef::new(url.clone(), category);
        let mut record = ProductRecord::new(site_id, &item, title);
        if let Some(card_category) = first_text(card, CARD_CATEGORY) {
            record.category = card_category;
        }
        match promo {
            Some(promo) => {
                record.price = Some(promo);
                record.original_price = price;
            }
            None => record.price = price,
        }
        record.vendor_name = first_text(card, VENDOR);
        record.image_urls = first_attr(card, IMAGE, "src")
            .and_then(|src| resolve_link(url, &src))
            .map(|src| vec![src.to_string()])
            .unwrap_or_default();

        record.attributes.insert(
            "discount".to_string(),
            first_text(card, DISCOUNT).unwrap_or_else(|| "0%".to_string()),
        );
        if let Some(availability) = first_text(card, AVAILABILITY) {
            record.attributes.insert("availability".to_string(), availability);
        }
        Some(record)
    }
}

fn first_text(scope: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    scope.select(&selector).find_map(extract::element_text)
}

fn first_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let element = scope.select(&selector).next()?;
    element.value().attr(attr).map(|v| v.trim().to_string())
}

#[async_trait]
impl SiteAdapter for MtnAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn host_patterns(&self) -> &[&'static str] {
        &["shop.mtn.bj"]
    }

    fn stop_on_duplicates(&self) -> bool {
        true
    }

    fn page_cap(&self) -> Option<u32> {
        Some(1)
    }

    fn parse_categories(&self, site_id: &str, _html: &str, page_url: &Url) -> Vec<Category> {
        vec![Category {
            site_id: site_id.to_string(),
            name: SHOP_FRONT.to_string(),
            url: page_url.clone(),
        }]
    }

    fn page_url(&self, category: &Category, page: u32) -> Result<Url, url::ParseError> {
        if page <= 1 {
            return Ok(category.url.clone());
        }
        let mut url = category.url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    fn parse_listing(&self, html: &str, category: &Category, page_url: &Url) -> Vec<ItemRef> {
        let doc = Html::parse_document(html);
        let Ok(card_selector) = Selector::parse(PRODUCT_CARD) else {
            return Vec::new();
        };

        let mut items = Vec::new();
        for card in doc.select(&card_selector) {
            let Some(url) = first_attr(card, PRODUCT_LINK, "href").and_then(|href| resolve_link(page_url, &href))
            else {
                continue;
            };

            // Incomplete cards stay bare and are counted as unparsable
            match self.parse_card(&category.site_id, card, &url, &category.name) {
                Some(record) => items.push(ItemRef::with_record(url, record)),
                None => items.push(ItemRef::new(url, &category.name)),
            }
        }
        items
    }

    fn parse_item(&self, _site_id: &str, _html: &str, item: &ItemRef) -> Result<ProductRecord, SiteError> {
        Err(SiteError::Parse {
            url: item.url.to_string(),
            message: "product card lacks a title".to_string(),
        })
    }

    /// The shop front is the only category and needs no request to find
    async fn discover_categories(
        &self,
        _fetcher: &dyn Fetcher,
        site_id: &str,
        base_url: &Url,
    ) -> Result<Vec<Category>, SiteError> {
        Ok(self.parse_categories(site_id, "", base_url))
    }

    /// Records come from the listing cards; product pages are never fetched
    async fn fetch_item(
        &self,
        _fetcher: &dyn Fetcher,
        site_id: &str,
        item: &ItemRef,
    ) -> Result<Option<ProductRecord>, SiteError> {
        match &item.listed {
            Some(record) => Ok(Some(record.clone())),
            None => self.parse_item(site_id, "", item).map(Some),
        }
    }
}

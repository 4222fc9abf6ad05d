//! CoinAfrique classifieds (`*.coinafrique.com`)

use super::extract;
use super::SiteAdapter;
use crate::model::{Category, ItemRef, ProductRecord};
use crate::SiteError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

const CATEGORY_LINK: &str = "li.category.gtm-category-bar.center a";
const ITEM_LINK: &str = "a.card-image.ad__card-image";

const TITLE: &str = "div.ad__info__box-priceAndTitle h1.title-ad";
const PRICE: &str = "div.ad__info__box-priceAndTitle p.price";
const LOCATION: &str = "p.extras span.valign-wrapper:nth-of-type(2) span";
const DESCRIPTION: &str = "div.ad__info__box-descriptions p:nth-of-type(2)";
const VENDOR_NAME: &str = "div.profile-card__content p.username a";
const VENDOR_LOCATION: &str = "div.profile-card__content p.physical-address span.physical-address__name";
const VENDOR_ADS: &str = "div.profile-card__content p.nb-ads";
const VENDOR_SINCE: &str = "div.profile-card__content p.member-since span";
const CHARACTERISTICS: &str = "div.details-characteristics ul li";
const SLIDES: &str = "div.swiper-slide";

/// Adapter for CoinAfrique country sites
///
/// Categories come from the category bar of the home page, whose first
/// entry is a catch-all and is dropped. Listing pages repeat older ads
/// between fresh ones, so a page of duplicates does not end the category.
#[derive(Debug, Default)]
pub struct CoinAfriqueAdapter;

impl CoinAfriqueAdapter {
    pub const NAME: &'static str = "coinafrique";
}

#[async_trait]
impl SiteAdapter for CoinAfriqueAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn host_patterns(&self) -> &[&'static str] {
        &["*.coinafrique.com"]
    }

    fn stop_on_duplicates(&self) -> bool {
        false
    }

    fn page_cap(&self) -> Option<u32> {
        Some(1000)
    }

    fn parse_categories(&self, site_id: &str, html: &str, page_url: &Url) -> Vec<Category> {
        let doc = Html::parse_document(html);
        extract::links_with_text(&doc, CATEGORY_LINK, page_url)
            .into_iter()
            .skip(1)
            .map(|(name, url)| Category {
                site_id: site_id.to_string(),
                name,
                url,
            })
            .collect()
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
        extract::links(&doc, ITEM_LINK, page_url)
            .into_iter()
            .map(|url| ItemRef::new(url, &category.name))
            .collect()
    }

    fn parse_item(&self, site_id: &str, html: &str, item: &ItemRef) -> Result<ProductRecord, SiteError> {
        let doc = Html::parse_document(html);
        let title = extract::text(&doc, TITLE).ok_or_else(|| SiteError::Parse {
            url: item.url.to_string(),
            message: "ad title not found".to_string(),
        })?;

        let mut record = ProductRecord::new(site_id, item, title);
        record.price = extract::text(&doc, PRICE);
        record.location = extract::text(&doc, LOCATION);
        record.description = extract::text(&doc, DESCRIPTION);
        record.vendor_name = extract::text(&doc, VENDOR_NAME);
        record.vendor_location = extract::text(&doc, VENDOR_LOCATION);

        if let Some(ads) = extract::text(&doc, VENDOR_ADS) {
            record.attributes.insert("vendor_ads".to_string(), ads);
        }
        if let Some(since) = extract::text(&doc, VENDOR_SINCE) {
            record.attributes.insert("vendor_since".to_string(), since);
        }
        record.attributes.extend(characteristics(&doc));

        record.image_urls = slide_images(&doc, &item.url);
        Ok(record)
    }
}

/// `label -> value` pairs of the characteristics list
fn characteristics(doc: &Html) -> Vec<(String, String)> {
    let (Ok(entry), Ok(label), Ok(value)) = (
        Selector::parse(CHARACTERISTICS),
        Selector::parse("span:not(.qt)"),
        Selector::parse("span.qt"),
    ) else {
        return Vec::new();
    };

    doc.select(&entry)
        .filter_map(|li| {
            let name = li.select(&label).find_map(extract::element_text)?;
            let value = li.select(&value).find_map(extract::element_text)?;
            Some((name, value))
        })
        .collect()
}

/// Gallery images are slide backgrounds; thumbnails repeat them
fn slide_images(doc: &Html, page_url: &Url) -> Vec<String> {
    let mut images: Vec<String> = Vec::new();
    for style in extract::attrs(doc, SLIDES, "style") {
        if style.contains("thumb") {
            continue;
        }
        let Some(src) = extract::background_image(&style) else {
            continue;
        };
        if let Some(url) = crate::url::resolve_link(page_url, src) {
            let url = url.to_string();
            if !images.contains(&url) {
                images.push(url);
            }
        }
    }
    images
}

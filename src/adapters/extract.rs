//! Small `scraper` helpers shared by the adapters
//!
//! Selectors are given as strings. An unparsable selector matches nothing,
//! the same as a selector that finds no element on a changed page.

use crate::url::resolve_link;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Text content of an element with whitespace runs collapsed
///
/// Returns `None` when nothing but whitespace remains.
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Text of the first element matching `css`
pub fn text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).find_map(element_text)
}

/// Text of every element matching `css`, empty ones skipped
pub fn all_text(doc: &Html, css: &str) -> Vec<String> {
    match Selector::parse(css) {
        Ok(selector) => doc.select(&selector).filter_map(element_text).collect(),
        Err(_) => Vec::new(),
    }
}

/// Raw attribute values of every element matching `css`
pub fn attrs(doc: &Html, css: &str, attr: &str) -> Vec<String> {
    match Selector::parse(css) {
        Ok(selector) => doc
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Absolute `href` targets of every anchor matching `css`, in document order
pub fn links(doc: &Html, css: &str, page_url: &Url) -> Vec<Url> {
    attrs(doc, css, "href")
        .iter()
        .filter_map(|href| resolve_link(page_url, href))
        .collect()
}

/// `(text, absolute href)` for every anchor matching `css` that has both
pub fn links_with_text(doc: &Html, css: &str, page_url: &Url) -> Vec<(String, Url)> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };

    doc.select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            let url = resolve_link(page_url, href)?;
            Some((element_text(el)?, url))
        })
        .collect()
}

/// Absolute `src` URLs of every image matching `css`
pub fn image_sources(doc: &Html, css: &str, page_url: &Url) -> Vec<String> {
    attrs(doc, css, "src")
        .iter()
        .filter_map(|src| resolve_link(page_url, src))
        .map(|url| url.to_string())
        .collect()
}

/// URL inside a CSS `background-image: url(...)` declaration
pub fn background_image(style: &str) -> Option<&str> {
    if !style.contains("background-image") {
        return None;
    }
    let start = style.find("url(")? + "url(".len();
    let end = start + style[start..].find(')')?;
    let url = style[start..end].trim().trim_matches(|c| c == '\'' || c == '"');
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

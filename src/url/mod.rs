//! URL helpers for adapters and adapter resolution
//!
//! Listing pages link to items with relative, protocol-relative or absolute
//! hrefs; everything is resolved against the page it was found on so that the
//! item URL stored in the ledger is always absolute.

use url::Url;

/// Extracts the lowercase host of a URL, without any `www.` prefix
///
/// # Examples
///
/// ```
/// use url::Url;
/// use souk_harvest::url::site_host;
///
/// let url = Url::parse("https://WWW.Iliko.bj/categories").unwrap();
/// assert_eq!(site_host(&url), Some("iliko.bj".to_string()));
/// ```
pub fn site_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Checks a host against an adapter host pattern
///
/// `"iliko.bj"` matches only that host; `"*.coinafrique.com"` matches the
/// bare domain and any subdomain of it. Comparison ignores ASCII case.
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}

/// Resolves an href found on `page` into an absolute item or category URL
///
/// Returns `None` for empty hrefs, in-page anchors and non-HTTP schemes
/// (`javascript:`, `mailto:`, `tel:`). The fragment is dropped so that the
/// same item reached through different anchors keeps one identity.
pub fn resolve_link(page: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut resolved = page.join(href).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Expands a listing page template such as `{url}?page={page}`
///
/// When the category URL already carries a query string, a `?` right after
/// `{url}` is written as `&` so the page parameter joins the existing query.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use souk_harvest::url::fill_page_template;
///
/// let category = Url::parse("https://bj.bazarafrique.com/c?sort=new").unwrap();
/// let url = fill_page_template("{url}?page={page}", &category, 2).unwrap();
/// assert_eq!(url.as_str(), "https://bj.bazarafrique.com/c?sort=new&page=2");
/// ```
pub fn fill_page_template(template: &str, category_url: &Url, page: u32) -> Result<Url, url::ParseError> {
    let template = match category_url.query() {
        Some(_) => template.replace("{url}?", "{url}&"),
        None => template.to_string(),
    };
    let expanded = template
        .replace("{url}", category_url.as_str())
        .replace("{page}", &page.to_string());
    Url::parse(&expanded)
}

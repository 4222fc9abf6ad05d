use crate::adapters::SELECTORS_ADAPTER;
use crate::config::types::{Config, CrawlerConfig, SelectorConfig, SiteEntry, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.fetch_retries > 5 {
        return Err(ConfigError::Validation(format!(
            "fetch_retries must be at most 5, got {}",
            config.fetch_retries
        )));
    }

    // The per-item timeout must cover every attempt of the item page fetch
    let attempt_budget_ms = item_fetch_budget_ms(config);
    if config.item_timeout_secs.saturating_mul(1000) < attempt_budget_ms {
        return Err(ConfigError::Validation(format!(
            "item_timeout_secs ({}) must cover {} fetch attempt(s) of {}s plus retry delays ({}ms in total)",
            config.item_timeout_secs,
            config.fetch_retries + 1,
            config.fetch_timeout_secs,
            attempt_budget_ms
        )));
    }

    Ok(())
}

/// Worst-case time one item page fetch can take, retries included
fn item_fetch_budget_ms(config: &CrawlerConfig) -> u64 {
    let retries = u64::from(config.fetch_retries);
    (retries + 1)
        .saturating_mul(config.fetch_timeout_secs.saturating_mul(1000))
        .saturating_add(retries.saturating_mul(config.retry_delay_ms))
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates site entries
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();

    for site in sites {
        validate_site_id(&site.id)?;

        if !seen_ids.insert(site.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site id '{}'",
                site.id
            )));
        }

        let url = Url::parse(&site.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", site.base_url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "base-url '{}' must use http or https",
                site.base_url
            )));
        }

        if site.max_pages == Some(0) {
            return Err(ConfigError::Validation(format!(
                "Site '{}': max-pages must be >= 1",
                site.id
            )));
        }

        match (site.adapter.as_deref(), &site.selectors) {
            (Some(SELECTORS_ADAPTER), None) => {
                return Err(ConfigError::Validation(format!(
                    "Site '{}' uses the selectors adapter but has no [site.selectors] table",
                    site.id
                )));
            }
            (_, Some(selectors)) => validate_selectors(&site.id, selectors)?,
            _ => {}
        }
    }

    Ok(())
}

/// Site ids are written into the tab-separated ledger, so they are kept simple
fn validate_site_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation("Site id cannot be empty".to_string()));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "Site id must contain only ASCII letters, digits, '-' and '_', got '{}'",
            id
        )));
    }

    Ok(())
}

fn validate_selectors(site_id: &str, selectors: &SelectorConfig) -> Result<(), ConfigError> {
    if !selectors.page_template.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "Site '{}': page-template must contain {{page}}",
            site_id
        )));
    }

    if let Some(first) = &selectors.first_page_template {
        if !first.contains("{url}") {
            return Err(ConfigError::Validation(format!(
                "Site '{}': first-page-template must contain {{url}}",
                site_id
            )));
        }
    }

    if selectors.category_limit == Some(0) {
        return Err(ConfigError::Validation(format!(
            "Site '{}': category-limit must be >= 1",
            site_id
        )));
    }

    let required = [
        ("category-link", Some(&selectors.category_link)),
        ("item-link", Some(&selectors.item_link)),
        ("title", Some(&selectors.title)),
        ("price", selectors.price.as_ref()),
        ("description", selectors.description.as_ref()),
        ("location", selectors.location.as_ref()),
        ("images", selectors.images.as_ref()),
        ("vendor-name", selectors.vendor_name.as_ref()),
        ("vendor-location", selectors.vendor_location.as_ref()),
    ];

    for (field, css) in required {
        if let Some(css) = css {
            Selector::parse(css).map_err(|e| {
                ConfigError::Validation(format!(
                    "Site '{}': invalid {} selector '{}': {:?}",
                    site_id, field, css, e
                ))
            })?;
        }
    }

    Ok(())
}

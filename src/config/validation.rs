use crate::config::types::{
    BrowserConfig, Config, CrawlerConfig, OutputConfig, PortalEntry, RendererKind,
};
use crate::crawler::SelectorSet;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_output_config(&config.output)?;
    validate_portals(&config.portals)?;
    SelectorSet::compile(&config.selectors)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_routes < 1 || config.max_concurrent_routes > 32 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-routes must be between 1 and 32, got {}",
            config.max_concurrent_routes
        )));
    }

    if config.element_wait_ms < 1 {
        return Err(ConfigError::Validation(
            "element-wait-ms must be >= 1".to_string(),
        ));
    }

    if config.poll_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "poll-interval-ms must be >= 1".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.route_timeout_ms < config.element_wait_ms {
        return Err(ConfigError::Validation(format!(
            "route-timeout-ms ({}) must not be shorter than element-wait-ms ({})",
            config.route_timeout_ms, config.element_wait_ms
        )));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.renderer == RendererKind::Browserless {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            ConfigError::Validation("browserless renderer requires an endpoint".to_string())
        })?;
        validate_http_url(endpoint, "browser endpoint")?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_path.is_none() && config.database_path.is_none() {
        return Err(ConfigError::Validation(
            "at least one of csv-path or database-path must be set".to_string(),
        ));
    }

    for (key, value) in [
        ("csv-path", &config.csv_path),
        ("database-path", &config.database_path),
        ("summary-path", &config.summary_path),
    ] {
        if value.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{} cannot be empty when set",
                key
            )));
        }
    }

    Ok(())
}

/// Validates portal entries
fn validate_portals(portals: &[PortalEntry]) -> Result<(), ConfigError> {
    if portals.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[portal]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for portal in portals {
        let name = portal.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Validation(
                "portal name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(name.to_string()) {
            return Err(ConfigError::Validation(format!(
                "duplicate portal name '{}'",
                name
            )));
        }

        validate_http_url(&portal.url, &format!("portal '{}'", name))?;
    }

    Ok(())
}

/// Checks that a URL parses and uses http or https
fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid URL for {} '{}': {}", what, raw, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "URL for {} '{}' must use http or https",
            what, raw
        )));
    }

    Ok(())
}

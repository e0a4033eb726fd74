use crate::listing::Portal;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Fare-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    pub output: OutputConfig,
    /// Portals in run order
    #[serde(default, rename = "portal")]
    pub portals: Vec<PortalEntry>,
}

impl Config {
    /// The configured portals, in file order
    pub fn portals(&self) -> Vec<Portal> {
        self.portals
            .iter()
            .map(|entry| Portal::new(entry.name.clone(), entry.url.clone()))
            .collect()
    }
}

/// Crawl pacing, bounds and retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Upper bound for any "wait for element" (milliseconds)
    #[serde(rename = "element-wait-ms")]
    pub element_wait_ms: u64,

    /// Upper bound for waiting on the optional reveal control (milliseconds)
    #[serde(rename = "reveal-wait-ms")]
    pub reveal_wait_ms: u64,

    /// Interval between re-checks while waiting for an element (milliseconds)
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Delay after activating a page control, before reading the next page
    #[serde(rename = "page-settle-ms")]
    pub page_settle_ms: u64,

    /// Delay after navigating to a portal or route URL
    #[serde(rename = "load-settle-ms")]
    pub load_settle_ms: u64,

    /// Upper bound for one route's detail fetch, retries excluded
    #[serde(rename = "route-timeout-ms")]
    pub route_timeout_ms: u64,

    /// Maximum listing pages walked per portal
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Routes fetched in parallel within one portal
    #[serde(rename = "max-concurrent-routes")]
    pub max_concurrent_routes: u32,

    /// Extra attempts for a route that failed with a transient error
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff between route attempts, doubled each retry
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            element_wait_ms: 10_000,
            reveal_wait_ms: 2_000,
            poll_interval_ms: 500,
            page_settle_ms: 2_000,
            load_settle_ms: 0,
            route_timeout_ms: 60_000,
            max_pages: 200,
            max_concurrent_routes: 1,
            max_retries: 2,
            retry_backoff_ms: 1_000,
        }
    }
}

impl CrawlerConfig {
    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn reveal_wait(&self) -> Duration {
        Duration::from_millis(self.reveal_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    pub fn load_settle(&self) -> Duration {
        Duration::from_millis(self.load_settle_ms)
    }

    pub fn route_timeout(&self) -> Duration {
        Duration::from_millis(self.route_timeout_ms)
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// How pages are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Plain HTTP GET of the page
    #[default]
    Http,
    /// Rendered HTML from a Browserless `/content` endpoint
    Browserless,
}

/// Browsing capability configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub renderer: RendererKind,

    /// Base URL of the rendering service (browserless renderer only)
    pub endpoint: Option<String>,

    /// Access token for the rendering service
    pub token: Option<String>,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request HTTP timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Re-load the page while waiting for an element to appear
    ///
    /// Unset means on for the browserless renderer and off for plain HTTP,
    /// whose pages cannot change between loads.
    #[serde(rename = "reload-while-waiting")]
    pub reload_while_waiting: Option<bool>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::Http,
            endpoint: None,
            token: None,
            user_agent: format!("fare-harvest/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_ms: 30_000,
            reload_while_waiting: None,
        }
    }
}

impl BrowserConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// CSS selectors locating every element the crawl reads
///
/// Defaults match the operator portals' current markup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    #[serde(rename = "route-container")]
    pub route_container: String,
    #[serde(rename = "route-entry")]
    pub route_entry: String,
    #[serde(rename = "route-link")]
    pub route_link: String,
    #[serde(rename = "page-control")]
    pub page_control: String,
    #[serde(rename = "reveal-control")]
    pub reveal_control: String,
    #[serde(rename = "bus-item")]
    pub bus_item: String,
    #[serde(rename = "operator-name")]
    pub operator_name: String,
    #[serde(rename = "bus-type")]
    pub bus_type: String,
    #[serde(rename = "departure-time")]
    pub departure_time: String,
    pub duration: String,
    #[serde(rename = "arrival-time")]
    pub arrival_time: String,
    #[serde(rename = "star-rating")]
    pub star_rating: String,
    pub fare: String,
    #[serde(rename = "seats-left")]
    pub seats_left: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            route_container: "#root > div > div:nth-of-type(4)".to_string(),
            route_entry: ".route_link".to_string(),
            route_link: "a".to_string(),
            page_control: ".DC_117_pageTabs".to_string(),
            reveal_control: ".button".to_string(),
            bus_item: ".bus-item".to_string(),
            operator_name: ".travels".to_string(),
            bus_type: ".bus-type".to_string(),
            departure_time: ".dp-time".to_string(),
            duration: ".dur".to_string(),
            arrival_time: ".bp-time".to_string(),
            star_rating: ".rating-sec .rating span".to_string(),
            fare: ".fare".to_string(),
            seats_left: ".seat-left".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Flat-file sink
    #[serde(rename = "csv-path")]
    pub csv_path: Option<String>,

    /// Relational sink (SQLite database file)
    #[serde(rename = "database-path")]
    pub database_path: Option<String>,

    /// Markdown run report
    #[serde(rename = "summary-path")]
    pub summary_path: Option<String>,

    /// Extra attempts for a failed sink write
    #[serde(rename = "sink-retries", default = "default_sink_retries")]
    pub sink_retries: u32,
}

fn default_sink_retries() -> u32 {
    3
}

/// A configured operator portal
#[derive(Debug, Clone, Deserialize)]
pub struct PortalEntry {
    pub name: String,
    pub url: String,
}

//! Fare-Harvest: a bus route and fare crawler
//!
//! This crate walks a fixed set of operator portals, paginates their route
//! listings, visits every route's detail page and extracts each bus entry into
//! a uniform [`BusListing`]. A finished run is handed to one or more sinks
//! (flat CSV file, SQLite table) exactly once.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod listing;
pub mod output;
pub mod query;
pub mod sink;
pub mod state;

use thiserror::Error;

/// Main error type for Fare-Harvest runs
///
/// Portal, route and record level failures never surface here; they are
/// recorded in the [`CrawlRun`] and the run carries on. Only configuration,
/// client construction and sink failures abort a run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Sink failed after {attempts} attempt(s): {source}")]
    Sink {
        source: sink::SinkError,
        attempts: u32,
        /// The collected run, kept so the caller can still recover the records
        run: Box<state::CrawlRun>,
    },

    #[error("Failed to open sink: {0}")]
    SinkSetup(#[from] sink::SinkError),
}

impl CrawlError {
    /// Takes back the in-memory run from a failed sink handoff
    pub fn into_recovered_run(self) -> Option<state::CrawlRun> {
        match self {
            Self::Sink { run, .. } => Some(*run),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Result type alias for Fare-Harvest operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use listing::{BusListing, Portal, RouteRef};
pub use state::{CrawlRun, PortalState};

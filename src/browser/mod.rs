//! Browsing capability used by the crawl pipeline
//!
//! The crawl core never talks HTTP directly. It asks a [`Browser`] for a
//! [`Session`], drives it (navigate, wait for an element, activate a control,
//! read the rendered document) and drops it when done. Each concurrent unit of
//! work owns its own session; sessions are never shared.
//!
//! - `document`: pure helpers over a rendered HTML document
//! - `http`: a session backed by plain HTTP or a Browserless renderer

mod document;
mod http;

pub use document::{activation_target, contains, count};
pub use http::{build_http_client, HttpBrowser, HttpSession, Renderer};

use crate::ConfigError;
use async_trait::async_trait;
use scraper::Selector;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by a browsing session
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Renderer returned HTTP {status}: {message}")]
    Renderer { status: u16, message: String },

    #[error("No element matches '{selector}' at index {index}")]
    ElementNotFound { selector: String, index: usize },

    #[error("Element '{selector}' has no link to follow")]
    NotInteractable { selector: String },

    #[error("No page loaded in session")]
    NoPage,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl BrowserError {
    /// Returns true if retrying the same request may succeed
    ///
    /// Timeouts, refused connections, HTTP 429 and 5xx responses are transient.
    /// Everything else (404, bad markup, missing controls) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Status { status, .. } | Self::Renderer { status, .. } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}

/// A compiled CSS selector that remembers its source text
#[derive(Clone)]
pub struct Locator {
    css: String,
    selector: Selector,
}

impl Locator {
    /// Compiles a CSS selector
    pub fn parse(css: &str) -> Result<Self, ConfigError> {
        let selector = Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
            selector: css.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            css: css.to_string(),
            selector,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.css
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Locator").field(&self.css).finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css)
    }
}

/// Hands out independent browsing sessions
pub trait Browser: Send + Sync {
    /// Opens a fresh session; it is released when dropped
    fn open_session(&self) -> Box<dyn Session>;
}

/// One browsing session: a current page plus the actions allowed on it
#[async_trait]
pub trait Session: Send {
    /// Navigates to an absolute URL
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Waits until `locator` matches in the current page
    ///
    /// Returns `Ok(false)` once `timeout` elapses; exceeding the bound means the
    /// element is absent, it is not an error.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration)
        -> Result<bool, BrowserError>;

    /// Activates the `index`-th element matching `locator`
    async fn click(&mut self, locator: &Locator, index: usize) -> Result<(), BrowserError>;

    /// The current rendered document
    fn html(&self) -> &str;

    /// URL of the current page, after redirects
    fn current_url(&self) -> Option<&Url>;
}

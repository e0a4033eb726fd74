//! HTTP-backed browsing sessions
//!
//! Pages are loaded either with a plain GET or through a Browserless
//! `/content` endpoint that returns the fully rendered HTML. Activating a
//! control follows the link it carries.
//!
//! Waiting for an element checks the loaded document. Only when reloads are
//! enabled (the default for the Browserless renderer) does it re-load the
//! current page at the poll interval until the element shows up or the bound
//! elapses; a plain GET returns the same static HTML every time.

use crate::browser::{document, Browser, BrowserError, Locator, Session};
use crate::config::{BrowserConfig, CrawlerConfig, RendererKind};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use fare_harvest::browser::build_http_client;
/// use fare_harvest::config::BrowserConfig;
///
/// let client = build_http_client(&BrowserConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &BrowserConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Where rendered HTML comes from
#[derive(Debug, Clone)]
pub enum Renderer {
    /// GET the page directly
    Direct,
    /// POST the URL to a Browserless `/content` endpoint
    Browserless {
        endpoint: String,
        token: Option<String>,
    },
}

impl Renderer {
    /// True if loading the same URL again can give a different document
    pub fn renders_dynamically(&self) -> bool {
        matches!(self, Self::Browserless { .. })
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        match (config.renderer, config.endpoint.as_deref()) {
            (RendererKind::Browserless, Some(endpoint)) => Self::Browserless {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                token: config.token.clone(),
            },
            _ => Self::Direct,
        }
    }

    /// Loads `url` and returns the final URL with its rendered HTML
    async fn render(&self, client: &Client, url: &Url) -> Result<(Url, String), BrowserError> {
        match self {
            Self::Direct => {
                let response = client
                    .get(url.as_str())
                    .send()
                    .await
                    .map_err(|e| classify(url, e))?;

                let status = response.status();
                let final_url = response.url().clone();
                if !status.is_success() {
                    return Err(BrowserError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }

                let body = response.text().await.map_err(|e| classify(url, e))?;
                Ok((final_url, body))
            }

            Self::Browserless { endpoint, token } => {
                let mut request = client.post(format!("{}/content", endpoint));
                if let Some(token) = token {
                    request = request.query(&[("token", token)]);
                }

                let body = serde_json::json!({ "url": url.as_str() });
                let response = request
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| classify(url, e))?;

                let status = response.status();
                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(BrowserError::Renderer {
                        status: status.as_u16(),
                        message,
                    });
                }

                let html = response.text().await.map_err(|e| classify(url, e))?;
                Ok((url.clone(), html))
            }
        }
    }
}

/// Maps a transport failure onto a browser error
fn classify(url: &Url, error: reqwest::Error) -> BrowserError {
    if error.is_timeout() {
        BrowserError::Timeout {
            url: url.to_string(),
        }
    } else {
        BrowserError::Transport {
            url: url.to_string(),
            source: error,
        }
    }
}

/// Hands out [`HttpSession`]s sharing one connection pool
#[derive(Clone)]
pub struct HttpBrowser {
    client: Client,
    renderer: Arc<Renderer>,
    poll_interval: Duration,
    reload_while_waiting: bool,
}

impl HttpBrowser {
    pub fn new(browser: &BrowserConfig, crawler: &CrawlerConfig) -> Result<Self, BrowserError> {
        let client = build_http_client(browser)?;
        let renderer = Renderer::from_config(browser);
        let reload_while_waiting = browser
            .reload_while_waiting
            .unwrap_or_else(|| renderer.renders_dynamically());

        Ok(Self {
            client,
            renderer: Arc::new(renderer),
            poll_interval: crawler.poll_interval(),
            reload_while_waiting,
        })
    }
}

impl Browser for HttpBrowser {
    fn open_session(&self) -> Box<dyn Session> {
        Box::new(HttpSession {
            client: self.client.clone(),
            renderer: Arc::clone(&self.renderer),
            poll_interval: self.poll_interval,
            reload_while_waiting: self.reload_while_waiting,
            current: None,
            html: String::new(),
        })
    }
}

/// A session holding the most recently rendered page
pub struct HttpSession {
    client: Client,
    renderer: Arc<Renderer>,
    poll_interval: Duration,
    reload_while_waiting: bool,
    current: Option<Url>,
    html: String,
}

impl HttpSession {
    async fn load(&mut self, url: &Url) -> Result<(), BrowserError> {
        let (final_url, html) = self.renderer.render(&self.client, url).await?;
        tracing::trace!("Loaded {} ({} bytes)", final_url, html.len());
        self.current = Some(final_url);
        self.html = html;
        Ok(())
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let url = Url::parse(url).map_err(|e| BrowserError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.load(&url).await
    }

    async fn wait_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + timeout;

        loop {
            if document::contains(&self.html, locator) {
                return Ok(true);
            }
            if !self.reload_while_waiting {
                return Ok(false);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(url) = self.current.clone() else {
                return Ok(false);
            };
            if remaining.is_zero() {
                return Ok(false);
            }

            tokio::time::sleep(self.poll_interval.min(remaining)).await;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            match tokio::time::timeout(remaining, self.load(&url)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_transient() => {
                    tracing::debug!("Transient error while waiting for '{}': {}", locator, e);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(document::contains(&self.html, locator)),
            }
        }
    }

    async fn click(&mut self, locator: &Locator, index: usize) -> Result<(), BrowserError> {
        if self.current.is_none() {
            return Err(BrowserError::NoPage);
        }

        let target =
            document::activation_target(&self.html, self.current.as_ref(), locator, index)?;
        tracing::trace!("Activating '{}' #{} -> {}", locator, index, target);
        self.load(&target).await
    }

    fn html(&self) -> &str {
        &self.html
    }

    fn current_url(&self) -> Option<&Url> {
        self.current.as_ref()
    }
}

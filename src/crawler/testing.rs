//! In-memory browser serving canned pages

use crate::browser::{activation_target, contains, Browser, BrowserError, Locator, Session};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

#[derive(Clone, Default)]
pub struct StaticBrowser {
    pages: Arc<HashMap<String, String>>,
    delays: Arc<HashMap<String, Duration>>,
    failures: Arc<Mutex<HashMap<String, u32>>>,
    sessions: Arc<AtomicUsize>,
    visits: Arc<Mutex<Vec<String>>>,
}

fn key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl StaticBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        Arc::make_mut(&mut self.pages).insert(key(url), html.to_string());
        self
    }

    /// Delays every load of `url`
    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(key(url), delay);
        self
    }

    /// Answers the first `times` loads of `url` with HTTP 503
    pub fn flaky(self, url: &str, times: u32) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(key(url), times);
        }
        self
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Browser for StaticBrowser {
    fn open_session(&self) -> Box<dyn Session> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Box::new(StaticSession {
            browser: self.clone(),
            current: None,
            html: String::new(),
        })
    }
}

struct StaticSession {
    browser: StaticBrowser,
    current: Option<Url>,
    html: String,
}

impl StaticSession {
    async fn load(&mut self, url: Url) -> Result<(), BrowserError> {
        let key = url.to_string();
        if let Ok(mut visits) = self.browser.visits.lock() {
            visits.push(key.clone());
        }

        if let Some(delay) = self.browser.delays.get(&key) {
            tokio::time::sleep(*delay).await;
        }

        let failing = match self.browser.failures.lock() {
            Ok(mut failures) => match failures.get_mut(&key) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            },
            Err(_) => false,
        };
        if failing {
            return Err(BrowserError::Status { url: key, status: 503 });
        }

        let html = self
            .browser
            .pages
            .get(&key)
            .cloned()
            .ok_or(BrowserError::Status { url: key, status: 404 })?;

        self.current = Some(url);
        self.html = html;
        Ok(())
    }
}

#[async_trait]
impl Session for StaticSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let parsed = Url::parse(url).map_err(|e| BrowserError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        self.load(parsed).await
    }

    async fn wait_for(
        &mut self,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<bool, BrowserError> {
        Ok(contains(&self.html, locator))
    }

    async fn click(&mut self, locator: &Locator, index: usize) -> Result<(), BrowserError> {
        if self.current.is_none() {
            return Err(BrowserError::NoPage);
        }
        let target = activation_target(&self.html, self.current.as_ref(), locator, index)?;
        self.load(target).await
    }

    fn html(&self) -> &str {
        &self.html
    }

    fn current_url(&self) -> Option<&Url> {
        self.current.as_ref()
    }
}

//! Pagination walker
//!
//! Walks the numbered listing pages of one portal and yields the routes
//! rendered on each page, in document order. Page advancement is strictly
//! sequential: after page `n` the walker activates the page control at
//! position `n` (zero-based), i.e. the control for page `n + 1`.
//!
//! The walker owns its session for the whole walk. It is not restartable;
//! a new walk always starts again from the portal's entry URL.

use crate::browser::{Browser, BrowserError, Session};
use crate::config::CrawlerConfig;
use crate::crawler::{settle, CancelFlag, SelectorSet};
use crate::listing::{Portal, RouteRef};
use scraper::{ElementRef, Html};
use thiserror::Error;
use url::Url;

/// Failures that abort the walk of one portal
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Failed to load portal {portal}: {source}")]
    Load {
        portal: String,
        #[source]
        source: BrowserError,
    },

    #[error("Route list '{selector}' never appeared on page {page} of portal {portal}")]
    ContainerMissing {
        portal: String,
        page: u32,
        selector: String,
    },

    #[error("Browser error on page {page} of portal {portal}: {source}")]
    Browser {
        portal: String,
        page: u32,
        #[source]
        source: BrowserError,
    },
}

/// Routes and control count read from one rendered listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub routes: Vec<RouteRef>,
    pub page_controls: usize,
}

/// The result of walking every page of a portal
#[derive(Debug, Clone, Default)]
pub struct Walk {
    pub routes: Vec<RouteRef>,
    pub pages: u32,
    /// True if cancellation stopped the walk before the last page
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    /// The current page is loaded and has not been read yet
    Ready,
    /// The current page was read; the next call moves to the following page
    Advance,
    Finished,
}

/// Lazy, finite cursor over a portal's listing pages
pub struct PaginationWalker<'a> {
    portal: &'a Portal,
    selectors: &'a SelectorSet,
    timing: &'a CrawlerConfig,
    session: Box<dyn Session>,
    page: u32,
    pages_read: u32,
    phase: Phase,
}

impl<'a> PaginationWalker<'a> {
    /// Creates a walker with a fresh session; nothing is loaded until the
    /// first call to [`next_page`](Self::next_page)
    pub fn new(
        browser: &dyn Browser,
        portal: &'a Portal,
        selectors: &'a SelectorSet,
        timing: &'a CrawlerConfig,
    ) -> Self {
        Self {
            portal,
            selectors,
            timing,
            session: browser.open_session(),
            page: 0,
            pages_read: 0,
            phase: Phase::NotStarted,
        }
    }

    /// Number of listing pages read so far
    pub fn pages_read(&self) -> u32 {
        self.pages_read
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Yields the routes of the next listing page
    ///
    /// Returns `Ok(None)` once the last page has been read. A page whose
    /// route list is present but empty yields an empty vector. A route list
    /// that never renders aborts the walk with [`WalkError::ContainerMissing`].
    pub async fn next_page(&mut self) -> Result<Option<Vec<RouteRef>>, WalkError> {
        match self.phase {
            Phase::Finished => return Ok(None),
            Phase::NotStarted => {
                self.phase = Phase::Finished;
                if let Err(source) = self.session.goto(&self.portal.entry_url).await {
                    return Err(WalkError::Load {
                        portal: self.portal.name.clone(),
                        source,
                    });
                }
                settle(self.timing.load_settle()).await;
                self.page = 1;
                self.phase = Phase::Ready;
            }
            Phase::Advance => {
                let control = self.page as usize;
                if let Err(e) = self
                    .session
                    .click(&self.selectors.page_control, control)
                    .await
                {
                    tracing::warn!(
                        "Could not advance {} past page {}: {}",
                        self.portal.name,
                        self.page,
                        e
                    );
                    self.phase = Phase::Finished;
                    return Ok(None);
                }
                self.page += 1;
                settle(self.timing.page_settle()).await;
                self.phase = Phase::Ready;
            }
            Phase::Ready => {}
        }

        tracing::info!("Processing page: {} ({})", self.page, self.portal.name);

        let present = match self
            .session
            .wait_for(&self.selectors.route_container, self.timing.element_wait())
            .await
        {
            Ok(present) => present,
            Err(source) => {
                self.phase = Phase::Finished;
                return Err(WalkError::Browser {
                    portal: self.portal.name.clone(),
                    page: self.page,
                    source,
                });
            }
        };

        if !present {
            self.phase = Phase::Finished;
            return Err(WalkError::ContainerMissing {
                portal: self.portal.name.clone(),
                page: self.page,
                selector: self.selectors.route_container.as_str().to_string(),
            });
        }

        let listing = parse_listing_page(
            self.session.html(),
            self.session.current_url(),
            &self.portal.name,
            self.selectors,
        );
        self.pages_read += 1;

        if listing.routes.is_empty() {
            tracing::debug!(
                "No routes rendered on page {} of {}",
                self.page,
                self.portal.name
            );
        }

        if self.page as usize >= listing.page_controls {
            tracing::info!("Reached the last page ({}) of {}", self.page, self.portal.name);
            self.phase = Phase::Finished;
        } else if self.page >= self.timing.max_pages {
            tracing::warn!(
                "Stopping {} at max-pages ({}) with {} page control(s) still available",
                self.portal.name,
                self.timing.max_pages,
                listing.page_controls
            );
            self.phase = Phase::Finished;
        } else {
            self.phase = Phase::Advance;
        }

        Ok(Some(listing.routes))
    }
}

/// Walks every listing page of a portal and collects its routes
///
/// Cancellation is checked between pages; routes read before it fired are
/// returned with `interrupted` set.
pub async fn walk_portal(
    browser: &dyn Browser,
    portal: &Portal,
    selectors: &SelectorSet,
    timing: &CrawlerConfig,
    cancel: &CancelFlag,
) -> Result<Walk, WalkError> {
    let mut walker = PaginationWalker::new(browser, portal, selectors, timing);
    let mut walk = Walk::default();

    while let Some(routes) = walker.next_page().await? {
        walk.routes.extend(routes);

        if cancel.is_cancelled() && !walker.is_finished() {
            tracing::warn!(
                "Cancellation requested, stopping {} after page {}",
                portal.name,
                walker.pages_read()
            );
            walk.interrupted = true;
            break;
        }
    }

    walk.pages = walker.pages_read();
    Ok(walk)
}

/// Reads the routes and the number of page controls from a listing page
///
/// Route entries are only read inside the route-list container. An entry
/// without a usable link is skipped.
pub fn parse_listing_page(
    html: &str,
    base: Option<&Url>,
    portal: &str,
    selectors: &SelectorSet,
) -> ListingPage {
    let document = Html::parse_document(html);
    let page_controls = document.select(selectors.page_control.selector()).count();

    let Some(container) = document.select(selectors.route_container.selector()).next() else {
        return ListingPage {
            routes: Vec::new(),
            page_controls,
        };
    };

    let mut routes = Vec::new();
    for entry in container.select(selectors.route_entry.selector()) {
        match route_from_entry(&entry, base, selectors) {
            Some((route_name, route_url)) => routes.push(RouteRef {
                portal: portal.to_string(),
                route_name,
                route_url,
            }),
            None => tracing::debug!(
                "Skipping route entry without a usable link on {}",
                portal
            ),
        }
    }

    ListingPage {
        routes,
        page_controls,
    }
}

/// Extracts `(route name, absolute route URL)` from one route entry
fn route_from_entry(
    entry: &ElementRef<'_>,
    base: Option<&Url>,
    selectors: &SelectorSet,
) -> Option<(String, String)> {
    let link = entry
        .select(selectors.route_link.selector())
        .next()
        .or_else(|| entry.value().attr("href").map(|_| *entry))?;

    let href = link.value().attr("href")?.trim();
    let route_url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    let name = link
        .value()
        .attr("title")
        .map(str::to_string)
        .unwrap_or_else(|| link.text().collect::<Vec<_>>().join(" "));
    let route_name = name.split_whitespace().collect::<Vec<_>>().join(" ");

    if route_name.is_empty() {
        return None;
    }

    Some((route_name, route_url.to_string()))
}

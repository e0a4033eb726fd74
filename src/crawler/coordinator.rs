//! Crawl coordinator - main crawl orchestration logic
//!
//! Drives every portal through `Pending -> Listing -> Detailing -> Done`
//! (or `Failed`), fans route detail fetches out to independent sessions,
//! collects listings into one [`CrawlRun`] and hands that run to the sinks
//! exactly once.

use crate::browser::{Browser, HttpBrowser};
use crate::config::{Config, CrawlerConfig};
use crate::crawler::detail::{fetch_detail, DetailPage, RouteError};
use crate::crawler::extractor::extract;
use crate::crawler::walker::walk_portal;
use crate::crawler::{CancelFlag, SelectorSet};
use crate::listing::{BusListing, Portal, RouteRef};
use crate::sink::RecordSink;
use crate::state::{CrawlRun, PortalReport, PortalState, RouteOutcome};
use crate::CrawlError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Main crawl coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    selectors: Arc<SelectorSet>,
    browser: Arc<dyn Browser>,
    cancel: CancelFlag,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a coordinator that browses over HTTP
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let browser = HttpBrowser::new(&config.browser, &config.crawler)?;
        Self::with_browser(config, Arc::new(browser))
    }

    /// Creates a coordinator on top of any browsing capability
    pub fn with_browser(config: Config, browser: Arc<dyn Browser>) -> Result<Self, CrawlError> {
        let selectors = SelectorSet::compile(&config.selectors)?;

        Ok(Self {
            config: Arc::new(config),
            selectors: Arc::new(selectors),
            browser,
            cancel: CancelFlag::new(),
            config_hash: None,
        })
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = Some(config_hash.into());
        self
    }

    /// A handle that stops the run when cancelled
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Crawls every configured portal in file order
    pub async fn run(&self) -> CrawlRun {
        let portals = self.config.portals();
        self.run_portals(&portals).await
    }

    /// Crawls the given portals in order
    ///
    /// Portal and route failures are recorded in the returned run and never
    /// stop the remaining work. Cancellation stops scheduling new work; what
    /// was collected before it stays in the run.
    pub async fn run_portals(&self, portals: &[Portal]) -> CrawlRun {
        let mut run = CrawlRun::start(portals);
        run.config_hash = self.config_hash.clone();

        tracing::info!("Starting crawl of {} portal(s)", portals.len());

        for (index, portal) in portals.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Cancellation requested, skipping {} remaining portal(s)",
                    portals.len() - index
                );
                break;
            }

            let (report, listings) = self.crawl_portal(portal).await;
            tracing::info!(
                "Portal {} {}: {} listing(s), {} dropped, {} failed route(s)",
                report.portal,
                report.state,
                report.listings(),
                report.dropped(),
                report.failed_routes()
            );
            run.record_portal(index, report, listings);
        }

        run.cancelled = self.cancel.is_cancelled();
        run.finish();

        tracing::info!(
            "Crawl {}: {} listing(s), {} dropped, {} failed route(s), {} failed portal(s)",
            run.status(),
            run.total_listings(),
            run.total_dropped(),
            run.failed_routes(),
            run.failed_portals()
        );

        run
    }

    /// Takes one portal from `Pending` to `Done` or `Failed`
    async fn crawl_portal(&self, portal: &Portal) -> (PortalReport, Vec<BusListing>) {
        let mut report = PortalReport::new(&portal.name);
        report.advance(PortalState::Listing);
        tracing::info!("Crawling portal {} ({})", portal.name, portal.entry_url);

        let walk = match walk_portal(
            self.browser.as_ref(),
            portal,
            &self.selectors,
            &self.config.crawler,
            &self.cancel,
        )
        .await
        {
            Ok(walk) => walk,
            Err(e) => {
                tracing::error!("Portal {} failed: {}", portal.name, e);
                report.fail(e.to_string());
                return (report, Vec::new());
            }
        };

        report.pages = walk.pages;
        report.routes_found = walk.routes.len();
        report.interrupted = walk.interrupted;
        report.advance(PortalState::Detailing);
        tracing::info!(
            "Portal {}: {} route(s) across {} page(s)",
            portal.name,
            walk.routes.len(),
            walk.pages
        );

        let harvests = if walk.interrupted {
            Vec::new()
        } else {
            self.crawl_routes(&walk.routes).await
        };
        if harvests.len() < walk.routes.len() {
            report.interrupted = true;
        }

        let mut listings = Vec::new();
        for harvest in harvests {
            listings.extend(harvest.listings);
            report.routes.push(harvest.outcome);
        }

        report.advance(PortalState::Done);
        (report, listings)
    }

    /// Fetches route details with bounded parallelism
    ///
    /// Results come back in route order whatever order the fetches finish in.
    async fn crawl_routes(&self, routes: &[RouteRef]) -> Vec<RouteHarvest> {
        let limit = self.config.crawler.max_concurrent_routes.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();
        let mut scheduled = 0usize;

        for (index, route) in routes.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Cancellation requested, {} route(s) left unvisited",
                    routes.len() - index
                );
                break;
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Cancellation requested, {} route(s) left unvisited",
                    routes.len() - index
                );
                break;
            }

            let worker = RouteWorker {
                browser: Arc::clone(&self.browser),
                selectors: Arc::clone(&self.selectors),
                timing: self.config.crawler.clone(),
                cancel: self.cancel.clone(),
            };
            let route = route.clone();
            tasks.spawn(async move {
                let _permit = permit;
                (index, worker.harvest(route).await)
            });
            scheduled += 1;
        }

        let mut slots: Vec<Option<RouteHarvest>> = (0..scheduled).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, harvest)) => slots[index] = Some(harvest),
                Err(e) => tracing::error!("Route task aborted: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(routes)
            .map(|(slot, route)| {
                slot.unwrap_or_else(|| RouteHarvest::failed(route.clone(), 0, "route task aborted"))
            })
            .collect()
    }

    /// Hands the run to `sink`, retrying failed writes with backoff
    ///
    /// After the last failed attempt the run comes back inside
    /// [`CrawlError::Sink`] so its listings are not lost.
    pub async fn deliver(
        &self,
        run: CrawlRun,
        sink: &mut dyn RecordSink,
    ) -> Result<CrawlRun, CrawlError> {
        deliver(run, sink, self.config.output.sink_retries, &self.config.crawler).await
    }
}

/// Appends a run's listings to `sink`, with up to `retries` extra attempts
pub async fn deliver(
    run: CrawlRun,
    sink: &mut dyn RecordSink,
    retries: u32,
    timing: &CrawlerConfig,
) -> Result<CrawlRun, CrawlError> {
    let max_attempts = retries + 1;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match sink.append(run.listings()) {
            Ok(()) => {
                tracing::info!(
                    "Delivered {} listing(s) to {}",
                    run.total_listings(),
                    sink.name()
                );
                return Ok(run);
            }
            Err(e) if attempt < max_attempts => {
                let backoff = timing.retry_backoff(attempt);
                tracing::warn!(
                    "Sink write failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt,
                    max_attempts,
                    backoff,
                    e
                );
                tokio::time::sleep(backoff).await;
            }
            Err(source) => {
                tracing::error!(
                    "Sink write failed after {} attempt(s): {}",
                    attempt,
                    source
                );
                return Err(CrawlError::Sink {
                    source,
                    attempts: attempt,
                    run: Box::new(run),
                });
            }
        }
    }
}

/// Listings and outcome of one route
struct RouteHarvest {
    outcome: RouteOutcome,
    listings: Vec<BusListing>,
}

impl RouteHarvest {
    fn failed(route: RouteRef, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            outcome: RouteOutcome::failed(route, attempts, error),
            listings: Vec::new(),
        }
    }
}

/// Everything one route task needs, owned so the task can be spawned
struct RouteWorker {
    browser: Arc<dyn Browser>,
    selectors: Arc<SelectorSet>,
    timing: CrawlerConfig,
    cancel: CancelFlag,
}

impl RouteWorker {
    /// Fetches and extracts one route, retrying transient failures
    async fn harvest(self, route: RouteRef) -> RouteHarvest {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let fetch = fetch_detail(self.browser.as_ref(), &route, &self.selectors, &self.timing);
            let result = match tokio::time::timeout(self.timing.route_timeout(), fetch).await {
                Ok(result) => result,
                Err(_) => Err(RouteError::Timeout {
                    url: route.route_url.clone(),
                    after: self.timing.route_timeout(),
                }),
            };

            match result {
                Ok(page) => return harvest_page(&page, &self.selectors, attempt),
                Err(e)
                    if e.is_transient()
                        && attempt <= self.timing.max_retries
                        && !self.cancel.is_cancelled() =>
                {
                    let backoff = self.timing.retry_backoff(attempt);
                    tracing::warn!(
                        "Route {} failed (attempt {}), retrying in {:?}: {}",
                        route.route_name,
                        attempt,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping route {} after {} attempt(s): {}",
                        route.route_name,
                        attempt,
                        e
                    );
                    return RouteHarvest::failed(route, attempt, e.to_string());
                }
            }
        }
    }
}

/// Extracts every bus entry on a fetched detail page
fn harvest_page(page: &DetailPage, selectors: &SelectorSet, attempts: u32) -> RouteHarvest {
    let route = page.route();
    let parsed = page.parse();
    let mut listings = Vec::new();
    let mut dropped: BTreeMap<&'static str, usize> = BTreeMap::new();

    for snapshot in parsed.snapshots(selectors) {
        match extract(&snapshot, selectors) {
            Ok(fields) => listings.push(BusListing::from_parts(route, fields)),
            Err(reason) => {
                tracing::trace!("Dropped bus entry on {}: {}", route.route_name, reason);
                *dropped.entry(reason.reason()).or_insert(0) += 1;
            }
        }
    }

    let dropped_total: usize = dropped.values().sum();
    if dropped_total > 0 {
        tracing::debug!(
            "Route {}: {} listing(s), {} dropped",
            route.route_name,
            listings.len(),
            dropped_total
        );
    }

    RouteHarvest {
        outcome: RouteOutcome {
            route: route.clone(),
            listings: listings.len(),
            dropped,
            error: None,
            attempts,
        },
        listings,
    }
}

//! Crawler module for portal traversal and listing extraction
//!
//! This module contains the core crawling logic, including:
//! - Compiled selectors for every element the crawl reads
//! - Pagination of a portal's route listings
//! - Route detail fetching and bus entry extraction
//! - Overall crawl coordination and sink handoff

mod coordinator;
mod detail;
mod extractor;
mod selectors;
mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{deliver, Coordinator};
pub use detail::{fetch_detail, DetailPage, ParsedDetail, RawBusSnapshot, RouteError};
pub use extractor::{extract, parse_fare, parse_rating, parse_seats, Dropped};
pub use selectors::SelectorSet;
pub use walker::{parse_listing_page, walk_portal, ListingPage, PaginationWalker, Walk, WalkError};

use crate::config::Config;
use crate::output::write_markdown_summary;
use crate::sink::open_sinks;
use crate::state::CrawlRun;
use crate::CrawlError;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared stop signal for a running crawl
///
/// Cloning shares the flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleeps for a settle delay; zero skips the sleep
pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Runs a complete crawl operation
///
/// Opens the configured sinks, crawls every portal, hands the run to the
/// sinks once and writes the markdown summary if one is configured.
///
/// # Example
///
/// ```no_run
/// use fare_harvest::config::load_config;
/// use fare_harvest::crawler::{run_crawl, CancelFlag};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let run = run_crawl(config, None, CancelFlag::new()).await?;
/// println!("{} listings", run.total_listings());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: Option<String>,
    cancel: CancelFlag,
) -> Result<CrawlRun, CrawlError> {
    let mut sinks = open_sinks(&config.output)?;
    let summary_path = config.output.summary_path.clone();

    let mut coordinator = Coordinator::new(config)?.with_cancel_flag(cancel);
    if let Some(hash) = config_hash {
        coordinator = coordinator.with_config_hash(hash);
    }

    let run = coordinator.run().await;
    let run = coordinator.deliver(run, &mut sinks).await?;

    if let Some(path) = summary_path {
        match write_markdown_summary(&run, Path::new(&path)) {
            Ok(()) => tracing::info!("Summary written to {}", path),
            Err(e) => tracing::warn!("Failed to write summary to {}: {}", path, e),
        }
    }

    Ok(run)
}

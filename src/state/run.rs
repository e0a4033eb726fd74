//! In-memory record of one crawl run
//!
//! A [`CrawlRun`] is owned by the coordinator while the crawl is running and
//! handed to the sinks once it finishes. Listings are only ever appended.

use crate::listing::{BusListing, Portal, RouteRef};
use crate::state::PortalState;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// What happened to one route
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub route: RouteRef,
    /// Listings kept from this route
    pub listings: usize,
    /// Bus entries dropped, by reason code
    pub dropped: BTreeMap<&'static str, usize>,
    /// Set when the route was lost entirely
    pub error: Option<String>,
    pub attempts: u32,
}

impl RouteOutcome {
    pub fn failed(route: RouteRef, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            route,
            listings: 0,
            dropped: BTreeMap::new(),
            error: Some(error.into()),
            attempts,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Outcome of one portal
#[derive(Debug, Clone)]
pub struct PortalReport {
    pub portal: String,
    pub state: PortalState,
    /// Listing pages read
    pub pages: u32,
    /// Routes discovered on the listing pages
    pub routes_found: usize,
    /// One entry per attempted route, in discovery order
    pub routes: Vec<RouteOutcome>,
    /// Why the portal failed, if it did
    pub failure: Option<String>,
    /// True if cancellation cut the portal short
    pub interrupted: bool,
}

impl PortalReport {
    pub fn new(portal: impl Into<String>) -> Self {
        Self {
            portal: portal.into(),
            state: PortalState::Pending,
            pages: 0,
            routes_found: 0,
            routes: Vec::new(),
            failure: None,
            interrupted: false,
        }
    }

    /// Moves to `next` if the lifecycle allows it
    ///
    /// Returns false and keeps the current state otherwise.
    pub fn advance(&mut self, next: PortalState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                "Ignoring invalid state change for {}: {} -> {}",
                self.portal,
                self.state,
                next
            );
            return false;
        }

        self.state = next;
        true
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.advance(PortalState::Failed) {
            self.failure = Some(reason.into());
        }
    }

    pub fn listings(&self) -> usize {
        self.routes.iter().map(|r| r.listings).sum()
    }

    pub fn dropped(&self) -> usize {
        self.routes.iter().map(RouteOutcome::dropped_total).sum()
    }

    pub fn failed_routes(&self) -> usize {
        self.routes.iter().filter(|r| r.is_failed()).count()
    }
}

/// One invocation of the pipeline
#[derive(Debug, Clone)]
pub struct CrawlRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// SHA-256 of the configuration file, when known
    pub config_hash: Option<String>,
    /// One report per configured portal, in run order
    pub portals: Vec<PortalReport>,
    /// True if cancellation was requested during the run
    pub cancelled: bool,
    listings: Vec<BusListing>,
}

impl CrawlRun {
    /// Starts a run with a pending report for every portal
    pub fn start(portals: &[Portal]) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            config_hash: None,
            portals: portals.iter().map(|p| PortalReport::new(&p.name)).collect(),
            cancelled: false,
            listings: Vec::new(),
        }
    }

    /// Stores a finished portal's report and appends its listings
    pub fn record_portal(&mut self, index: usize, report: PortalReport, listings: Vec<BusListing>) {
        match self.portals.get_mut(index) {
            Some(slot) => *slot = report,
            None => self.portals.push(report),
        }
        self.listings.extend(listings);
    }

    /// Every listing collected so far, in collection order
    pub fn listings(&self) -> &[BusListing] {
        &self.listings
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn total_listings(&self) -> usize {
        self.listings.len()
    }

    pub fn total_routes(&self) -> usize {
        self.portals.iter().map(|p| p.routes.len()).sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.portals.iter().map(PortalReport::dropped).sum()
    }

    pub fn failed_routes(&self) -> usize {
        self.portals.iter().map(PortalReport::failed_routes).sum()
    }

    pub fn failed_portals(&self) -> usize {
        self.portals
            .iter()
            .filter(|p| p.state == PortalState::Failed)
            .count()
    }

    /// Drop counts summed over every route, by reason code
    pub fn drop_reasons(&self) -> BTreeMap<&'static str, usize> {
        let mut reasons = BTreeMap::new();
        for route in self.portals.iter().flat_map(|p| p.routes.iter()) {
            for (reason, count) in &route.dropped {
                *reasons.entry(*reason).or_insert(0) += count;
            }
        }
        reasons
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    pub fn status(&self) -> &'static str {
        match (self.finished_at, self.cancelled) {
            (None, _) => "running",
            (Some(_), true) => "cancelled",
            (Some(_), false) => "completed",
        }
    }
}

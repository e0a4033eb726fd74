//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PortalState`: Lifecycle of one portal within a run
//! - `CrawlRun`: Everything one run produced, with a report per portal

mod portal_state;
mod run;

// Re-export main types
pub use portal_state::PortalState;
pub use run::{CrawlRun, PortalReport, RouteOutcome};

//! Output module for crawl reports and listing tables
//!
//! This module handles:
//! - Printing the end-of-run report
//! - Generating markdown summaries of a run
//! - Summarizing and listing stored records

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use stats::{compute_statistics, print_run_report, print_statistics, ListingStatistics};

use crate::query::StoredListing;

/// Prints stored listings as a table, at most `limit` rows
pub fn print_listings(listings: &[&StoredListing], limit: usize) {
    println!(
        "{:<16} {:<16} {:<28} {:<32} {:>6} {:>8} {:>6} {:>5}",
        "From", "To", "Bus", "Type", "Departs", "Fare", "Rating", "Seats"
    );

    for stored in listings.iter().take(limit) {
        let listing = &stored.listing;
        println!(
            "{:<16} {:<16} {:<28} {:<32} {:>6} {:>8.0} {:>6} {:>5}",
            truncate(&stored.from_city, 16),
            truncate(&stored.to_city, 16),
            truncate(&listing.operator_name, 28),
            truncate(&listing.bus_type, 32),
            listing.departure_time,
            listing.price,
            listing
                .star_rating
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "-".to_string()),
            listing
                .seats_available
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    if listings.len() > limit {
        println!("... and {} more", listings.len() - limit);
    }
    println!("{} matching listing(s)", listings.len());
}

/// Shortens `text` to at most `width` characters
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('~');
    short
}

//! Statistics for finished runs and stored listings
//!
//! `print_run_report` renders the end-of-run table; `compute_statistics`
//! and `print_statistics` summarize what the sinks hold.

use crate::query::{DepartureBucket, StoredListing};
use crate::state::CrawlRun;
use std::collections::BTreeMap;

/// Prints the end-of-run report to stdout
pub fn print_run_report(run: &CrawlRun) {
    println!("=== Crawl Report ===\n");

    println!(
        "{:<24} {:<12} {:>6} {:>7} {:>9} {:>8} {:>7}",
        "Portal", "State", "Pages", "Routes", "Listings", "Dropped", "Failed"
    );
    for portal in &run.portals {
        let state = if portal.interrupted {
            format!("{}*", portal.state)
        } else {
            portal.state.to_string()
        };
        println!(
            "{:<24} {:<12} {:>6} {:>7} {:>9} {:>8} {:>7}",
            portal.portal,
            state,
            portal.pages,
            portal.routes_found,
            portal.listings(),
            portal.dropped(),
            portal.failed_routes()
        );
    }
    println!();

    println!("Total listings: {}", run.total_listings());
    println!("Dropped entries: {}", run.total_dropped());
    println!(
        "Failed routes: {} / {}",
        run.failed_routes(),
        run.total_routes()
    );
    println!("Failed portals: {}", run.failed_portals());

    for portal in run.portals.iter().filter(|p| p.failure.is_some()) {
        println!(
            "  - {}: {}",
            portal.portal,
            portal.failure.as_deref().unwrap_or_default()
        );
    }

    if run.portals.iter().any(|p| p.interrupted) {
        println!("(* interrupted by cancellation)");
    }
}

/// Per-portal figures over stored listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortalStatistics {
    pub listings: u64,
    pub routes: u64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub average_price: Option<f64>,
    /// Listings with a known star rating
    pub rated: u64,
}

/// Summary of the stored listings
#[derive(Debug, Clone, Default)]
pub struct ListingStatistics {
    pub total_listings: u64,
    pub by_portal: BTreeMap<String, PortalStatistics>,
    pub by_departure: BTreeMap<&'static str, u64>,
}

/// Computes statistics over stored listings
pub fn compute_statistics(listings: &[StoredListing]) -> ListingStatistics {
    let mut stats = ListingStatistics {
        total_listings: listings.len() as u64,
        ..ListingStatistics::default()
    };
    let mut routes: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut price_sums: BTreeMap<&str, f64> = BTreeMap::new();

    for stored in listings {
        let listing = &stored.listing;
        let portal = stats.by_portal.entry(listing.portal.clone()).or_default();

        portal.listings += 1;
        portal.min_price = Some(portal.min_price.map_or(listing.price, |p| p.min(listing.price)));
        portal.max_price = Some(portal.max_price.map_or(listing.price, |p| p.max(listing.price)));
        if listing.star_rating.is_some() {
            portal.rated += 1;
        }

        *price_sums.entry(listing.portal.as_str()).or_insert(0.0) += listing.price;
        let seen = routes.entry(listing.portal.as_str()).or_default();
        if !seen.contains(&listing.route_name.as_str()) {
            seen.push(listing.route_name.as_str());
        }

        let bucket = DepartureBucket::of_departure(&listing.departure_time)
            .map(|b| b.as_str())
            .unwrap_or("unknown");
        *stats.by_departure.entry(bucket).or_insert(0) += 1;
    }

    for (name, portal) in stats.by_portal.iter_mut() {
        portal.routes = routes.get(name.as_str()).map_or(0, |r| r.len() as u64);
        if portal.listings > 0 {
            portal.average_price = price_sums
                .get(name.as_str())
                .map(|sum| sum / portal.listings as f64);
        }
    }

    stats
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ListingStatistics) {
    println!("=== Listing Statistics ===\n");

    println!("Overview:");
    println!("  Total listings: {}", stats.total_listings);
    println!("  Portals: {}", stats.by_portal.len());
    println!();

    println!("By Portal:");
    for (name, portal) in &stats.by_portal {
        println!(
            "  {}: {} listing(s) on {} route(s), fare {:.0}-{:.0} (avg {:.2}), {} rated",
            name,
            portal.listings,
            portal.routes,
            portal.min_price.unwrap_or_default(),
            portal.max_price.unwrap_or_default(),
            portal.average_price.unwrap_or_default(),
            portal.rated
        );
    }
    println!();

    if !stats.by_departure.is_empty() {
        println!("By Departure:");
        for (bucket, count) in &stats.by_departure {
            let percentage = if stats.total_listings > 0 {
                (*count as f64 / stats.total_listings as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", bucket, count, percentage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::BusListing;

    fn stored(
        portal: &str,
        route: &str,
        price: f64,
        departure: &str,
        rating: Option<f64>,
    ) -> StoredListing {
        StoredListing::from_listing(BusListing {
            portal: portal.to_string(),
            route_name: route.to_string(),
            route_url: "https://portal.test/r".to_string(),
            operator_name: "Operator".to_string(),
            bus_type: "Seater".to_string(),
            departure_time: departure.to_string(),
            duration: "03h 00m".to_string(),
            arrival_time: "00:00".to_string(),
            star_rating: rating,
            price,
            seats_available: None,
        })
        .unwrap()
    }

    #[test]
    fn test_compute_statistics() {
        let listings = vec![
            stored("Kerala", "Kochi to Kannur", 400.0, "07:00", Some(4.0)),
            stored("Kerala", "Kochi to Kannur", 600.0, "21:00", None),
            stored("Kerala", "Kannur to Kochi", 500.0, "13:00", None),
            stored("Goa", "Panaji to Margao", 90.0, "02:30", Some(3.0)),
        ];

        let stats = compute_statistics(&listings);

        assert_eq!(stats.total_listings, 4);
        let kerala = &stats.by_portal["Kerala"];
        assert_eq!(kerala.listings, 3);
        assert_eq!(kerala.routes, 2);
        assert_eq!(kerala.min_price, Some(400.0));
        assert_eq!(kerala.max_price, Some(600.0));
        assert_eq!(kerala.average_price, Some(500.0));
        assert_eq!(kerala.rated, 1);
        assert_eq!(stats.by_departure["night"], 1);
        assert_eq!(stats.by_departure["evening"], 1);
    }

    #[test]
    fn test_compute_statistics_empty() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.total_listings, 0);
        assert!(stats.by_portal.is_empty());
    }
}

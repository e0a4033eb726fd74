//! Read access to persisted listings
//!
//! Listings are read back from the relational sink, or from the flat file
//! when no database has been written, and filtered with a [`ListingFilter`].

mod filter;

pub use filter::{DepartureBucket, ListingFilter, ParseBucketError};

use crate::config::OutputConfig;
use crate::listing::BusListing;
use crate::sink::{CsvSink, SinkResult, SqliteSink};
use std::path::Path;

/// A persisted listing with its route split into cities
#[derive(Debug, Clone, PartialEq)]
pub struct StoredListing {
    pub from_city: String,
    pub to_city: String,
    pub listing: BusListing,
}

impl StoredListing {
    /// Returns `None` when the route name has no `<from> to <to>` split
    pub fn from_listing(listing: BusListing) -> Option<Self> {
        let (from_city, to_city) = listing.cities()?;
        Some(Self {
            from_city,
            to_city,
            listing,
        })
    }
}

/// Loads every stored listing
///
/// The database is preferred; the CSV file is read when the database is
/// missing or holds no rows.
pub fn load_listings(output: &OutputConfig) -> SinkResult<Vec<StoredListing>> {
    if let Some(database_path) = &output.database_path {
        let path = Path::new(database_path);
        if path.exists() {
            let rows = SqliteSink::open(path)?.load_all()?;
            if !rows.is_empty() {
                tracing::debug!("Loaded {} listing(s) from {}", rows.len(), path.display());
                return Ok(rows.into_iter().filter_map(StoredListing::from_listing).collect());
            }
        }
    }

    if let Some(csv_path) = &output.csv_path {
        let rows = CsvSink::new(csv_path).load_all()?;
        tracing::debug!("Loaded {} listing(s) from {}", rows.len(), csv_path);
        return Ok(rows.into_iter().filter_map(StoredListing::from_listing).collect());
    }

    Ok(Vec::new())
}

/// Applies `filter`, keeping stored order
pub fn query<'a>(listings: &'a [StoredListing], filter: &ListingFilter) -> Vec<&'a StoredListing> {
    listings.iter().filter(|l| filter.matches(l)).collect()
}

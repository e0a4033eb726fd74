//! Record types flowing through the crawl pipeline
//!
//! Data moves strictly downward: a [`Portal`] yields [`RouteRef`]s, each route
//! yields bus entries, and every bus entry that satisfies the required-field
//! contract becomes one [`BusListing`].

/// One operator's booking micro-site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portal {
    /// Display name, persisted as the `state` column
    pub name: String,

    /// First listing page of the portal
    pub entry_url: String,
}

impl Portal {
    pub fn new(name: impl Into<String>, entry_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entry_url: entry_url.into(),
        }
    }
}

/// A discovered route waiting for detail extraction
///
/// Duplicates across listing pages are possible and are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRef {
    pub portal: String,
    pub route_name: String,
    pub route_url: String,
}

/// The bus-specific part of a listing, as read from one bus entry
#[derive(Debug, Clone, PartialEq)]
pub struct BusFields {
    pub operator_name: String,
    pub bus_type: String,
    pub departure_time: String,
    pub duration: String,
    pub arrival_time: String,
    /// `None` means the rating was not shown (unknown, not zero)
    pub star_rating: Option<f64>,
    pub price: f64,
    /// `None` means the seat count was not shown (unknown, not zero)
    pub seats_available: Option<u32>,
}

/// The normalized, persisted record for one bus service on one route
#[derive(Debug, Clone, PartialEq)]
pub struct BusListing {
    pub portal: String,
    pub route_name: String,
    pub route_url: String,
    pub operator_name: String,
    pub bus_type: String,
    pub departure_time: String,
    pub duration: String,
    pub arrival_time: String,
    pub star_rating: Option<f64>,
    pub price: f64,
    pub seats_available: Option<u32>,
}

impl BusListing {
    /// Tags extracted bus fields with the route they were found on
    pub fn from_parts(route: &RouteRef, fields: BusFields) -> Self {
        Self {
            portal: route.portal.clone(),
            route_name: route.route_name.clone(),
            route_url: route.route_url.clone(),
            operator_name: fields.operator_name,
            bus_type: fields.bus_type,
            departure_time: fields.departure_time,
            duration: fields.duration,
            arrival_time: fields.arrival_time,
            star_rating: fields.star_rating,
            price: fields.price,
            seats_available: fields.seats_available,
        }
    }

    /// Origin and destination derived from the route name
    pub fn cities(&self) -> Option<(String, String)> {
        split_route_name(&self.route_name)
    }
}

/// Separator between origin and destination in a route name
pub const ROUTE_SEPARATOR: &str = " to ";

/// Splits a route name such as `"Kochi to Bangalore"` into its two cities
///
/// Only the first separator counts. Returns `None` unless both trimmed parts
/// are non-empty.
pub fn split_route_name(route_name: &str) -> Option<(String, String)> {
    let (from, to) = route_name.split_once(ROUTE_SEPARATOR)?;
    let (from, to) = (from.trim(), to.trim());

    if from.is_empty() || to.is_empty() {
        return None;
    }

    Some((from.to_string(), to.to_string()))
}

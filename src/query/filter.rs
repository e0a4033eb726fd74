use crate::query::StoredListing;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Time-of-day bucket of a departure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepartureBucket {
    /// 06:00 to 11:59
    Morning,
    /// 12:00 to 17:59
    Afternoon,
    /// 18:00 to 23:59
    Evening,
    /// 00:00 to 05:59
    Night,
}

impl DepartureBucket {
    pub fn from_hour(hour: u32) -> Option<Self> {
        match hour {
            0..=5 => Some(Self::Night),
            6..=11 => Some(Self::Morning),
            12..=17 => Some(Self::Afternoon),
            18..=23 => Some(Self::Evening),
            _ => None,
        }
    }

    /// Buckets a departure time such as `"06:30"` by its hour
    pub fn of_departure(departure_time: &str) -> Option<Self> {
        let hour = departure_time.trim().split(':').next()?.trim();
        Self::from_hour(hour.parse().ok()?)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Morning, Self::Afternoon, Self::Evening, Self::Night]
    }
}

impl fmt::Display for DepartureBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown departure bucket '{0}' (expected morning, afternoon, evening or night)")]
pub struct ParseBucketError(String);

impl FromStr for DepartureBucket {
    type Err = ParseBucketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|bucket| bucket.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseBucketError(s.to_string()))
    }
}

/// Predicates over stored listings; unset fields match everything
///
/// City and operator names compare case-insensitively as whole values; the bus
/// type matches as a case-insensitive substring. A listing with an unknown
/// rating or seat count never satisfies a rating or seat bound.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub from_city: Option<String>,
    pub to_city: Option<String>,
    pub bus_name: Option<String>,
    pub bus_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub min_seats: Option<u32>,
    pub departure: Option<DepartureBucket>,
}

impl ListingFilter {
    pub fn matches(&self, stored: &StoredListing) -> bool {
        let listing = &stored.listing;

        same_text(&self.from_city, &stored.from_city)
            && same_text(&self.to_city, &stored.to_city)
            && same_text(&self.bus_name, &listing.operator_name)
            && self.bus_type.as_ref().map_or(true, |wanted| {
                listing
                    .bus_type
                    .to_lowercase()
                    .contains(&wanted.to_lowercase())
            })
            && self.min_price.map_or(true, |min| listing.price >= min)
            && self.max_price.map_or(true, |max| listing.price <= max)
            && known_at_least(self.min_rating, listing.star_rating)
            && self.max_rating.map_or(true, |max| {
                listing.star_rating.is_some_and(|rating| rating <= max)
            })
            && self.min_seats.map_or(true, |min| {
                listing.seats_available.is_some_and(|seats| seats >= min)
            })
            && self.departure.map_or(true, |bucket| {
                DepartureBucket::of_departure(&listing.departure_time) == Some(bucket)
            })
    }
}

fn same_text(wanted: &Option<String>, actual: &str) -> bool {
    wanted
        .as_ref()
        .map_or(true, |w| w.trim().to_lowercase() == actual.trim().to_lowercase())
}

fn known_at_least(min: Option<f64>, value: Option<f64>) -> bool {
    min.map_or(true, |min| value.is_some_and(|v| v >= min))
}

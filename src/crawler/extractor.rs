//! Field extraction from one bus entry
//!
//! The required-field contract: operator name, bus type, departure time,
//! duration, arrival time and fare must all be present and non-empty, and the
//! fare must parse as a number. Anything else drops the entry. Star rating and
//! seat count are optional and stay unknown when absent or unreadable.

use crate::browser::Locator;
use crate::crawler::detail::RawBusSnapshot;
use crate::crawler::SelectorSet;
use crate::listing::BusFields;
use std::fmt;

/// Why a bus entry did not become a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dropped {
    MissingRequiredField(&'static str),
    UnparseableFare(String),
}

impl Dropped {
    /// Stable reason code used in run reports
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingRequiredField(_) => "missing-required-field",
            Self::UnparseableFare(_) => "unparseable-fare",
        }
    }
}

impl fmt::Display for Dropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredField(field) => write!(f, "missing required field '{}'", field),
            Self::UnparseableFare(text) => write!(f, "unparseable fare '{}'", text),
        }
    }
}

/// Reads one bus entry into [`BusFields`]
pub fn extract(
    snapshot: &RawBusSnapshot<'_>,
    selectors: &SelectorSet,
) -> Result<BusFields, Dropped> {
    let required = |locator: &Locator, field: &'static str| {
        snapshot
            .text(locator)
            .ok_or(Dropped::MissingRequiredField(field))
    };

    let operator_name = required(&selectors.operator_name, "operator_name")?;
    let bus_type = required(&selectors.bus_type, "bus_type")?;
    let departure_time = required(&selectors.departure_time, "departure_time")?;
    let duration = required(&selectors.duration, "duration")?;
    let arrival_time = required(&selectors.arrival_time, "arrival_time")?;
    let fare_text = required(&selectors.fare, "price")?;

    let price = parse_fare(&fare_text).ok_or(Dropped::UnparseableFare(fare_text))?;

    let star_rating = snapshot
        .text(&selectors.star_rating)
        .and_then(|text| parse_rating(&text));
    let seats_available = snapshot
        .text(&selectors.seats_left)
        .and_then(|text| parse_seats(&text));

    Ok(BusFields {
        operator_name,
        bus_type,
        departure_time,
        duration,
        arrival_time,
        star_rating,
        price,
        seats_available,
    })
}

/// Parses a displayed fare such as `"INR 549"` or `"Starts from ₹1,299"`
///
/// The amount is the last whitespace-separated token with any currency marks
/// around it removed and thousands separators dropped.
pub fn parse_fare(text: &str) -> Option<f64> {
    let token = text.split_whitespace().last()?;
    let amount = token
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .trim_end_matches(|c: char| !c.is_ascii_digit())
        .replace(',', "");

    let price: f64 = amount.parse().ok()?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Parses a star rating from the first token of its text
pub fn parse_rating(text: &str) -> Option<f64> {
    let rating: f64 = text.split_whitespace().next()?.parse().ok()?;
    rating.is_finite().then_some(rating)
}

/// Parses a seat count such as `"12 Seats left"`
pub fn parse_seats(text: &str) -> Option<u32> {
    text.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::crawler::DetailPage;
    use crate::listing::RouteRef;

    fn selectors() -> SelectorSet {
        SelectorSet::compile(&SelectorConfig::default()).unwrap()
    }

    fn page(items: &str) -> DetailPage {
        let route = RouteRef {
            portal: "Kerala".to_string(),
            route_name: "Kochi to Kannur".to_string(),
            route_url: "https://portal.test/route/1".to_string(),
        };
        DetailPage::new(route, format!("<html><body>{}</body></html>", items), true)
    }

    fn bus(fare: &str, extra: &str) -> String {
        format!(
            r#"<div class="bus-item">
                <div class="travels">KSRTC Swift</div>
                <div class="bus-type">Non A/C Seater (2+3)</div>
                <div class="dp-time">06:30</div>
                <div class="dur">05h 10m</div>
                <div class="bp-time">11:40</div>
                <div class="fare">{}</div>
                {}
            </div>"#,
            fare, extra
        )
    }

    fn extract_one(html: &str) -> Result<BusFields, Dropped> {
        let selectors = selectors();
        let page = page(html);
        let parsed = page.parse();
        let snapshot = parsed.snapshots(&selectors).next().unwrap();
        extract(&snapshot, &selectors)
    }

    #[test]
    fn test_extract_complete_entry() {
        let html = bus(
            "INR 549",
            r#"<div class="rating-sec"><div class="rating"><span>4.3</span></div></div>
               <div class="seat-left">12 Seats left</div>"#,
        );

        let fields = extract_one(&html).unwrap();
        assert_eq!(fields.operator_name, "KSRTC Swift");
        assert_eq!(fields.bus_type, "Non A/C Seater (2+3)");
        assert_eq!(fields.departure_time, "06:30");
        assert_eq!(fields.duration, "05h 10m");
        assert_eq!(fields.arrival_time, "11:40");
        assert_eq!(fields.price, 549.0);
        assert_eq!(fields.star_rating, Some(4.3));
        assert_eq!(fields.seats_available, Some(12));
    }

    #[test]
    fn test_missing_rating_and_prefixed_fare() {
        let fields = extract_one(&bus("Starts from ₹549", "")).unwrap();
        assert_eq!(fields.star_rating, None);
        assert_eq!(fields.seats_available, None);
        assert_eq!(fields.price, 549.0);
    }

    #[test]
    fn test_missing_required_field_drops_entry() {
        let html = r#"<div class="bus-item">
            <div class="travels">KSRTC</div>
            <div class="dp-time">06:30</div>
            <div class="dur">05h 10m</div>
            <div class="bp-time">11:40</div>
            <div class="fare">INR 549</div>
        </div>"#;

        let dropped = extract_one(html).unwrap_err();
        assert_eq!(dropped, Dropped::MissingRequiredField("bus_type"));
        assert_eq!(dropped.reason(), "missing-required-field");
    }

    #[test]
    fn test_blank_required_field_drops_entry() {
        let html = bus("INR 549", "").replace("KSRTC Swift", "   ");
        assert_eq!(
            extract_one(&html).unwrap_err(),
            Dropped::MissingRequiredField("operator_name")
        );
    }

    #[test]
    fn test_unparseable_fare_drops_entry() {
        let dropped = extract_one(&bus("Sold out", "")).unwrap_err();
        assert_eq!(dropped, Dropped::UnparseableFare("Sold out".to_string()));
        assert_eq!(dropped.reason(), "unparseable-fare");
    }

    #[test]
    fn test_parse_fare() {
        assert_eq!(parse_fare("INR 549"), Some(549.0));
        assert_eq!(parse_fare("₹549"), Some(549.0));
        assert_eq!(parse_fare("Starts from ₹1,299"), Some(1299.0));
        assert_eq!(parse_fare("Rs.499.50"), Some(499.5));
        assert_eq!(parse_fare("INR 720/-"), Some(720.0));
        assert_eq!(parse_fare("INR"), None);
        assert_eq!(parse_fare(""), None);
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("4.5"), Some(4.5));
        assert_eq!(parse_rating("3.9 (120)"), Some(3.9));
        assert_eq!(parse_rating("New"), None);
    }

    #[test]
    fn test_parse_seats() {
        assert_eq!(parse_seats("12 Seats left"), Some(12));
        assert_eq!(parse_seats("1 Seat left"), Some(1));
        assert_eq!(parse_seats("Single seat left"), None);
    }
}

use crate::browser::Locator;
use crate::config::SelectorConfig;
use crate::ConfigError;

/// Compiled selectors for every element the crawl reads
#[derive(Debug, Clone)]
pub struct SelectorSet {
    pub route_container: Locator,
    pub route_entry: Locator,
    pub route_link: Locator,
    pub page_control: Locator,
    pub reveal_control: Locator,
    pub bus_item: Locator,
    pub operator_name: Locator,
    pub bus_type: Locator,
    pub departure_time: Locator,
    pub duration: Locator,
    pub arrival_time: Locator,
    pub star_rating: Locator,
    pub fare: Locator,
    pub seats_left: Locator,
}

impl SelectorSet {
    /// Compiles every configured selector, failing on the first invalid one
    pub fn compile(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            route_container: Locator::parse(&config.route_container)?,
            route_entry: Locator::parse(&config.route_entry)?,
            route_link: Locator::parse(&config.route_link)?,
            page_control: Locator::parse(&config.page_control)?,
            reveal_control: Locator::parse(&config.reveal_control)?,
            bus_item: Locator::parse(&config.bus_item)?,
            operator_name: Locator::parse(&config.operator_name)?,
            bus_type: Locator::parse(&config.bus_type)?,
            departure_time: Locator::parse(&config.departure_time)?,
            duration: Locator::parse(&config.duration)?,
            arrival_time: Locator::parse(&config.arrival_time)?,
            star_rating: Locator::parse(&config.star_rating)?,
            fare: Locator::parse(&config.fare)?,
            seats_left: Locator::parse(&config.seats_left)?,
        })
    }
}

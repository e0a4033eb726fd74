//! Route detail fetching
//!
//! Opens a route's detail page in a fresh session, reveals the bus list if
//! the page hides it behind a control, and keeps the rendered document. The
//! bus entries of a [`DetailPage`] are read through [`ParsedDetail`], whose
//! [`RawBusSnapshot`]s borrow the parsed document and cannot outlive it.

use crate::browser::{Browser, BrowserError, Locator};
use crate::config::CrawlerConfig;
use crate::crawler::{settle, SelectorSet};
use crate::listing::RouteRef;
use scraper::{ElementRef, Html};
use std::time::Duration;
use thiserror::Error;

/// Failures that lose a whole route
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Failed to load route {url}: {source}")]
    Browser {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("Route {url} did not finish within {after:?}")]
    Timeout { url: String, after: Duration },
}

impl RouteError {
    /// Returns true if another attempt at the route may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Browser { source, .. } => source.is_transient(),
            Self::Timeout { .. } => true,
        }
    }
}

/// A route's rendered detail page
#[derive(Debug, Clone)]
pub struct DetailPage {
    route: RouteRef,
    html: String,
    items_rendered: bool,
}

impl DetailPage {
    pub fn new(route: RouteRef, html: String, items_rendered: bool) -> Self {
        Self {
            route,
            html,
            items_rendered,
        }
    }

    pub fn route(&self) -> &RouteRef {
        &self.route
    }

    /// False if no bus entry rendered within the element wait
    pub fn has_items(&self) -> bool {
        self.items_rendered
    }

    pub fn parse(&self) -> ParsedDetail {
        ParsedDetail {
            document: Html::parse_document(&self.html),
            items_rendered: self.items_rendered,
        }
    }
}

/// A parsed detail page
pub struct ParsedDetail {
    document: Html,
    items_rendered: bool,
}

impl ParsedDetail {
    /// Bus entries in document order
    pub fn snapshots<'a>(
        &'a self,
        selectors: &'a SelectorSet,
    ) -> impl Iterator<Item = RawBusSnapshot<'a>> + 'a {
        self.document
            .select(selectors.bus_item.selector())
            .filter(move |_| self.items_rendered)
            .map(|element| RawBusSnapshot { element })
    }
}

/// One bus entry, read-only and only valid while its page is parsed
#[derive(Clone, Copy)]
pub struct RawBusSnapshot<'a> {
    element: ElementRef<'a>,
}

impl<'a> RawBusSnapshot<'a> {
    /// Whitespace-normalized text of the first element matching `locator`
    /// inside this entry
    ///
    /// Returns `None` if nothing matches or the text is empty.
    pub fn text(&self, locator: &Locator) -> Option<String> {
        let element = self.element.select(locator.selector()).next()?;
        let text = element
            .text()
            .flat_map(str::split_whitespace)
            .collect::<Vec<_>>()
            .join(" ");

        (!text.is_empty()).then_some(text)
    }
}

/// Loads a route's detail page and waits for its bus entries
///
/// A missing or inert reveal control is not an error; the page is read as it
/// is. Bus entries that never render give a page with no entries.
pub async fn fetch_detail(
    browser: &dyn Browser,
    route: &RouteRef,
    selectors: &SelectorSet,
    timing: &CrawlerConfig,
) -> Result<DetailPage, RouteError> {
    let browser_error = |source| RouteError::Browser {
        url: route.route_url.clone(),
        source,
    };

    let mut session = browser.open_session();
    session.goto(&route.route_url).await.map_err(browser_error)?;
    settle(timing.load_settle()).await;

    match session
        .wait_for(&selectors.reveal_control, timing.reveal_wait())
        .await
    {
        Ok(true) => match session.click(&selectors.reveal_control, 0).await {
            Ok(()) => settle(timing.load_settle()).await,
            Err(e) => tracing::debug!(
                "Reveal control on {} could not be activated: {}",
                route.route_name,
                e
            ),
        },
        Ok(false) => tracing::debug!("No reveal control on {}", route.route_name),
        Err(e) => tracing::debug!(
            "Error while looking for reveal control on {}: {}",
            route.route_name,
            e
        ),
    }

    let items_rendered = session
        .wait_for(&selectors.bus_item, timing.element_wait())
        .await
        .map_err(browser_error)?;

    if !items_rendered {
        tracing::info!("No bus entries rendered for route {}", route.route_name);
    }

    Ok(DetailPage::new(
        route.clone(),
        session.html().to_string(),
        items_rendered,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::crawler::testing::StaticBrowser;

    fn selectors() -> SelectorSet {
        SelectorSet::compile(&SelectorConfig::default()).unwrap()
    }

    fn timing() -> CrawlerConfig {
        CrawlerConfig {
            element_wait_ms: 10,
            reveal_wait_ms: 10,
            ..CrawlerConfig::default()
        }
    }

    fn route(url: &str) -> RouteRef {
        RouteRef {
            portal: "Kerala".to_string(),
            route_name: "Kochi to Kannur".to_string(),
            route_url: url.to_string(),
        }
    }

    const BUSES: &str = r#"<html><body>
        <div class="bus-item"><div class="travels">  KSRTC
            Swift </div></div>
        <div class="bus-item"><div class="travels"></div></div>
    </body></html>"#;

    #[tokio::test]
    async fn test_reveal_control_is_followed() {
        let browser = StaticBrowser::new()
            .page(
                "https://portal.test/route/1",
                r#"<a class="button" href="/route/1/buses">View Buses</a>"#,
            )
            .page("https://portal.test/route/1/buses", BUSES);

        let page = fetch_detail(
            &browser,
            &route("https://portal.test/route/1"),
            &selectors(),
            &timing(),
        )
        .await
        .unwrap();

        assert!(page.has_items());
        let selectors = selectors();
        let parsed = page.parse();
        assert_eq!(parsed.snapshots(&selectors).count(), 2);
    }

    #[tokio::test]
    async fn test_without_reveal_control() {
        let browser = StaticBrowser::new().page("https://portal.test/route/2", BUSES);

        let page = fetch_detail(
            &browser,
            &route("https://portal.test/route/2"),
            &selectors(),
            &timing(),
        )
        .await
        .unwrap();

        assert!(page.has_items());
    }

    #[tokio::test]
    async fn test_inert_reveal_control_is_not_fatal() {
        let html = format!(
            r#"<a class="button" href="javascript:void(0)">View Buses</a>{}"#,
            BUSES
        );
        let browser = StaticBrowser::new().page("https://portal.test/route/3", &html);

        let page = fetch_detail(
            &browser,
            &route("https://portal.test/route/3"),
            &selectors(),
            &timing(),
        )
        .await
        .unwrap();

        assert!(page.has_items());
    }

    #[tokio::test]
    async fn test_no_bus_entries() {
        let browser = StaticBrowser::new()
            .page("https://portal.test/route/4", "<p>No buses found</p>");

        let page = fetch_detail(
            &browser,
            &route("https://portal.test/route/4"),
            &selectors(),
            &timing(),
        )
        .await
        .unwrap();

        assert!(!page.has_items());
        let selectors = selectors();
        assert_eq!(page.parse().snapshots(&selectors).count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_route() {
        let browser = StaticBrowser::new();
        let result = fetch_detail(
            &browser,
            &route("https://portal.test/route/404"),
            &selectors(),
            &timing(),
        )
        .await;

        match result {
            Err(e @ RouteError::Browser { .. }) => assert!(!e.is_transient()),
            other => panic!("expected browser error, got {:?}", other.map(|p| p.has_items())),
        }
    }

    #[test]
    fn test_snapshot_text_normalizes_whitespace() {
        let selectors = selectors();
        let page = DetailPage::new(route("https://portal.test/r"), BUSES.to_string(), true);
        let parsed = page.parse();
        let snapshots: Vec<_> = parsed.snapshots(&selectors).collect();

        assert_eq!(
            snapshots[0].text(&selectors.operator_name).as_deref(),
            Some("KSRTC Swift")
        );
        assert_eq!(snapshots[1].text(&selectors.operator_name), None);
        assert_eq!(snapshots[0].text(&selectors.fare), None);
    }
}

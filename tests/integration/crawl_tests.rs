//! Integration tests for the crawler
//!
//! These tests use wiremock to serve portal listing pages and route detail
//! pages, and run full crawls into temporary CSV and SQLite sinks.

use fare_harvest::config::{
    load_config_with_hash, BrowserConfig, Config, CrawlerConfig, OutputConfig, PortalEntry,
    SelectorConfig,
};
use fare_harvest::crawler::{run_crawl, CancelFlag, Coordinator};
use fare_harvest::query::{load_listings, query, ListingFilter};
use fare_harvest::sink::{CsvSink, SqliteSink};
use fare_harvest::PortalState;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with short waits and no retries
fn create_test_config(portals: Vec<(&str, String)>, dir: &TempDir) -> Config {
    Config {
        crawler: CrawlerConfig {
            element_wait_ms: 200,
            reveal_wait_ms: 50,
            poll_interval_ms: 20,
            page_settle_ms: 0,
            load_settle_ms: 0,
            route_timeout_ms: 5_000,
            max_pages: 10,
            max_concurrent_routes: 2,
            max_retries: 0,
            retry_backoff_ms: 10,
        },
        browser: BrowserConfig::default(),
        selectors: SelectorConfig::default(),
        output: OutputConfig {
            csv_path: Some(dir.path().join("bus_data.csv").display().to_string()),
            database_path: Some(dir.path().join("bus_data.db").display().to_string()),
            summary_path: Some(dir.path().join("summary.md").display().to_string()),
            sink_retries: 0,
        },
        portals: portals
            .into_iter()
            .map(|(name, url)| PortalEntry {
                name: name.to_string(),
                url,
            })
            .collect(),
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

/// A listing page laid out the way the portals render it
fn listing_page(routes: &[(&str, &str)], pages: &[&str]) -> String {
    let entries: String = routes
        .iter()
        .map(|(name, href)| {
            format!(
                r#"<div class="route_link"><a href="{}" title="{}">{}</a></div>"#,
                href, name, name
            )
        })
        .collect();
    let tabs: String = pages
        .iter()
        .enumerate()
        .map(|(i, href)| {
            format!(
                r#"<div class="DC_117_pageTabs"><a href="{}">{}</a></div>"#,
                href,
                i + 1
            )
        })
        .collect();

    format!(
        r#"<html><body><div id="root"><div>
            <div class="header"></div><div class="search"></div><div class="banner"></div>
            <div class="routes">{}</div>
            <div class="pager">{}</div>
        </div></div></body></html>"#,
        entries, tabs
    )
}

struct Bus<'a> {
    operator: &'a str,
    bus_type: Option<&'a str>,
    departs: &'a str,
    fare: &'a str,
    rating: Option<&'a str>,
    seats: Option<&'a str>,
}

impl<'a> Bus<'a> {
    fn new(operator: &'a str, departs: &'a str, fare: &'a str) -> Self {
        Self {
            operator,
            bus_type: Some("Non A/C Seater (2+3)"),
            departs,
            fare,
            rating: Some("4.2"),
            seats: Some("23 Seats left"),
        }
    }

    fn render(&self) -> String {
        let optional = |class: &str, value: Option<&str>| {
            value
                .map(|v| format!(r#"<div class="{}">{}</div>"#, class, v))
                .unwrap_or_default()
        };
        format!(
            r#"<div class="bus-item">
                <div class="travels">{}</div>
                {}
                <div class="dp-time">{}</div>
                <div class="dur">04h 30m</div>
                <div class="bp-time">23:59</div>
                {}
                <div class="fare">{}</div>
                {}
            </div>"#,
            self.operator,
            optional("bus-type", self.bus_type),
            self.departs,
            self.rating
                .map(|r| {
                    format!(
                        concat!(
                            r#"<div class="rating-sec"><div class="rating">"#,
                            r#"<span>{}</span></div></div>"#
                        ),
                        r
                    )
                })
                .unwrap_or_default(),
            self.fare,
            optional("seat-left", self.seats),
        )
    }
}

fn detail_page(buses: &[Bus<'_>]) -> String {
    let items: String = buses.iter().map(Bus::render).collect();
    format!(
        r#"<html><body><div class="bus-list">{}</div></body></html>"#,
        items
    )
}

async fn mount_page(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Mounts a two-page Kerala portal with five routes and ten buses, two of
/// which lack a bus type
async fn mount_kerala(server: &MockServer) {
    let pages = ["/kerala/", "/kerala/page-2"];
    mount_page(
        server,
        "/kerala/",
        listing_page(
            &[
                ("Kochi to Kannur", "/route/1"),
                ("Kannur to Kochi", "/route/2"),
                ("Kochi to Bangalore", "/route/3"),
            ],
            &pages,
        ),
    )
    .await;
    mount_page(
        server,
        "/kerala/page-2",
        listing_page(
            &[
                ("Trivandrum to Kochi", "/route/4"),
                ("Kozhikode to Mysore", "/route/5"),
            ],
            &pages,
        ),
    )
    .await;

    let untyped = |operator, departs| Bus {
        bus_type: None,
        ..Bus::new(operator, departs, "INR 300")
    };

    mount_page(
        server,
        "/route/1",
        detail_page(&[
            Bus::new("KSRTC Swift", "06:00", "INR 420"),
            Bus::new("KSRTC", "21:30", "INR 390"),
        ]),
    )
    .await;
    mount_page(
        server,
        "/route/2",
        detail_page(&[
            Bus::new("KSRTC", "07:15", "INR 400"),
            untyped("KSRTC Fast", "09:00"),
        ]),
    )
    .await;

    // The operator buses only render after the reveal control is followed
    mount_page(
        server,
        "/route/3",
        r#"<html><body><a class="button" href="/route/3/buses">View Buses</a></body></html>"#
            .to_string(),
    )
    .await;
    mount_page(
        server,
        "/route/3/buses",
        detail_page(&[
            Bus::new("KSRTC Swift", "20:00", "INR 1,150"),
            Bus::new("KSRTC Airavat", "22:00", "INR 1,320"),
        ]),
    )
    .await;

    mount_page(
        server,
        "/route/4",
        detail_page(&[
            untyped("KSRTC", "05:00"),
            Bus::new("KSRTC Minnal", "13:45", "INR 350"),
        ]),
    )
    .await;
    mount_page(
        server,
        "/route/5",
        detail_page(&[
            Bus::new("KSRTC", "12:30", "INR 600"),
            Bus {
                rating: None,
                seats: None,
                ..Bus::new("KSRTC Super Deluxe", "16:00", "Starts from ₹549")
            },
        ]),
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_single_portal() {
    let server = MockServer::start().await;
    mount_kerala(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![("Kerala", format!("{}/kerala/", server.uri()))], &dir);
    let output = config.output.clone();

    let run = run_crawl(config, Some("test-hash".to_string()), CancelFlag::new())
        .await
        .expect("crawl should succeed");

    assert_eq!(run.status(), "completed");
    assert_eq!(run.portals.len(), 1);
    let kerala = &run.portals[0];
    assert_eq!(kerala.state, PortalState::Done);
    assert_eq!(kerala.pages, 2);
    assert_eq!(kerala.routes_found, 5);
    assert_eq!(kerala.listings(), 8);
    assert_eq!(kerala.dropped(), 2);
    assert_eq!(run.drop_reasons()["missing-required-field"], 2);

    // Output follows route order, then rendered order within a route
    let operators: Vec<_> = run
        .listings()
        .iter()
        .map(|l| l.operator_name.as_str())
        .collect();
    assert_eq!(
        operators,
        vec![
            "KSRTC Swift",
            "KSRTC",
            "KSRTC",
            "KSRTC Swift",
            "KSRTC Airavat",
            "KSRTC Minnal",
            "KSRTC",
            "KSRTC Super Deluxe",
        ]
    );

    let csv_rows = CsvSink::new(output.csv_path.as_ref().unwrap())
        .load_all()
        .unwrap();
    assert_eq!(csv_rows.len(), 8);
    assert_eq!(csv_rows[3].price, 1150.0);

    let db = SqliteSink::open(Path::new(output.database_path.as_ref().unwrap())).unwrap();
    assert_eq!(db.count().unwrap(), 8);

    let summary = std::fs::read_to_string(output.summary_path.as_ref().unwrap()).unwrap();
    assert!(summary.contains("| Kerala | done | 2 | 5 | 8 | 2 | 0 |"));
    assert!(summary.contains("- **Config Hash**: test-hash"));
}

#[tokio::test]
async fn test_fare_with_prefix_and_unknown_rating() {
    let server = MockServer::start().await;
    mount_kerala(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![("Kerala", format!("{}/kerala/", server.uri()))], &dir);
    let output = config.output.clone();

    run_crawl(config, None, CancelFlag::new()).await.unwrap();

    let csv = std::fs::read_to_string(output.csv_path.as_ref().unwrap()).unwrap();
    let deluxe = csv
        .lines()
        .find(|line| line.contains("KSRTC Super Deluxe"))
        .expect("row for the deluxe service");
    assert!(deluxe.contains("N/A"));

    let listings = load_listings(&output).unwrap();
    let filter = ListingFilter {
        bus_name: Some("ksrtc super deluxe".to_string()),
        ..ListingFilter::default()
    };
    let found = query(&listings, &filter);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].listing.price, 549.0);
    assert_eq!(found[0].listing.star_rating, None);
    assert_eq!(found[0].listing.seats_available, None);
    assert_eq!(found[0].from_city, "Kozhikode");
    assert_eq!(found[0].to_city, "Mysore");

    // An unknown rating never satisfies a rating bound
    let rated = ListingFilter {
        min_rating: Some(0.0),
        ..filter
    };
    assert!(query(&listings, &rated).is_empty());
}

#[tokio::test]
async fn test_missing_container_fails_only_that_portal() {
    let server = MockServer::start().await;
    mount_kerala(&server).await;
    mount_page(
        &server,
        "/goa/",
        "<html><body><p>Something went wrong</p></body></html>".to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        vec![
            ("Goa", format!("{}/goa/", server.uri())),
            ("Kerala", format!("{}/kerala/", server.uri())),
        ],
        &dir,
    );

    let run = Coordinator::new(config).unwrap().run().await;

    assert_eq!(run.portals[0].portal, "Goa");
    assert_eq!(run.portals[0].state, PortalState::Failed);
    assert!(run.portals[0]
        .failure
        .as_deref()
        .unwrap()
        .contains("never appeared"));
    assert_eq!(run.portals[1].state, PortalState::Done);
    assert_eq!(run.total_listings(), 8);
    assert_eq!(run.failed_portals(), 1);
}

#[tokio::test]
async fn test_route_without_bus_items() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/punjab/",
        listing_page(
            &[
                ("Amritsar to Delhi", "/route/empty"),
                ("Delhi to Amritsar", "/route/missing"),
            ],
            &[],
        ),
    )
    .await;
    mount_page(
        &server,
        "/route/empty",
        "<html><body><p>No buses found</p></body></html>".to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![("Punjab", format!("{}/punjab/", server.uri()))], &dir);
    let output = config.output.clone();

    let run = run_crawl(config, None, CancelFlag::new()).await.unwrap();

    let punjab = &run.portals[0];
    assert_eq!(punjab.state, PortalState::Done);
    assert_eq!(punjab.pages, 1);
    assert_eq!(punjab.routes_found, 2);
    assert_eq!(punjab.listings(), 0);
    // The empty page is not a failure; the 404 route is
    assert!(!punjab.routes[0].is_failed());
    assert!(punjab.routes[1].is_failed());

    let csv_rows = CsvSink::new(output.csv_path.as_ref().unwrap())
        .load_all()
        .unwrap();
    assert!(csv_rows.is_empty());
}

#[tokio::test]
async fn test_cancelled_crawl_still_delivers() {
    let server = MockServer::start().await;
    mount_kerala(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![("Kerala", format!("{}/kerala/", server.uri()))], &dir);
    let output = config.output.clone();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let run = run_crawl(config, None, cancel).await.unwrap();

    assert!(run.cancelled);
    assert_eq!(run.status(), "cancelled");
    assert_eq!(run.total_listings(), 0);
    assert!(Path::new(output.summary_path.as_ref().unwrap()).exists());
}

#[test]
fn test_load_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[crawler]
element-wait-ms = 5000
max-concurrent-routes = 4

[selectors]
bus-item = ".bus-card"

[output]
csv-path = "bus_data.csv"

[[portal]]
name = "Kerala"
url = "https://www.redbus.in/online-booking/ksrtc-kerala/"

[[portal]]
name = "Andhra"
url = "https://www.redbus.in/online-booking/apsrtc/"
"#
    )
    .unwrap();

    let (config, hash) = load_config_with_hash(file.path()).unwrap();

    assert_eq!(hash.len(), 64);
    assert_eq!(config.crawler.element_wait_ms, 5000);
    assert_eq!(config.crawler.max_concurrent_routes, 4);
    assert_eq!(config.crawler.max_pages, 200);
    assert_eq!(config.selectors.bus_item, ".bus-card");
    assert_eq!(config.selectors.fare, ".fare");
    assert_eq!(config.output.database_path, None);
    assert_eq!(config.output.sink_retries, 3);

    let names: Vec<_> = config.portals().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["Kerala", "Andhra"]);
}

#[test]
fn test_load_config_rejects_bad_selector() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[selectors]
fare = "div[["

[output]
csv-path = "bus_data.csv"

[[portal]]
name = "Kerala"
url = "https://www.redbus.in/online-booking/ksrtc-kerala/"
"#
    )
    .unwrap();

    assert!(load_config_with_hash(file.path()).is_err());
}

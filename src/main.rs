//! Fare-Harvest main entry point
//!
//! This is the command-line interface for the Fare-Harvest bus fare crawler.

use anyhow::{Context, Result};
use clap::{Args, Parser};
use fare_harvest::config::{load_config_with_hash, Config};
use fare_harvest::crawler::{run_crawl, CancelFlag};
use fare_harvest::output::{compute_statistics, print_listings, print_run_report, print_statistics};
use fare_harvest::query::{load_listings, query, DepartureBucket, ListingFilter};
use fare_harvest::sink::{CsvSink, RecordSink};
use fare_harvest::CrawlError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fare-Harvest: a bus route and fare crawler
///
/// Fare-Harvest walks the configured operator portals, visits every route
/// they list and stores each bus service with its timings, rating, fare and
/// seat count in a CSV file and/or a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "fare-harvest")]
#[command(version)]
#[command(about = "A bus route and fare crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "query"])]
    dry_run: bool,

    /// Show statistics from the stored listings and exit
    #[arg(long, conflicts_with_all = ["dry_run", "query"])]
    stats: bool,

    /// Filter the stored listings and print the matches
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    query: bool,

    #[command(flatten)]
    filter: QueryArgs,
}

/// Filters applied by `--query`
#[derive(Args, Debug, Default)]
struct QueryArgs {
    /// Departure city
    #[arg(long, requires = "query")]
    from: Option<String>,

    /// Destination city
    #[arg(long, requires = "query")]
    to: Option<String>,

    /// Operator name (exact, case-insensitive)
    #[arg(long, requires = "query")]
    bus_name: Option<String>,

    /// Text contained in the bus type, e.g. "sleeper"
    #[arg(long, requires = "query")]
    bus_type: Option<String>,

    #[arg(long, requires = "query")]
    min_price: Option<f64>,

    #[arg(long, requires = "query")]
    max_price: Option<f64>,

    #[arg(long, requires = "query")]
    min_rating: Option<f64>,

    #[arg(long, requires = "query")]
    max_rating: Option<f64>,

    #[arg(long, requires = "query")]
    min_seats: Option<u32>,

    /// Departure time of day: morning, afternoon, evening or night
    #[arg(long, requires = "query")]
    departure: Option<DepartureBucket>,

    /// Maximum rows printed
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

impl QueryArgs {
    fn to_filter(&self) -> ListingFilter {
        ListingFilter {
            from_city: self.from.clone(),
            to_city: self.to.clone(),
            bus_name: self.bus_name.clone(),
            bus_type: self.bus_type.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            min_seats: self.min_seats,
            departure: self.departure,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.query {
        handle_query(&config, &cli.filter)?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fare_harvest=info,warn"),
            1 => EnvFilter::new("fare_harvest=debug,info"),
            2 => EnvFilter::new("fare_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Fare-Harvest Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Element wait: {}ms", crawler.element_wait_ms);
    println!("  Reveal wait: {}ms", crawler.reveal_wait_ms);
    println!("  Page settle: {}ms", crawler.page_settle_ms);
    println!("  Route timeout: {}ms", crawler.route_timeout_ms);
    println!("  Max pages per portal: {}", crawler.max_pages);
    println!("  Concurrent routes: {}", crawler.max_concurrent_routes);
    println!(
        "  Retries: {} (backoff {}ms, doubled per attempt)",
        crawler.max_retries, crawler.retry_backoff_ms
    );

    println!("\nBrowser:");
    println!("  Renderer: {:?}", config.browser.renderer);
    if let Some(endpoint) = &config.browser.endpoint {
        println!("  Endpoint: {}", endpoint);
    }
    println!("  User agent: {}", config.browser.user_agent);
    if let Some(reload) = config.browser.reload_while_waiting {
        println!("  Reload while waiting: {}", reload);
    }

    println!("\nSinks:");
    if let Some(csv) = &config.output.csv_path {
        println!("  CSV: {}", csv);
    }
    if let Some(db) = &config.output.database_path {
        println!("  Database: {}", db);
    }
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    println!("\nPortals ({}):", config.portals.len());
    for portal in &config.portals {
        println!("  - {}: {}", portal.name, portal.url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} portal(s) in the order above", config.portals.len());
}

/// Handles the --stats mode: shows statistics from the stored listings
fn handle_stats(config: &Config) -> Result<()> {
    let listings = load_listings(&config.output).context("Failed to load stored listings")?;
    let stats = compute_statistics(&listings);
    print_statistics(&stats);
    Ok(())
}

/// Handles the --query mode: prints stored listings matching the filters
fn handle_query(config: &Config, args: &QueryArgs) -> Result<()> {
    let listings = load_listings(&config.output).context("Failed to load stored listings")?;
    let filter = args.to_filter();
    tracing::debug!("Querying {} listing(s) with {:?}", listings.len(), filter);

    let matches = query(&listings, &filter);
    print_listings(&matches, args.limit);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> Result<()> {
    tracing::info!("Portals: {}", config.portals.len());

    let cancel = CancelFlag::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work and saving results");
            signal.cancel();
        }
    });

    match run_crawl(config, Some(config_hash), cancel).await {
        Ok(run) => {
            tracing::info!("Crawl {} with {} listing(s)", run.status(), run.total_listings());
            print_run_report(&run);
            Ok(())
        }
        Err(e @ CrawlError::Sink { .. }) => {
            tracing::error!("Crawl failed: {}", e);
            let message = e.to_string();
            if let Some(run) = e.into_recovered_run() {
                print_run_report(&run);
                save_recovered_run(run.listings())?;
            }
            anyhow::bail!(message)
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Writes listings that no configured sink accepted to a fresh CSV file
fn save_recovered_run(listings: &[fare_harvest::BusListing]) -> Result<()> {
    let path = PathBuf::from(format!(
        "fare-harvest-recovered-{}.csv",
        chrono::Utc::now().format("%Y%m%dT%H%M%S")
    ));
    let mut sink = CsvSink::new(&path);
    sink.append(listings)
        .with_context(|| format!("Failed to save recovered listings to {}", path.display()))?;
    println!(
        "Recovered {} listing(s) to {}",
        listings.len(),
        path.display()
    );
    Ok(())
}

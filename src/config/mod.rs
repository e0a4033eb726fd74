//! Configuration module for Fare-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use fare_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fare-harvest.toml")).unwrap();
//! println!("Portals configured: {}", config.portals.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, OutputConfig, PortalEntry, RendererKind,
    SelectorConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

//! Configuration module for Relay-Payloads
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use relay_payloads::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("relay-payloads.toml")).unwrap();
//! println!("Max concurrent requests: {}", config.fetcher.max_concurrent);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetcherSettings, OutputConfig, RangeConfig, RelaysConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use validation::validate;

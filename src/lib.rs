//! Relay-Payloads: bulk retrieval of MEV-Boost delivered payloads
//!
//! This crate queries one or more relay data APIs for the
//! `proposer_payload_delivered` record of every slot in a range, bounding
//! concurrency and request rate, retrying rate-limited requests with
//! exponential backoff, and assembling one row per (slot, relay) into a
//! single result set.

pub mod catalog;
pub mod config;
pub mod fetch;
pub mod output;
pub mod record;

use thiserror::Error;

pub use output::OutputError;

/// Main error type for Relay-Payloads operations
///
/// Only setup-time and sink-time problems surface here. Per-request failures
/// are folded into null records by the scheduler and never reach the caller.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid slot range: end slot {end} must be greater than start slot {start}")]
    InvalidRange { start: u64, end: u64 },

    #[error("No endpoints to query")]
    NoEndpoints,

    #[error("Invalid endpoint URL {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("Failed to resolve endpoint host {host}: {message}")]
    EndpointResolution { host: String, message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Relay-Payloads operations
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{endpoints, Network, Relay, RelaySelector};
pub use config::Config;
pub use fetch::{BackoffFetcher, Coordinator, Outcome, RunReport, RunStatus, Scheduler};
pub use record::{normalize, PayloadRecord, ResultSet, SlotQuery, SlotRange};

use crate::catalog::{Network, RelaySelector};
use crate::fetch::{FetcherConfig, SchedulerConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Relay-Payloads
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub relays: RelaysConfig,
    pub fetcher: FetcherSettings,
    pub range: RangeConfig,
    pub output: OutputConfig,
}

/// Which endpoints to query
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelaysConfig {
    /// Consensus network
    pub network: Network,

    /// `all` or a single relay id
    pub relay: RelaySelector,
}

/// Throttle and retry settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherSettings {
    /// Maximum requests in flight at once
    pub max_concurrent: u32,

    /// Maximum units submitted per one-second batch
    pub max_per_second: u32,

    /// Retries allowed for a rate-limited request
    pub max_retries: u32,

    /// First backoff delay after HTTP 429 (seconds)
    pub initial_backoff_secs: u64,

    /// Bound on a single request (seconds)
    pub request_timeout_secs: u64,

    /// Pause between batches (milliseconds)
    pub batch_pause_ms: u64,

    /// User-Agent header
    pub user_agent: String,

    /// Resolve endpoint hosts before dispatching
    pub preflight_dns: bool,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        let fetcher = FetcherConfig::default();
        Self {
            max_concurrent: 15,
            max_per_second: 15,
            max_retries: fetcher.max_retries,
            initial_backoff_secs: fetcher.initial_backoff.as_secs(),
            request_timeout_secs: fetcher.request_timeout.as_secs(),
            batch_pause_ms: 1000,
            user_agent: fetcher.user_agent,
            preflight_dns: true,
        }
    }
}

impl FetcherSettings {
    /// Settings for the backoff fetcher
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_secs(self.initial_backoff_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Settings for the scheduler
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent: self.max_concurrent as usize,
            max_per_second: self.max_per_second as usize,
            batch_pause: Duration::from_millis(self.batch_pause_ms),
        }
    }
}

/// Slot range to fetch; latest mode when either end is missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RangeConfig {
    /// First slot (inclusive)
    pub start_slot: Option<u64>,

    /// Last slot (exclusive)
    pub end_slot: Option<u64>,
}

impl RangeConfig {
    /// Both ends, when configured
    pub fn bounds(&self) -> Option<(u64, u64)> {
        self.start_slot.zip(self.end_slot)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory the JSON file is written to
    pub directory: String,

    /// Name of the JSON file
    pub filename: String,

    /// Write the result to disk; otherwise keep it in memory as a table
    pub save_to_file: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "data".to_string(),
            filename: "block_payloads.json".to_string(),
            save_to_file: true,
        }
    }
}

impl OutputConfig {
    /// Full path of the output file
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.directory).join(&self.filename)
    }
}

//! Run coordinator - ties configuration, catalog, scheduler and sink together
//!
//! This module contains the top-level run logic:
//! - Resolving the endpoint list from the catalog
//! - Preflight DNS resolution of endpoint hosts
//! - Choosing range mode or latest mode
//! - Delivering the result set to the configured sink

use crate::catalog::{endpoints, parse_endpoint, resolve_endpoints};
use crate::config::Config;
use crate::fetch::{BackoffFetcher, RunReport, Scheduler};
use crate::output::{JsonFileSink, PayloadSink, PayloadTable, TableSink};
use crate::PayloadError;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Where a run's result set ended up
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Written to a JSON file
    File(PathBuf),
    /// Kept in memory
    Table(PayloadTable),
}

/// Top-level run orchestration
pub struct Coordinator {
    config: Config,
    endpoints: Vec<String>,
    scheduler: Scheduler<BackoffFetcher>,
}

impl Coordinator {
    /// Creates a coordinator for the configured network and relay selection
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(PayloadError::NoEndpoints)` - The selection maps to no endpoint
    /// * `Err(PayloadError)` - The HTTP client could not be built
    pub fn new(config: Config) -> Result<Self, PayloadError> {
        let list = endpoints(config.relays.network, config.relays.relay);
        if list.is_empty() {
            tracing::error!(
                "No endpoints for relay '{}' on {}",
                config.relays.relay,
                config.relays.network
            );
            return Err(PayloadError::NoEndpoints);
        }
        Self::with_endpoints(config, list)
    }

    /// Creates a coordinator over an explicit endpoint list
    pub fn with_endpoints(config: Config, endpoints: Vec<String>) -> Result<Self, PayloadError> {
        if endpoints.is_empty() {
            return Err(PayloadError::NoEndpoints);
        }
        for endpoint in &endpoints {
            parse_endpoint(endpoint)?;
        }

        // One token stops both batch dispatch and backoff sleeps
        let cancel = CancellationToken::new();
        let fetcher = BackoffFetcher::new(config.fetcher.fetcher_config())?
            .with_cancellation(cancel.clone());
        let scheduler = Scheduler::new(fetcher, config.fetcher.scheduler_config())
            .with_cancellation(cancel);

        Ok(Self {
            config,
            endpoints,
            scheduler,
        })
    }

    /// Returns a handle that cancels runs started by this coordinator
    pub fn cancellation_token(&self) -> CancellationToken {
        self.scheduler.cancellation_token()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Number of units a run would dispatch, saturating at `u64::MAX`
    pub fn unit_count(&self) -> u64 {
        match self.config.range.bounds() {
            Some((start, end)) => end
                .saturating_sub(start)
                .saturating_mul(self.endpoints.len() as u64),
            None => self.endpoints.len() as u64,
        }
    }

    /// Runs the configured fetch
    ///
    /// Range mode when both slot bounds are set, latest mode otherwise.
    pub async fn run(&self) -> Result<RunReport, PayloadError> {
        if self.config.fetcher.preflight_dns {
            let urls = self
                .endpoints
                .iter()
                .map(|e| parse_endpoint(e))
                .collect::<Result<Vec<_>, _>>()?;
            resolve_endpoints(&urls).await?;
            tracing::debug!("Resolved {} endpoint hosts", urls.len());
        }

        match self.config.range.bounds() {
            Some((start, end)) => self.scheduler.run(start, end, &self.endpoints).await,
            None => {
                tracing::info!("No slot range configured, fetching latest payloads");
                self.scheduler.run_latest(&self.endpoints).await
            }
        }
    }

    /// Hands the result set to the configured sink
    ///
    /// A sink failure leaves `report` untouched, so the caller still holds
    /// the fetched data.
    pub fn persist(&self, report: &RunReport) -> Result<Delivery, PayloadError> {
        if self.config.output.save_to_file {
            let mut sink = JsonFileSink::from_config(&self.config.output);
            if let Err(e) = sink.emit(&report.results) {
                tracing::error!("Failed to write {}: {}", sink.describe(), e);
                return Err(e.into());
            }
            Ok(Delivery::File(sink.path()))
        } else {
            let mut sink = TableSink::new();
            sink.emit(&report.results)?;
            tracing::info!("Result kept as {}", sink.describe());
            match sink.into_table() {
                Some(table) => Ok(Delivery::Table(table)),
                None => Ok(Delivery::Table(PayloadTable::from(&report.results))),
            }
        }
    }
}

/// Runs a complete fetch and delivers the result
///
/// # Example
///
/// ```no_run
/// use relay_payloads::config::parse_config;
/// use relay_payloads::fetch::run_fetch;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = parse_config("[range]\nstart-slot = 100\nend-slot = 110\n")?;
/// let (report, _delivery) = run_fetch(config).await?;
/// println!("{} rows", report.results.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_fetch(config: Config) -> Result<(RunReport, Delivery), PayloadError> {
    let coordinator = Coordinator::new(config)?;
    let report = coordinator.run().await?;
    let delivery = coordinator.persist(&report)?;
    Ok((report, delivery))
}

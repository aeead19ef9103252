//! Relay-Payloads main entry point
//!
//! This is the command-line interface for bulk retrieval of delivered
//! MEV-Boost payloads.

use anyhow::Context;
use clap::Parser;
use relay_payloads::catalog::{Network, RelaySelector};
use relay_payloads::config::{load_config_with_hash, validate, Config};
use relay_payloads::fetch::{Coordinator, Delivery};
use relay_payloads::output::print_statistics;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Relay-Payloads: bulk retrieval of delivered MEV-Boost payloads
///
/// Queries relay data APIs for every slot in a range, within a concurrency
/// cap and a per-second request budget, and saves one row per (slot, relay)
/// as JSON.
#[derive(Parser, Debug)]
#[command(name = "relay-payloads")]
#[command(version)]
#[command(about = "Bulk retrieval of delivered MEV-Boost payloads", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// First slot to fetch (inclusive)
    #[arg(long, requires = "end_slot")]
    start_slot: Option<u64>,

    /// Slot to stop at (exclusive)
    #[arg(long, requires = "start_slot")]
    end_slot: Option<u64>,

    /// Network to query (mainnet, holesky)
    #[arg(long)]
    network: Option<Network>,

    /// Relay to query, or "all"
    #[arg(long)]
    relay: Option<RelaySelector>,

    /// Output directory
    #[arg(long)]
    directory: Option<String>,

    /// Output filename
    #[arg(long)]
    filename: Option<String>,

    /// Maximum requests in flight at once
    #[arg(long)]
    max_concurrent: Option<u32>,

    /// Maximum requests submitted per second
    #[arg(long)]
    max_per_second: Option<u32>,

    /// Keep the result in memory and print a preview instead of saving it
    #[arg(long)]
    no_save: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be fetched without any requests
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let (Some(start), Some(end)) = (self.start_slot, self.end_slot) {
            config.range.start_slot = Some(start);
            config.range.end_slot = Some(end);
        }
        if let Some(network) = self.network {
            config.relays.network = network;
        }
        if let Some(relay) = self.relay {
            config.relays.relay = relay;
        }
        if let Some(directory) = &self.directory {
            config.output.directory = directory.clone();
        }
        if let Some(filename) = &self.filename {
            config.output.filename = filename.clone();
        }
        if let Some(cap) = self.max_concurrent {
            config.fetcher.max_concurrent = cap;
        }
        if let Some(cap) = self.max_per_second {
            config.fetcher.max_per_second = cap;
        }
        if self.no_save {
            config.output.save_to_file = false;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    cli.apply_overrides(&mut config);
    validate(&config).context("invalid configuration")?;

    let coordinator = Coordinator::new(config)?;

    if cli.dry_run {
        handle_dry_run(&coordinator);
        return Ok(());
    }

    handle_fetch(coordinator).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("relay_payloads=info,warn"),
            1 => EnvFilter::new("relay_payloads=debug,info"),
            2 => EnvFilter::new("relay_payloads=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be fetched
fn handle_dry_run(coordinator: &Coordinator) {
    let config = coordinator.config();

    println!("=== Relay-Payloads Dry Run ===\n");

    println!("Relays:");
    println!("  Network: {}", config.relays.network);
    println!("  Selection: {}", config.relays.relay);
    for endpoint in coordinator.endpoints() {
        println!("    * {}", endpoint);
    }

    println!("\nFetcher:");
    println!("  Max concurrent: {}", config.fetcher.max_concurrent);
    println!("  Max per second: {}", config.fetcher.max_per_second);
    println!("  Max retries: {}", config.fetcher.max_retries);
    println!("  Initial backoff: {}s", config.fetcher.initial_backoff_secs);
    println!("  Request timeout: {}s", config.fetcher.request_timeout_secs);

    println!("\nRange:");
    match config.range.bounds() {
        Some((start, end)) => println!("  Slots {}..{}", start, end),
        None => println!("  Latest payloads (no slot range)"),
    }

    println!("\nOutput:");
    if config.output.save_to_file {
        println!("  File: {}", config.output.path().display());
    } else {
        println!("  In-memory table");
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would dispatch {} units", coordinator.unit_count());
}

/// Handles the main fetch operation
async fn handle_fetch(coordinator: Coordinator) -> anyhow::Result<()> {
    let token = coordinator.cancellation_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, finishing in-flight requests (Ctrl-C again to abort)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt received, aborting");
            std::process::exit(130);
        }
    });

    tracing::info!(
        "Querying {} endpoints ({} units)",
        coordinator.endpoints().len(),
        coordinator.unit_count()
    );

    let report = coordinator.run().await?;

    let delivery = coordinator
        .persist(&report)
        .context("failed to deliver results")?;

    print_statistics(&report.stats);

    match delivery {
        Delivery::File(path) => {
            println!("Saved {} rows to {}", report.results.len(), path.display())
        }
        Delivery::Table(table) => print!("{}", table.preview(10)),
    }

    if !report.is_complete() {
        tracing::warn!("Run {}; output is partial", report.status.as_str());
    }

    Ok(())
}

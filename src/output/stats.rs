//! Run statistics
//!
//! This module tallies unit outcomes per relay while a run is collected and
//! renders the end-of-run report.

use crate::fetch::FetchFailure;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome counts for a single relay endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatistics {
    /// Units that returned at least one record
    pub data_units: u64,

    /// Units answered with an empty body
    pub empty_units: u64,

    /// Units that failed (status, transport, or exhausted rate limit)
    pub failed_units: u64,

    /// Real records produced by this relay
    pub records: u64,

    /// Fields nulled during coercion
    pub coercion_issues: u64,
}

impl RelayStatistics {
    /// Total units seen for this relay
    pub fn units(&self) -> u64 {
        self.data_units + self.empty_units + self.failed_units
    }
}

/// Statistics for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Units handed to the worker pool
    pub units_dispatched: u64,

    /// Units never dispatched because the run was cancelled
    pub units_skipped: u64,

    /// Real records collected
    pub records: u64,

    /// Null placeholder rows synthesized
    pub null_records: u64,

    /// Records dropped because no slot could be determined (latest mode)
    pub dropped_records: u64,

    /// Fields nulled during coercion, all relays
    pub coercion_issues: u64,

    /// Per-relay breakdown, keyed by endpoint URL
    pub relays: BTreeMap<String, RelayStatistics>,

    /// Failed units grouped by failure kind
    pub failures: BTreeMap<&'static str, u64>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatistics {
    /// Starts a new tally stamped with the current time
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            units_dispatched: 0,
            units_skipped: 0,
            records: 0,
            null_records: 0,
            dropped_records: 0,
            coercion_issues: 0,
            relays: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    fn relay(&mut self, relay: &str) -> &mut RelayStatistics {
        self.relays.entry(relay.to_string()).or_default()
    }

    /// Records a unit that produced `records` rows with `issues` nulled fields
    pub fn record_data(&mut self, relay: &str, records: u64, issues: u64) {
        let entry = self.relay(relay);
        entry.data_units += 1;
        entry.records += records;
        entry.coercion_issues += issues;
        self.records += records;
        self.coercion_issues += issues;
    }

    pub fn record_empty(&mut self, relay: &str) {
        self.relay(relay).empty_units += 1;
    }

    pub fn record_failed(&mut self, relay: &str, failure: &FetchFailure) {
        self.relay(relay).failed_units += 1;
        *self.failures.entry(failure.kind()).or_insert(0) += 1;
    }

    pub fn record_null(&mut self) {
        self.null_records += 1;
    }

    pub fn record_dropped(&mut self) {
        self.dropped_records += 1;
    }

    /// Stamps the finish time
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished
    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Total units that produced an outcome
    pub fn units_completed(&self) -> u64 {
        self.relays.values().map(RelayStatistics::units).sum()
    }

    /// Share of completed units that returned data, as a percentage
    pub fn data_rate(&self) -> f64 {
        let completed = self.units_completed();
        if completed == 0 {
            return 0.0;
        }
        let data: u64 = self.relays.values().map(|r| r.data_units).sum();
        (data as f64 / completed as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Run Statistics ===\n");

    println!("Overview:");
    println!("  Started: {}", stats.started_at.to_rfc3339());
    if let Some(finished) = stats.finished_at {
        println!("  Finished: {}", finished.to_rfc3339());
    }
    if let Some(duration) = stats.duration_seconds() {
        println!("  Duration: {:.1}s", duration);
    }
    println!("  Units dispatched: {}", stats.units_dispatched);
    if stats.units_skipped > 0 {
        println!("  Units skipped (cancelled): {}", stats.units_skipped);
    }
    println!("  Records: {}", stats.records);
    println!("  Null records: {}", stats.null_records);
    if stats.dropped_records > 0 {
        println!("  Dropped records: {}", stats.dropped_records);
    }
    println!("  Coercion issues: {}", stats.coercion_issues);
    println!();

    println!("Per Relay:");
    for (relay, counts) in &stats.relays {
        println!(
            "  {}: {} data, {} empty, {} failed, {} records",
            relay, counts.data_units, counts.empty_units, counts.failed_units, counts.records
        );
    }
    println!();

    if !stats.failures.is_empty() {
        println!("Failure Summary:");
        let mut failure_counts: Vec<_> = stats.failures.iter().collect();
        failure_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (kind, count) in failure_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    println!(
        "Data Rate: {:.1}% ({} units completed)",
        stats.data_rate(),
        stats.units_completed()
    );
}

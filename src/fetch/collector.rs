//! Result collector
//!
//! Workers never touch the result set directly. Each one sends its unit's
//! outcome down a channel; a single collector drains the channel, normalizes
//! records, synthesizes null rows, and tallies statistics. The collector ends
//! when the last sender is dropped.

use crate::fetch::Outcome;
use crate::output::RunStatistics;
use crate::record::{normalize, PayloadRecord, ResultSet, SlotQuery};
use tokio::sync::mpsc;

/// Identity of a dispatched unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKey {
    /// One slot on one endpoint
    Slot(SlotQuery),
    /// An endpoint's most recent deliveries
    Latest(String),
}

impl UnitKey {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Slot(query) => &query.endpoint,
            Self::Latest(endpoint) => endpoint,
        }
    }
}

/// A completed unit as sent by a worker
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub key: UnitKey,
    pub outcome: Outcome,
}

pub type UnitSender = mpsc::UnboundedSender<UnitResult>;
pub type UnitReceiver = mpsc::UnboundedReceiver<UnitResult>;

/// Creates the worker-to-collector channel
pub fn unit_channel() -> (UnitSender, UnitReceiver) {
    mpsc::unbounded_channel()
}

/// Drains `rx` into a result set until every sender is gone
pub async fn collect(mut rx: UnitReceiver, mut stats: RunStatistics) -> (ResultSet, RunStatistics) {
    let mut results = ResultSet::new();

    while let Some(unit) = rx.recv().await {
        absorb(unit, &mut results, &mut stats);
    }

    (results, stats)
}

/// Folds one unit into the accumulator
///
/// A slot unit always contributes at least one row: its records, or a single
/// null row when it produced none.
fn absorb(unit: UnitResult, results: &mut ResultSet, stats: &mut RunStatistics) {
    let relay = unit.key.endpoint().to_string();
    let queried_slot = match &unit.key {
        UnitKey::Slot(query) => Some(query.slot),
        UnitKey::Latest(_) => None,
    };

    let mut produced = 0u64;

    match unit.outcome {
        Outcome::Data(raw_records) => {
            let mut issues = 0u64;
            for raw in &raw_records {
                match normalize(raw, &relay, queried_slot) {
                    Ok(normalized) => {
                        issues += normalized.issues.len() as u64;
                        results.push(normalized.record);
                        produced += 1;
                    }
                    Err(issue) => {
                        tracing::warn!("Dropping record from {}: {}", relay, issue);
                        stats.record_dropped();
                    }
                }
            }
            stats.record_data(&relay, produced, issues);
            tracing::debug!("Collected {} records from {}", produced, relay);
        }
        Outcome::Empty => {
            stats.record_empty(&relay);
            if let UnitKey::Slot(query) = &unit.key {
                tracing::debug!("No data for slot {} on {}", query.slot, relay);
            }
        }
        Outcome::Failed(failure) => {
            stats.record_failed(&relay, &failure);
            match &unit.key {
                UnitKey::Slot(query) => {
                    tracing::warn!("Slot {} on {} failed: {}", query.slot, relay, failure)
                }
                UnitKey::Latest(_) => {
                    tracing::warn!("Latest payloads from {} failed: {}", relay, failure)
                }
            }
        }
    }

    if produced == 0 {
        if let UnitKey::Slot(query) = &unit.key {
            results.push(PayloadRecord::null(query));
            stats.record_null();
        }
    }
}

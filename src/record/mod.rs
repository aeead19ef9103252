//! Data model for delivered-payload observations
//!
//! This module holds the dispatch unit ([`SlotQuery`]), the canonical record
//! shape ([`PayloadRecord`]) and the per-run accumulator ([`ResultSet`]), plus
//! the normalizer that coerces raw relay JSON into records.

mod normalize;

use crate::PayloadError;
use serde::{Deserialize, Serialize};

pub use normalize::{normalize, CoercionIssue, Expected, Normalized};

/// Half-open slot range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    start: u64,
    end: u64,
}

impl SlotRange {
    /// Creates a range, rejecting `end <= start`
    pub fn new(start: u64, end: u64) -> Result<Self, PayloadError> {
        if end <= start {
            return Err(PayloadError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of slots in the range
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Always false; an empty range cannot be constructed
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn slots(&self) -> std::ops::Range<u64> {
        self.start..self.end
    }
}

/// A single unit of work: one slot queried against one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotQuery {
    pub slot: u64,
    pub endpoint: String,
}

impl SlotQuery {
    pub fn new(slot: u64, endpoint: impl Into<String>) -> Self {
        Self {
            slot,
            endpoint: endpoint.into(),
        }
    }
}

/// One delivered-payload observation
///
/// Every field except `slot` and `relay` is optional: a null record carries
/// only those two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadRecord {
    pub slot: u64,
    pub parent_hash: Option<String>,
    pub block_hash: Option<String>,
    pub builder_pubkey: Option<String>,
    pub proposer_pubkey: Option<String>,
    pub proposer_fee_recipient: Option<String>,
    pub gas_limit: Option<u64>,
    pub gas_used: Option<u64>,
    pub value: Option<f64>,
    pub block_number: Option<u64>,
    pub num_tx: Option<u64>,
    pub relay: String,
}

impl PayloadRecord {
    /// Synthesizes the placeholder row for a unit that produced no data
    pub fn null(query: &SlotQuery) -> Self {
        Self {
            slot: query.slot,
            parent_hash: None,
            block_hash: None,
            builder_pubkey: None,
            proposer_pubkey: None,
            proposer_fee_recipient: None,
            gas_limit: None,
            gas_used: None,
            value: None,
            block_number: None,
            num_tx: None,
            relay: query.endpoint.clone(),
        }
    }

    /// Returns true if every payload field is null
    ///
    /// This is a property of the row, not of its origin: a relay record that
    /// carried nothing but a slot is indistinguishable from a synthesized
    /// placeholder. Run statistics count placeholders separately in
    /// `null_records`.
    pub fn is_null(&self) -> bool {
        self.parent_hash.is_none()
            && self.block_hash.is_none()
            && self.builder_pubkey.is_none()
            && self.proposer_pubkey.is_none()
            && self.proposer_fee_recipient.is_none()
            && self.gas_limit.is_none()
            && self.gas_used.is_none()
            && self.value.is_none()
            && self.block_number.is_none()
            && self.num_tx.is_none()
    }
}

/// All records produced by one run
///
/// Order follows completion order unless [`ResultSet::sort`] is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<PayloadRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: PayloadRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PayloadRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[PayloadRecord] {
        &self.records
    }

    /// Number of rows whose payload fields are all null
    ///
    /// Counts placeholders and empty relay records alike, so it can exceed
    /// the run's `null_records`.
    pub fn null_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_null()).count()
    }

    /// Records produced for one (slot, relay) pair
    pub fn for_unit(&self, query: &SlotQuery) -> impl Iterator<Item = &PayloadRecord> + '_ {
        let SlotQuery { slot, endpoint } = query.clone();
        self.records
            .iter()
            .filter(move |r| r.slot == slot && r.relay == endpoint)
    }

    /// Orders records by slot, then relay; stable within a unit
    pub fn sort(&mut self) {
        self.records
            .sort_by(|a, b| a.slot.cmp(&b.slot).then_with(|| a.relay.cmp(&b.relay)));
    }
}

impl IntoIterator for ResultSet {
    type Item = PayloadRecord;
    type IntoIter = std::vec::IntoIter<PayloadRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a PayloadRecord;
    type IntoIter = std::slice::Iter<'a, PayloadRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<PayloadRecord> for ResultSet {
    fn from_iter<I: IntoIterator<Item = PayloadRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

//! In-memory tabular sink
//!
//! Keeps the result set as a columnar table instead of writing it anywhere,
//! one vector per field with typed nulls.

use crate::output::traits::{OutputResult, PayloadSink};
use crate::record::{PayloadRecord, ResultSet};
use std::fmt::Write as _;

/// Logical type of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    UInt64,
    Float64,
    Utf8,
}

/// Column names and types, in output order
pub const SCHEMA: [(&str, ColumnType); 12] = [
    ("slot", ColumnType::UInt64),
    ("parent_hash", ColumnType::Utf8),
    ("block_hash", ColumnType::Utf8),
    ("builder_pubkey", ColumnType::Utf8),
    ("proposer_pubkey", ColumnType::Utf8),
    ("proposer_fee_recipient", ColumnType::Utf8),
    ("gas_limit", ColumnType::UInt64),
    ("gas_used", ColumnType::UInt64),
    ("value", ColumnType::Float64),
    ("block_number", ColumnType::UInt64),
    ("num_tx", ColumnType::UInt64),
    ("relay", ColumnType::Utf8),
];

/// Columnar view of a result set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadTable {
    pub slot: Vec<u64>,
    pub parent_hash: Vec<Option<String>>,
    pub block_hash: Vec<Option<String>>,
    pub builder_pubkey: Vec<Option<String>>,
    pub proposer_pubkey: Vec<Option<String>>,
    pub proposer_fee_recipient: Vec<Option<String>>,
    pub gas_limit: Vec<Option<u64>>,
    pub gas_used: Vec<Option<u64>>,
    pub value: Vec<Option<f64>>,
    pub block_number: Vec<Option<u64>>,
    pub num_tx: Vec<Option<u64>>,
    pub relay: Vec<String>,
}

impl PayloadTable {
    pub fn num_rows(&self) -> usize {
        self.slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }

    pub fn schema(&self) -> &'static [(&'static str, ColumnType)] {
        &SCHEMA
    }

    /// Appends one record as a row
    pub fn push(&mut self, record: &PayloadRecord) {
        self.slot.push(record.slot);
        self.parent_hash.push(record.parent_hash.clone());
        self.block_hash.push(record.block_hash.clone());
        self.builder_pubkey.push(record.builder_pubkey.clone());
        self.proposer_pubkey.push(record.proposer_pubkey.clone());
        self.proposer_fee_recipient
            .push(record.proposer_fee_recipient.clone());
        self.gas_limit.push(record.gas_limit);
        self.gas_used.push(record.gas_used);
        self.value.push(record.value);
        self.block_number.push(record.block_number);
        self.num_tx.push(record.num_tx);
        self.relay.push(record.relay.clone());
    }

    /// Reassembles row `index` as a record
    pub fn row(&self, index: usize) -> Option<PayloadRecord> {
        if index >= self.num_rows() {
            return None;
        }
        Some(PayloadRecord {
            slot: self.slot[index],
            parent_hash: self.parent_hash[index].clone(),
            block_hash: self.block_hash[index].clone(),
            builder_pubkey: self.builder_pubkey[index].clone(),
            proposer_pubkey: self.proposer_pubkey[index].clone(),
            proposer_fee_recipient: self.proposer_fee_recipient[index].clone(),
            gas_limit: self.gas_limit[index],
            gas_used: self.gas_used[index],
            value: self.value[index],
            block_number: self.block_number[index],
            num_tx: self.num_tx[index],
            relay: self.relay[index].clone(),
        })
    }

    /// Number of nulls in each column, in schema order
    pub fn null_counts(&self) -> Vec<(&'static str, usize)> {
        fn nulls<T>(column: &[Option<T>]) -> usize {
            column.iter().filter(|v| v.is_none()).count()
        }

        vec![
            ("slot", 0),
            ("parent_hash", nulls(&self.parent_hash)),
            ("block_hash", nulls(&self.block_hash)),
            ("builder_pubkey", nulls(&self.builder_pubkey)),
            ("proposer_pubkey", nulls(&self.proposer_pubkey)),
            ("proposer_fee_recipient", nulls(&self.proposer_fee_recipient)),
            ("gas_limit", nulls(&self.gas_limit)),
            ("gas_used", nulls(&self.gas_used)),
            ("value", nulls(&self.value)),
            ("block_number", nulls(&self.block_number)),
            ("num_tx", nulls(&self.num_tx)),
            ("relay", 0),
        ]
    }

    /// Renders the first `limit` rows as a plain-text table
    pub fn preview(&self, limit: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "shape: ({}, {})",
            self.num_rows(),
            SCHEMA.len()
        );
        let _ = writeln!(
            out,
            "{:>10}  {:>12}  {:>10}  {:>6}  {:>22}  {}",
            "slot", "block_number", "gas_used", "num_tx", "value", "relay"
        );

        for index in 0..self.num_rows().min(limit) {
            let _ = writeln!(
                out,
                "{:>10}  {:>12}  {:>10}  {:>6}  {:>22}  {}",
                self.slot[index],
                display_opt(&self.block_number[index]),
                display_opt(&self.gas_used[index]),
                display_opt(&self.num_tx[index]),
                display_opt(&self.value[index]),
                self.relay[index]
            );
        }

        if self.num_rows() > limit {
            let _ = writeln!(out, "... {} more rows", self.num_rows() - limit);
        }
        out
    }
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}

impl From<&ResultSet> for PayloadTable {
    fn from(results: &ResultSet) -> Self {
        let mut table = PayloadTable::default();
        for record in results {
            table.push(record);
        }
        table
    }
}

/// Sink keeping the most recent result set as a [`PayloadTable`]
#[derive(Debug, Default)]
pub struct TableSink {
    table: Option<PayloadTable>,
}

impl TableSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&PayloadTable> {
        self.table.as_ref()
    }

    pub fn into_table(self) -> Option<PayloadTable> {
        self.table
    }
}

impl PayloadSink for TableSink {
    fn emit(&mut self, results: &ResultSet) -> OutputResult<()> {
        self.table = Some(PayloadTable::from(results));
        Ok(())
    }

    fn describe(&self) -> String {
        let rows = self.table.as_ref().map(PayloadTable::num_rows).unwrap_or(0);
        format!("in-memory table ({} rows)", rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SlotQuery;

    fn sample() -> ResultSet {
        let mut real = PayloadRecord::null(&SlotQuery::new(10, "relay-a"));
        real.num_tx = Some(150);
        real.gas_used = Some(12_000_000);
        real.value = Some(3.5e16);

        vec![real, PayloadRecord::null(&SlotQuery::new(11, "relay-b"))]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_table_from_results() {
        let results = sample();
        let table = PayloadTable::from(&results);

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.slot, vec![10, 11]);
        assert_eq!(table.num_tx, vec![Some(150), None]);
        assert_eq!(table.relay, vec!["relay-a", "relay-b"]);
        assert_eq!(table.row(0).as_ref(), results.records().first());
        assert!(table.row(2).is_none());
    }

    #[test]
    fn test_null_counts() {
        let table = PayloadTable::from(&sample());
        let counts = table.null_counts();

        assert_eq!(counts.len(), table.schema().len());
        assert!(counts.contains(&("num_tx", 1)));
        assert!(counts.contains(&("block_hash", 2)));
        assert!(counts.contains(&("slot", 0)));
    }

    #[test]
    fn test_preview() {
        let table = PayloadTable::from(&sample());
        let preview = table.preview(1);

        assert!(preview.starts_with("shape: (2, 12)"));
        assert!(preview.contains("relay-a"));
        assert!(!preview.contains("relay-b"));
        assert!(preview.contains("... 1 more rows"));
    }

    #[test]
    fn test_table_sink() {
        let mut sink = TableSink::new();
        assert!(sink.table().is_none());

        sink.emit(&sample()).unwrap();

        assert_eq!(sink.table().map(PayloadTable::num_rows), Some(2));
        assert_eq!(sink.describe(), "in-memory table (2 rows)");
    }
}

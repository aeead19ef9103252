//! Output module for delivering a run's result set
//!
//! This module handles:
//! - Writing the result set to a JSON file
//! - Holding the result set as an in-memory table
//! - Recording run statistics

mod json;
pub mod stats;
mod table;
mod traits;

pub use json::JsonFileSink;
pub use stats::{print_statistics, RelayStatistics, RunStatistics};
pub use table::{ColumnType, PayloadTable, TableSink, SCHEMA};
pub use traits::{OutputError, OutputResult, PayloadSink};

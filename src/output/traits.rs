//! Sink traits and errors
//!
//! A sink receives the finished result set of a run. The scheduler never
//! assumes a format; the sink decides whether rows go to disk or stay in
//! memory.

use crate::record::ResultSet;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for a finished result set
///
/// Sinks only borrow the result set. A failed emit leaves the caller's
/// in-memory rows untouched.
pub trait PayloadSink {
    /// Consumes a view of the finished rows
    ///
    /// # Arguments
    ///
    /// * `results` - Every row produced by the run
    fn emit(&mut self, results: &ResultSet) -> OutputResult<()>;

    /// Human-readable description of where rows went
    fn describe(&self) -> String;
}

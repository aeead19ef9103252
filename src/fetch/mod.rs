//! Fetch module for retrieving delivered payloads from relays
//!
//! This module contains the core retrieval logic, including:
//! - HTTP fetching with rate-limit backoff
//! - Concurrency and rate limiting across (slot, endpoint) units
//! - Collecting outcomes into a single result set
//! - Overall run coordination

mod collector;
mod coordinator;
mod fetcher;
mod scheduler;

pub use collector::{collect, unit_channel, UnitKey, UnitReceiver, UnitResult, UnitSender};
pub use coordinator::{run_fetch, Coordinator, Delivery};
pub use fetcher::{
    build_http_client, BackoffFetcher, FetchFailure, FetchReport, FetcherConfig, Outcome,
    SlotFetcher,
};
pub use scheduler::{RunReport, RunStatus, Scheduler, SchedulerConfig};

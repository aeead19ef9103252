//! Rate-limited scheduler
//!
//! This module handles:
//! - Enumerating every (slot, endpoint) unit of a run
//! - Global concurrency limiting via a semaphore
//! - Pacing dispatch in strictly sequential batches
//! - Cancellation between batches
//! - Handing every outcome to the collector

use crate::catalog::{latest_url, parse_endpoint, slot_query_url};
use crate::fetch::collector::{collect, unit_channel, UnitKey, UnitResult, UnitSender};
use crate::fetch::{FetchFailure, Outcome, SlotFetcher};
use crate::output::RunStatistics;
use crate::record::{ResultSet, SlotQuery, SlotRange};
use crate::PayloadError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Throttle settings for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum requests in flight at once
    pub max_concurrent: usize,

    /// Maximum units submitted per batch
    pub max_per_second: usize,

    /// Pause between a completed batch and the next one
    pub batch_pause: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 15,
            max_per_second: 15,
            batch_pause: Duration::from_secs(1),
        }
    }
}

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub results: ResultSet,
    pub stats: RunStatistics,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Scheduler dispatching units onto a bounded worker pool
///
/// Two throttles hold at the same time: the semaphore caps requests in
/// flight, and batches of at most `max_per_second` units run one after the
/// other with a pause in between.
pub struct Scheduler<F> {
    fetcher: Arc<F>,
    semaphore: Arc<Semaphore>,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl<F> Scheduler<F>
where
    F: SlotFetcher + 'static,
{
    /// Creates a new scheduler
    ///
    /// Caps below one are raised to one.
    pub fn new(fetcher: F, config: SchedulerConfig) -> Self {
        Self::from_arc(Arc::new(fetcher), config)
    }

    /// Creates a scheduler around a shared fetcher
    pub fn from_arc(fetcher: Arc<F>, mut config: SchedulerConfig) -> Self {
        config.max_concurrent = config.max_concurrent.max(1);
        config.max_per_second = config.max_per_second.max(1);

        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the scheduler's cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns a handle that cancels this scheduler's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetches every slot in `[start_slot, end_slot)` from every endpoint
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - One row or more per dispatched unit
    /// * `Err(PayloadError::InvalidRange)` - `end_slot <= start_slot`; nothing was sent
    /// * `Err(PayloadError)` - No endpoints, or an endpoint URL is malformed
    pub async fn run(
        &self,
        start_slot: u64,
        end_slot: u64,
        endpoints: &[String],
    ) -> Result<RunReport, PayloadError> {
        let range = SlotRange::new(start_slot, end_slot)?;
        let bases = parse_endpoints(endpoints)?;
        let total = range.len().saturating_mul(bases.len() as u64);

        tracing::info!(
            "Fetching slots {}..{} from {} endpoints ({} units)",
            range.start(),
            range.end(),
            bases.len(),
            total
        );

        let units = range.slots().flat_map(|slot| {
            bases.iter().map(move |(endpoint, base)| {
                (
                    UnitKey::Slot(SlotQuery::new(slot, endpoint.clone())),
                    slot_query_url(base, slot),
                )
            })
        });

        Ok(self.execute(units, total).await)
    }

    /// Fetches the most recent deliveries from every endpoint
    pub async fn run_latest(&self, endpoints: &[String]) -> Result<RunReport, PayloadError> {
        let bases = parse_endpoints(endpoints)?;
        let total = bases.len() as u64;

        tracing::info!("Fetching latest payloads from {} endpoints", total);

        let units = bases
            .iter()
            .map(|(endpoint, base)| (UnitKey::Latest(endpoint.clone()), latest_url(base)));

        Ok(self.execute(units, total).await)
    }

    /// Runs dispatch and collection side by side
    async fn execute<I>(&self, units: I, total: u64) -> RunReport
    where
        I: Iterator<Item = (UnitKey, Url)>,
    {
        let (tx, rx) = unit_channel();
        let ((status, dispatched), (mut results, mut stats)) =
            tokio::join!(self.dispatch(units, tx), collect(rx, RunStatistics::new()));

        stats.units_dispatched = dispatched;
        stats.units_skipped = total.saturating_sub(dispatched);
        stats.finish();

        if status == RunStatus::Cancelled {
            tracing::warn!(
                "Run cancelled: {} of {} units dispatched",
                dispatched,
                total
            );
        } else {
            tracing::info!(
                "Run completed: {} units, {} rows ({} null)",
                dispatched,
                results.len(),
                stats.null_records
            );
        }

        results.sort();

        RunReport {
            status,
            results,
            stats,
        }
    }

    /// Submits units batch by batch, returning the status and units dispatched
    ///
    /// `tx` is consumed so the collector ends once the last worker is done.
    async fn dispatch<I>(&self, mut units: I, tx: UnitSender) -> (RunStatus, u64)
    where
        I: Iterator<Item = (UnitKey, Url)>,
    {
        let mut dispatched = 0u64;
        let mut batch_number = 0u64;
        let mut next = units.next();

        while next.is_some() {
            if self.cancel.is_cancelled() {
                return (RunStatus::Cancelled, dispatched);
            }

            let mut batch = Vec::with_capacity(self.config.max_per_second);
            while batch.len() < self.config.max_per_second {
                match next.take() {
                    Some(unit) => {
                        batch.push(unit);
                        next = units.next();
                    }
                    None => break,
                }
            }

            batch_number += 1;
            dispatched += batch.len() as u64;
            tracing::debug!("Submitting batch {} ({} units)", batch_number, batch.len());

            self.run_batch(batch, &tx).await;

            if batch_number % 10 == 0 {
                tracing::info!("Progress: {} units completed", dispatched);
            }

            if next.is_some() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.batch_pause) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        (RunStatus::Completed, dispatched)
    }

    /// Runs one batch to completion
    async fn run_batch(&self, batch: Vec<(UnitKey, Url)>, tx: &UnitSender) {
        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::new();

        for (key, url) in batch {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&self.semaphore);
            let worker_tx = tx.clone();
            let worker_key = key.clone();

            let handle = tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetcher.fetch(url.as_str()).await,
                    Err(_) => Outcome::Failed(FetchFailure::Network(
                        "worker pool closed".to_string(),
                    )),
                };
                // The receiver only closes after dispatch ends
                let _ = worker_tx.send(UnitResult {
                    key: worker_key,
                    outcome,
                });
            });
            in_flight.insert(handle.id(), key);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                // A panicked worker never reported; report on its behalf
                if let Some(key) = in_flight.remove(&e.id()) {
                    tracing::error!("Worker for {:?} panicked: {}", key, e);
                    let _ = tx.send(UnitResult {
                        key,
                        outcome: Outcome::Failed(FetchFailure::Network(
                            "worker panicked".to_string(),
                        )),
                    });
                }
            }
        }
    }
}

fn parse_endpoints(endpoints: &[String]) -> Result<Vec<(String, Url)>, PayloadError> {
    if endpoints.is_empty() {
        return Err(PayloadError::NoEndpoints);
    }
    endpoints
        .iter()
        .map(|endpoint| parse_endpoint(endpoint).map(|url| (endpoint.clone(), url)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fake fetcher that tracks in-flight calls and answers from a script
    struct CountingFetcher {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        delay: Duration,
        log: Mutex<Vec<String>>,
        respond: fn(&str) -> Outcome,
    }

    impl CountingFetcher {
        fn new(delay: Duration, respond: fn(&str) -> Outcome) -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                delay,
                log: Mutex::new(Vec::new()),
                respond,
            }
        }
    }

    #[async_trait]
    impl SlotFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.log.lock().unwrap().push(url.to_string());

            tokio::time::sleep(self.delay).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            (self.respond)(url)
        }
    }

    fn always_empty(_: &str) -> Outcome {
        Outcome::Empty
    }

    fn data_for_relay_a(url: &str) -> Outcome {
        if url.contains("relay-a") {
            Outcome::Data(vec![json!({"slot": "0", "num_tx": "5"})])
        } else {
            Outcome::Failed(FetchFailure::HttpStatus(503))
        }
    }

    fn fast_config(max_concurrent: usize, max_per_second: usize) -> SchedulerConfig {
        SchedulerConfig {
            max_concurrent,
            max_per_second,
            batch_pause: Duration::from_millis(5),
        }
    }

    fn endpoints() -> Vec<String> {
        vec![
            "http://relay-a.test/data".to_string(),
            "http://relay-b.test/data".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_invalid_range_makes_no_calls() {
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::ZERO, always_empty),
            fast_config(4, 4),
        );

        let err = scheduler.run(10, 10, &endpoints()).await.unwrap_err();
        assert!(matches!(err, PayloadError::InvalidRange { start: 10, end: 10 }));

        let err = scheduler.run(10, 5, &endpoints()).await.unwrap_err();
        assert!(matches!(err, PayloadError::InvalidRange { .. }));

        assert_eq!(scheduler.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_endpoints_is_setup_error() {
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::ZERO, always_empty),
            fast_config(4, 4),
        );
        let err = scheduler.run(0, 5, &[]).await.unwrap_err();
        assert!(matches!(err, PayloadError::NoEndpoints));
    }

    #[tokio::test]
    async fn test_one_row_per_unit() {
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::from_millis(1), data_for_relay_a),
            fast_config(3, 4),
        );

        let report = scheduler.run(100, 107, &endpoints()).await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.results.len(), 14);
        assert_eq!(report.stats.units_dispatched, 14);
        assert_eq!(report.stats.null_records, 7);
        assert_eq!(scheduler.fetcher.calls.load(Ordering::SeqCst), 14);

        for slot in 100..107 {
            for endpoint in endpoints() {
                let query = SlotQuery::new(slot, endpoint.clone());
                let rows: Vec<_> = report.results.for_unit(&query).collect();
                assert_eq!(rows.len(), 1, "unit {:?}", query);
                if endpoint.contains("relay-a") {
                    assert_eq!(rows[0].num_tx, Some(5));
                    assert_eq!(rows[0].slot, slot);
                } else {
                    assert!(rows[0].is_null());
                }
            }
        }
    }

    #[tokio::test]
    async fn test_concurrency_cap_respected() {
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::from_millis(20), always_empty),
            fast_config(3, 10),
        );

        let report = scheduler.run(0, 15, &endpoints()).await.unwrap();

        assert_eq!(report.results.len(), 30);
        let peak = scheduler.fetcher.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {} exceeded cap", peak);
        assert!(peak >= 2);
    }

    #[tokio::test]
    async fn test_batches_never_overlap() {
        // With a batch size of 1 no two units may ever be in flight together,
        // even though the semaphore would allow it.
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::from_millis(5), always_empty),
            fast_config(8, 1),
        );

        let report = scheduler.run(0, 4, &endpoints()).await.unwrap();

        assert_eq!(report.results.len(), 8);
        assert_eq!(scheduler.fetcher.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_urls_carry_slot() {
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::ZERO, always_empty),
            fast_config(2, 2),
        );

        scheduler
            .run(5, 7, &["http://relay-a.test/data".to_string()])
            .await
            .unwrap();

        let mut log = scheduler.fetcher.log.lock().unwrap().clone();
        log.sort();
        assert_eq!(
            log,
            vec![
                "http://relay-a.test/data?slot=5".to_string(),
                "http://relay-a.test/data?slot=6".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::ZERO, always_empty),
            fast_config(2, 2),
        );
        scheduler.cancellation_token().cancel();

        let report = scheduler.run(0, 10, &endpoints()).await.unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.results.is_empty());
        assert_eq!(report.stats.units_skipped, 20);
        assert_eq!(scheduler.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_drains_in_flight() {
        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::from_millis(30), always_empty),
            SchedulerConfig {
                max_concurrent: 2,
                max_per_second: 2,
                batch_pause: Duration::from_secs(60),
            },
        );
        let token = scheduler.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let report = scheduler.run(0, 10, &endpoints()).await.unwrap();

        // The first batch was in flight when cancelled and still reported
        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.stats.units_dispatched, 2);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.stats.units_skipped, 18);
    }

    #[tokio::test]
    async fn test_run_latest() {
        fn latest(url: &str) -> Outcome {
            assert!(!url.contains("slot="));
            Outcome::Data(vec![json!({"slot": "42"}), json!({"slot": "41"})])
        }

        let scheduler = Scheduler::new(
            CountingFetcher::new(Duration::ZERO, latest),
            fast_config(2, 2),
        );
        let report = scheduler.run_latest(&endpoints()).await.unwrap();

        assert_eq!(report.results.len(), 4);
        assert_eq!(report.results.records()[0].slot, 41);
        assert_eq!(report.stats.null_records, 0);
    }
}

//! Integration tests for the fetch pipeline
//!
//! These tests use wiremock to stand in for relay data APIs and drive the
//! fetcher, the scheduler and the coordinator end-to-end.

use relay_payloads::config::Config;
use relay_payloads::fetch::{
    BackoffFetcher, Coordinator, Delivery, FetchFailure, FetcherConfig, Outcome, RunStatus,
    Scheduler, SchedulerConfig,
};
use relay_payloads::record::{PayloadRecord, SlotQuery};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DATA_PATH: &str = "/relay/v1/data/bidtraces/proposer_payload_delivered";

fn test_fetcher(max_retries: u32, initial_backoff: Duration) -> BackoffFetcher {
    BackoffFetcher::new(FetcherConfig {
        max_retries,
        initial_backoff,
        request_timeout: Duration::from_millis(300),
        user_agent: "relay-payloads-test".to_string(),
    })
    .unwrap()
}

fn delivered(slot: u64) -> serde_json::Value {
    json!({
        "slot": slot.to_string(),
        "parent_hash": "0xparent",
        "block_hash": format!("0xblock{}", slot),
        "builder_pubkey": "0xbuilder",
        "proposer_pubkey": "0xproposer",
        "proposer_fee_recipient": "0xfee",
        "gas_limit": "30000000",
        "gas_used": "12000000",
        "value": "42000000000000000",
        "block_number": "19000000",
        "num_tx": "150"
    })
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mock_server = MockServer::start().await;

    // 429 twice, then records
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([delivered(7)])))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(5, Duration::from_millis(50));
    let url = format!("{}{}?slot=7", mock_server.uri(), DATA_PATH);
    let report = fetcher.fetch_with_report(&url).await;

    assert!(report.outcome.is_data());
    assert_eq!(
        report.backoff_delays,
        vec![Duration::from_millis(50), Duration::from_millis(100)]
    );
}

#[tokio::test]
async fn test_rate_limit_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(2, Duration::from_millis(10));
    let url = format!("{}{}?slot=1", mock_server.uri(), DATA_PATH);
    let report = fetcher.fetch_with_report(&url).await;

    assert_eq!(
        report.outcome,
        Outcome::Failed(FetchFailure::RateLimitExhausted { attempts: 3 })
    );
    assert_eq!(report.backoff_delays.len(), 2);
}

#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(1) // Cancelled before the first retry
        .mount(&mock_server)
        .await;

    let token = CancellationToken::new();
    let fetcher = test_fetcher(5, Duration::from_secs(30)).with_cancellation(token.clone());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let url = format!("{}{}?slot=1", mock_server.uri(), DATA_PATH);
    let report = tokio::time::timeout(Duration::from_secs(5), fetcher.fetch_with_report(&url))
        .await
        .expect("backoff sleep was not interrupted");

    assert_eq!(
        report.outcome,
        Outcome::Failed(FetchFailure::Cancelled { attempts: 1 })
    );
    assert!(report.backoff_delays.is_empty());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1) // Only 429 is retried
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(5, Duration::from_millis(10));
    let url = format!("{}{}?slot=1", mock_server.uri(), DATA_PATH);
    let report = fetcher.fetch_with_report(&url).await;

    assert_eq!(report.outcome, Outcome::Failed(FetchFailure::HttpStatus(500)));
    assert!(report.backoff_delays.is_empty());
}

#[tokio::test]
async fn test_timeout_is_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([delivered(1)]))
                .set_delay(Duration::from_secs(2)), // Longer than timeout
        )
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(5, Duration::from_millis(10));
    let url = format!("{}{}?slot=1", mock_server.uri(), DATA_PATH);
    let report = fetcher.fetch_with_report(&url).await;

    assert_eq!(report.outcome, Outcome::Failed(FetchFailure::Timeout));
}

#[tokio::test]
async fn test_empty_array_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let fetcher = test_fetcher(5, Duration::from_millis(10));
    let url = format!("{}{}?slot=1", mock_server.uri(), DATA_PATH);

    assert_eq!(fetcher.fetch_with_report(&url).await.outcome, Outcome::Empty);
}

#[tokio::test]
async fn test_scheduler_mixed_outcomes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("slot", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([delivered(1)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("slot", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("slot", "3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([delivered(3)]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let endpoint = format!("{}{}", mock_server.uri(), DATA_PATH);
    let scheduler = Scheduler::new(
        test_fetcher(1, Duration::from_millis(10)),
        SchedulerConfig {
            max_concurrent: 3,
            max_per_second: 3,
            batch_pause: Duration::from_millis(10),
        },
    );

    let report = scheduler.run(1, 4, &[endpoint.clone()]).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.results.null_count(), 2);

    let real = report
        .results
        .for_unit(&SlotQuery::new(1, endpoint.clone()))
        .next()
        .unwrap();
    assert_eq!(real.num_tx, Some(150));
    assert_eq!(real.block_hash.as_deref(), Some("0xblock1"));
    assert_eq!(real.relay, endpoint);

    for slot in [2, 3] {
        let row = report
            .results
            .for_unit(&SlotQuery::new(slot, endpoint.clone()))
            .next()
            .unwrap();
        assert!(row.is_null());
    }

    assert_eq!(report.stats.failures.get("http-status"), Some(&1));
    assert_eq!(report.stats.failures.get("timeout"), Some(&1));
}

#[tokio::test]
async fn test_coordinator_writes_json_file() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("slot", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([delivered(100)])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("slot", "101"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("out");

    let mut config = Config::default();
    config.range.start_slot = Some(100);
    config.range.end_slot = Some(102);
    config.fetcher.batch_pause_ms = 10;
    config.output.directory = output_dir.to_string_lossy().into_owned();
    config.output.filename = "payloads.json".to_string();

    let endpoint = format!("{}{}", mock_server.uri(), DATA_PATH);
    let coordinator = Coordinator::with_endpoints(config, vec![endpoint.clone()]).unwrap();

    let report = coordinator.run().await.unwrap();
    assert!(report.is_complete());

    let path = match coordinator.persist(&report).unwrap() {
        Delivery::File(path) => path,
        other => panic!("unexpected delivery: {:?}", other),
    };
    assert_eq!(path, output_dir.join("payloads.json"));

    let content = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<PayloadRecord> = serde_json::from_str(&content).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].slot, 100);
    assert_eq!(rows[0].gas_limit, Some(30_000_000));
    assert_eq!(rows[0].relay, endpoint);
    assert_eq!(rows[1].slot, 101);
    assert!(rows[1].is_null());
}

#[tokio::test]
async fn test_coordinator_latest_mode_in_memory() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([delivered(9), delivered(8)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.output.save_to_file = false;

    let endpoint = format!("{}{}", mock_server.uri(), DATA_PATH);
    let coordinator = Coordinator::with_endpoints(config, vec![endpoint]).unwrap();

    let report = coordinator.run().await.unwrap();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results.null_count(), 0);

    match coordinator.persist(&report).unwrap() {
        Delivery::Table(table) => {
            assert_eq!(table.num_rows(), 2);
            // Sorted by slot
            assert_eq!(table.slot, vec![8, 9]);
        }
        other => panic!("unexpected delivery: {:?}", other),
    }
}

//! HTTP fetcher implementation
//!
//! This module performs the single GET behind every unit of work:
//! - Building the HTTP client with a bounded request timeout
//! - Classifying responses into data, empty, or failed outcomes
//! - Retrying rate-limited (HTTP 429) responses with exponential backoff
//!
//! Nothing in here returns an error to the caller. Every failure is folded
//! into [`Outcome::Failed`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Settings for the backoff fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Retries allowed after the first rate-limited attempt
    pub max_retries: u32,

    /// Sleep before the first retry; doubled for every following one
    pub initial_backoff: Duration,

    /// Bound on a single request, connect included
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            user_agent: format!("relay-payloads/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Why a unit produced no data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Still rate limited after the retry ceiling
    RateLimitExhausted { attempts: u32 },
    /// Non-200, non-429 status
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    Timeout,
    /// Connection refused or DNS failure
    Connect,
    /// Run cancelled while waiting out a rate limit
    Cancelled { attempts: u32 },
    /// Any other transport error
    Network(String),
    /// 200 response whose body is not a JSON array of records
    Decode(String),
}

impl FetchFailure {
    /// Short label used to group failures in run statistics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimitExhausted { .. } => "rate-limited",
            Self::HttpStatus(_) => "http-status",
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Cancelled { .. } => "cancelled",
            Self::Network(_) => "network",
            Self::Decode(_) => "decode",
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimitExhausted { attempts } => {
                write!(f, "rate limited after {} attempts", attempts)
            }
            Self::HttpStatus(code) => write!(f, "HTTP {}", code),
            Self::Timeout => f.write_str("request timeout"),
            Self::Connect => f.write_str("connection failed"),
            Self::Cancelled { attempts } => {
                write!(f, "cancelled during backoff after {} attempts", attempts)
            }
            Self::Network(e) => write!(f, "network error: {}", e),
            Self::Decode(e) => write!(f, "undecodable body: {}", e),
        }
    }
}

/// Result of fetching one query URL
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Non-empty array of raw records
    Data(Vec<Value>),
    /// 200 with an empty array, `null`, or no body
    Empty,
    /// No data could be obtained
    Failed(FetchFailure),
}

impl Outcome {
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }
}

/// An outcome plus the backoff sleeps taken to reach it
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub outcome: Outcome,
    pub backoff_delays: Vec<Duration>,
}

/// Source of outcomes for query URLs
///
/// The scheduler only depends on this trait, so the HTTP fetcher can be
/// swapped for an instrumented fake in tests.
#[async_trait]
pub trait SlotFetcher: Send + Sync {
    /// Fetches one fully-formed query URL
    async fn fetch(&self, url: &str) -> Outcome;
}

/// Builds an HTTP client with the configured timeout and user agent
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout)
        .connect_timeout(config.request_timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher that retries HTTP 429 with exponentially growing delays
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 200, records | `Data` |
/// | HTTP 200, `[]`/`null`/empty | `Empty` |
/// | HTTP 429 | Sleep, double the delay, retry up to `max_retries` times |
/// | Cancelled while sleeping | Immediate `Failed` |
/// | Other status | Immediate `Failed` |
/// | Timeout / connect / transport error | Immediate `Failed` |
#[derive(Debug, Clone)]
pub struct BackoffFetcher {
    client: Client,
    config: FetcherConfig,
    cancel: CancellationToken,
}

impl BackoffFetcher {
    /// Creates a fetcher with its own HTTP client
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config)?;
        Ok(Self {
            client,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Cuts backoff sleeps short once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fetches a URL and reports every backoff sleep taken
    pub async fn fetch_with_report(&self, url: &str) -> FetchReport {
        let mut delay = self.config.initial_backoff;
        let mut backoff_delays = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.attempt(url).await {
                Attempt::Done(outcome) => {
                    return FetchReport {
                        outcome,
                        backoff_delays,
                    };
                }
                Attempt::RateLimited => {
                    if backoff_delays.len() as u32 >= self.config.max_retries {
                        tracing::warn!(
                            "Rate limit persists for {} after {} attempts, giving up",
                            url,
                            attempt
                        );
                        return FetchReport {
                            outcome: Outcome::Failed(FetchFailure::RateLimitExhausted {
                                attempts: attempt,
                            }),
                            backoff_delays,
                        };
                    }

                    tracing::warn!(
                        "Rate limit exceeded for {}. Retrying in {:?}...",
                        url,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            tracing::debug!("Backoff for {} cancelled", url);
                            return FetchReport {
                                outcome: Outcome::Failed(FetchFailure::Cancelled {
                                    attempts: attempt,
                                }),
                                backoff_delays,
                            };
                        }
                    }
                    backoff_delays.push(delay);
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    /// Performs one GET and classifies it
    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Done(Outcome::Failed(classify_transport_error(url, &e))),
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited;
        }

        if status != StatusCode::OK {
            tracing::debug!("Failed to fetch {}. Status code: {}", url, status.as_u16());
            return Attempt::Done(Outcome::Failed(FetchFailure::HttpStatus(status.as_u16())));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return Attempt::Done(Outcome::Failed(classify_transport_error(url, &e))),
        };

        Attempt::Done(classify_body(&body))
    }
}

#[async_trait]
impl SlotFetcher for BackoffFetcher {
    async fn fetch(&self, url: &str) -> Outcome {
        self.fetch_with_report(url).await.outcome
    }
}

enum Attempt {
    Done(Outcome),
    RateLimited,
}

fn classify_transport_error(url: &str, e: &reqwest::Error) -> FetchFailure {
    let failure = if e.is_timeout() {
        FetchFailure::Timeout
    } else if e.is_connect() {
        FetchFailure::Connect
    } else {
        FetchFailure::Network(e.to_string())
    };
    tracing::debug!("Request to {} failed: {}", url, failure);
    failure
}

/// Classifies a 200 response body
///
/// A lone JSON object is accepted as a single record.
fn classify_body(body: &str) -> Outcome {
    if body.trim().is_empty() {
        return Outcome::Empty;
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Null) => Outcome::Empty,
        Ok(Value::Array(items)) if items.is_empty() => Outcome::Empty,
        Ok(Value::Array(items)) => Outcome::Data(items),
        Ok(obj @ Value::Object(_)) => Outcome::Data(vec![obj]),
        Ok(other) => Outcome::Failed(FetchFailure::Decode(format!(
            "expected an array, got {}",
            other
        ))),
        Err(e) => Outcome::Failed(FetchFailure::Decode(e.to_string())),
    }
}

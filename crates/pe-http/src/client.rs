//! Shared HTTP substrate every collector calls through (§4.1, §9).
//!
//! Centralizes what the original crawler inlined per-collector: a
//! configured `reqwest::Client` with a source-appropriate `User-Agent`,
//! per-host rate limiting, and exponential-backoff retry that only retries
//! the transient error classes (timeouts, connection resets, 5xx, 429).

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use pe_core::error::{AppError, AppResult};

use crate::rate_limiter::HostRateLimiter;

/// Hook a caller can use to inspect every response before it's parsed —
/// e.g. to record a request/response pair for cost tracking or audit
/// logging. Default no-op.
pub trait ResponseInspector: Send + Sync {
    fn inspect(&self, _url: &str, _status: StatusCode) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInspector;

impl ResponseInspector for NoopInspector {}

/// Shared substrate used by all collectors to reach the network (§9).
pub struct HttpSubstrate {
    client: Client,
    sec_client: Client,
    rate_limiter: Arc<HostRateLimiter>,
    max_retries: u32,
    backoff_factor: f64,
    inspector: Arc<dyn ResponseInspector>,
}

impl HttpSubstrate {
    pub fn new(
        user_agent: &str,
        sec_user_agent: &str,
        default_requests_per_second: f64,
        max_retries: u32,
        backoff_factor: f64,
    ) -> AppResult<Self> {
        let client = build_client(user_agent)?;
        let sec_client = build_client(sec_user_agent)?;

        Ok(Self {
            client,
            sec_client,
            rate_limiter: Arc::new(HostRateLimiter::new(default_requests_per_second)),
            max_retries,
            backoff_factor,
            inspector: Arc::new(NoopInspector),
        })
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn ResponseInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    fn client_for(&self, url: &str) -> &Client {
        if url.contains("sec.gov") {
            &self.sec_client
        } else {
            &self.client
        }
    }

    fn host_of(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string())
    }

    /// Fetches `url`, retrying transient failures with exponential backoff,
    /// and deserializes the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        let bytes = self.get_bytes(url).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::parse(format!("invalid JSON from {url}: {e}")))
    }

    /// Fetches `url` as raw bytes, applying the per-host rate limit and the
    /// retry policy (§4.1, §7: transient errors retried in the substrate).
    pub async fn get_bytes(&self, url: &str) -> AppResult<Vec<u8>> {
        let host = Self::host_of(url);
        let mut backoff = self.backoff_policy();
        let mut attempt = 0u32;

        loop {
            self.rate_limiter.wait_for_permit(&host).await;

            let result = self.client_for(url).get(url).send().await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    self.inspector.inspect(url, status);
                    let retry_after = retry_after_duration(&response);

                    if status.is_success() {
                        return response
                            .bytes()
                            .await
                            .map(|b| b.to_vec())
                            .map_err(|e| AppError::transient(format!("reading body from {url}: {e}")));
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Err(AppError::not_found(format!("{url} returned 404")));
                    }

                    if is_retryable_status(status) && attempt < self.max_retries {
                        attempt += 1;
                        let mut wait = backoff.next_backoff().unwrap_or(Duration::from_secs(1));
                        if let Some(retry_after) = retry_after {
                            wait = wait.max(retry_after);
                        }
                        warn!(url, %status, attempt, ?wait, "transient HTTP error, retrying");
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if is_retryable_status(status) {
                        let message = format!("{url} returned {status} after {attempt} retries");
                        return Err(match retry_after {
                            Some(retry_after) => AppError::transient_after(message, retry_after),
                            None => AppError::transient(message),
                        });
                    }

                    return Err(AppError::fatal(format!("{url} returned {status}")));
                }
                Err(e) if attempt < self.max_retries && is_retryable_reqwest_error(&e) => {
                    attempt += 1;
                    let wait = backoff.next_backoff().unwrap_or(Duration::from_secs(1));
                    warn!(url, error = %e, attempt, ?wait, "transient transport error, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) if is_retryable_reqwest_error(&e) => {
                    return Err(AppError::transient(format!(
                        "{url} failed after {attempt} retries: {e}"
                    )));
                }
                Err(e) => {
                    return Err(AppError::fatal(format!("{url}: {e}")));
                }
            }
        }
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            multiplier: self.backoff_factor,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

fn build_client(user_agent: &str) -> AppResult<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| AppError::config(format!("failed to build HTTP client: {e}")))
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Parses a `Retry-After` header as a seconds count (the form every source
/// in this domain sends on 429s; the HTTP-date form isn't handled).
fn retry_after_duration(response: &reqwest::Response) -> Option<Duration> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn is_retryable_reqwest_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_json_parses_successful_response() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/data.json")
            .with_status(200)
            .with_body(r#"{"value": 42}"#)
            .create_async()
            .await;

        let substrate = HttpSubstrate::new("pe-collector-test/1.0", "pe-collector-test/1.0", 100.0, 1, 2.0)
            .unwrap();
        let url = format!("{}/data.json", server.url());

        #[derive(serde::Deserialize)]
        struct Payload {
            value: i32,
        }

        let payload: Payload = substrate.get_json(&url).await.unwrap();
        assert_eq!(payload.value, 42);
    }

    #[tokio::test]
    async fn not_found_surfaces_as_not_found_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.json")
            .with_status(404)
            .create_async()
            .await;

        let substrate = HttpSubstrate::new("pe-collector-test/1.0", "pe-collector-test/1.0", 100.0, 1, 2.0)
            .unwrap();
        let url = format!("{}/missing.json", server.url());

        let err = substrate.get_bytes(&url).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn server_error_retries_then_surfaces_transient() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/flaky.json")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let substrate = HttpSubstrate::new("pe-collector-test/1.0", "pe-collector-test/1.0", 100.0, 1, 2.0)
            .unwrap();
        let url = format!("{}/flaky.json", server.url());

        let err = substrate.get_bytes(&url).await.unwrap_err();
        assert!(matches!(err, AppError::Transient { .. }));
    }

    #[tokio::test]
    async fn rate_limited_retries_honor_retry_after_header() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/limited.json")
            .with_status(429)
            .with_header("Retry-After", "1")
            .expect(2)
            .create_async()
            .await;

        let substrate = HttpSubstrate::new("pe-collector-test/1.0", "pe-collector-test/1.0", 100.0, 1, 2.0)
            .unwrap();
        let url = format!("{}/limited.json", server.url());

        let started = std::time::Instant::now();
        let err = substrate.get_bytes(&url).await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_secs(1));
        match err {
            AppError::Transient { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(1)));
            }
            other => panic!("expected Transient, got {other:?}"),
        }
    }
}

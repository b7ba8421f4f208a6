//! A single node endpoint and its backoff state.
//!
//! ```text
//!            connection error
//!   AVAILABLE ───────────────▶ BACKOFF(until)
//!       ▲                           │
//!       └───────── answer ──────────┘
//! ```
//!
//! Any HTTP answer, 5xx included, counts as the node being reachable.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::ConnectionError;
use super::Request;
use crate::config::{ConfigError, NodeConfig, BACKOFF_DELAY};

/// Consecutive-failure bookkeeping of one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffState {
    pub retries: u32,
    pub backoff_until: Option<Instant>,
}

/// Raw answer of one node, before status classification.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub url: String,
    pub text: String,
}

#[derive(Debug)]
pub struct Connection {
    endpoint: String,
    headers: HeaderMap,
    client: Client,
    backoff_cap: Duration,
    state: Mutex<BackoffState>,
}

impl Connection {
    pub fn new(node: &NodeConfig, client: Client, backoff_cap: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: node.endpoint.clone(),
            headers: header_map(&node.headers)?,
            client,
            backoff_cap,
            state: Mutex::new(BackoffState::default()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn backoff_state(&self) -> BackoffState {
        *self.state.lock()
    }

    pub fn backoff_until(&self) -> Option<Instant> {
        self.state.lock().backoff_until
    }

    /// Time left before this connection may be used again.
    pub fn backoff_remaining(&self, now: Instant) -> Duration {
        self.backoff_until()
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Delay imposed after `retries` earlier consecutive failures.
    pub fn backoff_delay(&self, retries: u32) -> Duration {
        BACKOFF_DELAY
            .saturating_mul(2u32.saturating_pow(retries))
            .min(self.backoff_cap)
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        let delay = self.backoff_delay(state.retries);
        state.backoff_until = Some(Instant::now() + delay);
        state.retries = state.retries.saturating_add(1);
        warn!(
            endpoint = %self.endpoint,
            retries = state.retries,
            backoff_ms = delay.as_millis() as u64,
            "connection failed, backing off"
        );
    }

    pub fn record_success(&self) {
        *self.state.lock() = BackoffState::default();
    }

    /// Issue `request` once. `timeout` bounds this single attempt.
    ///
    /// Only transport-level failures are errors here; every HTTP answer is
    /// returned as-is and resets the backoff.
    pub async fn request(
        &self,
        request: &Request,
        extra_headers: &HeaderMap,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, ConnectionError> {
        let url = format!("{}{}", self.endpoint, request.path);
        debug!(method = %request.method, url = %url, "sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(self.headers.clone())
            .headers(extra_headers.clone());
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(json) = &request.json {
            builder = builder.json(json);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let outcome = match builder.send().await {
            Ok(response) => {
                let status = response.status();
                let final_url = response.url().to_string();
                response.text().await.map(|text| HttpResponse {
                    status,
                    url: final_url,
                    text,
                })
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                self.record_success();
                Ok(response)
            }
            Err(source) => {
                self.record_failure();
                Err(ConnectionError { url, source })
            }
        }
    }
}

pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let invalid = || ConfigError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

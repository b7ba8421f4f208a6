//! # Transport
//!
//! Carries one HTTP request to the ledger, failing over across every
//! configured node within a single time budget.
//!
//! ## Architecture
//!
//! ```text
//! Transport::forward_request
//!     │  loop until answered or budget spent
//!     ▼
//! Pool ── Picker (BackoffPicker: earliest backoff_until)
//!     │
//!     ▼
//! Connection ── reqwest::Client + Mutex<BackoffState>
//! ```
//!
//! ## Retry Policy
//!
//! | Outcome                    | Action                                  |
//! |----------------------------|-----------------------------------------|
//! | 2xx                        | decode body (JSON, else text), return   |
//! | non-2xx                    | typed [`TransportError`], no retry      |
//! | connection-level failure   | back off that node, try again           |
//! | budget spent               | [`TransportError::Timeout`] with causes |
//!
//! Backoff is `BACKOFF_DELAY * 2^retries`, capped at half the timeout, or at
//! `NO_TIMEOUT_BACKOFF_CAP` when the transport has no timeout and retries
//! forever. Sleeps use `tokio::time`, so dropping the future cancels them.

pub mod connection;
pub mod error;
pub mod pool;

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use connection::{BackoffState, Connection, HttpResponse};
pub use error::{ConnectionError, HttpFailure, TransportError};
pub use pool::{BackoffPicker, Picker, Pool};

use crate::config::{NodeConfig, NO_TIMEOUT_BACKOFF_CAP};

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// One logical request, independent of which node serves it.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path appended to the node endpoint, starting with `/`.
    pub path: String,
    pub json: Option<Value>,
    pub params: Vec<(String, String)>,
    /// Sent on top of the node's own headers.
    pub headers: BTreeMap<String, String>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            json: None,
            params: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Add a query parameter; `None` values are left out entirely.
    pub fn param<V: ToString>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.params.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn decode(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// JSON as-is; text becomes a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Transport {
    pool: Pool,
    timeout: Option<Duration>,
}

impl Transport {
    pub fn new(nodes: &[NodeConfig], timeout: Option<Duration>) -> Result<Self, TransportError> {
        Self::with_picker(nodes, timeout, Box::new(BackoffPicker))
    }

    pub fn with_picker(
        nodes: &[NodeConfig],
        timeout: Option<Duration>,
        picker: Box<dyn Picker>,
    ) -> Result<Self, TransportError> {
        let cap = backoff_cap(timeout);
        let client = reqwest::Client::new();
        let connections = nodes
            .iter()
            .map(|node| Connection::new(node, client.clone(), cap))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            pool: Pool::new(connections, picker)?,
            timeout,
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send `request` to the best available node, retrying connection
    /// failures on whichever node the picker chooses next.
    pub async fn forward_request(&self, request: Request) -> Result<ResponseBody, TransportError> {
        let extra_headers = connection::header_map(&request.headers)?;
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut errors = Vec::new();

        loop {
            let conn = self.pool.get_connection();
            let now = Instant::now();
            let wait = conn.backoff_remaining(now);

            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(now);
                if remaining.is_zero() || wait >= remaining {
                    return Err(self.timed_out(&request, errors));
                }
            }
            if !wait.is_zero() {
                debug!(endpoint = conn.endpoint(), wait_ms = wait.as_millis() as u64, "waiting out backoff");
                tokio::time::sleep(wait).await;
            }

            let budget = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if budget == Some(Duration::ZERO) {
                return Err(self.timed_out(&request, errors));
            }

            match conn.request(&request, &extra_headers, budget).await {
                Ok(response) if response.status.is_success() => {
                    return Ok(ResponseBody::decode(response.text));
                }
                Ok(response) => {
                    debug!(status = response.status.as_u16(), url = %response.url, "node answered with error");
                    return Err(TransportError::from_status(
                        response.status,
                        response.url,
                        response.text,
                    ));
                }
                Err(e) => errors.push(e),
            }
        }
    }

    fn timed_out(&self, request: &Request, errors: Vec<ConnectionError>) -> TransportError {
        warn!(
            method = %request.method,
            path = %request.path,
            attempts = errors.len(),
            "request budget exhausted"
        );
        TransportError::Timeout { errors }
    }
}

/// Backoff ceiling for a transport with the given overall `timeout`.
pub fn backoff_cap(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(timeout) => timeout / 2,
        None => NO_TIMEOUT_BACKOFF_CAP,
    }
}

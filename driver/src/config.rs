//! # Driver Configuration & Constants
//!
//! Every protocol constant the driver depends on lives here, next to the
//! caller-facing node configuration.
//!
//! The protocol constants are not tunables. The server hashes, signs and
//! range-checks with exactly these values; change one and every
//! transaction you build is rejected.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Transaction model version written into every transaction.
pub const TRANSACTION_VERSION: &str = "2.0";

/// Largest amount a single output may carry. The lower bound is 1.
pub const MAX_AMOUNT: u64 = 9_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Base of the exponential backoff: a connection that failed `n` times in a
/// row rests for `BACKOFF_DELAY * 2^n`.
pub const BACKOFF_DELAY: Duration = Duration::from_millis(500);

/// Backoff ceiling when no timeout is configured. With a timeout the
/// ceiling is half of it.
pub const NO_TIMEOUT_BACKOFF_CAP: Duration = Duration::from_secs(10);

/// Total time budget of one request, retries included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Node used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9984";

/// Port assumed for plain HTTP endpoints that do not name one.
pub const DEFAULT_PORT: u16 = 9984;

/// Port assumed for HTTPS endpoints that do not name one.
pub const DEFAULT_TLS_PORT: u16 = 443;

/// Prefix of every versioned API route.
pub const API_PREFIX: &str = "/v1";

// ---------------------------------------------------------------------------
// Node configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    #[error("no nodes configured")]
    NoNodes,
}

/// A node as the caller writes it: a bare URL or an endpoint with its own
/// headers.
///
/// ```
/// use resdb_driver::config::NodeSpec;
///
/// let nodes: Vec<NodeSpec> = serde_json::from_str(
///     r#"["localhost", {"endpoint": "https://ledger.example:8443", "headers": {"app_id": "x"}}]"#,
/// ).unwrap();
/// assert_eq!(nodes.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Url(String),
    Detailed {
        endpoint: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl From<&str> for NodeSpec {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for NodeSpec {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

/// A node after normalization: absolute endpoint URL plus the full header
/// set to send to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
}

/// Everything needed to build a [`Resdb`](crate::driver::Resdb) driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// Sent to every node; per-node headers win on conflict.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request budget in milliseconds. `null` means retry forever.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: Option<u64>,
}

fn default_timeout_ms() -> Option<u64> {
    Some(DEFAULT_TIMEOUT.as_millis() as u64)
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            headers: BTreeMap::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DriverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn normalized_nodes(&self) -> Result<Vec<NodeConfig>, ConfigError> {
        normalize_nodes(&self.nodes, &self.headers)
    }
}

/// Normalize node specs, falling back to [`DEFAULT_ENDPOINT`] when the list
/// is empty. Driver-level `headers` are merged under each node's own.
pub fn normalize_nodes(
    nodes: &[NodeSpec],
    headers: &BTreeMap<String, String>,
) -> Result<Vec<NodeConfig>, ConfigError> {
    if nodes.is_empty() {
        return Ok(vec![NodeConfig {
            endpoint: normalize_url(DEFAULT_ENDPOINT)?,
            headers: headers.clone(),
        }]);
    }
    nodes
        .iter()
        .map(|node| {
            let (endpoint, own) = match node {
                NodeSpec::Url(url) => (url.as_str(), None),
                NodeSpec::Detailed { endpoint, headers } => (endpoint.as_str(), Some(headers)),
            };
            let mut merged = headers.clone();
            if let Some(own) = own {
                merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Ok(NodeConfig {
                endpoint: normalize_url(endpoint)?,
                headers: merged,
            })
        })
        .collect()
}

/// `scheme://host:port/path`, with `http` and the scheme's default port
/// filled in when missing and any query, fragment or trailing slash dropped.
///
/// ```
/// use resdb_driver::config::normalize_url;
///
/// assert_eq!(normalize_url("localhost").unwrap(), "http://localhost:9984");
/// assert_eq!(normalize_url("https://node.example/api/").unwrap(), "https://node.example:443/api");
/// ```
pub fn normalize_url(node: &str) -> Result<String, ConfigError> {
    let trimmed = node.trim();
    let absolute = if trimmed.is_empty() {
        DEFAULT_ENDPOINT.to_string()
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: node.to_string(),
        reason,
    };
    let url = Url::parse(&absolute).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?;

    // `Url` hides a port equal to the scheme default, so look at the text.
    let port = if has_explicit_port(&absolute) {
        url.port_or_known_default()
    } else {
        None
    }
    .unwrap_or(match url.scheme() {
        "https" => DEFAULT_TLS_PORT,
        _ => DEFAULT_PORT,
    });

    Ok(format!(
        "{}://{}:{}{}",
        url.scheme(),
        host,
        port,
        url.path().trim_end_matches('/')
    ))
}

fn has_explicit_port(absolute: &str) -> bool {
    let authority = absolute
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(absolute)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    match authority.rsplit_once(':') {
        Some((_, port)) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

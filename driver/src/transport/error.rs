//! Transport error taxonomy.
//!
//! Two families with opposite retry policies: a [`ConnectionError`] means
//! the node never answered and the request moves on to another node, so it
//! only reaches the caller collected inside [`TransportError::Timeout`];
//! every other variant is final and reaches the caller on first sight.

use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;

/// A node that could not be reached (refused, reset, DNS, per-request
/// timeout, body cut short).
#[derive(Debug, Error)]
#[error("connection to {url} failed: {source}")]
pub struct ConnectionError {
    pub url: String,
    #[source]
    pub source: reqwest::Error,
}

/// A non-2xx answer, kept whole for the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpFailure {
    pub status: u16,
    pub url: String,
    /// Raw response text.
    pub body: String,
    /// The body, if it parsed as JSON.
    pub json: Option<Value>,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} at {}", self.status, self.url)?;
        if !self.body.is_empty() {
            write!(f, ": {}", self.body)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bad request: {0}")]
    BadRequest(HttpFailure),

    #[error("not found: {0}")]
    NotFound(HttpFailure),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(HttpFailure),

    #[error("gateway timeout: {0}")]
    GatewayTimeout(HttpFailure),

    #[error("{0}")]
    Http(HttpFailure),

    #[error("request timed out after {} connection error(s)", .errors.len())]
    Timeout { errors: Vec<ConnectionError> },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TransportError {
    /// Classify a non-2xx response.
    pub fn from_status(status: StatusCode, url: String, body: String) -> Self {
        let json = serde_json::from_str(&body).ok();
        let failure = HttpFailure {
            status: status.as_u16(),
            url,
            body,
            json,
        };
        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest(failure),
            StatusCode::NOT_FOUND => Self::NotFound(failure),
            StatusCode::SERVICE_UNAVAILABLE => Self::ServiceUnavailable(failure),
            StatusCode::GATEWAY_TIMEOUT => Self::GatewayTimeout(failure),
            _ => Self::Http(failure),
        }
    }

    /// The HTTP answer, for the status-bearing variants.
    pub fn http_failure(&self) -> Option<&HttpFailure> {
        match self {
            Self::BadRequest(f)
            | Self::NotFound(f)
            | Self::ServiceUnavailable(f)
            | Self::GatewayTimeout(f)
            | Self::Http(f) => Some(f),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.http_failure().map(|f| f.status)
    }
}

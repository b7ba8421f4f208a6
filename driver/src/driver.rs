//! # Driver
//!
//! [`Resdb`] is the entry point for talking to a ResilientDB deployment:
//! it owns the [`Transport`] and hands out one small endpoint handle per
//! API namespace.
//!
//! ```text
//! Resdb
//!  ├── info()              GET  /
//!  ├── api_info()          GET  /v1
//!  ├── transactions()      /v1/transactions/
//!  ├── outputs()           /v1/outputs/
//!  ├── blocks()            /v1/blocks/
//!  ├── assets()            /v1/assets/
//!  └── metadata()          /v1/metadata/
//! ```
//!
//! Every handle takes optional per-call headers through `with_headers`.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::codec::SerializationError;
use crate::config::{ConfigError, DriverConfig, NodeConfig, NodeSpec, API_PREFIX};
use crate::transaction::{
    fulfill, prepare_transaction, Operation, PrepareRequest, Transaction, TransactionError,
};
use crate::transport::{Request, ResponseBody, Transport, TransportError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("unexpected response from {endpoint}: {body}")]
    UnexpectedResponse { endpoint: String, body: String },
}

// ---------------------------------------------------------------------------
// Resdb
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Resdb {
    nodes: Vec<NodeConfig>,
    transport: Transport,
    api_prefix: String,
}

impl Resdb {
    pub fn new(config: DriverConfig) -> Result<Self, DriverError> {
        let nodes = config.normalized_nodes()?;
        let transport = Transport::new(&nodes, config.timeout())?;
        Ok(Self {
            nodes,
            transport,
            api_prefix: API_PREFIX.to_string(),
        })
    }

    /// Driver for `nodes` with default headers and timeout.
    ///
    /// ```
    /// use resdb_driver::driver::Resdb;
    ///
    /// let resdb = Resdb::with_nodes(["localhost:18000", "https://ledger.example"]).unwrap();
    /// assert_eq!(resdb.nodes()[0].endpoint, "http://localhost:18000");
    /// ```
    pub fn with_nodes<N: Into<NodeSpec>>(nodes: impl IntoIterator<Item = N>) -> Result<Self, DriverError> {
        Self::new(DriverConfig {
            nodes: nodes.into_iter().map(Into::into).collect(),
            ..DriverConfig::default()
        })
    }

    pub fn nodes(&self) -> &[NodeConfig] {
        &self.nodes
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Node details, from `GET /`.
    pub async fn info(&self) -> Result<Value, DriverError> {
        Ok(self.transport.forward_request(Request::get("/")).await?.into_value())
    }

    /// HTTP API details, from `GET /v1`.
    pub async fn api_info(&self) -> Result<Value, DriverError> {
        Ok(self
            .transport
            .forward_request(Request::get(self.api_prefix.clone()))
            .await?
            .into_value())
    }

    pub fn transactions(&self) -> TransactionsEndpoint<'_> {
        TransactionsEndpoint(Namespace::new(self, "/transactions/"))
    }

    pub fn outputs(&self) -> OutputsEndpoint<'_> {
        OutputsEndpoint(Namespace::new(self, "/outputs/"))
    }

    pub fn blocks(&self) -> BlocksEndpoint<'_> {
        BlocksEndpoint(Namespace::new(self, "/blocks/"))
    }

    pub fn assets(&self) -> AssetsEndpoint<'_> {
        AssetsEndpoint(Namespace::new(self, "/assets/"))
    }

    pub fn metadata(&self) -> MetadataEndpoint<'_> {
        MetadataEndpoint(Namespace::new(self, "/metadata/"))
    }
}

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Namespace<'a> {
    driver: &'a Resdb,
    path: String,
    headers: BTreeMap<String, String>,
}

impl<'a> Namespace<'a> {
    fn new(driver: &'a Resdb, suffix: &str) -> Self {
        Self {
            driver,
            path: format!("{}{}", driver.api_prefix, suffix),
            headers: BTreeMap::new(),
        }
    }

    async fn send(&self, request: Request) -> Result<ResponseBody, DriverError> {
        Ok(self
            .driver
            .transport
            .forward_request(request.headers(&self.headers))
            .await?)
    }

    async fn list(&self, request: Request) -> Result<Vec<Value>, DriverError> {
        let endpoint = request.path.clone();
        match self.send(request).await? {
            ResponseBody::Json(Value::Array(items)) => Ok(items),
            other => Err(unexpected(endpoint, other)),
        }
    }
}

fn unexpected(endpoint: String, body: ResponseBody) -> DriverError {
    let body = match body {
        ResponseBody::Json(value) => value.to_string(),
        ResponseBody::Text(text) => text,
    };
    DriverError::UnexpectedResponse { endpoint, body }
}

macro_rules! with_headers {
    ($endpoint:ident) => {
        impl<'a> $endpoint<'a> {
            /// Extra headers for calls made through this handle.
            pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
                self.0.headers.extend(headers);
                self
            }
        }
    };
}

with_headers!(TransactionsEndpoint);
with_headers!(OutputsEndpoint);
with_headers!(BlocksEndpoint);
with_headers!(AssetsEndpoint);
with_headers!(MetadataEndpoint);

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransactionsEndpoint<'a>(Namespace<'a>);

impl TransactionsEndpoint<'_> {
    /// Build an unsigned transaction. Purely local.
    pub fn prepare(&self, request: PrepareRequest) -> Result<Transaction, DriverError> {
        Ok(prepare_transaction(request)?)
    }

    /// Sign a prepared transaction. Purely local.
    pub fn fulfill<K: AsRef<str>>(&self, tx: &Transaction, private_keys: &[K]) -> Result<Transaction, DriverError> {
        Ok(fulfill(tx, private_keys)?)
    }

    /// Submit a fulfilled transaction and wait for commit. Returns the id the
    /// node reports, or the transaction's own id when it reports none.
    pub async fn send_commit(&self, tx: &Transaction) -> Result<String, DriverError> {
        let path = format!("{}commit", self.0.path);
        let body = self
            .0
            .send(Request::post(path.clone()).json(tx.to_value()?))
            .await?;

        let reported = match body {
            ResponseBody::Text(text) => {
                let id = text.trim().strip_prefix("id:").map(|id| id.trim().to_string());
                if id.is_none() {
                    return Err(DriverError::UnexpectedResponse {
                        endpoint: path,
                        body: text,
                    });
                }
                id
            }
            ResponseBody::Json(value) => value.get("id").and_then(Value::as_str).map(str::to_string),
        };
        let id = reported
            .or_else(|| tx.id.clone())
            .ok_or(TransactionError::MissingId)?;
        info!(id = %id, "transaction committed");
        Ok(id)
    }

    /// A committed transaction by id.
    pub async fn retrieve(&self, txid: &str) -> Result<Transaction, DriverError> {
        let path = format!("{}{}", self.0.path, txid);
        match self.0.send(Request::get(path.clone())).await? {
            ResponseBody::Json(value) => Ok(Transaction::from_value(value)?),
            other => Err(unexpected(path, other)),
        }
    }

    /// Fetch many transactions with at most `concurrency` requests in
    /// flight. Results come back in the order of `txids`.
    pub async fn retrieve_many<S: AsRef<str>>(
        &self,
        txids: &[S],
        concurrency: usize,
    ) -> Vec<Result<Transaction, DriverError>> {
        stream::iter(txids)
            .map(|id| self.retrieve(id.as_ref()))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// Every transaction touching `asset_id`, optionally of one operation.
    pub async fn get(&self, asset_id: &str, operation: Option<Operation>) -> Result<Vec<Transaction>, DriverError> {
        let request = Request::get(self.0.path.clone())
            .param("asset_id", Some(asset_id))
            .param("operation", operation);
        self.0
            .list(request)
            .await?
            .into_iter()
            .map(|value| Transaction::from_value(value).map_err(DriverError::from))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Outputs, blocks, assets, metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OutputsEndpoint<'a>(Namespace<'a>);

impl OutputsEndpoint<'_> {
    /// Outputs owned by `public_key`. `spent` narrows to spent or unspent
    /// ones; `None` returns both.
    pub async fn get(&self, public_key: &str, spent: Option<bool>) -> Result<Vec<Value>, DriverError> {
        let request = Request::get(self.0.path.clone())
            .param("public_key", Some(public_key))
            .param("spent", spent);
        self.0.list(request).await
    }
}

#[derive(Debug, Clone)]
pub struct BlocksEndpoint<'a>(Namespace<'a>);

impl BlocksEndpoint<'_> {
    /// The block containing `txid`, if any.
    pub async fn get(&self, txid: &str) -> Result<Option<Value>, DriverError> {
        let request = Request::get(self.0.path.clone()).param("transaction_id", Some(txid));
        Ok(self.0.list(request).await?.into_iter().next())
    }
}

#[derive(Debug, Clone)]
pub struct AssetsEndpoint<'a>(Namespace<'a>);

impl AssetsEndpoint<'_> {
    /// Text search over asset data. A `limit` of 0 returns every match.
    pub async fn get(&self, search: &str, limit: usize) -> Result<Vec<Value>, DriverError> {
        let request = Request::get(self.0.path.clone())
            .param("search", Some(search))
            .param("limit", Some(limit));
        self.0.list(request).await
    }
}

#[derive(Debug, Clone)]
pub struct MetadataEndpoint<'a>(Namespace<'a>);

impl MetadataEndpoint<'_> {
    /// Text search over transaction metadata. A `limit` of 0 returns every
    /// match.
    pub async fn get(&self, search: &str, limit: usize) -> Result<Vec<Value>, DriverError> {
        let request = Request::get(self.0.path.clone())
            .param("search", Some(search))
            .param("limit", Some(limit));
        self.0.list(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ENDPOINT;

    #[test]
    fn defaults() {
        let resdb = Resdb::new(DriverConfig::default()).unwrap();
        assert_eq!(resdb.nodes().len(), 1);
        assert_eq!(resdb.nodes()[0].endpoint, DEFAULT_ENDPOINT);
        assert_eq!(resdb.api_prefix(), "/v1");
        assert_eq!(resdb.transport().timeout(), Some(crate::config::DEFAULT_TIMEOUT));
    }

    #[test]
    fn namespace_paths() {
        let resdb = Resdb::with_nodes(["n1"]).unwrap();
        assert_eq!(resdb.transactions().0.path, "/v1/transactions/");
        assert_eq!(resdb.outputs().0.path, "/v1/outputs/");
        assert_eq!(resdb.blocks().0.path, "/v1/blocks/");
        assert_eq!(resdb.assets().0.path, "/v1/assets/");
        assert_eq!(resdb.metadata().0.path, "/v1/metadata/");
    }

    #[test]
    fn per_call_headers_accumulate() {
        let resdb = Resdb::with_nodes(["n1"]).unwrap();
        let handle = resdb
            .outputs()
            .with_headers([("app_id".to_string(), "x".to_string())].into_iter().collect());
        assert_eq!(handle.0.headers.get("app_id").map(String::as_str), Some("x"));
    }

    #[test]
    fn invalid_node_is_a_config_error() {
        assert!(matches!(
            Resdb::with_nodes(["http://"]),
            Err(DriverError::Config(ConfigError::InvalidEndpoint { .. }))
        ));
    }

    #[test]
    fn prepare_and_fulfill_are_local() {
        let alice = crate::crypto::generate_keypair();
        let resdb = Resdb::with_nodes(["n1"]).unwrap();
        let txs = resdb.transactions();
        let prepared = txs
            .prepare(PrepareRequest::new(Operation::Create).signers(vec![alice.public_key.clone()]))
            .unwrap();
        let signed = txs.fulfill(&prepared, &[&alice.private_key]).unwrap();
        assert!(signed.id.is_some());
    }
}

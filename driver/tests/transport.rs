//! Transport and driver tests against mock ledger nodes.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use resdb_driver::config::{DriverConfig, NodeConfig, NodeSpec};
use resdb_driver::crypto::generate_keypair;
use resdb_driver::transaction::{fulfill, prepare_create, Operation};
use resdb_driver::transport::{Request, ResponseBody, Transport, TransportError};
use resdb_driver::{DriverError, Resdb};

/// Nothing listens on port 1; connections are refused immediately.
const DEAD_NODE: &str = "http://127.0.0.1:1";

fn node(endpoint: &str) -> NodeConfig {
    NodeConfig {
        endpoint: endpoint.to_string(),
        headers: BTreeMap::new(),
    }
}

fn driver(server: &MockServer) -> Resdb {
    Resdb::with_nodes([server.uri()]).unwrap()
}

async fn fetch(transport: &Transport, route: &str) -> Result<ResponseBody, TransportError> {
    transport.forward_request(Request::get(route)).await
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fails_over_to_live_node() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.0"})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Transport::new(&[node(DEAD_NODE), node(&server.uri())], Some(Duration::from_secs(5))).unwrap();
    let body = transport.forward_request(Request::get("/")).await.unwrap();
    assert_eq!(body, ResponseBody::Json(json!({"version": "1.0"})));

    let dead = &transport.pool().connections()[0];
    assert_eq!(dead.backoff_state().retries, 1);
    assert!(dead.backoff_until().is_some());
    assert_eq!(transport.pool().connections()[1].backoff_state().retries, 0);
}

#[tokio::test]
async fn unreachable_nodes_time_out_with_causes() {
    let transport = Transport::new(&[node(DEAD_NODE)], Some(Duration::from_secs(1))).unwrap();

    let started = Instant::now();
    match transport.forward_request(Request::get("/")).await {
        Err(TransportError::Timeout { errors }) => {
            assert!(!errors.is_empty());
            assert!(errors.iter().all(|e| e.url == format!("{}/", DEAD_NODE)));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert!(started.elapsed() <= Duration::from_secs(2));
}

#[tokio::test]
async fn http_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/transactions/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Transport::new(&[node(&server.uri())], Some(Duration::from_secs(5))).unwrap();
    match transport.forward_request(Request::get("/v1/transactions/missing")).await {
        Err(TransportError::NotFound(failure)) => {
            assert_eq!(failure.status, 404);
            assert_eq!(failure.json, Some(json!({"message": "Not found"})));
            assert!(failure.url.ends_with("/v1/transactions/missing"));
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
    // An answer, even an error, keeps the node healthy.
    assert_eq!(transport.pool().connections()[0].backoff_state().retries, 0);
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let server = MockServer::start().await;
    for (code, route) in [(400, "/bad"), (503, "/busy"), (504, "/slow"), (500, "/boom")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(code).set_body_string("nope"))
            .mount(&server)
            .await;
    }

    let transport = Transport::new(&[node(&server.uri())], Some(Duration::from_secs(5))).unwrap();
    assert!(matches!(fetch(&transport, "/bad").await, Err(TransportError::BadRequest(_))));
    assert!(matches!(fetch(&transport, "/busy").await, Err(TransportError::ServiceUnavailable(_))));
    assert!(matches!(fetch(&transport, "/slow").await, Err(TransportError::GatewayTimeout(_))));
    match fetch(&transport, "/boom").await {
        Err(TransportError::Http(failure)) => {
            assert_eq!(failure.status, 500);
            assert_eq!(failure.body, "nope");
            assert_eq!(failure.json, None);
        }
        other => panic!("expected Http, got {:?}", other),
    }
}

#[tokio::test]
async fn node_and_request_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("app_id", "node-level"))
        .and(header("x-trace", "call-level"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let resdb = Resdb::new(DriverConfig {
        nodes: vec![NodeSpec::Detailed {
            endpoint: server.uri(),
            headers: [("app_id".to_string(), "node-level".to_string())].into_iter().collect(),
        }],
        headers: [("app_id".to_string(), "driver-level".to_string())].into_iter().collect(),
        ..DriverConfig::default()
    })
    .unwrap();

    let request = Request::get("/").headers(&[("x-trace".to_string(), "call-level".to_string())].into_iter().collect());
    let body = resdb.transport().forward_request(request).await.unwrap();
    assert_eq!(body.as_text(), Some("ok"));
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[tokio::test]
async fn info_and_api_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"software": "resdb"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"docs": "/v1/docs"})))
        .mount(&server)
        .await;

    let resdb = driver(&server);
    assert_eq!(resdb.info().await.unwrap()["software"], "resdb");
    assert_eq!(resdb.api_info().await.unwrap()["docs"], "/v1/docs");
}

#[tokio::test]
async fn send_commit_accepts_text_and_json() {
    let alice = generate_keypair();
    let tx = fulfill(
        &prepare_create(&[&alice.public_key], None, Some(json!({"n": 1})), None).unwrap(),
        &[&alice.private_key],
    )
    .unwrap();
    let id = tx.id.clone().unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions/commit"))
        .and(body_json(tx.to_value().unwrap()))
        .respond_with(ResponseTemplate::new(201).set_body_string(format!("id: {}", id)))
        .expect(1)
        .mount(&server)
        .await;
    assert_eq!(driver(&server).transactions().send_commit(&tx).await.unwrap(), id);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions/commit"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    assert_eq!(driver(&server).transactions().send_commit(&tx).await.unwrap(), id);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions/commit"))
        .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
        .mount(&server)
        .await;
    assert!(matches!(
        driver(&server).transactions().send_commit(&tx).await,
        Err(DriverError::UnexpectedResponse { .. })
    ));
}

#[tokio::test]
async fn rejected_commit_surfaces_bad_request() {
    let alice = generate_keypair();
    let tx = fulfill(
        &prepare_create(&[&alice.public_key], None, None, None).unwrap(),
        &[&alice.private_key],
    )
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/transactions/commit"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid transaction"})))
        .expect(1)
        .mount(&server)
        .await;

    match driver(&server).transactions().send_commit(&tx).await {
        Err(DriverError::Transport(TransportError::BadRequest(failure))) => {
            assert_eq!(failure.json.unwrap()["message"], "Invalid transaction")
        }
        other => panic!("expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn retrieve_and_retrieve_many() {
    let alice = generate_keypair();
    let txs: Vec<_> = (0..3)
        .map(|i| {
            fulfill(
                &prepare_create(&[&alice.public_key], None, Some(json!({"i": i})), None).unwrap(),
                &[&alice.private_key],
            )
            .unwrap()
        })
        .collect();

    let server = MockServer::start().await;
    for tx in &txs {
        Mock::given(method("GET"))
            .and(path(format!("/v1/transactions/{}", tx.id.as_ref().unwrap())))
            .respond_with(ResponseTemplate::new(200).set_body_json(tx.to_value().unwrap()))
            .mount(&server)
            .await;
    }

    let resdb = driver(&server);
    let first = resdb.transactions().retrieve(txs[0].id.as_ref().unwrap()).await.unwrap();
    assert_eq!(first, txs[0]);

    let mut ids: Vec<String> = txs.iter().map(|tx| tx.id.clone().unwrap()).collect();
    ids.push("missing".to_string());
    let fetched = resdb.transactions().retrieve_many(&ids, 2).await;
    assert_eq!(fetched.len(), 4);
    for (tx, result) in txs.iter().zip(&fetched) {
        assert_eq!(result.as_ref().unwrap(), tx);
    }
    assert!(matches!(
        fetched[3],
        Err(DriverError::Transport(TransportError::NotFound(_)))
    ));
}

#[tokio::test]
async fn query_endpoints_send_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/transactions/"))
        .and(query_param("asset_id", "abc"))
        .and(query_param("operation", "TRANSFER"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/outputs/"))
        .and(query_param("public_key", "pk"))
        .and(query_param("spent", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["../transactions/t/outputs/0"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/"))
        .and(query_param("transaction_id", "t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([7, 9])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/assets/"))
        .and(query_param("search", "bicycle"))
        .and(query_param("limit", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "a", "data": {}}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/metadata/"))
        .and(query_param("search", "earth"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let resdb = driver(&server);
    assert!(resdb
        .transactions()
        .get("abc", Some(Operation::Transfer))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(resdb.outputs().get("pk", Some(false)).await.unwrap().len(), 1);
    assert_eq!(resdb.blocks().get("t").await.unwrap(), Some(json!(7)));
    assert_eq!(resdb.assets().get("bicycle", 0).await.unwrap().len(), 1);
    assert!(resdb.metadata().get("earth", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn block_lookup_without_match_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    assert_eq!(driver(&server).blocks().get("t").await.unwrap(), None);
}

//! End-to-end tests: live server on an ephemeral port, real client
//!
//! - Echo round trip through `RpcClient` and through raw HTTP
//! - Procedure faults, unknown methods and bad params as `400`
//! - Non-POST requests as `405`, other paths as `404`
//! - Cancellation, timeouts and id session release

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use httprpc_client::{
    ClientError, DefaultIdStore, IdError, IdSession, IdStore, LeasedIdStore, RpcClient,
    UuidIdStore,
};
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use support::{TestServer, Text};

/// Create HTTP client for raw wire checks
fn create_http_client() -> Client<HttpConnector, Full<Bytes>> {
    Client::builder(TokioExecutor::new()).build_http()
}

async fn send_raw(
    server: &TestServer,
    method: Method,
    path: &str,
    body: &str,
) -> (StatusCode, hyper::HeaderMap, Bytes) {
    let request = Request::builder()
        .method(method)
        .uri(format!("http://{}{}", server.addr(), path))
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();

    let response = timeout(Duration::from_secs(5), create_http_client().request(request))
        .await
        .expect("Request timeout")
        .expect("Request failed");

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

fn client() -> RpcClient {
    RpcClient::builder()
        .with_request_timeout(Duration::from_secs(5))
        .build()
}

#[tokio::test]
async fn test_echo_through_client() {
    let server = TestServer::start().await;
    let cancel = CancellationToken::new();

    let reply: Text = client()
        .call(
            &cancel,
            &server.url(),
            "Echo",
            &Text {
                text: "hi".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(reply.text, "hi");
}

#[tokio::test]
async fn test_echo_wire_format() {
    let server = TestServer::start().await;

    let (status, headers, body) = send_raw(
        &server,
        Method::POST,
        "/rpc",
        r#"{"id":1,"method":"Echo","params":{"text":"hi"}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers[CONTENT_TYPE], "application/json");

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["result"], json!({"text": "hi"}));
    assert_eq!(json["id"], 1);
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_procedure_fault() {
    let server = TestServer::start().await;

    let (status, _, body) = send_raw(
        &server,
        Method::POST,
        "/rpc",
        r#"{"jsonrpc":"2.0","id":2,"method":"Fail","params":null}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["message"], "boom");
    assert!(json.get("result").is_none());

    let err = client()
        .call::<_, ()>(&CancellationToken::new(), &server.url(), "Fail", &())
        .await
        .unwrap_err();
    assert_eq!(err.fault().map(|f| f.message.as_str()), Some("boom"));
}

#[tokio::test]
async fn test_unknown_method() {
    let server = TestServer::start().await;

    let (status, headers, body) = send_raw(
        &server,
        Method::POST,
        "/rpc",
        r#"{"jsonrpc":"2.0","id":3,"method":"Missing","params":{}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers["x-content-type-options"], "nosniff");
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], -32601);

    let err = client()
        .call::<_, Value>(&CancellationToken::new(), &server.url(), "Missing", &())
        .await
        .unwrap_err();
    assert_eq!(err.fault().map(|f| f.code), Some(-32601));
}

#[tokio::test]
async fn test_invalid_params() {
    let server = TestServer::start().await;

    let err = client()
        .call::<_, Text>(
            &CancellationToken::new(),
            &server.url(),
            "Echo",
            &json!({"text": ["not", "a", "string"]}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.fault().map(|f| f.code), Some(-32602));
}

#[tokio::test]
async fn test_non_post_rejected() {
    let server = TestServer::start().await;

    let (status, headers, body) = send_raw(&server, Method::GET, "/rpc", "").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[ALLOW], "POST");
    assert!(
        headers[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    assert_eq!(body, "rpc: POST method required, received GET");
}

#[tokio::test]
async fn test_other_path_not_found() {
    let server = TestServer::start().await;

    let (status, _, _) = send_raw(
        &server,
        Method::POST,
        "/elsewhere",
        r#"{"id":1,"method":"Echo","params":{"text":"hi"}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancelled_token_returns_promptly() {
    let server = TestServer::start().await;
    let store = Arc::new(LeasedIdStore::new(4));
    let client = RpcClient::builder().with_id_store(store.clone()).build();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = timeout(
        Duration::from_millis(500),
        client.call::<_, Text>(&cancel, &server.url(), "Echo", &json!({"text": "hi"})),
    )
    .await
    .expect("cancelled call should not block");

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert_eq!(store.outstanding(), 0);
}

#[tokio::test]
async fn test_cancel_during_slow_call() {
    let server = TestServer::start().await;
    let store = Arc::new(LeasedIdStore::new(4));
    let client = RpcClient::builder().with_id_store(store.clone()).build();

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };

    let started = std::time::Instant::now();
    let err = client
        .call::<_, String>(&cancel, &server.url(), "Sleep", &json!({"millis": 5_000}))
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(store.outstanding(), 0);
}

#[tokio::test]
async fn test_call_timeout() {
    let server = TestServer::start().await;

    let err = client()
        .call_with_timeout::<_, String>(
            &CancellationToken::new(),
            &server.url(),
            "Sleep",
            &json!({"millis": 2_000}),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(50)));
}

/// Sessions whose release always fails
#[derive(Default)]
struct SulkyStore {
    opened: AtomicUsize,
}

struct SulkySession(u64);

impl IdSession for SulkySession {
    fn id(&self) -> Value {
        Value::from(self.0)
    }

    fn close(self: Box<Self>) -> Result<(), IdError> {
        Err(IdError::Store("release refused".to_string()))
    }
}

impl IdStore for SulkyStore {
    fn new_session(&self) -> Result<Box<dyn IdSession>, IdError> {
        let n = self.opened.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(Box::new(SulkySession(n)))
    }
}

#[tokio::test]
async fn test_release_failure_is_secondary() {
    let server = TestServer::start().await;
    let client = RpcClient::builder()
        .with_id_store(Arc::new(SulkyStore::default()))
        .build();
    let cancel = CancellationToken::new();

    // Successful call: the release failure is the only failure
    let err = client
        .call::<_, Text>(&cancel, &server.url(), "Echo", &json!({"text": "hi"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Id(IdError::Store(_))));

    // Failed call: the fault wins
    let err = client
        .call::<_, ()>(&cancel, &server.url(), "Fail", &())
        .await
        .unwrap_err();
    assert_eq!(err.fault().map(|f| f.message.as_str()), Some("boom"));
}

#[tokio::test]
async fn test_uuid_ids_round_trip() {
    let server = TestServer::start().await;
    let client = RpcClient::builder()
        .with_id_store(Arc::new(UuidIdStore))
        .verify_response_id(true)
        .build();

    let reply: Value = client
        .call(&CancellationToken::new(), &server.url(), "Whoami", &())
        .await
        .unwrap();

    let id = reply["id"].as_str().expect("string id");
    assert_eq!(id.len(), 36);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_one_client() {
    let server = TestServer::start().await;
    let client = Arc::new(
        RpcClient::builder()
            .with_id_store(Arc::new(DefaultIdStore::new()))
            .verify_response_id(true)
            .build(),
    );
    let url = server.url();

    let calls = (0..64).map(|i| {
        let client = Arc::clone(&client);
        let url = url.clone();
        async move {
            let reply: Text = client
                .call(
                    &CancellationToken::new(),
                    &url,
                    "Echo",
                    &json!({"text": format!("call-{}", i)}),
                )
                .await?;
            assert_eq!(reply.text, format!("call-{}", i));
            Ok::<_, ClientError>(())
        }
    });

    for outcome in futures::future::join_all(calls).await {
        outcome.unwrap();
    }

    let stats = client.transport_statistics().expect("transport initialized");
    assert_eq!(stats.requests_sent, 64);
    assert_eq!(stats.errors, 0);
}

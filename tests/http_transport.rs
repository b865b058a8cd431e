use std::time::Duration;

use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deribit_rpc_client::auth::Credentials;
use deribit_rpc_client::{ClientConfig, DeribitClient, DeribitError, HttpTransport, RpcTransport};

const API_PATH: &str = "/api/v2";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(server: &MockServer) -> ClientConfig {
    init_tracing();
    ClientConfig {
        base_url: format!("{}{API_PATH}", server.uri()),
        enable_private: true,
        credentials: Some(Credentials::new("mock_client_id", "mock_client_secret")),
        timeout: Duration::from_secs(1),
        ..ClientConfig::default()
    }
}

fn build_client(server: &MockServer) -> DeribitClient {
    init_tracing();
    DeribitClient::builder()
        .base_url(format!("{}{API_PATH}", server.uri()))
        .credentials(Credentials::new("mock_client_id", "mock_client_secret"))
        .enable_private(true)
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap()
}

fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
        "usIn": 1_700_000_000_000_000u64,
        "usOut": 1_700_000_000_000_150u64,
        "usDiff": 150,
        "testnet": true
    }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

async fn mount_auth(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(json!({
            "method": "public/auth",
            "params": {
                "grant_type": "client_credentials",
                "client_id": "mock_client_id",
                "client_secret": "mock_client_secret"
            }
        })))
        .respond_with(rpc_result(json!({
            "access_token": "mock_access_token",
            "refresh_token": "mock_refresh_token",
            "expires_in": 900,
            "scope": "connection mainaccount",
            "token_type": "bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_execute_posts_json_rpc_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(header("content-type", "application/json"))
        .and(header_exists("user-agent"))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": "public/ticker",
            "params": { "instrument_name": "BTC-PERPETUAL" }
        })))
        .respond_with(rpc_result(json!({ "mark_price": 50000.5, "best_bid_price": 50000.0 })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config(&server)).unwrap();
    let result = transport
        .execute("public/ticker", &json!({ "instrument_name": "BTC-PERPETUAL" }), None)
        .await
        .unwrap();

    assert_eq!(result["mark_price"], json!(50000.5));
}

#[tokio::test]
async fn test_request_ids_increase() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(rpc_result(json!(1_700_000_000_000u64)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config(&server)).unwrap();
    for _ in 0..3 {
        transport.execute("public/get_time", &Value::Null, None).await.unwrap();
    }

    let ids: Vec<u64> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| serde_json::from_slice::<Value>(&r.body).unwrap())
        .map(|body| {
            assert_eq!(body["params"], json!({}));
            body["id"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_bearer_token_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(header("authorization", "Bearer abc.def"))
        .respond_with(rpc_result(json!({ "equity": 1.0 })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config(&server)).unwrap();
    let result = transport
        .execute("private/get_account_summary", &json!({ "currency": "BTC" }), Some("abc.def"))
        .await
        .unwrap();

    assert_eq!(result, json!({ "equity": 1.0 }));
}

#[tokio::test]
async fn test_error_classification() {
    let cases: [(i64, &str, fn(&DeribitError) -> bool); 4] = [
        (10028, "too_many_requests", |e| e.is_rate_limit()),
        (13009, "unauthorized", |e| e.is_auth()),
        (13004, "invalid_credentials", |e| e.is_auth()),
        (11050, "bad_request", |e| matches!(e, DeribitError::Api(_))),
    ];

    for (code, message, check) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(API_PATH))
            .respond_with(rpc_error(code, message))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&config(&server)).unwrap();
        let err = transport
            .execute("public/ticker", &json!({}), None)
            .await
            .unwrap_err();

        assert!(check(&err), "code {code} classified as {err:?}");
        assert_eq!(err.code(), code);
        assert_eq!(err.rpc_error().unwrap().message, message);
    }
}

#[tokio::test]
async fn test_error_data_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {
                "code": -32602,
                "message": "Invalid params",
                "data": { "param": "instrument_name", "reason": "must be a string" }
            }
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config(&server)).unwrap();
    let err = transport
        .execute("public/ticker", &json!({ "instrument_name": 5 }), None)
        .await
        .unwrap_err();

    let rpc = err.rpc_error().unwrap();
    assert_eq!(rpc.code, -32602);
    assert_eq!(rpc.data.as_ref().unwrap()["param"], "instrument_name");
}

#[tokio::test]
async fn test_http_error_is_sanitized() {
    let server = MockServer::start().await;
    let body = format!(
        "upstream failure while handling client_secret=mock_client_secret {}",
        "x".repeat(1000)
    );

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string(body))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config(&server)).unwrap();
    let err = transport
        .execute("public/get_time", &json!({}), None)
        .await
        .unwrap_err();

    let rpc = err.rpc_error().unwrap();
    assert!(matches!(err, DeribitError::Api(_)));
    assert_eq!(rpc.code, 500);
    assert!(!rpc.message.contains("mock_client_secret"));
    assert!(rpc.message.contains("***REDACTED***"));
    assert!(rpc.message.chars().count() < 600);
}

#[tokio::test]
async fn test_invalid_json_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config(&server)).unwrap();
    let err = transport
        .execute("public/get_time", &json!({}), None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), -1);
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(rpc_result(json!(1)).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(&config(&server)).unwrap();
    let err = transport
        .execute("public/get_time", &json!({}), None)
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn test_client_caches_public_results() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(json!({ "method": "public/get_instruments" })))
        .respond_with(rpc_result(json!([{ "instrument_name": "BTC-PERPETUAL", "tick_size": 0.5 }])))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let params = json!({ "currency": "BTC", "kind": "future" });

    let first = client.call_public("get_instruments", params.clone()).await.unwrap();
    let reordered = json!({ "kind": "future", "currency": "BTC" });
    let second = client.call_public("get_instruments", reordered).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(client.cache_stats().slow_tier_entries, 1);
}

#[tokio::test]
async fn test_client_private_call_authenticates() {
    let server = MockServer::start().await;
    mount_auth(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(header("authorization", "Bearer mock_access_token"))
        .and(body_partial_json(json!({ "method": "private/get_positions" })))
        .respond_with(rpc_result(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let client = build_client(&server);
    client.call_private("get_positions", json!({ "currency": "BTC" })).await.unwrap();
    client.call_private("get_positions", json!({ "currency": "ETH" })).await.unwrap();
}

#[tokio::test]
async fn test_client_reauthenticates_after_unauthorized() {
    let server = MockServer::start().await;
    mount_auth(&server, 2).await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(json!({ "method": "private/get_account_summary" })))
        .respond_with(rpc_error(13009, "unauthorized"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(json!({ "method": "private/get_account_summary" })))
        .respond_with(rpc_result(json!({ "currency": "BTC", "equity": 3.0 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let summary = client
        .call_private("get_account_summary", json!({ "currency": "BTC" }))
        .await
        .unwrap();

    assert_eq!(summary["equity"], json!(3.0));
}

#[tokio::test]
async fn test_auth_response_without_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_partial_json(json!({ "method": "public/auth" })))
        .respond_with(rpc_result(json!({ "token_type": "bearer" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server);
    let err = client.access_token().await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(err.code(), 13009);
    assert!(err.to_string().contains("missing access_token"));
}

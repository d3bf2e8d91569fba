//! `/request` against local mock backends.

use reqwest::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_relay_passes_through_upstream_answer() {
    let server = common::spawn_default_server().await;
    let (backend, received) = common::start_mock_backend(201, "created upstream").await;

    let response = common::client()
        .post(server.url("/request"))
        .json(&json!({
            "method": "POST",
            "url": format!("http://{backend}/things?x=1"),
            "body": "payload",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.text().await.unwrap(), "created upstream");

    let heads = received.lock().unwrap().clone();
    assert_eq!(heads.len(), 1);
    assert!(heads[0].starts_with("POST /things?x=1 HTTP/1.1\r\n"), "{}", heads[0]);
    assert_eq!(common::header_value(&heads[0], "content-length").as_deref(), Some("7"));
}

#[tokio::test]
async fn test_relay_propagates_request_id_and_trace() {
    let server = common::spawn_default_server().await;
    let (backend, received) = common::start_mock_backend(200, "ok").await;

    let response = common::client()
        .post(server.url("/request"))
        .header("x-request-id", "relay-test-id")
        .json(&json!({ "method": "GET", "url": format!("http://{backend}/") }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let heads = received.lock().unwrap().clone();
    assert_eq!(
        common::header_value(&heads[0], "x-request-id").as_deref(),
        Some("relay-test-id")
    );
    let traceparent = common::header_value(&heads[0], "traceparent").expect("traceparent");
    assert!(traceparent.starts_with("00-"));
    assert_eq!(traceparent.split('-').count(), 4);
}

#[tokio::test]
async fn test_relay_caller_headers_take_precedence() {
    let server = common::spawn_default_server().await;
    let (backend, received) = common::start_mock_backend(200, "ok").await;

    common::client()
        .post(server.url("/request"))
        .json(&json!({
            "method": "GET",
            "url": format!("http://{backend}/"),
            "headers": {
                "X-Request-Id": "from-instruction",
                "X-Extra": "yes",
            },
        }))
        .send()
        .await
        .unwrap();

    let heads = received.lock().unwrap().clone();
    assert_eq!(
        common::header_value(&heads[0], "x-request-id").as_deref(),
        Some("from-instruction")
    );
    assert_eq!(common::header_value(&heads[0], "x-extra").as_deref(), Some("yes"));
}

#[tokio::test]
async fn test_relay_upstream_error_status_is_not_rewritten() {
    let server = common::spawn_default_server().await;
    let (backend, _) = common::start_mock_backend(503, "upstream down").await;

    let response = common::client()
        .post(server.url("/request"))
        .json(&json!({ "method": "GET", "url": format!("http://{backend}/") }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().await.unwrap(), "upstream down");
}

#[tokio::test]
async fn test_relay_unreachable_target() {
    let server = common::spawn_default_server().await;

    let response = common::client()
        .post(server.url("/request"))
        .json(&json!({ "method": "GET", "url": "http://127.0.0.1:1/" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_relay_rejects_bad_instructions() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    let malformed = client
        .post(server.url("/request"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let bad_method = client
        .post(server.url("/request"))
        .json(&json!({ "method": "NOT A METHOD", "url": "http://127.0.0.1:1/" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_method.status(), StatusCode::BAD_REQUEST);

    let bad_url = client
        .post(server.url("/request"))
        .json(&json!({ "method": "GET", "url": "ftp://example.com/" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_url.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_relay_requires_post() {
    let server = common::spawn_default_server().await;

    let response = common::client().get(server.url("/request")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

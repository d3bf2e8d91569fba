//! End-to-end tests for the diagnostic endpoints.

use reqwest::StatusCode;
use std::time::{Duration, Instant};

mod common;

#[tokio::test]
async fn test_echo_dumps_request() {
    let server = common::spawn_default_server().await;
    let response = common::client()
        .post(server.url("/?debug=1"))
        .header("x-custom", "abc")
        .body("hello body")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.starts_with("POST /?debug=1 HTTP/1.1\r\n"), "{body}");
    assert!(body.contains(&format!("Host: {}\r\n", server.addr)));
    assert!(body.contains("X-Custom: abc\r\n"));
    assert!(body.ends_with("\r\n\r\nhello body"));
}

#[tokio::test]
async fn test_health() {
    let server = common::spawn_default_server().await;
    let response = common::client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_status_explicit_code() {
    let server = common::spawn_default_server().await;
    let response = common::client()
        .get(server.url("/status?status=418"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(response.text().await.unwrap(), "I'm a teapot");
}

#[tokio::test]
async fn test_status_sweep() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    for code in 100u16..=599 {
        let response = client
            .get(server.url(&format!("/status?status={code}")))
            .send()
            .await
            .unwrap();
        if code < 200 {
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "status={code}");
        } else {
            assert_eq!(response.status().as_u16(), code);
        }
    }

    let metrics = client.get(server.url("/metrics")).send().await.unwrap().text().await.unwrap();
    assert!(!metrics.contains("http_response_status_code=\"1"));
}

#[tokio::test]
async fn test_status_random_codes_from_table() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    for path in ["/status", "/status?status=random", "/status?status="] {
        for _ in 0..10 {
            let response = client.get(server.url(path)).send().await.unwrap();
            assert!(
                [200, 400, 500, 502, 503].contains(&response.status().as_u16()),
                "unexpected status {}",
                response.status()
            );
        }
    }
}

#[tokio::test]
async fn test_status_invalid_parameter() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    for value in ["abc", "1000", "42", "-5"] {
        let response = client
            .get(server.url(&format!("/status?status={value}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "status={value}");
    }
}

#[tokio::test]
async fn test_timeout_sleeps() {
    let server = common::spawn_default_server().await;
    let started = Instant::now();
    let response = common::client()
        .get(server.url("/timeout?timeout=200ms"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_timeout_one_second_bounds() {
    let server = common::spawn_default_server().await;
    let started = Instant::now();
    let response = common::client()
        .get(server.url("/timeout?timeout=1s"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
}

#[tokio::test]
async fn test_timeout_negative_returns_immediately() {
    let server = common::spawn_default_server().await;
    let started = Instant::now();
    let response = common::client()
        .get(server.url("/timeout?timeout=-10s"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_timeout_errors() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    let missing = client.get(server.url("/timeout")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(missing.text().await.unwrap(), "timeout parameter is missing");

    let invalid = client.get(server.url("/timeout?timeout=10")).send().await.unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let unknown_unit = client.get(server.url("/timeout?timeout=5x")).send().await.unwrap();
    assert_eq!(unknown_unit.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_header_size() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    let response = client.get(server.url("/headersize?size=1024")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let header = response.headers().get("x-header-size").unwrap().to_str().unwrap().to_string();
    assert_eq!(header.len(), 1024);
    assert!(header.chars().all(|c| c == '0'));
    assert_eq!(response.text().await.unwrap(), "OK");

    let empty = client.get(server.url("/headersize?size=0")).send().await.unwrap();
    assert_eq!(empty.status(), StatusCode::OK);
    assert_eq!(empty.headers().get("x-header-size").unwrap(), "");

    let missing = client.get(server.url("/headersize")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let negative = client.get(server.url("/headersize?size=-1")).send().await.unwrap();
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_header_size_limit() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    let huge = client
        .get(server.url("/headersize?size=100000000000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(huge.status(), StatusCode::BAD_REQUEST);
    assert!(huge.text().await.unwrap().contains("limit"));

    let health = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_header_size_configured_limit() {
    let mut config = echoserver::EchoConfig::default();
    config.listener.max_header_bytes = 64;
    let server = common::spawn_server(config).await;
    let client = common::client();

    let at_limit = client.get(server.url("/headersize?size=64")).send().await.unwrap();
    assert_eq!(at_limit.status(), StatusCode::OK);
    assert_eq!(at_limit.headers().get("x-header-size").unwrap().len(), 64);

    let over = client.get(server.url("/headersize?size=65")).send().await.unwrap();
    assert_eq!(over.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_fibonacci() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    let small = client.get(server.url("/fibonacci?n=10")).send().await.unwrap();
    assert_eq!(small.status(), StatusCode::OK);
    assert_eq!(small.text().await.unwrap(), "55");

    let zero = client.get(server.url("/fibonacci?n=0")).send().await.unwrap();
    assert_eq!(zero.text().await.unwrap(), "0");

    let large = client.get(server.url("/fibonacci?n=1000")).send().await.unwrap();
    let digits = large.text().await.unwrap();
    assert_eq!(digits.len(), 209);
    assert!(digits.starts_with("434665576869374564356885276750"));
}

#[tokio::test]
async fn test_fibonacci_invalid() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    for path in ["/fibonacci", "/fibonacci?n=-1", "/fibonacci?n=ten"] {
        let response = client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
    }
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    for path in ["/nope", "/health/", "/status/418"] {
        let response = client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn test_request_id_generated_and_reused() {
    let server = common::spawn_default_server().await;
    let client = common::client();

    let first = client.get(server.url("/health")).send().await.unwrap();
    let second = client.get(server.url("/health")).send().await.unwrap();
    let first_id = first.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();
    let second_id = second.headers().get("x-request-id").unwrap().to_str().unwrap().to_string();
    assert_ne!(first_id, second_id);
    assert!(first_id.contains('/'));

    let supplied = client
        .get(server.url("/health"))
        .header("x-request-id", "caller-chosen-id")
        .send()
        .await
        .unwrap();
    assert_eq!(supplied.headers().get("x-request-id").unwrap(), "caller-chosen-id");
}

#[tokio::test]
async fn test_body_limit() {
    let mut config = echoserver::EchoConfig::default();
    config.listener.max_body_bytes = 16;
    let server = common::spawn_server(config).await;

    let response = common::client()
        .post(server.url("/"))
        .body(vec![b'a'; 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

//! Relay client.
//!
//! # Responsibilities
//! - Decode relay instructions
//! - Build the outbound request, adding request id and trace headers
//!   the caller did not set
//! - Return the upstream status and body untouched

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use thiserror::Error;
use url::Url;

use crate::config::RelayConfig;

/// Instruction describing the request to send on the caller's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// What the upstream answered.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid method \"{0}\"")]
    InvalidMethod(String),

    #[error("invalid url \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header \"{0}\"")]
    InvalidHeader(String),

    #[error("failed to build relay client: {0}")]
    Client(String),

    #[error("{0}")]
    Transport(String),

    #[error("failed to read upstream body: {0}")]
    Body(String),
}

/// Pooled HTTP client used for every relayed request.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
}

impl RelayClient {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| RelayError::Client(error_chain(&e)))?;
        Ok(Self { client })
    }

    /// Send `request`, adding each of `propagation` unless the caller
    /// already set a header of that name.
    pub async fn relay(
        &self,
        request: &RelayRequest,
        propagation: HeaderMap,
    ) -> Result<RelayResponse, RelayError> {
        let method = parse_method(&request.method)?;
        let url = parse_url(&request.url)?;
        let headers = outbound_headers(&request.headers, propagation)?;

        let response = self
            .client
            .request(method, url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| RelayError::Transport(error_chain(&e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::Body(error_chain(&e)))?;

        Ok(RelayResponse { status, body })
    }
}

fn parse_method(method: &str) -> Result<Method, RelayError> {
    Method::from_bytes(method.as_bytes()).map_err(|_| RelayError::InvalidMethod(method.to_string()))
}

fn parse_url(raw: &str) -> Result<Url, RelayError> {
    let url = Url::parse(raw).map_err(|e| RelayError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(RelayError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme \"{scheme}\""),
        }),
    }
}

/// Caller headers first, then any propagated header whose name is still free.
pub fn outbound_headers(
    caller: &BTreeMap<String, String>,
    propagation: HeaderMap,
) -> Result<HeaderMap, RelayError> {
    let mut headers = HeaderMap::with_capacity(caller.len() + propagation.len());

    for (name, value) in caller {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RelayError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| RelayError::InvalidHeader(name.clone()))?;
        headers.append(header_name, header_value);
    }

    let mut current = None;
    for (name, value) in propagation {
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = &current {
            if !caller_has(caller, name) {
                headers.append(name.clone(), value);
            }
        }
    }

    Ok(headers)
}

fn caller_has(caller: &BTreeMap<String, String>, name: &HeaderName) -> bool {
    caller.keys().any(|key| key.eq_ignore_ascii_case(name.as_str()))
}

/// `Display` of `err` followed by each of its sources.
fn error_chain(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn propagation(request_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_str(request_id).unwrap());
        headers.insert(
            "traceparent",
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );
        headers
    }

    #[test]
    fn test_instruction_defaults() {
        let request: RelayRequest =
            serde_json::from_str(r#"{"method":"GET","url":"http://localhost/"}"#).unwrap();
        assert_eq!(request.body, "");
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_instruction_requires_method_and_url() {
        assert!(serde_json::from_str::<RelayRequest>(r#"{"url":"http://localhost/"}"#).is_err());
        assert!(serde_json::from_str::<RelayRequest>(r#"{"method":"GET"}"#).is_err());
    }

    #[test]
    fn test_propagated_headers_added_when_absent() {
        let headers = outbound_headers(&BTreeMap::new(), propagation("host/abc-000001")).unwrap();
        assert_eq!(headers.get("x-request-id").unwrap(), "host/abc-000001");
        assert!(headers.contains_key("traceparent"));
    }

    #[test]
    fn test_caller_headers_take_precedence() {
        let mut caller = BTreeMap::new();
        caller.insert("X-Request-Id".to_string(), "mine".to_string());
        caller.insert("Accept".to_string(), "text/plain".to_string());

        let headers = outbound_headers(&caller, propagation("generated")).unwrap();
        let ids: Vec<_> = headers.get_all("x-request-id").iter().collect();
        assert_eq!(ids, vec!["mine"]);
        assert_eq!(headers.get("accept").unwrap(), "text/plain");
        assert!(headers.contains_key("traceparent"));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut caller = BTreeMap::new();
        caller.insert("bad header".to_string(), "x".to_string());
        let err = outbound_headers(&caller, HeaderMap::new()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidHeader(name) if name == "bad header"));
    }

    #[test]
    fn test_url_validation() {
        assert!(parse_url("http://localhost:8080/x").is_ok());
        assert!(parse_url("https://example.com").is_ok());
        assert!(matches!(parse_url("not a url"), Err(RelayError::InvalidUrl { .. })));
        assert!(matches!(parse_url("ftp://example.com"), Err(RelayError::InvalidUrl { .. })));
    }

    #[test]
    fn test_method_validation() {
        assert_eq!(parse_method("PATCH").unwrap(), Method::PATCH);
        assert!(matches!(parse_method("GE T"), Err(RelayError::InvalidMethod(_))));
        assert!(matches!(parse_method(""), Err(RelayError::InvalidMethod(_))));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let client = RelayClient::new(&RelayConfig::default()).unwrap();
        let request = RelayRequest {
            method: "GET".to_string(),
            url: "http://127.0.0.1:1/".to_string(),
            body: String::new(),
            headers: BTreeMap::new(),
        };

        let err = client.relay(&request, HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
    }
}

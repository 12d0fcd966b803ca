//! Per-call context handed to every procedure

use std::net::SocketAddr;

use http::request::Parts;
use http::{HeaderMap, Method, Uri};
use serde_json::Value;

/// Transport-level metadata of the HTTP request carrying a call
#[derive(Debug, Clone)]
pub struct CallContext {
    /// HTTP method of the carrying request
    pub method: Method,
    /// Request target
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Peer address, when the request came through a socket
    pub remote_addr: Option<SocketAddr>,
    /// Correlation id of the call, as sent by the client
    pub request_id: Value,
    /// Arrival timestamp (Unix milliseconds)
    pub received_at: i64,
}

impl CallContext {
    pub(crate) fn from_parts(parts: &Parts, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            remote_addr,
            request_id: Value::Null,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub(crate) fn with_request_id(mut self, id: Value) -> Self {
        self.request_id = id;
        self
    }

    /// Header value as a string, if present and visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|h| h.to_str().ok())
    }

    /// Context for invoking a procedure outside of HTTP (tests, in-process calls)
    pub fn detached() -> Self {
        Self {
            method: Method::POST,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            remote_addr: None,
            request_id: Value::Null,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

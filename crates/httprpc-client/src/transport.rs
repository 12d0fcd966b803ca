//! Transport abstraction for the RPC client
//!
//! A [`Transport`] performs one HTTP exchange. The response body stays behind
//! a [`ResponseBody`] so the caller decides when it is read and released.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use ::http::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use ::http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::TransportError;

pub use self::http::HttpTransport;

/// One outbound HTTP request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportRequest {
    /// `POST` of a JSON body
    pub fn post(url: Url, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            method: Method::POST,
            url,
            headers,
            body,
        }
    }
}

/// One inbound HTTP response
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Response body handle
#[async_trait]
pub trait ResponseBody: Send {
    /// Read the whole body. A body can be read once.
    async fn bytes(&mut self) -> Result<Bytes, TransportError>;

    /// Release the body and whatever connection resources it holds
    fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// Body already held in memory
#[derive(Debug, Clone)]
pub struct BufferedBody {
    data: Option<Bytes>,
}

impl BufferedBody {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

#[async_trait]
impl ResponseBody for BufferedBody {
    async fn bytes(&mut self) -> Result<Bytes, TransportError> {
        self.data.take().ok_or(TransportError::Closed)
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Transport counters
#[derive(Debug, Clone, Default)]
pub struct TransportStatistics {
    /// Number of requests sent
    pub requests_sent: u64,
    /// Number of responses received
    pub responses_received: u64,
    /// Number of errors encountered
    pub errors: u64,
    /// Last error message
    pub last_error: Option<String>,
}

/// Performs HTTP exchanges on behalf of the client
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: TransportRequest)
    -> Result<TransportResponse, TransportError>;

    fn statistics(&self) -> TransportStatistics {
        TransportStatistics::default()
    }
}

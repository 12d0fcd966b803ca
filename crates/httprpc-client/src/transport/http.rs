//! HTTP transport implementation backed by reqwest

use std::sync::Arc;

use ::http::header::{HeaderMap, HeaderName, HeaderValue};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::{Client, Response, redirect};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::transport::{
    ResponseBody, Transport, TransportRequest, TransportResponse, TransportStatistics,
};

/// HTTP/1.1 + HTTP/2 transport over a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client
    client: Client,
    /// Statistics
    stats: Arc<Mutex<TransportStatistics>>,
}

impl HttpTransport {
    /// Create a transport configured from the client's connection settings
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut builder = Client::builder().connect_timeout(config.timeouts.connect);

        if let Some(user_agent) = &config.connection.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        if let Some(headers) = &config.connection.headers {
            builder = builder.default_headers(default_headers(headers)?);
        }

        let policy = if config.connection.follow_redirects {
            redirect::Policy::limited(config.connection.max_redirects as usize)
        } else {
            redirect::Policy::none()
        };

        let client = builder
            .redirect(policy)
            .build()
            .map_err(TransportError::Request)?;

        Ok(Self::with_client(client))
    }

    /// Create HTTP transport with custom client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            stats: Arc::new(Mutex::new(TransportStatistics::default())),
        }
    }

    /// Update statistics
    fn update_stats<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut TransportStatistics),
    {
        let mut stats = self.stats.lock();
        update_fn(&mut stats);
    }
}

fn default_headers(
    headers: &std::collections::HashMap<String, String>,
) -> ClientResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::config(format!("Invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::config(format!("Invalid value for header {}: {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "Sending HTTP request");
        self.update_stats(|stats| stats.requests_sent += 1);

        let sent = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await;

        match sent {
            Ok(response) => {
                self.update_stats(|stats| stats.responses_received += 1);
                debug!(status = %response.status(), "Received HTTP response");
                Ok(TransportResponse {
                    status: response.status(),
                    headers: response.headers().clone(),
                    body: Box::new(ReqwestBody {
                        response: Some(response),
                        stats: Arc::clone(&self.stats),
                    }),
                })
            }
            Err(err) => {
                warn!("HTTP request failed: {}", err);
                self.update_stats(|stats| {
                    stats.errors += 1;
                    stats.last_error = Some(err.to_string());
                });
                Err(TransportError::Request(err))
            }
        }
    }

    fn statistics(&self) -> TransportStatistics {
        self.stats.lock().clone()
    }
}

struct ReqwestBody {
    response: Option<Response>,
    stats: Arc<Mutex<TransportStatistics>>,
}

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn bytes(&mut self) -> Result<Bytes, TransportError> {
        let response = self.response.take().ok_or(TransportError::Closed)?;
        response.bytes().await.map_err(|err| {
            let mut stats = self.stats.lock();
            stats.errors += 1;
            stats.last_error = Some(err.to_string());
            TransportError::Body(err.to_string())
        })
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        // Dropping an unread response returns or discards its connection
        drop(self.response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_transport_from_default_config() {
        let transport = HttpTransport::new(&ClientConfig::default()).unwrap();
        let stats = transport.statistics();
        assert_eq!(stats.requests_sent, 0);
        assert!(stats.last_error.is_none());
    }

    #[test]
    fn test_invalid_default_header_rejected() {
        let mut config = ClientConfig::default();
        config.connection.headers = Some(HashMap::from([(
            "bad header".to_string(),
            "value".to_string(),
        )]));

        let err = HttpTransport::new(&config).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_counted() {
        let transport = HttpTransport::new(&ClientConfig::default()).unwrap();

        // Grab a free port, then close it so nothing is listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = url::Url::parse(&format!("http://{}/rpc", addr)).unwrap();
        let result = transport
            .round_trip(TransportRequest::post(url, Bytes::from_static(b"{}")))
            .await;

        assert!(matches!(result, Err(TransportError::Request(_))));
        let stats = transport.statistics();
        assert_eq!(stats.requests_sent, 1);
        assert_eq!(stats.errors, 1);
        assert!(stats.last_error.is_some());
    }
}

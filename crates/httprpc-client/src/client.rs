//! The caller: one outbound procedure call per [`RpcClient::call`]

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use httprpc_protocol::{JsonRpcVersion, ResponseEnvelope, encode_call};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, ProtocolError, TransportError};
use crate::id::{DefaultIdStore, IdStore, SessionGuard};
use crate::transport::{HttpTransport, Transport, TransportRequest, TransportStatistics};

/// JSON-RPC client.
///
/// The id store and transport are created on first use unless supplied
/// through [`RpcClientBuilder`]; each client owns its own defaults.
pub struct RpcClient {
    config: ClientConfig,
    id_store: OnceCell<Arc<dyn IdStore>>,
    transport: OnceCell<Arc<dyn Transport>>,
}

impl RpcClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            id_store: OnceCell::new(),
            transport: OnceCell::new(),
        }
    }

    pub fn builder() -> RpcClientBuilder {
        RpcClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Statistics of the transport, once one exists
    pub fn transport_statistics(&self) -> Option<TransportStatistics> {
        self.transport.get().map(|transport| transport.statistics())
    }

    fn id_store(&self) -> &Arc<dyn IdStore> {
        self.id_store
            .get_or_init(|| Arc::new(DefaultIdStore::new()))
    }

    fn transport(&self) -> ClientResult<&Arc<dyn Transport>> {
        self.transport.get_or_try_init(|| {
            debug!("Initializing default HTTP transport");
            let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&self.config)?);
            Ok(transport)
        })
    }

    /// Call `method` on the server at `target`, bounded by the configured
    /// request timeout
    pub async fn call<P, R>(
        &self,
        cancel: &CancellationToken,
        target: &str,
        method: &str,
        params: &P,
    ) -> ClientResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.call_with_timeout(cancel, target, method, params, self.config.timeouts.request)
            .await
    }

    pub async fn call_with_timeout<P, R>(
        &self,
        cancel: &CancellationToken,
        target: &str,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> ClientResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        match tokio::time::timeout(timeout, self.call_inner(cancel, target, method, params)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(method = %method, "Call timed out after {:?}", timeout);
                Err(ClientError::Timeout(timeout))
            }
        }
    }

    async fn call_inner<P, R>(
        &self,
        cancel: &CancellationToken,
        target: &str,
        method: &str,
        params: &P,
    ) -> ClientResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let target = Url::parse(target)
            .map_err(|e| ClientError::config(format!("Invalid target URL {}: {}", target, e)))?;
        let id_store = Arc::clone(self.id_store());
        let transport = Arc::clone(self.transport()?);

        let session = SessionGuard::new(id_store.new_session()?);
        let outcome = self
            .exchange(transport.as_ref(), cancel, target, method, session.id(), params)
            .await;

        first_failure(outcome, session.release())
    }

    async fn exchange<P, R>(
        &self,
        transport: &dyn Transport,
        cancel: &CancellationToken,
        target: Url,
        method: &str,
        id: &Value,
        params: &P,
    ) -> ClientResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        if cancel.is_cancelled() {
            debug!(method = %method, "Call cancelled before sending");
            return Err(ClientError::Cancelled);
        }

        let body = encode_call(self.config.version, id, method, params)?;
        debug!(method = %method, id = %id, "Sending call");

        let request = TransportRequest::post(target, Bytes::from(body));
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            response = transport.round_trip(request) => response?,
        };

        let status = response.status;
        let mut body = response.body;

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            read = body.bytes() => read.map_err(ClientError::from),
        };
        let outcome = read.and_then(|bytes| self.decode(status, id, &bytes));

        first_failure(outcome, body.close())
    }

    fn decode<R>(&self, status: StatusCode, id: &Value, bytes: &[u8]) -> ClientResult<R>
    where
        R: DeserializeOwned,
    {
        let envelope = match ResponseEnvelope::from_slice(bytes) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(bytes).into_owned(),
                }
                .into());
            }
            Err(err) => return Err(ProtocolError::MalformedResponse(err).into()),
        };

        if self.config.verify_response_id && !envelope.is_error() && envelope.id != *id {
            return Err(ProtocolError::IdMismatch {
                expected: id.clone(),
                actual: envelope.id,
            }
            .into());
        }

        if let Some(fault) = &envelope.error {
            debug!(code = fault.code, status = %status, "Call returned fault: {}", fault);
        }

        envelope.decode_result().map_err(ClientError::from)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("config", &self.config)
            .field("id_store_initialized", &self.id_store.get().is_some())
            .field("transport_initialized", &self.transport.get().is_some())
            .finish()
    }
}

/// Combine a call outcome with a cleanup result. The earlier failure wins;
/// a cleanup failure only surfaces when the call itself succeeded.
fn first_failure<T, E>(outcome: ClientResult<T>, cleanup: Result<(), E>) -> ClientResult<T>
where
    E: Into<ClientError> + Display,
{
    match (outcome, cleanup) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(primary), Err(secondary)) => {
            warn!("Cleanup failed after an earlier error ({}): {}", primary, secondary);
            Err(primary)
        }
    }
}

/// Builder for [`RpcClient`]
#[derive(Default)]
pub struct RpcClientBuilder {
    config: ClientConfig,
    id_store: Option<Arc<dyn IdStore>>,
    transport: Option<Arc<dyn Transport>>,
}

impl RpcClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_id_store(mut self, store: Arc<dyn IdStore>) -> Self {
        self.id_store = Some(store);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_version(mut self, version: JsonRpcVersion) -> Self {
        self.config.version = version;
        self
    }

    /// Default timeout applied by [`RpcClient::call`]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.request = timeout;
        self
    }

    pub fn verify_response_id(mut self, verify: bool) -> Self {
        self.config.verify_response_id = verify;
        self
    }

    pub fn build(self) -> RpcClient {
        let mut client = RpcClient::new(self.config);
        if let Some(store) = self.id_store {
            client.id_store = OnceCell::with_value(store);
        }
        if let Some(transport) = self.transport {
            client.transport = OnceCell::with_value(transport);
        }
        client
    }
}

//! HTTP JSON-RPC server
//!
//! Accept loop hosting a [`Dispatcher`] on one endpoint path. Each connection
//! is served on its own task; requests to any other path get `404`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::codec::{Codec, plain_text};
use crate::dispatcher::{DEFAULT_MAX_BODY_SIZE, Dispatcher};
use crate::error::RegistryError;
use crate::procedure::{Procedure, RawProcedure};
use crate::registry::ProcedureRegistry;
use crate::Result;

/// Configuration for the HTTP RPC server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path of the RPC endpoint
    pub rpc_path: String,
    /// Maximum request body size
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            rpc_path: "/rpc".to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE, // 1MB
        }
    }
}

/// Builder for [`HttpRpcServer`]
pub struct HttpRpcServerBuilder {
    config: ServerConfig,
    registry: Arc<ProcedureRegistry>,
    codec: Option<Arc<dyn Codec>>,
}

impl HttpRpcServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            registry: Arc::new(ProcedureRegistry::new()),
            codec: None,
        }
    }

    /// Start from an existing (possibly shared) registry
    pub fn with_registry(registry: Arc<ProcedureRegistry>) -> Self {
        Self {
            registry,
            ..Self::new()
        }
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the RPC endpoint path
    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        self.config.rpc_path = path.into();
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Replace the default JSON codec
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Register a public procedure
    pub fn procedure<P>(
        self,
        name: impl Into<String>,
        procedure: P,
    ) -> std::result::Result<Self, RegistryError>
    where
        P: Procedure,
    {
        self.registry.register(name, procedure)?;
        Ok(self)
    }

    /// Register a JSON-level procedure
    pub fn raw_procedure(
        self,
        name: impl Into<String>,
        procedure: RawProcedure,
    ) -> std::result::Result<Self, RegistryError> {
        self.registry.register_raw(name, procedure)?;
        Ok(self)
    }

    pub fn build(self) -> HttpRpcServer {
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.registry))
            .with_max_body_size(self.config.max_body_size);
        if let Some(codec) = self.codec {
            dispatcher = dispatcher.with_codec(codec);
        }

        HttpRpcServer {
            config: self.config,
            dispatcher: Arc::new(dispatcher),
        }
    }
}

impl Default for HttpRpcServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP RPC server
#[derive(Clone)]
pub struct HttpRpcServer {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpRpcServer {
    pub fn builder() -> HttpRpcServerBuilder {
        HttpRpcServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProcedureRegistry> {
        self.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Bind the configured address and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. Connections already accepted keep
    /// running on their own tasks.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        info!("HTTP RPC server listening on {}", local_addr);
        info!("RPC endpoint available at: {}", self.config.rpc_path);
        info!("Registered procedures: {:?}", self.registry().registered_methods());

        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("HTTP RPC server on {} shutting down", local_addr);
                    return Ok(());
                }
            };
            debug!("New connection from {}", peer_addr);

            let dispatcher = Arc::clone(&self.dispatcher);
            let rpc_path = self.config.rpc_path.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    handle_request(req, Arc::clone(&dispatcher), rpc_path.clone(), peer_addr)
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Client disconnects mid-request are routine
                    if err.is_incomplete_message() {
                        debug!("Client disconnected (normal): {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    dispatcher: Arc<Dispatcher>,
    rpc_path: String,
    peer_addr: SocketAddr,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    debug!("Handling {} {}", req.method(), req.uri().path());

    if req.uri().path() != rpc_path {
        return Ok(plain_text(StatusCode::NOT_FOUND, "Not Found"));
    }

    Ok(dispatcher.dispatch(req, Some(peer_addr)).await)
}

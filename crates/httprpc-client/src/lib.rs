//! # HTTP JSON-RPC Client
//!
//! Calls procedures hosted by an `httprpc-server` (or any JSON-RPC over HTTP
//! peer). Each call is correlated through an id drawn from a pluggable
//! [`IdStore`], sent through a pluggable [`Transport`], and bound to a
//! [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use httprpc_client::prelude::*;
//! use serde_json::{Value, json};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::builder().build();
//!     let cancel = CancellationToken::new();
//!
//!     let reply: Value = client
//!         .call(&cancel, "http://127.0.0.1:8000/rpc", "Echo", &json!({"text": "hi"}))
//!         .await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```
//!
//! ## Identifier stores
//!
//! - [`DefaultIdStore`]: monotonic counter, one per store (the default)
//! - [`LeasedIdStore`]: bounded pool with id reuse
//! - [`UuidIdStore`]: UUID v7 trace ids

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod transport;

// Re-export main types
pub use client::{RpcClient, RpcClientBuilder};
pub use config::{ClientConfig, ConnectionConfig, TimeoutConfig};
pub use error::{ClientError, ClientResult, IdError, ProtocolError, TransportError};
pub use id::{DefaultIdStore, IdSession, IdStore, LeasedIdStore, SessionGuard, UuidIdStore};
pub use transport::{
    BufferedBody, HttpTransport, ResponseBody, Transport, TransportRequest, TransportResponse,
    TransportStatistics,
};

// Re-export foundational types
pub use httprpc_protocol::{Fault, FaultCode, JsonRpcVersion};

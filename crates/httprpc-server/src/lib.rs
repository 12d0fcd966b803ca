//! # HTTP JSON-RPC Server
//!
//! Hosts a table of named procedures and dispatches JSON-RPC calls arriving
//! over HTTP `POST` to them.
//!
//! ## Pieces
//! - [`ProcedureRegistry`]: the concurrency-safe name → procedure table
//! - [`Procedure`] / [`procedure_fn`] / [`RawProcedure`]: ways to declare a procedure
//! - [`Dispatcher`]: turns one HTTP request into one procedure invocation
//! - [`HttpRpcServer`]: the hyper accept loop around a dispatcher
//!
//! ```rust,no_run
//! use httprpc_server::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Text {
//!     text: String,
//! }
//!
//! impl Payload for Text {}
//!
//! # async fn run() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let echo = procedure_fn(|_ctx: &CallContext, args: Text, reply: &mut Text| {
//!     reply.text = args.text;
//!     Ok(())
//! });
//!
//! let server = HttpRpcServer::builder()
//!     .bind_address("127.0.0.1:8000".parse()?)
//!     .procedure("Echo", echo)?
//!     .build();
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod prelude;
pub mod procedure;
pub mod registry;
pub mod server;

// Re-export main types
pub use codec::{Codec, CodecRequest, JsonCodec};
pub use context::CallContext;
pub use dispatcher::Dispatcher;
pub use error::{HttpRpcError, RegistryError};
pub use procedure::{
    ArgumentSlot, FnProcedure, Input, Output, Payload, PayloadKind, Procedure, RawProcedure,
    Signature, TypeInfo, Visibility, procedure_fn,
};
pub use registry::{ProcedureDescriptor, ProcedureRegistry};
pub use server::{HttpRpcServer, HttpRpcServerBuilder, ServerConfig};

// Re-export foundational types
pub use httprpc_protocol::{Fault, FaultCode, JsonRpcVersion};

/// Result type for HTTP RPC server operations
pub type Result<T> = std::result::Result<T, HttpRpcError>;

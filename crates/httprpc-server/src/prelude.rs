//! # HTTP RPC Server Prelude
//!
//! Re-exports of the types most procedure authors need.
//!
//! ```rust
//! use httprpc_server::prelude::*;
//! ```

// Core server types
pub use crate::server::{HttpRpcServer, HttpRpcServerBuilder, ServerConfig};
pub use crate::dispatcher::Dispatcher;
pub use crate::registry::{ProcedureDescriptor, ProcedureRegistry};

// Procedure declaration
pub use crate::context::CallContext;
pub use crate::procedure::{
    Payload, PayloadKind, Procedure, RawProcedure, Signature, Visibility, procedure_fn,
};

// Re-export foundational types
pub use httprpc_protocol::prelude::*;

// Error types
pub use crate::{HttpRpcError, RegistryError, Result};

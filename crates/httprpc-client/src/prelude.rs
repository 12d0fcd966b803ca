//! # Client Prelude
//!
//! ```rust
//! use httprpc_client::prelude::*;
//! ```

pub use crate::client::{RpcClient, RpcClientBuilder};
pub use crate::config::{ClientConfig, ConnectionConfig, TimeoutConfig};
pub use crate::error::{ClientError, ClientResult, IdError, ProtocolError, TransportError};
pub use crate::id::{DefaultIdStore, IdSession, IdStore, LeasedIdStore, UuidIdStore};
pub use crate::transport::{HttpTransport, Transport};

// Re-export foundational types
pub use httprpc_protocol::{Fault, FaultCode, JsonRpcVersion};

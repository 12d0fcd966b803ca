//! # Protocol Prelude
//!
//! ```rust
//! use httprpc_protocol::prelude::*;
//! ```

pub use crate::error::{Fault, FaultCode, ReplyError};
pub use crate::request::{CallEnvelope, RequestEnvelope, encode_call};
pub use crate::response::{ResponseEnvelope, decode_reply};
pub use crate::types::JsonRpcVersion;

// Standard error codes
pub use crate::error_codes::*;

//! # JSON-RPC over HTTP: wire protocol
//!
//! Transport-agnostic types shared by the httprpc server and client crates.
//! Nothing in here knows about HTTP; the envelopes and the fault type are plain
//! serde values.
//!
//! ## Contents
//! - [`Fault`]: the structured error carried in a response's `error` member
//! - [`CallEnvelope`] / [`RequestEnvelope`]: the request as sent and as received
//! - [`ResponseEnvelope`]: the response, holding exactly one of `result` or `error`
//! - [`encode_call`] / [`decode_reply`]: the client-side envelope codec

pub mod error;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use error::{Fault, FaultCode, ReplyError};
pub use request::{CallEnvelope, RequestEnvelope, encode_call};
pub use response::{ResponseEnvelope, decode_reply};
pub use types::JsonRpcVersion;

/// Protocol version written by default
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    /// Code given to faults built from a bare message
    pub const APPLICATION_ERROR: i64 = SERVER_ERROR_END;
}

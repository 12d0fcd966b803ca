//! Error types for client calls

use std::time::Duration;

use httprpc_protocol::{Fault, ReplyError};
use serde_json::Value;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Every way a call can fail
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response could not be understood
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Identifier session could not be opened or released
    #[error("Id session error: {0}")]
    Id(#[from] IdError),

    /// The peer answered with an error object
    #[error("Server fault (code {}): {}", .0.code, .0.message)]
    Fault(#[from] Fault),

    /// The outbound params could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Call cancelled")]
    Cancelled,

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Transport-specific errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success status whose body is not a response envelope
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Transport closed unexpectedly")]
    Closed,
}

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed response envelope: {0}")]
    MalformedResponse(serde_json::Error),

    #[error("Response id {actual} does not match request id {expected}")]
    IdMismatch { expected: Value, actual: Value },

    #[error("Result does not match the expected type: {0}")]
    ResultType(serde_json::Error),
}

/// Identifier store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("All {capacity} ids are in use")]
    Exhausted { capacity: u64 },

    #[error("Id {0} is not leased")]
    NotLeased(u64),

    #[error("Id store error: {0}")]
    Store(String),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// The server's fault, if the call failed with one
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<ReplyError> for ClientError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::Json(err) => ProtocolError::MalformedResponse(err).into(),
            ReplyError::Fault(fault) => Self::Fault(fault),
            ReplyError::ResultType(err) => ProtocolError::ResultType(err).into(),
        }
    }
}

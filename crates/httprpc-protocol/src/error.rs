use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::error_codes;

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(i64), // -32099 to -32000
    /// Any code outside the reserved ranges, chosen by a procedure
    Application(i64),
}

impl FaultCode {
    pub fn code(&self) -> i64 {
        match self {
            FaultCode::ParseError => error_codes::PARSE_ERROR,
            FaultCode::InvalidRequest => error_codes::INVALID_REQUEST,
            FaultCode::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            FaultCode::InvalidParams => error_codes::INVALID_PARAMS,
            FaultCode::InternalError => error_codes::INTERNAL_ERROR,
            FaultCode::ServerError(code) | FaultCode::Application(code) => *code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            error_codes::PARSE_ERROR => FaultCode::ParseError,
            error_codes::INVALID_REQUEST => FaultCode::InvalidRequest,
            error_codes::METHOD_NOT_FOUND => FaultCode::MethodNotFound,
            error_codes::INVALID_PARAMS => FaultCode::InvalidParams,
            error_codes::INTERNAL_ERROR => FaultCode::InternalError,
            c if (error_codes::SERVER_ERROR_START..=error_codes::SERVER_ERROR_END).contains(&c) => {
                FaultCode::ServerError(c)
            }
            c => FaultCode::Application(c),
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FaultCode::ParseError => "Parse error",
            FaultCode::InvalidRequest => "Invalid Request",
            FaultCode::MethodNotFound => "Method not found",
            FaultCode::InvalidParams => "Invalid params",
            FaultCode::InternalError => "Internal error",
            FaultCode::ServerError(_) => "Server error",
            FaultCode::Application(_) => "Application error",
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// Protocol-level failure carried in the `error` member of a response.
///
/// A `Fault` is an ordinary error value, so procedures return it with `?` and
/// callers propagate it like any other failure. It also round-trips through
/// the wire error object `{"code", "message", "data"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{message}")]
pub struct Fault {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Fault {
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn kind(&self) -> FaultCode {
        FaultCode::from_code(self.code)
    }

    pub fn parse_error(detail: impl fmt::Display) -> Self {
        Self::new(FaultCode::ParseError, format!("rpc: parse error: {}", detail))
    }

    pub fn invalid_request(detail: impl fmt::Display) -> Self {
        Self::new(
            FaultCode::InvalidRequest,
            format!("rpc: invalid request: {}", detail),
        )
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            FaultCode::MethodNotFound,
            format!("rpc: can't find method {:?}", method),
        )
    }

    pub fn invalid_params(detail: impl fmt::Display) -> Self {
        Self::new(
            FaultCode::InvalidParams,
            format!("rpc: invalid params: {}", detail),
        )
    }

    pub fn internal_error(detail: impl fmt::Display) -> Self {
        Self::new(
            FaultCode::InternalError,
            format!("rpc: internal error: {}", detail),
        )
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::new(
            FaultCode::ServerError(error_codes::APPLICATION_ERROR),
            message,
        )
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::from(message.to_string())
    }
}

/// Accepted shapes of a wire error: the structured object, the bare string
/// some JSON-RPC 1.0 peers send, or any other value as opaque data.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFault {
    Object {
        #[serde(default)]
        code: Option<Value>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Option<Value>,
    },
    Message(String),
    Other(Value),
}

/// Numeric codes pass through; anything else falls back to the application
/// code and is kept as data
fn wire_code(code: Option<Value>, data: Option<Value>) -> (i64, Option<Value>) {
    match code {
        None | Some(Value::Null) => (error_codes::APPLICATION_ERROR, data),
        Some(raw) => match raw.as_i64() {
            Some(code) => (code, data),
            None => (error_codes::APPLICATION_ERROR, data.or(Some(raw))),
        },
    }
}

impl<'de> Deserialize<'de> for Fault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match WireFault::deserialize(deserializer)? {
            WireFault::Object {
                code,
                message,
                data,
            } => {
                let (code, data) = wire_code(code, data);
                Fault {
                    code,
                    message: message.unwrap_or_default(),
                    data,
                }
            }
            WireFault::Message(message) => Fault::from(message),
            WireFault::Other(value) => Fault::from(value.to_string()).with_data(value),
        })
    }
}

/// Failure to turn a response envelope into a typed result
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("malformed response envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fault(Fault),

    #[error("result does not match the expected type: {0}")]
    ResultType(serde_json::Error),
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Fault, ReplyError};
use crate::types::JsonRpcVersion;

/// A response envelope. Exactly one of `result` and `error` is meant to be
/// present; the other member is omitted from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Informational only: an unknown or `null` version reads as the default
    #[serde(rename = "jsonrpc", default, deserialize_with = "lenient_version")]
    pub version: JsonRpcVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Fault>,
    #[serde(default)]
    pub id: Value,
}

fn lenient_version<'de, D>(deserializer: D) -> Result<JsonRpcVersion, D::Error>
where
    D: Deserializer<'de>,
{
    let version = Option::<Value>::deserialize(deserializer)?;
    Ok(version
        .as_ref()
        .and_then(Value::as_str)
        .and_then(JsonRpcVersion::parse)
        .unwrap_or_default())
}

impl ResponseEnvelope {
    pub fn success(version: JsonRpcVersion, id: Value, result: Value) -> Self {
        Self {
            version,
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(version: JsonRpcVersion, id: Value, fault: Fault) -> Self {
        Self {
            version,
            result: None,
            error: Some(fault),
            id,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The `error` member wins over `result`; a missing result reads as `null`
    pub fn into_result(self) -> Result<Value, Fault> {
        match self.error {
            Some(fault) => Err(fault),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    pub fn decode_result<R>(self) -> Result<R, ReplyError>
    where
        R: DeserializeOwned,
    {
        let value = self.into_result().map_err(ReplyError::Fault)?;
        serde_json::from_value(value).map_err(ReplyError::ResultType)
    }
}

/// Decode a raw response body into the call's result type
pub fn decode_reply<R>(bytes: &[u8]) -> Result<R, ReplyError>
where
    R: DeserializeOwned,
{
    ResponseEnvelope::from_slice(bytes)?.decode_result()
}

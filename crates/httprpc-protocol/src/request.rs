use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Fault;
use crate::types::JsonRpcVersion;

/// Outbound request envelope, borrowing the caller's id, method and params
#[derive(Debug, Serialize)]
pub struct CallEnvelope<'a, P: ?Sized> {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    /// Opaque correlation value; the peer echoes it verbatim
    pub id: &'a Value,
    pub method: &'a str,
    pub params: &'a P,
}

/// Serialize a call into its wire form
pub fn encode_call<P>(
    version: JsonRpcVersion,
    id: &Value,
    method: &str,
    params: &P,
) -> Result<Vec<u8>, serde_json::Error>
where
    P: Serialize + ?Sized,
{
    serde_json::to_vec(&CallEnvelope {
        version,
        id,
        method,
        params,
    })
}

/// A request envelope as received by a server.
///
/// `jsonrpc` and `id` are optional on the wire: JSON-RPC 1.0 peers omit the
/// version, and an absent id is treated as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(
        rename = "jsonrpc",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<JsonRpcVersion>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RequestEnvelope {
    /// Parse a raw message, classifying failures as JSON-RPC faults
    pub fn parse(bytes: &[u8]) -> Result<Self, Fault> {
        let value: Value = serde_json::from_slice(bytes).map_err(Fault::parse_error)?;

        let obj = value
            .as_object()
            .ok_or_else(|| Fault::invalid_request("request must be a JSON object"))?;

        match obj.get("method") {
            Some(Value::String(_)) => {}
            Some(_) => return Err(Fault::invalid_request("method must be a string")),
            None => return Err(Fault::invalid_request("missing method")),
        }

        serde_json::from_value(value).map_err(Fault::invalid_request)
    }

    /// Version to answer with
    pub fn response_version(&self) -> JsonRpcVersion {
        self.version.unwrap_or_default()
    }
}

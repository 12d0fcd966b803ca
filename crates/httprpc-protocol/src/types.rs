use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of the `jsonrpc` envelope member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JsonRpcVersion {
    V1_0,
    #[default]
    V2_0,
}

impl JsonRpcVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonRpcVersion::V1_0 => "1.0",
            JsonRpcVersion::V2_0 => "2.0",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1.0" => Some(JsonRpcVersion::V1_0),
            "2.0" => Some(JsonRpcVersion::V2_0),
            _ => None,
        }
    }
}

impl fmt::Display for JsonRpcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        JsonRpcVersion::parse(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("Invalid JSON-RPC version: {}", s))
        })
    }
}

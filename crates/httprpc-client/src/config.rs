//! Configuration types for the RPC client

use httprpc_protocol::JsonRpcVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    /// Protocol version stamped on outbound envelopes
    #[serde(default)]
    pub version: JsonRpcVersion,

    /// Timeout configurations
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Connection configurations
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Reject responses whose `id` differs from the request's
    #[serde(default)]
    pub verify_response_id: bool,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout
    #[serde(with = "duration_serde")]
    pub connect: Duration,

    /// Request timeout for individual calls
    #[serde(with = "duration_serde")]
    pub request: Duration,
}

/// Connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// User agent string
    pub user_agent: Option<String>,

    /// Custom headers to include in requests
    pub headers: Option<HashMap<String, String>>,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// Maximum number of redirects to follow
    pub max_redirects: u32,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(format!("httprpc-client/{}", env!("CARGO_PKG_VERSION"))),
            headers: None,
            follow_redirects: true,
            max_redirects: 5,
        }
    }
}

// Helper module for Duration serialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.version, JsonRpcVersion::V2_0);
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
        assert_eq!(config.timeouts.request, Duration::from_secs(30));
        assert!(!config.verify_response_id);
        assert!(
            config
                .connection
                .user_agent
                .as_deref()
                .unwrap()
                .starts_with("httprpc-client/")
        );
    }

    #[test]
    fn test_durations_serialize_as_millis() {
        let json = serde_json::to_value(TimeoutConfig::default()).unwrap();
        assert_eq!(json, json!({"connect": 10_000, "request": 30_000}));
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: ClientConfig = serde_json::from_value(json!({
            "version": "1.0",
            "timeouts": {"connect": 250, "request": 1500},
            "verify_response_id": true
        }))
        .unwrap();

        assert_eq!(config.version, JsonRpcVersion::V1_0);
        assert_eq!(config.timeouts.request, Duration::from_millis(1500));
        assert!(config.verify_response_id);
        assert_eq!(config.connection.max_redirects, 5);
    }
}

//! # Echo Client
//!
//! Exercises the procedures of the `echo_server` example.
//!
//! ```bash
//! cargo run -p httprpc-server --example echo_server
//! cargo run -p httprpc-client --example echo_client -- http://127.0.0.1:8000/rpc
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use httprpc_client::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct Text {
    text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000/rpc".to_string());

    let client = RpcClient::builder()
        .with_id_store(Arc::new(UuidIdStore))
        .with_request_timeout(Duration::from_secs(5))
        .build();
    let cancel = CancellationToken::new();

    let echoed: Text = client
        .call(&cancel, &target, "Echo", &Text { text: "hi".to_string() })
        .await
        .context("Echo failed")?;
    info!("Echo -> {:?}", echoed);

    let sum: i64 = client
        .call(&cancel, &target, "Arith.Add", &json!({"a": 2, "b": 40}))
        .await
        .context("Arith.Add failed")?;
    info!("Arith.Add -> {}", sum);

    match client
        .call::<_, i64>(&cancel, &target, "Arith.Divide", &json!({"a": 1, "b": 0}))
        .await
    {
        Ok(quotient) => warn!("Arith.Divide unexpectedly returned {}", quotient),
        Err(err) => match err.fault() {
            Some(fault) => info!("Arith.Divide -> fault {}: {}", fault.code, fault.message),
            None => return Err(err.into()),
        },
    }

    let inspected: Value = client
        .call(&cancel, &target, "Debug.Inspect", &[1, 2, 3])
        .await
        .context("Debug.Inspect failed")?;
    info!("Debug.Inspect -> {}", inspected);

    Ok(())
}

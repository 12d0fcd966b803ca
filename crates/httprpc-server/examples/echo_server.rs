//! # Echo / Arithmetic Server
//!
//! Serves a handful of procedures on `http://127.0.0.1:8000/rpc`.
//!
//! ```bash
//! cargo run -p httprpc-server --example echo_server
//!
//! curl -X POST http://127.0.0.1:8000/rpc \
//!   -H "Content-Type: application/json" \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"Echo","params":{"text":"hi"}}'
//! ```

use anyhow::Result;
use async_trait::async_trait;
use httprpc_server::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Text {
    text: String,
}

impl Payload for Text {}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Operands {
    a: i64,
    b: i64,
}

impl Payload for Operands {}

struct Divide;

#[async_trait]
impl Procedure for Divide {
    type Args = Operands;
    type Reply = i64;

    async fn call(
        &self,
        _ctx: &CallContext,
        args: Operands,
        reply: &mut i64,
    ) -> std::result::Result<(), Fault> {
        *reply = divide(&args)?;
        Ok(())
    }
}

fn add(args: &Operands) -> std::result::Result<i64, Fault> {
    args.a
        .checked_add(args.b)
        .ok_or_else(|| Fault::from("integer overflow"))
}

fn divide(args: &Operands) -> std::result::Result<i64, Fault> {
    if args.b == 0 {
        return Err(Fault::from("divide by zero"));
    }
    args.a
        .checked_div(args.b)
        .ok_or_else(|| Fault::from("integer overflow"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    info!("Starting echo server");
    let server = HttpRpcServer::builder()
        .bind_address("127.0.0.1:8000".parse()?)
        .procedure(
            "Echo",
            procedure_fn(|_ctx: &CallContext, args: Text, reply: &mut Text| {
                reply.text = args.text;
                Ok(())
            }),
        )?
        .procedure(
            "Arith.Add",
            procedure_fn(|_ctx: &CallContext, args: Operands, reply: &mut i64| {
                *reply = add(&args)?;
                Ok(())
            }),
        )?
        .procedure("Arith.Divide", Divide)?
        .raw_procedure(
            "Debug.Inspect",
            RawProcedure::json(|ctx, params| async move {
                Ok::<_, Fault>(json!({
                    "params": params,
                    "id": ctx.request_id,
                    "peer": ctx.remote_addr.map(|addr| addr.to_string()),
                }))
            }),
        )?
        .build();

    server.run().await?;
    Ok(())
}

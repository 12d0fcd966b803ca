//! Shared helpers: an in-process server on an ephemeral port

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use httprpc_server::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub text: String,
}

impl Payload for Text {}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Nap {
    pub millis: u64,
}

impl Payload for Nap {}

/// Sleeps before answering
pub struct Sleep;

#[async_trait]
impl Procedure for Sleep {
    type Args = Nap;
    type Reply = String;

    async fn call(
        &self,
        _ctx: &CallContext,
        args: Nap,
        reply: &mut String,
    ) -> std::result::Result<(), Fault> {
        tokio::time::sleep(Duration::from_millis(args.millis)).await;
        *reply = "awake".to_string();
        Ok(())
    }
}

/// Server with the fixture procedures registered
pub fn fixture_builder() -> HttpRpcServerBuilder {
    HttpRpcServer::builder()
        .procedure(
            "Echo",
            procedure_fn(|_ctx: &CallContext, args: Text, reply: &mut Text| {
                reply.text = args.text;
                Ok(())
            }),
        )
        .and_then(|b| {
            b.procedure(
                "Fail",
                procedure_fn(|_ctx: &CallContext, _args: (), _reply: &mut ()| {
                    Err(Fault::from("boom"))
                }),
            )
        })
        .and_then(|b| b.procedure("Sleep", Sleep))
        .and_then(|b| {
            b.raw_procedure(
                "Whoami",
                RawProcedure::json(|ctx, _params| async move {
                    Ok::<_, Fault>(json!({ "id": ctx.request_id }))
                }),
            )
        })
        .unwrap_or_else(|err| panic!("fixture registration failed: {}", err))
}

/// A server bound to `127.0.0.1:0`, stopped on drop
pub struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(fixture_builder()).await
    }

    pub async fn start_with(builder: HttpRpcServerBuilder) -> Self {
        let _ = tracing_subscriber::fmt::try_init();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let server = builder.build();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(err) = server.serve_with_shutdown(listener, shutdown).await {
                debug!("Test server stopped with error: {}", err);
            }
        });

        Self {
            addr,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}/rpc", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

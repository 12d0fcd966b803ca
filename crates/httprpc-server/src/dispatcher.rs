//! Per-call orchestration: one HTTP request in, one HTTP response out

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use httprpc_protocol::Fault;
use tracing::{debug, error, warn};

use crate::codec::{Codec, JsonCodec, plain_text};
use crate::context::CallContext;
use crate::procedure::CallFailure;
use crate::registry::ProcedureRegistry;

/// Default cap on request bodies (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Routes calls to registered procedures.
///
/// Holds no per-call state; the registry is the only thing shared between
/// calls, so one dispatcher serves any number of connections in parallel.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProcedureRegistry>,
    codec: Arc<dyn Codec>,
    max_body_size: usize,
}

impl Dispatcher {
    pub fn new(registry: Arc<ProcedureRegistry>) -> Self {
        Self {
            registry,
            codec: Arc::new(JsonCodec),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn registry(&self) -> &Arc<ProcedureRegistry> {
        &self.registry
    }

    /// Serve one call. Never fails: every outcome is an HTTP response.
    pub async fn dispatch<B>(
        &self,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let mut response = self.handle(req, remote_addr).await;
        response
            .headers_mut()
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        response
    }

    async fn handle<B>(
        &self,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        if req.method() != Method::POST {
            warn!(method = %req.method(), "Rejected non-POST request");
            return method_not_allowed(req.method());
        }

        let (parts, body) = req.into_parts();
        let body = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!(limit = self.max_body_size, "Request body too large");
                return plain_text(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("rpc: request body exceeds {} bytes", self.max_body_size),
                );
            }
            Err(err) => {
                warn!("Failed to read request body: {}", err);
                return plain_text(
                    StatusCode::BAD_REQUEST,
                    format!("rpc: failed to read request body: {}", err),
                );
            }
        };

        let mut request = self.codec.new_request(body);

        let method = match request.method() {
            Ok(method) => method,
            Err(fault) => {
                warn!(code = fault.code, "Malformed request: {}", fault);
                return request.write_error(StatusCode::BAD_REQUEST, &fault);
            }
        };

        let ctx = CallContext::from_parts(&parts, remote_addr).with_request_id(request.request_id());
        debug!(method = %method, id = %ctx.request_id, "Dispatching call");

        let descriptor = match self.registry.get(&method) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(method = %method, "{}", err);
                return request.write_error(StatusCode::BAD_REQUEST, &Fault::from(err));
            }
        };

        let mut argument = descriptor.allocate_argument();
        if let Err(fault) = request.read_request(argument.as_mut()) {
            warn!(method = %method, "Invalid params: {}", fault);
            return request.write_error(StatusCode::BAD_REQUEST, &fault);
        }

        match descriptor.invoke(ctx, argument).await {
            Ok(result) => {
                debug!(method = %method, status = %StatusCode::OK, "Call succeeded");
                request.write_response(result)
            }
            Err(CallFailure::Fault(fault)) => {
                debug!(method = %method, code = fault.code, "Procedure returned fault: {}", fault);
                request.write_error(StatusCode::BAD_REQUEST, &fault)
            }
            Err(CallFailure::Encode(err)) => {
                error!(method = %method, "Failed to encode result: {}", err);
                request.write_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &Fault::internal_error(format!("failed to encode result: {}", err)),
                )
            }
            Err(CallFailure::ArgumentType(ty)) => {
                error!(method = %method, "Codec produced an argument that is not {}", ty);
                request.write_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &Fault::internal_error(format!("argument is not {}", ty)),
                )
            }
        }
    }
}

fn method_not_allowed(method: &Method) -> Response<Full<Bytes>> {
    let mut response = plain_text(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("rpc: POST method required, received {}", method),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("POST"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{Payload, RawProcedure, procedure_fn};
    use http::header::CONTENT_TYPE;
    use serde::{Deserialize, Serialize, Serializer};
    use serde_json::{Value, json};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Text {
        text: String,
    }

    impl Payload for Text {}

    /// Result type whose serialization always fails
    #[derive(Debug, Default, Deserialize)]
    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    impl Payload for Unencodable {}

    fn dispatcher() -> Dispatcher {
        let registry = Arc::new(ProcedureRegistry::new());
        registry
            .register(
                "Echo",
                procedure_fn(|_ctx: &CallContext, args: Text, reply: &mut Text| {
                    reply.text = args.text;
                    Ok(())
                }),
            )
            .unwrap();
        registry
            .register(
                "Fail",
                procedure_fn(|_ctx: &CallContext, _args: (), _reply: &mut ()| {
                    Err(Fault::from("boom"))
                }),
            )
            .unwrap();
        registry
            .register(
                "Broken",
                procedure_fn(|_ctx: &CallContext, _args: (), _reply: &mut Unencodable| Ok(())),
            )
            .unwrap();
        registry
            .register_raw(
                "Whoami",
                RawProcedure::json(|ctx, _params| async move {
                    Ok::<_, Fault>(json!({
                        "id": ctx.request_id,
                        "agent": ctx.header("user-agent"),
                    }))
                }),
            )
            .unwrap();
        Dispatcher::new(registry)
    }

    fn post(body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri("/rpc")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn read_body(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    async fn read_json(response: Response<Full<Bytes>>) -> Value {
        serde_json::from_slice(&read_body(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let response = dispatcher()
            .dispatch(
                post(r#"{"id":1,"method":"Echo","params":{"text":"hi"}}"#),
                None,
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let json = read_json(response).await;
        assert_eq!(json["result"], json!({"text": "hi"}));
        assert_eq!(json["id"], 1);
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_procedure_fault_is_bad_request() {
        let response = dispatcher()
            .dispatch(post(r#"{"id":2,"method":"Fail","params":null}"#), None)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["error"]["message"], "boom");
        assert_eq!(json["id"], 2);
        assert!(json.get("result").is_none());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let response = dispatcher()
            .dispatch(post(r#"{"id":3,"method":"Nope","params":{}}"#), None)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["error"]["code"], -32601);
        assert!(json["error"]["message"].as_str().unwrap().contains("Nope"));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let response = dispatcher()
            .dispatch(post(r#"{"id":4,"method":"Echo","params":{"text":5}}"#), None)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let response = dispatcher().dispatch(post("{not json"), None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        let json = read_json(response).await;
        assert_eq!(json["error"]["code"], -32700);
        assert_eq!(json["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_non_post_rejected() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/rpc")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = dispatcher().dispatch(request, None).await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "POST");
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(
            response.headers()[CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(
            read_body(response).await,
            "rpc: POST method required, received GET"
        );
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let dispatcher = dispatcher().with_max_body_size(16);
        let response = dispatcher
            .dispatch(
                post(r#"{"id":1,"method":"Echo","params":{"text":"far too long"}}"#),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_unencodable_result() {
        let response = dispatcher()
            .dispatch(post(r#"{"id":5,"method":"Broken"}"#), None)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["error"]["code"], -32603);
    }

    #[tokio::test]
    async fn test_context_reaches_procedure() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/rpc")
            .header("user-agent", "inspector/1.0")
            .body(Full::new(Bytes::from_static(
                br#"{"id":"trace-1","method":"Whoami","params":null}"#,
            )))
            .unwrap();
        let addr: SocketAddr = "127.0.0.1:5555".parse().unwrap();
        let response = dispatcher().dispatch(request, Some(addr)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["result"]["id"], "trace-1");
        assert_eq!(json["result"]["agent"], "inspector/1.0");
    }
}

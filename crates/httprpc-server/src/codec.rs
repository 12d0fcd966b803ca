//! Request/response codecs.
//!
//! A [`Codec`] turns a raw request body into a [`CodecRequest`], which the
//! dispatcher asks for the method name, the decoded argument and finally the
//! encoded response.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;
use httprpc_protocol::{Fault, JsonRpcVersion, RequestEnvelope, ResponseEnvelope};
use serde_json::Value;
use tracing::error;

use crate::procedure::ArgumentSlot;

/// Factory for per-request codec state
pub trait Codec: Send + Sync {
    fn new_request(&self, body: Bytes) -> Box<dyn CodecRequest>;
}

/// Codec state for one request
pub trait CodecRequest: Send {
    /// Name of the procedure being called
    fn method(&mut self) -> Result<String, Fault>;

    /// Correlation id to echo, `null` if unknown
    fn request_id(&self) -> Value;

    /// Decode the params into the zero-valued argument
    fn read_request(&mut self, argument: &mut dyn ArgumentSlot) -> Result<(), Fault>;

    fn write_response(&self, result: Value) -> Response<Full<Bytes>>;

    fn write_error(&self, status: StatusCode, fault: &Fault) -> Response<Full<Bytes>>;
}

/// JSON-RPC codec
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn new_request(&self, body: Bytes) -> Box<dyn CodecRequest> {
        Box::new(JsonCodecRequest {
            envelope: RequestEnvelope::parse(&body),
        })
    }
}

struct JsonCodecRequest {
    envelope: Result<RequestEnvelope, Fault>,
}

impl JsonCodecRequest {
    fn version(&self) -> JsonRpcVersion {
        self.envelope
            .as_ref()
            .map(RequestEnvelope::response_version)
            .unwrap_or_default()
    }
}

impl CodecRequest for JsonCodecRequest {
    fn method(&mut self) -> Result<String, Fault> {
        match &self.envelope {
            Ok(envelope) => Ok(envelope.method.clone()),
            Err(fault) => Err(fault.clone()),
        }
    }

    fn request_id(&self) -> Value {
        self.envelope
            .as_ref()
            .map(|envelope| envelope.id.clone())
            .unwrap_or(Value::Null)
    }

    fn read_request(&mut self, argument: &mut dyn ArgumentSlot) -> Result<(), Fault> {
        let params = match &mut self.envelope {
            Ok(envelope) => std::mem::take(&mut envelope.params),
            Err(fault) => return Err(fault.clone()),
        };

        let err = match argument.decode(params.clone()) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        // Positional form: `"params": [args]`
        match params {
            Value::Array(mut items) if items.len() == 1 => argument
                .decode(items.remove(0))
                .map_err(|_| Fault::invalid_params(&err)),
            _ => Err(Fault::invalid_params(err)),
        }
    }

    fn write_response(&self, result: Value) -> Response<Full<Bytes>> {
        let envelope = ResponseEnvelope::success(self.version(), self.request_id(), result);
        json_response(StatusCode::OK, &envelope)
    }

    fn write_error(&self, status: StatusCode, fault: &Fault) -> Response<Full<Bytes>> {
        let envelope = ResponseEnvelope::failure(self.version(), self.request_id(), fault.clone());
        json_response(status, &envelope)
    }
}

fn json_response(status: StatusCode, envelope: &ResponseEnvelope) -> Response<Full<Bytes>> {
    match serde_json::to_vec(envelope) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(err) => {
            error!("Failed to encode response envelope: {}", err);
            plain_text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "rpc: failed to encode response",
            )
        }
    }
}

pub(crate) fn plain_text(status: StatusCode, body: impl Into<String>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.into())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

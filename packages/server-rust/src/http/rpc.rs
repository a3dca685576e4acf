//! JSON-RPC 2.0 adapter: POST to the exact path prefix.
//!
//! The numbered request id is echoed back; failures use the standard error
//! codes: -32601 method not found (HTTP 404), -32602 invalid params,
//! -32603 internal error (both HTTP 200 with the error in the envelope).

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use axum::http::StatusCode;
use metrics::counter;
use procgate_core::{coerce, Supplied};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::{encode, AppState};

/// JSON-RPC error code: method not found.
const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC error code: invalid params.
const INVALID_PARAMS: i32 = -32602;
/// JSON-RPC error code: internal error.
const INTERNAL_ERROR: i32 = -32603;

/// Incoming JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
struct RpcRequest {
    method: String,
    #[serde(default)]
    jsonrpc: String,
    #[serde(default)]
    id: u64,
    #[serde(default)]
    params: Map<String, Value>,
}

/// Outgoing JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize)]
struct RpcResponse {
    id: u64,
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Box<RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl RpcError {
    fn new(code: i32, message: &str, data: Value) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(data),
        }
    }
}

/// Handles `POST P` with a JSON-RPC 2.0 request body.
pub async fn handle(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();
    counter!("procgate_requests_total", "adapter" => "rpc").increment(1);

    // A malformed or empty body is a client error, reported before any
    // registry lookup.
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            let text = format!("json parse error: {err}");
            warn!("{text}");
            return (StatusCode::BAD_REQUEST, text).into_response();
        }
    };

    let mut response = RpcResponse {
        id: request.id,
        jsonrpc: request.jsonrpc.clone(),
        result: None,
        error: None,
    };
    let mut status = StatusCode::OK;

    match state.registry.lookup(&request.method) {
        None => {
            info!(method = %request.method, "unknown method");
            response.error = Some(RpcError::new(
                METHOD_NOT_FOUND,
                "Method not found",
                json!(format!("no method {}", request.method)),
            ));
            status = StatusCode::NOT_FOUND;
        }
        Some(identity) => match state.resolver.resolve(&identity).await {
            Err(err) => {
                warn!(method = %request.method, %err, "argument definition load failed");
                response.error = Some(RpcError::new(
                    METHOD_NOT_FOUND,
                    "Method not found",
                    json!(err.to_string()),
                ));
                status = StatusCode::NOT_FOUND;
            }
            Ok(defs) => {
                let supplied: HashMap<String, Supplied> = request
                    .params
                    .into_iter()
                    .map(|(key, value)| (key, Supplied::from_json(value)))
                    .collect();
                let outcome = coerce(&defs, &supplied, &identity);

                if outcome.is_complete() {
                    debug!(method = %request.method, args = ?outcome.envelope.arg, "dispatching");
                    match state.dispatcher.submit(&outcome.envelope).await {
                        Ok(result) if result.success => response.result = result.result,
                        Ok(result) => {
                            response.error = Some(RpcError::new(
                                INTERNAL_ERROR,
                                "Internal Error",
                                json!(result.error),
                            ));
                        }
                        Err(err) => {
                            response.error = Some(RpcError::new(
                                INTERNAL_ERROR,
                                "Internal Error",
                                json!(err.to_string()),
                            ));
                        }
                    }
                } else {
                    response.error = Some(RpcError::new(
                        INVALID_PARAMS,
                        "Required parameter(s) not found",
                        json!(outcome.missing),
                    ));
                }
            }
        },
    }

    let out = serde_json::to_string(&response).unwrap_or_else(|err| {
        warn!(%err, "response marshal failed");
        response.result = None;
        response.error = Some(RpcError::new(
            INTERNAL_ERROR,
            "Internal Error",
            json!(err.to_string()),
        ));
        serde_json::to_string(&response).unwrap_or_default()
    });
    encode::respond(start, status, out)
}

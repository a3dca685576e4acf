//! PostgREST-compatible adapter: POST with a raw JSON object body.
//!
//! Success returns the raw routine result as the whole body; failures use
//! the PostgREST error shape `{message, code?, details?}` with HTTP 400, and
//! an unknown method is a plain 404.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use axum::http::StatusCode;
use metrics::counter;
use procgate_core::{coerce, Supplied};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::{encode, AppState};

/// Error code reported for missing required parameters (undefined function).
const MISSING_PARAMS_CODE: &str = "42883";

/// PostgREST-style error body.
#[derive(Debug, Serialize)]
struct PgError {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl PgError {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: None,
            details: None,
        }
    }

    fn with_details(message: &str, details: Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(message)
        }
    }

    fn into_body(self, start: Instant, status: StatusCode) -> Response {
        let body = serde_json::to_string(&self).unwrap_or_else(|err| {
            warn!(%err, "error marshal failed");
            format!(r#"{{"message":"{}"}}"#, self.message)
        });
        encode::respond(start, status, body)
    }
}

/// Handles `POST P/{method}[.json]` with a raw JSON object body.
pub async fn handle(
    State(state): State<AppState>,
    Path(method): Path<String>,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    counter!("procgate_requests_total", "adapter" => "postgrest").increment(1);

    let method = method.strip_suffix(".json").unwrap_or(&method).to_string();
    debug!(%method, "postgrest call");

    let Some(identity) = state.registry.lookup(&method) else {
        info!(%method, "unknown method");
        return StatusCode::NOT_FOUND.into_response();
    };
    let defs = match state.resolver.resolve(&identity).await {
        Ok(defs) => defs,
        Err(err) => {
            warn!(%method, %err, "argument definition load failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    if body.is_empty() {
        return PgError::new("Cannot parse empty request payload, use '{}'")
            .into_body(start, StatusCode::BAD_REQUEST);
    }
    let params: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(params) => params,
        Err(err) => {
            warn!(%method, %err, "unparsable request payload");
            return PgError::with_details(
                "Cannot parse request payload",
                json!(format!("json parse error: {err}")),
            )
            .into_body(start, StatusCode::BAD_REQUEST);
        }
    };

    let supplied: HashMap<String, Supplied> = params
        .into_iter()
        .map(|(key, value)| (key, Supplied::from_json(value)))
        .collect();
    let outcome = coerce(&defs, &supplied, &identity);
    if !outcome.is_complete() {
        let mut error = PgError::with_details(
            "Required parameter(s) not found",
            json!(outcome.missing.join(", ")),
        );
        error.code = Some(MISSING_PARAMS_CODE.to_string());
        return error.into_body(start, StatusCode::BAD_REQUEST);
    }

    debug!(%method, args = ?outcome.envelope.arg, "dispatching");
    match state.dispatcher.submit(&outcome.envelope).await {
        Ok(result) if result.success => {
            let body = result.result.map(|raw| raw.get().to_string()).unwrap_or_default();
            encode::respond(start, StatusCode::OK, body)
        }
        Ok(result) => PgError::with_details(
            "Method call error",
            json!(result.error),
        )
        .into_body(start, StatusCode::BAD_REQUEST),
        Err(err) => PgError::with_details("Method call error", json!(err.to_string()))
            .into_body(start, StatusCode::BAD_REQUEST),
    }
}

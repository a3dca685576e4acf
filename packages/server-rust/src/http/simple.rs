//! Simple adapter: GET/HEAD with query-string arguments.
//!
//! The reply is the executor's result envelope serialized as-is
//! (`{"success":..., "result"|"error":...}`), always HTTP 200 once the
//! method resolves; an unknown method is a plain 404. HEAD requests run the
//! same pipeline — axum routes HEAD through the GET handler and the body is
//! stripped on the wire.

use std::time::Instant;

use axum::extract::{Path, RawQuery, State};
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use metrics::counter;
use procgate_core::{coerce, DispatchResult, Supplied};
use tracing::{debug, info, warn};

use super::{encode, AppState};

/// Handles `GET P/{method}[.json]?args` (and HEAD via the same route).
pub async fn handle(
    State(state): State<AppState>,
    Path(method): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let start = Instant::now();
    counter!("procgate_requests_total", "adapter" => "simple").increment(1);

    let method = method.strip_suffix(".json").unwrap_or(&method).to_string();
    let Some(identity) = state.registry.lookup(&method) else {
        info!(%method, "unknown method");
        return StatusCode::NOT_FOUND.into_response();
    };

    let defs = match state.resolver.resolve(&identity).await {
        Ok(defs) => defs,
        Err(err) => {
            info!(%method, %err, "argument definition load failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let supplied = Supplied::from_query_pairs(
        form_urlencoded::parse(query.as_deref().unwrap_or("").as_bytes()).into_owned(),
    );
    let outcome = coerce(&defs, &supplied, &identity);

    let result = if outcome.is_complete() {
        debug!(%method, args = ?outcome.envelope.arg, "dispatching");
        match state.dispatcher.submit(&outcome.envelope).await {
            Ok(result) => result,
            Err(err) => DispatchResult::fail(err.to_string()),
        }
    } else {
        DispatchResult::fail(format!(
            "Required parameter(s) [{}] not found",
            outcome.missing.join(", ")
        ))
    };

    let body = encode::to_body(&result, state.config.compact).unwrap_or_else(|err| {
        warn!(%err, "result marshal failed");
        serde_json::to_string(&DispatchResult::fail(err.to_string())).unwrap_or_default()
    });
    encode::respond(start, StatusCode::OK, body)
}

//! Response encoding: status, headers, and body serialization.
//!
//! Every completed request carries `Content-Type: application/json;
//! charset=UTF-8` and an `X-Elapsed` header with the wall-clock time spent in
//! the pipeline. Bodies are compact or pretty-printed per configuration.

use std::time::Instant;

use axum::response::{IntoResponse, Response};
use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::StatusCode;
use serde::Serialize;

/// Content type of every adapter response.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";

/// Header reporting elapsed pipeline time.
pub const ELAPSED_HEADER: &str = "x-elapsed";

/// Builds the final response: status, JSON content type, elapsed-time
/// header, and the serialized body.
#[must_use]
pub fn respond(start: Instant, status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (CONTENT_TYPE, CONTENT_TYPE_JSON.to_string()),
            (HeaderName::from_static(ELAPSED_HEADER), elapsed_text(start)),
        ],
        body,
    )
        .into_response()
}

/// Serializes a response body, compact or pretty-printed.
///
/// # Errors
///
/// Returns an error when the value cannot be represented as JSON; callers
/// convert that into their protocol's internal-error shape.
pub fn to_body<T: Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}

/// Elapsed time as milliseconds with microsecond precision. Kept ASCII so it
/// is always a valid header value.
fn elapsed_text(start: Instant) -> String {
    format!("{:.3}ms", start.elapsed().as_secs_f64() * 1000.0)
}

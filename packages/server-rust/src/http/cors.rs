//! CORS gate: origin allow-list check ahead of adapter dispatch.
//!
//! Requests carrying an `Origin` header are checked against the configured
//! allow-list before any registry or dispatcher work; a mismatch is rejected
//! with 403. Matching requests get the standard cross-origin headers on the
//! response. Requests without an `Origin` header skip the gate entirely
//! (same-origin assumed).

use axum::extract::{Request, State};
use axum::http::header::{HeaderValue, ORIGIN};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use tracing::{debug, warn};

use super::AppState;

const ALLOW_HEADERS: &str =
    "origin, content-type, accept, keep-alive, user-agent, x-requested-with, x-token";
const ALLOW_METHODS: &str = "GET, POST, OPTIONS";

/// Middleware enforcing the origin allow-list.
pub async fn gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(origin) = request.headers().get(ORIGIN).cloned() else {
        return next.run(request).await;
    };

    let allowed = origin
        .to_str()
        .is_ok_and(|o| origin_allowed(&state.config.cors_origins, o));
    if !allowed {
        warn!(origin = ?origin, "unregistered request source");
        return (StatusCode::FORBIDDEN, "Origin not registered").into_response();
    }
    debug!(origin = ?origin, "origin allowed");

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", origin);
    headers.insert(
        "access-control-allow-credentials",
        HeaderValue::from_static("true"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static(ALLOW_METHODS),
    );
    response
}

/// Exact-match lookup with wildcard support. An empty allow-list rejects
/// every cross-origin request.
fn origin_allowed(origins: &[String], origin: &str) -> bool {
    origins.iter().any(|o| o == "*" || o == origin)
}

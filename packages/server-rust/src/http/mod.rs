//! HTTP surface: router assembly, shared state, and the serve lifecycle.
//!
//! Follows the deferred startup pattern: `new()` allocates shared state,
//! `start()` binds the TCP listener, and `serve()` accepts connections until
//! the shutdown future fires. Route layout (relative to the configured
//! prefix `P`):
//!
//! - `GET/HEAD P/{method}[.json]?args` -- simple adapter
//! - `POST P` (exact)                  -- JSON-RPC 2.0 adapter
//! - `POST P/{method}[.json]`         -- PostgREST adapter
//! - `OPTIONS *`                       -- 204, CORS headers only

pub mod cors;
pub mod encode;
pub mod layers;
pub mod postgrest;
pub mod rpc;
pub mod simple;

use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{normalize_prefix, GatewayConfig};
use crate::dispatch::Dispatcher;
use crate::registry::RoutineRegistry;
use crate::resolver::ArgResolver;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state passed to all handlers via `State` extraction.
///
/// Everything here is read-only after startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Exposed method name → backing routine identity, loaded once.
    pub registry: Arc<RoutineRegistry>,
    /// Handle to the executor intake.
    pub dispatcher: Dispatcher,
    /// Argument-definition resolver (introspection dispatch).
    pub resolver: ArgResolver,
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Builds the state from configuration and an executor dispatcher.
    #[must_use]
    pub fn new(config: GatewayConfig, dispatcher: Dispatcher) -> Self {
        let registry = Arc::new(RoutineRegistry::from_entries(&config.routines));
        let resolver = ArgResolver::new(dispatcher.clone(), &config.introspection_routine);
        Self {
            registry,
            dispatcher,
            resolver,
            config: Arc::new(config),
        }
    }
}

// ---------------------------------------------------------------------------
// Router assembly
// ---------------------------------------------------------------------------

/// Assembles the axum router: adapters under the configured prefix, the CORS
/// gate, and the transport middleware stack.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/",
            post(rpc::handle)
                .get(prefix_root)
                .options(preflight)
                .fallback(unsupported),
        )
        .route(
            "/{method}",
            get(simple::handle)
                .post(postgrest::handle)
                .options(preflight)
                .fallback(unsupported),
        );

    let prefix = normalize_prefix(&state.config.prefix);
    let router = if prefix == "/" {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    router
        .fallback(global_fallback)
        .layer(middleware::from_fn_with_state(state.clone(), cors::gate))
        .layer(layers::build_http_layers(&state.config))
        .with_state(state)
}

/// `OPTIONS` reply: no content, plain-text content type. The CORS gate adds
/// the cross-origin headers when an allowed `Origin` is present.
async fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [(CONTENT_TYPE, "text/plain; charset=UTF-8")],
    )
        .into_response()
}

/// GET on the exact prefix carries no method name.
async fn prefix_root() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Request methods no adapter serves.
async fn unsupported(method: Method) -> Response {
    warn!(%method, "unsupported request method");
    (
        StatusCode::NOT_IMPLEMENTED,
        format!("Unsupported request method: {method}"),
    )
        .into_response()
}

/// Paths outside the prefix: OPTIONS still answers 204, everything else is
/// not found.
async fn global_fallback(request: Request) -> Response {
    if request.method() == Method::OPTIONS {
        preflight().await
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

// ---------------------------------------------------------------------------
// GatewayServer
// ---------------------------------------------------------------------------

/// Manages the HTTP server lifecycle: `new()` → `start()` → `serve()`.
pub struct GatewayServer {
    state: AppState,
    listener: Option<TcpListener>,
}

impl GatewayServer {
    /// Creates the server without binding any port.
    #[must_use]
    pub fn new(config: GatewayConfig, dispatcher: Dispatcher) -> Self {
        Self {
            state: AppState::new(config, dispatcher),
            listener: None,
        }
    }

    /// Binds the TCP listener to the configured host and port. Returns the
    /// actual bound port (relevant when port 0 requests an ephemeral one).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.state.config.host, port, "TCP listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until the shutdown future fires.
    ///
    /// # Errors
    ///
    /// Returns an error on a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let router = build_router(self.state);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use procgate_core::{ArgDef, DispatchResult, RoutineIdentity};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::RoutineEntry;
    use crate::executor::MemoryExecutor;

    fn text_arg(id: i32, name: &str, decl_type: &str) -> ArgDef {
        ArgDef {
            id,
            name: name.to_string(),
            decl_type: decl_type.to_string(),
            default: None,
            def_is_null: false,
        }
    }

    /// Echo handler that counts invocations and returns the named argument.
    fn echoing(arg_name: &'static str, calls: Arc<AtomicU32>) -> crate::executor::memory::RoutineHandler {
        Arc::new(move |arg| {
            calls.fetch_add(1, Ordering::SeqCst);
            DispatchResult::from_value(&arg.get(arg_name).cloned().unwrap_or(Value::Null))
                .unwrap_or_else(|err| DispatchResult::fail(err.to_string()))
        })
    }

    struct TestHarness {
        router: Router,
        echo_calls: Arc<AtomicU32>,
    }

    fn harness_with_origins(cors_origins: Vec<String>) -> TestHarness {
        let echo_calls = Arc::new(AtomicU32::new(0));

        let mut executor = MemoryExecutor::new("func_args");
        executor.register(
            RoutineIdentity::new("public", "echo"),
            vec![text_arg(1, "msg", "text")],
            echoing("msg", echo_calls.clone()),
        );
        executor.register(
            RoutineIdentity::new("public", "tag_list"),
            vec![text_arg(1, "tags", "text[]")],
            echoing("tags", Arc::new(AtomicU32::new(0))),
        );
        executor.register(
            RoutineIdentity::new("public", "fail"),
            vec![],
            Arc::new(|_| DispatchResult::fail("backing routine exploded")),
        );

        let config = GatewayConfig {
            prefix: "/rpc".to_string(),
            compact: true,
            cors_origins,
            routines: vec![
                RoutineEntry {
                    method: "echo".to_string(),
                    nsp: "public".to_string(),
                    proc: "echo".to_string(),
                },
                RoutineEntry {
                    method: "tag_list".to_string(),
                    nsp: "public".to_string(),
                    proc: "tag_list".to_string(),
                },
                RoutineEntry {
                    method: "fail".to_string(),
                    nsp: "public".to_string(),
                    proc: "fail".to_string(),
                },
            ],
            ..GatewayConfig::default()
        };

        let dispatcher = executor.spawn(config.intake_capacity);
        let router = build_router(AppState::new(config, dispatcher));
        TestHarness { router, echo_calls }
    }

    fn harness() -> TestHarness {
        harness_with_origins(vec!["*".to_string()])
    }

    async fn send(router: Router, request: HttpRequest<Body>) -> (StatusCode, String, axum::http::HeaderMap) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap(), headers)
    }

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // ----- simple adapter -----

    #[tokio::test]
    async fn get_echo_returns_success_envelope() {
        let h = harness();
        let (status, body, headers) = send(h.router, get("/rpc/echo?msg=hi")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"success":true,"result":"hi"}"#);
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/json; charset=UTF-8"
        );
        assert!(headers.contains_key("x-elapsed"));
        assert_eq!(h.echo_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_echo_missing_arg_reports_without_dispatch() {
        let h = harness();
        let (status, body, _) = send(h.router, get("/rpc/echo")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"success":false,"error":"Required parameter(s) [msg] not found"}"#
        );
        assert_eq!(h.echo_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn get_unknown_method_is_404() {
        let h = harness();
        let (status, _, _) = send(h.router, get("/rpc/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_json_suffix_is_stripped() {
        let h = harness();
        let (status, body, _) = send(h.router, get("/rpc/echo.json?msg=hi")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"success":true,"result":"hi"}"#);
    }

    #[tokio::test]
    async fn get_array_arg_encodes_literal() {
        let h = harness();
        let (status, body, _) = send(h.router, get("/rpc/tag_list?tags=a&tags=b")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"success":true,"result":"{a,b}"}"#);
    }

    #[tokio::test]
    async fn get_backing_failure_embeds_error_with_200() {
        let h = harness();
        let (status, body, _) = send(h.router, get("/rpc/fail")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"success":false,"error":"backing routine exploded"}"#
        );
    }

    #[tokio::test]
    async fn head_runs_the_pipeline() {
        let h = harness();
        let request = HttpRequest::builder()
            .method(Method::HEAD)
            .uri("/rpc/echo?msg=hi")
            .body(Body::empty())
            .unwrap();
        let (status, _, headers) = send(h.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key("x-elapsed"));
        assert_eq!(h.echo_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_calls_are_idempotent() {
        let h = harness();
        let (_, first, _) = send(h.router.clone(), get("/rpc/echo?msg=hi")).await;
        let (_, second, _) = send(h.router, get("/rpc/echo?msg=hi")).await;
        assert_eq!(first, second);
    }

    // ----- JSON-RPC adapter -----

    #[tokio::test]
    async fn rpc_echo_round_trip() {
        let h = harness();
        let (status, body, _) = send(
            h.router,
            post_json(
                "/rpc",
                r#"{"jsonrpc":"2.0","id":7,"method":"echo","params":{"msg":"hi"}}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"id":7,"jsonrpc":"2.0","result":"hi"}"#);
    }

    #[tokio::test]
    async fn rpc_unknown_method_is_32601_and_404() {
        let h = harness();
        let (status, body, _) = send(
            h.router,
            post_json("/rpc", r#"{"jsonrpc":"2.0","id":1,"method":"ghost","params":{}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["error"]["code"], json!(-32601));
        assert_eq!(parsed["id"], json!(1));
        assert_eq!(h.echo_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rpc_missing_params_is_32602_and_200() {
        let h = harness();
        let (status, body, _) = send(
            h.router,
            post_json("/rpc", r#"{"jsonrpc":"2.0","id":2,"method":"echo","params":{}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["error"]["code"], json!(-32602));
        assert_eq!(parsed["error"]["data"], json!(["msg"]));
        assert_eq!(h.echo_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rpc_backing_failure_is_32603_and_200() {
        let h = harness();
        let (status, body, _) = send(
            h.router,
            post_json("/rpc", r#"{"jsonrpc":"2.0","id":3,"method":"fail","params":{}}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["error"]["code"], json!(-32603));
        assert_eq!(parsed["error"]["data"], json!("backing routine exploded"));
    }

    #[tokio::test]
    async fn rpc_malformed_body_is_400() {
        let h = harness();
        let (status, _, _) = send(h.router, post_json("/rpc", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rpc_empty_body_is_400() {
        let h = harness();
        let (status, _, _) = send(h.router, post_json("/rpc", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // ----- PostgREST adapter -----

    #[tokio::test]
    async fn postgrest_echo_returns_raw_result() {
        let h = harness();
        let (status, body, _) =
            send(h.router, post_json("/rpc/echo", r#"{"msg":"hi"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#""hi""#);
    }

    #[tokio::test]
    async fn postgrest_empty_body_is_400() {
        let h = harness();
        let (status, body, _) = send(h.router, post_json("/rpc/echo", "")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            r#"{"message":"Cannot parse empty request payload, use '{}'"}"#
        );
    }

    #[tokio::test]
    async fn postgrest_unknown_method_is_404() {
        let h = harness();
        let (status, _, _) = send(h.router, post_json("/rpc/ghost", "{}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn postgrest_missing_params_is_400_with_code() {
        let h = harness();
        let (status, body, _) = send(h.router, post_json("/rpc/echo", "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["code"], json!("42883"));
        assert_eq!(parsed["message"], json!("Required parameter(s) not found"));
        assert_eq!(parsed["details"], json!("msg"));
    }

    #[tokio::test]
    async fn postgrest_array_body_passes_sequence() {
        let h = harness();
        let (status, body, _) = send(
            h.router,
            post_json("/rpc/tag_list", r#"{"tags":["a","b"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#""{a,b}""#);
    }

    #[tokio::test]
    async fn postgrest_backing_failure_is_400() {
        let h = harness();
        let (status, body, _) = send(h.router, post_json("/rpc/fail", "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["message"], json!("Method call error"));
    }

    // ----- routing, OPTIONS, CORS -----

    #[tokio::test]
    async fn options_is_204_anywhere() {
        let h = harness();
        let request = HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri("/rpc/echo")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(h.router.clone(), request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let request = HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri("/elsewhere")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(h.router, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn get_on_exact_prefix_is_404() {
        let h = harness();
        let (status, _, _) = send(h.router, get("/rpc")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_method_is_501() {
        let h = harness();
        let request = HttpRequest::builder()
            .method(Method::DELETE)
            .uri("/rpc/echo")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(h.router, request).await;
        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn cors_rejects_unknown_origin_before_dispatch() {
        let h = harness_with_origins(vec!["https://app.example".to_string()]);
        let request = HttpRequest::builder()
            .uri("/rpc/echo?msg=hi")
            .header("origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(h.router, request).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(h.echo_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cors_echoes_allowed_origin() {
        let h = harness_with_origins(vec!["https://app.example".to_string()]);
        let request = HttpRequest::builder()
            .uri("/rpc/echo?msg=hi")
            .header("origin", "https://app.example")
            .body(Body::empty())
            .unwrap();
        let (status, _, headers) = send(h.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "https://app.example"
        );
        assert_eq!(
            headers.get("access-control-allow-credentials").unwrap(),
            "true"
        );
        assert_eq!(
            headers.get("access-control-allow-methods").unwrap(),
            "GET, POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn no_origin_header_skips_the_gate() {
        let h = harness_with_origins(Vec::new());
        let (status, _, headers) = send(h.router, get("/rpc/echo?msg=hi")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("access-control-allow-origin"));
    }

    // ----- server lifecycle -----

    #[tokio::test]
    async fn start_binds_an_ephemeral_port() {
        let executor = MemoryExecutor::new("func_args");
        let config = GatewayConfig {
            host: "127.0.0.1".to_string(),
            ..GatewayConfig::default()
        };
        let dispatcher = executor.spawn(config.intake_capacity);
        let mut server = GatewayServer::new(config, dispatcher);
        let port = server.start().await.expect("start should succeed");
        assert!(port > 0);
    }
}

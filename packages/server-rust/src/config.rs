//! Gateway configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Path prefix all endpoints live under (e.g. `/rpc`).
    pub prefix: String,
    /// Allowed CORS origins. `"*"` allows any origin; an empty list rejects
    /// every cross-origin request.
    pub cors_origins: Vec<String>,
    /// Name of the reserved introspection routine that reports argument
    /// definitions. Dispatched with a null namespace.
    pub introspection_routine: String,
    /// Emit compact JSON bodies instead of pretty-printed ones on the plain
    /// GET endpoint.
    pub compact: bool,
    /// Maximum time to wait for a request to complete. This transport-level
    /// deadline is the only cancellation the dispatch layer has.
    pub request_timeout: Duration,
    /// Bounded capacity of the executor intake channel.
    pub intake_capacity: usize,
    /// Exposed routines: method name to backing identity, loaded once at
    /// startup and read-only thereafter.
    pub routines: Vec<RoutineEntry>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            prefix: "/rpc".to_string(),
            cors_origins: vec!["*".to_string()],
            introspection_routine: "func_args".to_string(),
            compact: false,
            request_timeout: Duration::from_secs(30),
            intake_capacity: 256,
            routines: Vec::new(),
        }
    }
}

/// One exposed routine: the public method name and its backing identity.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutineEntry {
    /// Method name callers use.
    pub method: String,
    /// Backing namespace (schema).
    pub nsp: String,
    /// Backing procedure name.
    pub proc: String,
}

/// Normalizes a path prefix: ensures a single leading slash and strips any
/// trailing slash, so `rpc/` and `/rpc` both become `/rpc`. A bare `/` (or
/// empty string) normalizes to `/`.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

//! Development gateway binary.
//!
//! Serves a handful of in-memory demo routines behind the full HTTP surface,
//! useful for exercising the three calling conventions without a backing
//! database. Routine method mappings can be overridden with `--routines`.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use procgate_core::{ArgDef, DispatchResult, RoutineIdentity};
use procgate_server::http::GatewayServer;
use procgate_server::{GatewayConfig, MemoryExecutor, RoutineEntry};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dev-server", about = "procgate development gateway")]
struct Args {
    /// Host interface to bind.
    #[arg(long, env = "PROCGATE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind. 0 picks an ephemeral port.
    #[arg(long, env = "PROCGATE_PORT", default_value_t = 8484)]
    port: u16,

    /// URL prefix all gateway routes are nested under.
    #[arg(long, env = "PROCGATE_PREFIX", default_value = "/rpc")]
    prefix: String,

    /// Allowed CORS origins. "*" allows any origin.
    #[arg(long = "cors-origin", env = "PROCGATE_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Emit compact JSON bodies instead of pretty-printed ones.
    #[arg(long, env = "PROCGATE_COMPACT")]
    compact: bool,

    /// Path to a JSON file with method → routine mappings, replacing the
    /// built-in demo registry.
    #[arg(long, env = "PROCGATE_ROUTINES")]
    routines: Option<PathBuf>,

    /// Address for the Prometheus scrape endpoint. Omit to disable metrics.
    #[arg(long, env = "PROCGATE_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procgate_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    let routines = match &args.routines {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading routines file {}", path.display()))?;
            serde_json::from_str::<Vec<RoutineEntry>>(&text)
                .with_context(|| format!("parsing routines file {}", path.display()))?
        }
        None => demo_registry(),
    };

    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        prefix: args.prefix,
        cors_origins: args.cors_origins,
        compact: args.compact,
        routines,
        ..GatewayConfig::default()
    };

    tracing::info!(
        prefix = %config.prefix,
        routines = config.routines.len(),
        compact = config.compact,
        "Configuration loaded"
    );

    let dispatcher = demo_executor(&config.introspection_routine).spawn(config.intake_capacity);

    let mut server = GatewayServer::new(config, dispatcher);
    let port = server.start().await?;
    tracing::info!(port, "gateway ready");

    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Method mappings for the built-in demo routines.
fn demo_registry() -> Vec<RoutineEntry> {
    vec![
        RoutineEntry {
            method: "echo".into(),
            nsp: "public".into(),
            proc: "echo".into(),
        },
        RoutineEntry {
            method: "add".into(),
            nsp: "public".into(),
            proc: "add".into(),
        },
        RoutineEntry {
            method: "tags".into(),
            nsp: "public".into(),
            proc: "tags".into(),
        },
    ]
}

/// Builds the in-memory executor with the demo routines registered.
fn demo_executor(introspection_routine: &str) -> MemoryExecutor {
    let mut executor = MemoryExecutor::new(introspection_routine);

    executor.register(
        RoutineIdentity::new("public", "echo"),
        vec![ArgDef {
            id: 1,
            name: "msg".into(),
            decl_type: "text".into(),
            default: None,
            def_is_null: false,
        }],
        Arc::new(|arg| match arg.get("msg") {
            Some(msg) => DispatchResult::from_value(msg)
                .unwrap_or_else(|err| DispatchResult::fail(err.to_string())),
            None => DispatchResult::fail("msg is required"),
        }),
    );

    executor.register(
        RoutineIdentity::new("public", "add"),
        vec![
            ArgDef {
                id: 1,
                name: "a".into(),
                decl_type: "integer".into(),
                default: None,
                def_is_null: false,
            },
            ArgDef {
                id: 2,
                name: "b".into(),
                decl_type: "integer".into(),
                default: Some("0".into()),
                def_is_null: false,
            },
        ],
        Arc::new(|arg| {
            let term = |name: &str, fallback: i64| {
                arg.get(name).map_or(Some(fallback), |v| match v {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.parse().ok(),
                    _ => None,
                })
            };
            match (term("a", 0), term("b", 0)) {
                (Some(a), Some(b)) => DispatchResult::from_value(&(a + b))
                    .unwrap_or_else(|err| DispatchResult::fail(err.to_string())),
                _ => DispatchResult::fail("a and b must be integers"),
            }
        }),
    );

    executor.register(
        RoutineIdentity::new("public", "tags"),
        vec![ArgDef {
            id: 1,
            name: "items".into(),
            decl_type: "text[]".into(),
            default: None,
            def_is_null: false,
        }],
        Arc::new(|arg| {
            // Echoes back the raw array literal so coercion is visible.
            let literal = arg.get("items").cloned().unwrap_or(Value::Null);
            DispatchResult::from_value(&json!({ "items": literal }))
                .unwrap_or_else(|err| DispatchResult::fail(err.to_string()))
        }),
    );

    executor
}

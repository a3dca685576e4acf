//! procgate server — HTTP gateway exposing stored routines over three
//! calling conventions (plain GET, JSON-RPC 2.0, PostgREST-style POST).
//!
//! Request flow: CORS gate → adapter (simple / rpc / postgrest) → registry
//! lookup → argument resolution (introspection dispatch) → coercion →
//! executor dispatch → response encoding. The executor itself is external;
//! this crate talks to it through a bounded intake channel of [`executor::Job`]
//! values, each carrying a single-use reply slot.

pub mod config;
pub mod dispatch;
pub mod executor;
pub mod http;
pub mod registry;
pub mod resolver;

pub use config::{GatewayConfig, RoutineEntry};
pub use dispatch::{DispatchError, Dispatcher};
pub use executor::{Job, MemoryExecutor};
pub use registry::RoutineRegistry;
pub use resolver::{ArgResolver, ResolveError};

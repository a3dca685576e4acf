//! Argument resolution via the reserved introspection routine.
//!
//! Introspection is a call like any other: an ordinary envelope targeting
//! the configured introspection routine (null namespace) travels through the
//! same dispatcher as regular calls. No caching — every request re-resolves,
//! which bounds staleness to zero at the cost of one round-trip per request.

use procgate_core::{ArgDef, CallEnvelope, RoutineIdentity};
use tracing::debug;

use crate::dispatch::{DispatchError, Dispatcher};

/// Errors from resolving a routine's argument definitions.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The dispatch protocol itself failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The executor reported a failure; the text is surfaced verbatim as the
    /// method-not-found cause.
    #[error("{0}")]
    Executor(String),
    /// The introspection reply was not a valid definition array.
    #[error("malformed argument definitions: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Resolves routine argument definitions through the dispatcher.
#[derive(Debug, Clone)]
pub struct ArgResolver {
    dispatcher: Dispatcher,
    introspection_routine: String,
}

impl ArgResolver {
    /// Creates a resolver dispatching against the given reserved routine.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, introspection_routine: impl Into<String>) -> Self {
        Self {
            dispatcher,
            introspection_routine: introspection_routine.into(),
        }
    }

    /// Fetches the ordered argument definitions for a routine.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when dispatch fails, the executor reports
    /// an error, or the reply cannot be decoded.
    pub async fn resolve(&self, identity: &RoutineIdentity) -> Result<Vec<ArgDef>, ResolveError> {
        let envelope = CallEnvelope::introspection(&self.introspection_routine, identity);
        let reply = self.dispatcher.submit(&envelope).await?;
        debug!(routine = %identity, success = reply.success, "got argument definitions");

        if !reply.success {
            return Err(ResolveError::Executor(
                reply.error.unwrap_or_else(|| "unknown executor error".to_string()),
            ));
        }
        let raw = reply
            .result
            .ok_or_else(|| ResolveError::Executor("empty introspection result".to_string()))?;
        Ok(serde_json::from_str(raw.get())?)
    }
}

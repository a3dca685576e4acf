//! The canonical call envelope and the executor's reply shape.
//!
//! `CallEnvelope` is the single wire contract handed to the executor: one
//! JSON object per invocation, for ordinary calls and introspection calls
//! alike. `DispatchResult` is what the executor deposits into the completion
//! slot — exactly one per submitted envelope, never partially filled.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::routine::RoutineIdentity;

// ---------------------------------------------------------------------------
// CallEnvelope
// ---------------------------------------------------------------------------

/// Canonical, protocol-agnostic representation of one routine invocation.
///
/// The target is nullable: introspection calls carry a null namespace and the
/// reserved introspection procedure as `proc`, with the routine being
/// inspected encoded in the argument map (`nsp`/`proc` keys). Ordinary calls
/// carry both target fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Target namespace, or `None` for introspection calls.
    pub nsp: Option<String>,
    /// Target procedure, or the reserved introspection routine name.
    pub proc: Option<String>,
    /// Coerced arguments, keyed by argument name.
    pub arg: Map<String, Value>,
}

impl CallEnvelope {
    /// Creates an empty envelope targeting the given routine.
    #[must_use]
    pub fn for_routine(identity: &RoutineIdentity) -> Self {
        Self {
            nsp: Some(identity.nsp.clone()),
            proc: Some(identity.proc.clone()),
            arg: Map::new(),
        }
    }

    /// Creates an introspection envelope: null namespace, the reserved
    /// introspection routine as target, and the inspected routine's identity
    /// as the argument map.
    #[must_use]
    pub fn introspection(introspection_routine: &str, identity: &RoutineIdentity) -> Self {
        let mut arg = Map::new();
        arg.insert("nsp".to_string(), Value::String(identity.nsp.clone()));
        arg.insert("proc".to_string(), Value::String(identity.proc.clone()));
        Self {
            nsp: None,
            proc: Some(introspection_routine.to_string()),
            arg,
        }
    }

    /// Serializes the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (argument values that cannot
    /// be represented as JSON).
    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// DispatchResult
// ---------------------------------------------------------------------------

/// Structured success/failure reply from the executor.
///
/// Invariant: success implies `result` is set and `error` absent, and vice
/// versa. The raw JSON payload is kept unparsed — this layer forwards it,
/// never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Whether the backing invocation succeeded.
    pub success: bool,
    /// Raw JSON result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Box<RawValue>>,
    /// Opaque error text on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    /// Successful result carrying pre-serialized JSON.
    #[must_use]
    pub fn ok(result: Box<RawValue>) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Successful result from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized to JSON.
    pub fn from_value<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        let raw = RawValue::from_string(serde_json::to_string(value)?)?;
        Ok(Self::ok(raw))
    }

    /// Failed result carrying opaque error text.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

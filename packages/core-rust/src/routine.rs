//! Routine identities and argument definitions.
//!
//! `ArgDef` mirrors the record shape returned by the backing store's
//! introspection routine, so its serde field names follow that wire format
//! (`arg`, `type`, `def`, `def_is_null`) rather than the Rust field names.

use serde::{Deserialize, Serialize};

/// Marker suffix on a declared type that flags an array-typed argument
/// (e.g. `text[]`, `int4[]`).
pub const ARRAY_TYPE_SUFFIX: &str = "[]";

// ---------------------------------------------------------------------------
// RoutineIdentity
// ---------------------------------------------------------------------------

/// Backing-routine identity: namespace plus procedure name.
///
/// Produced by a registry lookup and owned by the request's lifetime only.
/// Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutineIdentity {
    /// Namespace (schema) the procedure lives in.
    pub nsp: String,
    /// Procedure name within the namespace.
    pub proc: String,
}

impl RoutineIdentity {
    /// Creates an identity from namespace and procedure name.
    pub fn new(nsp: impl Into<String>, proc: impl Into<String>) -> Self {
        Self {
            nsp: nsp.into(),
            proc: proc.into(),
        }
    }
}

impl std::fmt::Display for RoutineIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.nsp, self.proc)
    }
}

// ---------------------------------------------------------------------------
// ArgDef
// ---------------------------------------------------------------------------

/// One argument definition of a stored routine, as reported by the
/// introspection routine.
///
/// Ordinals are unique within a routine's definition set, but coercion looks
/// arguments up by name; ordering carries no meaning beyond presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgDef {
    /// Ordinal position within the routine's signature.
    pub id: i32,
    /// Argument name, as supplied by callers.
    #[serde(rename = "arg")]
    pub name: String,
    /// Declared type. A trailing `[]` flags an array type.
    #[serde(rename = "type")]
    pub decl_type: String,
    /// Default value expression, if the routine declares one.
    #[serde(rename = "def")]
    pub default: Option<String>,
    /// True when the declared default is `NULL` (no `def` text is reported).
    pub def_is_null: bool,
}

impl ArgDef {
    /// Returns true when the declared type is an array type.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.decl_type.ends_with(ARRAY_TYPE_SUFFIX)
    }

    /// Returns true when the backing routine can fill this argument itself,
    /// i.e. it declares a default value or a null default.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.def_is_null || self.default.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

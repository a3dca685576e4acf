//! Type-directed argument coercion.
//!
//! Takes a routine's argument definitions and the caller-supplied values
//! (already normalized into [`Supplied`] at the protocol-adapter boundary)
//! and produces the canonical [`CallEnvelope`], or the list of required
//! argument names the caller omitted.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::envelope::CallEnvelope;
use crate::routine::{ArgDef, RoutineIdentity};

/// Separator between elements of an encoded array literal.
const ARRAY_SEPARATOR: char = ',';

/// Sentinel a caller passes as the sole element to mean "empty array".
const EMPTY_ARRAY_SENTINEL: &str = "{}";

// ---------------------------------------------------------------------------
// Supplied
// ---------------------------------------------------------------------------

/// A caller-supplied argument value, discriminated at the adapter boundary.
///
/// Query strings always yield `Sequence` per key (a key can repeat); a parsed
/// JSON body yields whichever shape the payload actually contains. Coercion
/// consumes this one closed type instead of inspecting open JSON values.
#[derive(Debug, Clone, PartialEq)]
pub enum Supplied {
    /// A single scalar value (string, number, or bool).
    Scalar(Value),
    /// An ordered sequence of values.
    Sequence(Vec<Value>),
}

impl Supplied {
    /// Normalizes a decoded JSON body value: arrays become `Sequence`,
    /// everything else is a `Scalar`.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Sequence(items),
            other => Self::Scalar(other),
        }
    }

    /// Builds the supplied map from decoded query-string pairs. Repeated
    /// keys accumulate into one `Sequence`, matching how multi-valued query
    /// parameters arrive on the wire.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> HashMap<String, Supplied>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut supplied: HashMap<String, Supplied> = HashMap::new();
        for (key, value) in pairs {
            let value = Value::String(value.into());
            match supplied.entry(key.into()).or_insert_with(|| {
                Supplied::Sequence(Vec::with_capacity(1))
            }) {
                Supplied::Sequence(items) => items.push(value),
                Supplied::Scalar(_) => unreachable!("query pairs only build sequences"),
            }
        }
        supplied
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Outcome of coercing supplied values against a routine's definitions.
#[derive(Debug)]
pub struct CoerceOutcome {
    /// The envelope to dispatch. Only meaningful when `missing` is empty.
    pub envelope: CallEnvelope,
    /// Names of required arguments the caller omitted, in declaration order.
    pub missing: Vec<String>,
}

impl CoerceOutcome {
    /// True when every required argument was present or defaulted and the
    /// envelope may be dispatched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Coerces caller-supplied values into a call envelope for `identity`.
///
/// Per argument definition, in declaration order:
/// - absent without a default → recorded in `missing`;
/// - absent with a default → skipped, the backing routine fills it in;
/// - array-typed with a `Sequence` → encoded as a `{a,b,...}` literal, except
///   for the single-element `"{}"` sentinel which passes through unchanged;
/// - array-typed with a `Scalar` → passed through unchanged (permissive
///   fallback for a single-element array expressed as a bare value);
/// - scalar-typed → the first sequence element, or the scalar verbatim.
///
/// A non-empty `missing` list means the envelope must not be dispatched.
#[must_use]
pub fn coerce(
    defs: &[ArgDef],
    supplied: &HashMap<String, Supplied>,
    identity: &RoutineIdentity,
) -> CoerceOutcome {
    let mut envelope = CallEnvelope::for_routine(identity);
    let mut missing = Vec::new();

    for def in defs {
        match supplied.get(&def.name) {
            None => {
                if def.has_default() {
                    debug!(arg = %def.name, "argument omitted, backing default applies");
                } else {
                    missing.push(def.name.clone());
                }
            }
            Some(value) if def.is_array() => {
                envelope
                    .arg
                    .insert(def.name.clone(), coerce_array(&def.name, value));
            }
            Some(Supplied::Sequence(items)) => {
                // Query strings deliver every key as a sequence; a scalar
                // argument takes the first value.
                if let Some(first) = items.first() {
                    envelope.arg.insert(def.name.clone(), first.clone());
                }
            }
            Some(Supplied::Scalar(value)) => {
                envelope.arg.insert(def.name.clone(), value.clone());
            }
        }
    }

    CoerceOutcome { envelope, missing }
}

/// Coerces a supplied value into an array-typed argument.
fn coerce_array(name: &str, value: &Supplied) -> Value {
    match value {
        // A bare scalar arrived where an array was expected. Pass it through
        // unchanged: callers express single-element arrays as bare values,
        // and the backing store parses the literal either way.
        Supplied::Scalar(scalar) => {
            debug!(arg = %name, "array argument supplied as scalar, passing through");
            scalar.clone()
        }
        // Single-element sentinel: the caller already wrote the empty-array
        // literal, do not re-wrap it into `{{}}`.
        Supplied::Sequence(items)
            if items.len() == 1 && items[0].as_str() == Some(EMPTY_ARRAY_SENTINEL) =>
        {
            Value::String(EMPTY_ARRAY_SENTINEL.to_string())
        }
        Supplied::Sequence(items) => Value::String(encode_array_literal(items)),
    }
}

/// Encodes a sequence as a single `{a,b,...}` array-literal string.
///
/// Elements containing the separator, braces, quotes, or backslashes are
/// double-quoted with backslash escapes (array-literal quoting), so a value
/// carrying a comma survives the trip instead of splitting the literal.
/// Elements free of special characters are joined bare.
fn encode_array_literal(items: &[Value]) -> String {
    let encoded: Vec<String> = items
        .iter()
        .map(|item| quote_element(&element_text(item)))
        .collect();
    format!("{{{}}}", encoded.join(","))
}

/// Textual form of one array element. Strings are used as-is; other scalars
/// use their JSON rendering.
fn element_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Quotes an element when it is empty or contains whitespace or characters
/// that would corrupt the array literal; returns it bare otherwise.
fn quote_element(text: &str) -> String {
    let needs_quoting = text.is_empty()
        || text.contains(ARRAY_SEPARATOR)
        || text.contains('{')
        || text.contains('}')
        || text.contains('"')
        || text.contains('\\')
        || text.contains(char::is_whitespace);
    if needs_quoting {
        let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

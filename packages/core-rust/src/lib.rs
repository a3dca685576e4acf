//! procgate core — routine metadata, call envelopes, and argument coercion.
//!
//! Everything in this crate is protocol-agnostic: the HTTP adapters and the
//! executor transport live in `procgate-server`. This crate defines the one
//! shared data model both sides agree on (routine identities, argument
//! definitions, the canonical call envelope, the executor reply) and the
//! type-directed coercion algorithm that turns caller-supplied values into
//! envelope arguments.

pub mod coerce;
pub mod envelope;
pub mod routine;

pub use coerce::{coerce, CoerceOutcome, Supplied};
pub use envelope::{CallEnvelope, DispatchResult};
pub use routine::{ArgDef, RoutineIdentity, ARRAY_TYPE_SUFFIX};

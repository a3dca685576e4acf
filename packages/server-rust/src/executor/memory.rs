//! In-memory executor backed by a registered routine table.
//!
//! Suitable for development and tests: routines are plain closures over the
//! coerced argument map, and the introspection routine is answered from the
//! same table. Production deployments plug a real worker pool into the same
//! intake channel; this layer cannot tell the difference.

use std::collections::HashMap;
use std::sync::Arc;

use procgate_core::{ArgDef, CallEnvelope, DispatchResult, RoutineIdentity};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::Job;
use crate::dispatch::Dispatcher;

/// Handler invoked for one registered routine. Receives the envelope's
/// argument map and returns the structured result.
pub type RoutineHandler = Arc<dyn Fn(&Map<String, Value>) -> DispatchResult + Send + Sync>;

struct RegisteredRoutine {
    defs: Vec<ArgDef>,
    handler: RoutineHandler,
}

/// In-memory executor: a routine table drained by a spawned task.
///
/// Registration happens before [`MemoryExecutor::spawn`]; the table is then
/// owned exclusively by the drain loop, so no locking is needed.
pub struct MemoryExecutor {
    introspection_routine: String,
    routines: HashMap<RoutineIdentity, RegisteredRoutine>,
}

impl MemoryExecutor {
    /// Creates an empty executor answering introspection calls for the given
    /// reserved routine name.
    #[must_use]
    pub fn new(introspection_routine: impl Into<String>) -> Self {
        Self {
            introspection_routine: introspection_routine.into(),
            routines: HashMap::new(),
        }
    }

    /// Registers a routine with its argument definitions and handler.
    pub fn register(
        &mut self,
        identity: RoutineIdentity,
        defs: Vec<ArgDef>,
        handler: RoutineHandler,
    ) {
        self.routines
            .insert(identity, RegisteredRoutine { defs, handler });
    }

    /// Spawns the drain loop on a bounded intake channel and returns the
    /// dispatcher connected to it. The loop ends when every dispatcher clone
    /// is dropped.
    #[must_use]
    pub fn spawn(self, intake_capacity: usize) -> Dispatcher {
        let (tx, mut rx) = mpsc::channel::<Job>(intake_capacity);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let result = self.execute(&job.payload);
                // A dropped reply slot means the caller went away mid-call.
                let _ = job.reply.send(result);
            }
            debug!("memory executor intake closed, drain loop ending");
        });
        Dispatcher::new(tx)
    }

    /// Executes one serialized envelope against the routine table.
    fn execute(&self, payload: &str) -> DispatchResult {
        let envelope: CallEnvelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "unparsable envelope payload");
                return DispatchResult::fail(format!("unparsable envelope: {err}"));
            }
        };

        if envelope.nsp.is_none()
            && envelope.proc.as_deref() == Some(self.introspection_routine.as_str())
        {
            return self.introspect(&envelope.arg);
        }

        let (Some(nsp), Some(proc)) = (&envelope.nsp, &envelope.proc) else {
            return DispatchResult::fail("envelope has no target routine");
        };
        let identity = RoutineIdentity::new(nsp.clone(), proc.clone());
        match self.routines.get(&identity) {
            Some(routine) => {
                debug!(routine = %identity, "invoking routine");
                (routine.handler)(&envelope.arg)
            }
            None => DispatchResult::fail(format!("no routine {identity}")),
        }
    }

    /// Answers an introspection call: the argument map names the routine
    /// whose definitions are requested.
    fn introspect(&self, arg: &Map<String, Value>) -> DispatchResult {
        let (Some(nsp), Some(proc)) = (
            arg.get("nsp").and_then(Value::as_str),
            arg.get("proc").and_then(Value::as_str),
        ) else {
            return DispatchResult::fail("introspection call missing nsp/proc arguments");
        };

        let identity = RoutineIdentity::new(nsp, proc);
        match self.routines.get(&identity) {
            Some(routine) => DispatchResult::from_value(&routine.defs)
                .unwrap_or_else(|err| DispatchResult::fail(err.to_string())),
            None => DispatchResult::fail(format!("no routine {identity}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn echo_defs() -> Vec<ArgDef> {
        vec![ArgDef {
            id: 1,
            name: "msg".to_string(),
            decl_type: "text".to_string(),
            default: None,
            def_is_null: false,
        }]
    }

    fn echo_executor() -> MemoryExecutor {
        let mut executor = MemoryExecutor::new("func_args");
        executor.register(
            RoutineIdentity::new("public", "echo"),
            echo_defs(),
            Arc::new(|arg| {
                DispatchResult::from_value(&arg.get("msg").cloned().unwrap_or(Value::Null))
                    .unwrap_or_else(|err| DispatchResult::fail(err.to_string()))
            }),
        );
        executor
    }

    #[test]
    fn executes_registered_routine() {
        let executor = echo_executor();
        let result =
            executor.execute(r#"{"nsp":"public","proc":"echo","arg":{"msg":"hi"}}"#);
        assert!(result.success);
        assert_eq!(result.result.unwrap().get(), r#""hi""#);
    }

    #[test]
    fn unknown_routine_fails() {
        let executor = echo_executor();
        let result = executor.execute(r#"{"nsp":"public","proc":"nope","arg":{}}"#);
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "no routine public.nope");
    }

    #[test]
    fn answers_introspection_from_table() {
        let executor = echo_executor();
        let result = executor
            .execute(r#"{"nsp":null,"proc":"func_args","arg":{"nsp":"public","proc":"echo"}}"#);
        assert!(result.success);

        let defs: Vec<ArgDef> =
            serde_json::from_str(result.result.unwrap().get()).unwrap();
        assert_eq!(defs, echo_defs());
    }

    #[test]
    fn introspection_of_unknown_routine_fails() {
        let executor = echo_executor();
        let result = executor
            .execute(r#"{"nsp":null,"proc":"func_args","arg":{"nsp":"public","proc":"nope"}}"#);
        assert!(!result.success);
    }

    #[test]
    fn unparsable_payload_fails() {
        let executor = echo_executor();
        let result = executor.execute("not json");
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("unparsable envelope"));
    }

    #[tokio::test]
    async fn spawned_loop_serves_dispatcher() {
        let dispatcher = echo_executor().spawn(16);

        let mut envelope =
            CallEnvelope::for_routine(&RoutineIdentity::new("public", "echo"));
        envelope.arg.insert("msg".to_string(), json!("hello"));

        let result = dispatcher.submit(&envelope).await.unwrap();
        assert!(result.success);
        assert_eq!(result.result.unwrap().get(), r#""hello""#);
    }
}

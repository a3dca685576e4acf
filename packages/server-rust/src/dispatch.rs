//! Blocking call/response dispatch against the executor intake.
//!
//! Each `submit` serializes the envelope, creates a single-use oneshot
//! completion slot, enqueues a [`Job`] on the bounded intake channel, and
//! suspends until the executor deposits exactly one result. Any number of
//! requests may submit concurrently; every call owns its slot, so replies
//! are never misdelivered across requests. There is no timeout at this
//! layer — the transport's request deadline is the only cancellation.

use metrics::counter;
use procgate_core::{CallEnvelope, DispatchResult};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::executor::Job;

/// Errors from the dispatch protocol itself (never from the backing
/// routine — those travel inside [`DispatchResult`]).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The envelope could not be serialized to its wire form.
    #[error("envelope serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
    /// The executor's intake channel is closed.
    #[error("executor intake closed")]
    IntakeClosed,
    /// The executor dropped the completion slot without replying.
    #[error("executor dropped the reply slot")]
    ReplyDropped,
}

/// Handle to the executor intake. Cheap to clone; every clone feeds the same
/// bounded channel, which is the only backpressure this layer has.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    intake: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Wraps an executor intake sender.
    #[must_use]
    pub fn new(intake: mpsc::Sender<Job>) -> Self {
        Self { intake }
    }

    /// Submits an envelope and waits for its single reply.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] when the envelope cannot be serialized or
    /// the executor went away. A saturated intake blocks instead of erroring.
    pub async fn submit(&self, envelope: &CallEnvelope) -> Result<DispatchResult, DispatchError> {
        let payload = envelope.to_wire()?;
        debug!(%payload, "submitting envelope");

        let (reply, slot) = oneshot::channel();
        self.intake
            .send(Job { payload, reply })
            .await
            .map_err(|_| DispatchError::IntakeClosed)?;

        let result = slot.await.map_err(|_| DispatchError::ReplyDropped)?;
        counter!(
            "procgate_dispatch_total",
            "outcome" => if result.success { "success" } else { "failure" }
        )
        .increment(1);
        Ok(result)
    }
}

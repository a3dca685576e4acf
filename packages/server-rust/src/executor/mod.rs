//! Executor boundary: the job contract and the in-memory executor.
//!
//! The executor is external to this layer. Its consumed contract is a
//! bounded mpsc intake of [`Job`] values; each job carries the serialized
//! call envelope and a single-use oneshot reply slot into which the executor
//! deposits exactly one [`DispatchResult`](procgate_core::DispatchResult).
//! [`MemoryExecutor`] is the in-process implementation used by tests and the
//! dev binary.

pub mod memory;

pub use memory::MemoryExecutor;

use procgate_core::DispatchResult;
use tokio::sync::oneshot;

/// One unit of work handed to the executor's intake.
#[derive(Debug)]
pub struct Job {
    /// Serialized call envelope (JSON wire form).
    pub payload: String,
    /// Single-use completion slot. The executor deposits exactly one result;
    /// the slot is never reused.
    pub reply: oneshot::Sender<DispatchResult>,
}

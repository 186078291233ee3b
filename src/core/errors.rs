/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{ObjectId, OpKind, TaskId};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export BackendError from backend module
pub use crate::backend::BackendError;

// Re-export GuardError from guard module
pub use super::guard::GuardError;

/// Connector error with serialization support
///
/// `Clone` because an object that failed initialization keeps its error
/// and hands a copy to every later caller.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum VolError {
    #[error("Serialization gate unavailable: {0}")]
    #[diagnostic(
        code(vol::gate_unavailable),
        help("The library thread-safety token could not be obtained. No library call was made.")
    )]
    GateUnavailable(String),

    #[error("{op} failed: {source}")]
    #[diagnostic(
        code(vol::backend),
        help("The underlying library rejected the call. Inspect the backend error for details.")
    )]
    Backend {
        op: OpKind,
        #[source]
        source: BackendError,
    },

    #[error("Object {0} failed to initialize")]
    #[diagnostic(
        code(vol::init_failed),
        help("The create/open that produced this object failed. The object is a tombstone.")
    )]
    InitFailed(ObjectId),

    #[error("Object {0} is not ready")]
    #[diagnostic(code(vol::not_ready))]
    NotReady(ObjectId),

    #[error("Object {0} is closed")]
    #[diagnostic(
        code(vol::object_closed),
        help("The object was closed and can no longer be used.")
    )]
    ObjectClosed(ObjectId),

    #[error("Object {0} already has a close in flight")]
    #[diagnostic(
        code(vol::close_in_progress),
        help("Wait for the pending close to complete before retrying.")
    )]
    CloseInProgress(ObjectId),

    #[error("Object {0} is still open")]
    #[diagnostic(
        code(vol::still_open),
        help("Close the object instead of releasing the reference directly.")
    )]
    StillOpen(ObjectId),

    #[error("Reference count underflow on object {0}")]
    #[diagnostic(
        code(vol::refcount_underflow),
        help("A reference was dropped more times than it was taken. This is a bug.")
    )]
    RefcountUnderflow(ObjectId),

    #[error("Task {0} was already freed")]
    #[diagnostic(
        code(vol::task_already_freed),
        help("A task handle may be freed exactly once, either by its caller or its handler.")
    )]
    TaskAlreadyFreed(TaskId),

    #[error("Scheduler is shut down")]
    #[diagnostic(
        code(vol::scheduler_shutdown),
        help("The connector has been shut down. Build a new one to submit work.")
    )]
    SchedulerShutdown,

    #[error("Timed out after {elapsed_ms}ms waiting for {what}")]
    #[diagnostic(code(vol::timeout))]
    Timeout { what: String, elapsed_ms: u64 },

    #[error("Handler for {0} panicked")]
    #[diagnostic(
        code(vol::handler_panicked),
        help("A deferred handler panicked. Its object may be left in Init.")
    )]
    HandlerPanicked(TaskId),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(vol::config), help("Check VOL_ASYNC_* environment variables."))]
    Config(String),
}

impl VolError {
    #[inline]
    pub fn backend(op: OpKind, source: BackendError) -> Self {
        VolError::Backend { op, source }
    }

    /// Whether the error came from the underlying library
    #[inline]
    pub fn is_backend(&self) -> bool {
        matches!(self, VolError::Backend { .. })
    }
}

/// Common result type for connector operations
pub type VolResult<T> = Result<T, VolError>;

/*!
 * Task Handles
 *
 * The token the scheduler hands back for one deferred operation. A task
 * handle is freed exactly once: by the synchronous caller after it has
 * observed its result, or by the handler itself for detached tasks.
 */

use crate::core::errors::{VolError, VolResult};
use crate::core::types::{OpKind, TaskId};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Execution state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Done,
}

/// Who released a task handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreedBy {
    Caller,
    Handler,
}

/// Accounting for task handles across a connector
#[derive(Debug, Default)]
pub struct TaskLedger {
    created: AtomicU64,
    freed_by_caller: AtomicU64,
    freed_by_handler: AtomicU64,
}

impl TaskLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn freed_by_caller(&self) -> u64 {
        self.freed_by_caller.load(Ordering::Relaxed)
    }

    pub fn freed_by_handler(&self) -> u64 {
        self.freed_by_handler.load(Ordering::Relaxed)
    }

    /// Handles created and not yet freed
    pub fn outstanding(&self) -> u64 {
        self.created()
            .saturating_sub(self.freed_by_caller() + self.freed_by_handler())
    }
}

/// Execution state shared between a handle and its observers
struct Progress {
    state: Mutex<TaskState>,
    finished: Condvar,
}

impl Progress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskState::Queued),
            finished: Condvar::new(),
        })
    }

    fn get(&self) -> TaskState {
        *self.state.lock()
    }

    fn set(&self, to: TaskState) {
        *self.state.lock() = to;
        if to == TaskState::Done {
            self.finished.notify_all();
        }
    }

    fn wait(&self) {
        let mut state = self.state.lock();
        while *state != TaskState::Done {
            self.finished.wait(&mut state);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if *state == TaskState::Done {
            return true;
        }
        let _ = self
            .finished
            .wait_while_for(&mut state, |s| *s != TaskState::Done, timeout);
        *state == TaskState::Done
    }
}

struct TaskInner {
    id: TaskId,
    kind: OpKind,
    progress: Arc<Progress>,
    freed: Mutex<Option<FreedBy>>,
    ledger: Arc<TaskLedger>,
}

/// Handle to a submitted task
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskInner>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, kind: OpKind, ledger: Arc<TaskLedger>) -> Self {
        ledger.created.fetch_add(1, Ordering::Relaxed);
        Self {
            inner: Arc::new(TaskInner {
                id,
                kind,
                progress: Progress::new(),
                freed: Mutex::new(None),
                ledger,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    #[inline]
    pub fn kind(&self) -> OpKind {
        self.inner.kind
    }

    pub fn state(&self) -> TaskState {
        self.inner.progress.get()
    }

    pub(crate) fn mark_running(&self) {
        self.inner.progress.set(TaskState::Running);
    }

    pub(crate) fn mark_done(&self) {
        self.inner.progress.set(TaskState::Done);
    }

    /// Block until the task's job has returned
    pub fn wait(&self) {
        self.inner.progress.wait();
    }

    /// Block until the job returns or `timeout` expires; true if it returned
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.progress.wait_timeout(timeout)
    }

    /// Read-only view of this task's progress
    ///
    /// Holds no reference to the handle itself, so it stays valid after
    /// the handle is freed.
    pub fn observer(&self) -> TaskObserver {
        TaskObserver {
            id: self.inner.id,
            kind: self.inner.kind,
            progress: Arc::clone(&self.inner.progress),
        }
    }

    /// Who freed this handle, if anyone has
    pub fn freed_by(&self) -> Option<FreedBy> {
        *self.inner.freed.lock()
    }

    pub fn is_freed(&self) -> bool {
        self.freed_by().is_some()
    }

    /// Release the handle
    ///
    /// # Errors
    ///
    /// `TaskAlreadyFreed` on a second free; the first free stands.
    pub(crate) fn free(&self, by: FreedBy) -> VolResult<()> {
        let mut freed = self.inner.freed.lock();
        if freed.is_some() {
            return Err(VolError::TaskAlreadyFreed(self.inner.id));
        }
        *freed = Some(by);

        let counter = match by {
            FreedBy::Caller => &self.inner.ledger.freed_by_caller,
            FreedBy::Handler => &self.inner.ledger.freed_by_handler,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        trace!(task = %self.inner.id, freed_by = ?by, "task handle freed");
        Ok(())
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .field("freed_by", &self.freed_by())
            .finish()
    }
}

/// What a detached caller keeps of its task
///
/// Reports progress only; freeing is left to the handler.
#[derive(Clone)]
pub struct TaskObserver {
    id: TaskId,
    kind: OpKind,
    progress: Arc<Progress>,
}

impl TaskObserver {
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn state(&self) -> TaskState {
        self.progress.get()
    }

    pub fn is_done(&self) -> bool {
        self.state() == TaskState::Done
    }

    pub fn wait(&self) {
        self.progress.wait();
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.progress.wait_timeout(timeout)
    }
}

impl fmt::Debug for TaskObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskObserver")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

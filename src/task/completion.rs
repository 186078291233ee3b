/*!
 * Completion Channel
 *
 * How a handler hands its outcome back. The strategy is chosen once at
 * submission:
 *
 * - **Wait**: the handler writes a `ResultSlot`; the caller's `Waiter`
 *   reads it and frees the task handle
 * - **Detach**: there is no slot; the handler frees the task handle and
 *   the caller watches the object's status
 */

use super::handle::{FreedBy, TaskHandle, TaskObserver, TaskState};
use crate::core::errors::{VolError, VolResult};
use crate::core::types::TaskId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Completion strategy requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    /// Caller blocks on a result slot
    #[default]
    Wait,
    /// Caller observes object status
    Detach,
}

/// Single-assignment result cell shared by a handler and its waiter
pub struct ResultSlot<T> {
    cell: Arc<Mutex<Option<VolResult<T>>>>,
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Mutex::new(None)),
        }
    }

    /// Store the outcome; false if the slot was already filled
    pub fn fill(&self, result: VolResult<T>) -> bool {
        let mut cell = self.cell.lock();
        if cell.is_some() {
            return false;
        }
        *cell = Some(result);
        true
    }

    pub fn is_filled(&self) -> bool {
        self.cell.lock().is_some()
    }

    fn take(&self) -> Option<VolResult<T>> {
        self.cell.lock().take()
    }
}

impl<T> Clone for ResultSlot<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a handler sends its outcome
pub enum Delivery<T> {
    /// Write the slot; the caller frees the task
    Slot(ResultSlot<T>),
    /// Discard the outcome and free the task
    FreeTask(TaskHandle),
}

impl<T> Delivery<T> {
    /// Hand the outcome over according to the strategy
    pub(crate) fn deliver(self, result: VolResult<T>) {
        match self {
            Delivery::Slot(slot) => {
                if !slot.fill(result) {
                    warn!("result slot filled twice");
                }
            }
            Delivery::FreeTask(task) => {
                if let Err(e) = &result {
                    debug!(task = %task.id(), error = %e, "detached task failed");
                }
                if let Err(e) = task.free(FreedBy::Handler) {
                    warn!(task = %task.id(), error = %e, "handler could not free task");
                }
            }
        }
    }
}

/// Caller side of a synchronous completion
///
/// Frees its task handle exactly once: when the result is read, or on
/// drop if it never was.
pub struct Waiter<T> {
    slot: ResultSlot<T>,
    task: Option<TaskHandle>,
}

impl<T> Waiter<T> {
    pub(crate) fn new(slot: ResultSlot<T>, task: TaskHandle) -> Self {
        Self {
            slot,
            task: Some(task),
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        self.task.as_ref().map(TaskHandle::id)
    }

    /// Whether the handler has finished
    pub fn is_ready(&self) -> bool {
        self.task
            .as_ref()
            .map_or(true, |task| task.state() == TaskState::Done)
    }

    /// Block until the handler has returned and read its outcome
    pub fn wait(mut self) -> VolResult<T> {
        match self.task.take() {
            Some(task) => {
                task.wait();
                self.collect(task)
            }
            None => Err(VolError::SchedulerShutdown),
        }
    }

    /// Like `wait`, giving the waiter back if `timeout` expires first
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<VolResult<T>, Self> {
        let finished = self
            .task
            .as_ref()
            .map_or(true, |task| task.wait_timeout(timeout));
        if !finished {
            return Err(self);
        }
        match self.task.take() {
            Some(task) => Ok(self.collect(task)),
            None => Ok(Err(VolError::SchedulerShutdown)),
        }
    }

    fn collect(&self, task: TaskHandle) -> VolResult<T> {
        // An empty slot after the job returned means the handler unwound
        let result = self
            .slot
            .take()
            .unwrap_or(Err(VolError::HandlerPanicked(task.id())));
        if let Err(e) = task.free(FreedBy::Caller) {
            warn!(task = %task.id(), error = %e, "caller could not free task");
        }
        result
    }
}

impl<T> Drop for Waiter<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.free(FreedBy::Caller) {
                warn!(task = %task.id(), error = %e, "abandoned waiter could not free task");
            }
        }
    }
}

/// What an entry point returns besides the object handle
pub enum Completion<T> {
    Wait(Waiter<T>),
    /// The handler frees the task; the caller only watches its progress
    Detached(TaskObserver),
}

impl<T> Completion<T> {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Completion::Wait(waiter) => waiter.task_id(),
            Completion::Detached(task) => Some(task.id()),
        }
    }

    /// Whether the handler has returned
    pub fn is_ready(&self) -> bool {
        match self {
            Completion::Wait(waiter) => waiter.is_ready(),
            Completion::Detached(task) => task.is_done(),
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Completion::Detached(_))
    }

    pub fn into_waiter(self) -> Option<Waiter<T>> {
        match self {
            Completion::Wait(waiter) => Some(waiter),
            Completion::Detached(_) => None,
        }
    }

    /// Block until the handler returns
    ///
    /// Yields the outcome for `Wait`; `None` for `Detached`, whose outcome
    /// is only visible through object status.
    pub fn join(self) -> Option<VolResult<T>> {
        match self {
            Completion::Wait(waiter) => Some(waiter.wait()),
            Completion::Detached(task) => {
                task.wait();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OpKind;
    use crate::task::TaskLedger;
    use std::thread;

    #[test]
    fn test_slot_fills_once() {
        let slot: ResultSlot<u32> = ResultSlot::new();
        assert!(slot.fill(Ok(1)));
        assert!(!slot.fill(Ok(2)));
        assert_eq!(slot.take(), Some(Ok(1)));
    }

    #[test]
    fn test_waiter_frees_as_caller() {
        let ledger = TaskLedger::new();
        let task = TaskHandle::new(TaskId(1), OpKind::Get, ledger.clone());
        let slot = ResultSlot::new();
        let delivery = Delivery::Slot(slot.clone());
        let waiter = Waiter::new(slot, task.clone());

        let worker = thread::spawn(move || {
            task.mark_running();
            delivery.deliver(Ok(42u32));
            task.mark_done();
        });

        assert_eq!(waiter.wait(), Ok(42));
        worker.join().unwrap();
        assert_eq!(ledger.freed_by_caller(), 1);
        assert_eq!(ledger.freed_by_handler(), 0);
    }

    #[test]
    fn test_detached_delivery_frees_as_handler() {
        let ledger = TaskLedger::new();
        let task = TaskHandle::new(TaskId(2), OpKind::Close, ledger.clone());
        Delivery::<()>::FreeTask(task.clone()).deliver(Ok(()));

        assert_eq!(task.freed_by(), Some(FreedBy::Handler));
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn test_detached_completion_observes_only() {
        let ledger = TaskLedger::new();
        let task = TaskHandle::new(TaskId(5), OpKind::Specific, ledger.clone());
        let completion: Completion<()> = Completion::Detached(task.observer());
        assert!(!completion.is_ready());

        Delivery::<()>::FreeTask(task.clone()).deliver(Ok(()));
        task.mark_done();
        drop(task);

        assert!(completion.is_ready());
        assert_eq!(completion.task_id(), Some(TaskId(5)));
        assert_eq!(completion.join(), None);
        assert_eq!(ledger.freed_by_handler(), 1);
    }

    #[test]
    fn test_empty_slot_reports_panic() {
        let task = TaskHandle::new(TaskId(3), OpKind::Get, TaskLedger::new());
        let waiter: Waiter<()> = Waiter::new(ResultSlot::new(), task.clone());
        task.mark_done();

        assert_eq!(waiter.wait(), Err(VolError::HandlerPanicked(TaskId(3))));
        assert_eq!(task.freed_by(), Some(FreedBy::Caller));
    }

    #[test]
    fn test_wait_timeout_returns_waiter() {
        let ledger = TaskLedger::new();
        let task = TaskHandle::new(TaskId(4), OpKind::Get, ledger.clone());
        let waiter: Waiter<()> = Waiter::new(ResultSlot::new(), task);

        assert!(!waiter.is_ready());
        let waiter = match waiter.wait_timeout(Duration::from_millis(5)) {
            Err(waiter) => waiter,
            Ok(_) => panic!("task never ran"),
        };
        drop(waiter);
        assert_eq!(ledger.freed_by_caller(), 1);
    }
}

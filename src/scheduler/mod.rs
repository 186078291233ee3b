/*!
 * Scheduler Module
 *
 * Where deferred handlers run.
 *
 * # Implementors
 *
 * - `ThreadPoolScheduler` (default): N named OS threads on one FIFO queue
 * - `TokioScheduler`: the blocking pool of an existing tokio runtime
 * - `InlineScheduler`: the submitting thread itself
 */

mod inline;
mod pool;
mod runtime;
mod traits;

pub use inline::InlineScheduler;
pub use pool::ThreadPoolScheduler;
pub use runtime::TokioScheduler;
pub use traits::{Job, TaskScheduler};

use crate::task::TaskHandle;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Run one job, keeping the task state accurate even if it panics
pub(crate) fn run_job(task: &TaskHandle, job: Job) {
    task.mark_running();
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!(task = %task.id(), op = %task.kind(), "handler panicked");
    }
    task.mark_done();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::VolError;
    use crate::core::types::{OpKind, TaskId};
    use crate::task::{TaskLedger, TaskState};

    #[test]
    fn test_inline_runs_immediately() {
        let scheduler = InlineScheduler::new();
        let task = TaskHandle::new(TaskId(1), OpKind::Specific, TaskLedger::new());
        let (tx, rx) = flume::bounded(1);

        scheduler
            .submit(task.clone(), Box::new(move || tx.send(7).unwrap()))
            .unwrap();
        assert_eq!(rx.try_recv(), Ok(7));
        assert_eq!(task.state(), TaskState::Done);

        scheduler.shutdown();
        assert_eq!(
            scheduler.submit(task, Box::new(|| {})),
            Err(VolError::SchedulerShutdown)
        );
    }

    #[test]
    fn test_run_job_survives_panic() {
        let task = TaskHandle::new(TaskId(2), OpKind::Get, TaskLedger::new());
        run_job(&task, Box::new(|| panic!("handler bug")));
        assert_eq!(task.state(), TaskState::Done);
    }
}

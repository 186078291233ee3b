/*!
 * Inline Scheduler
 * Runs each job on the submitting thread; for tests and single-threaded use
 */

use super::traits::{Job, TaskScheduler};
use super::run_job;
use crate::core::errors::{VolError, VolResult};
use crate::task::TaskHandle;
use std::sync::atomic::{AtomicBool, Ordering};

/// Executes synchronously in the caller
///
/// Blocks the submitter for the whole job, so an `Init` object can never
/// be observed by the caller in detached mode.
#[derive(Debug, Default)]
pub struct InlineScheduler {
    closed: AtomicBool,
}

impl InlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskScheduler for InlineScheduler {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn submit(&self, task: TaskHandle, job: Job) -> VolResult<()> {
        if self.is_shutdown() {
            return Err(VolError::SchedulerShutdown);
        }
        run_job(&task, job);
        Ok(())
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

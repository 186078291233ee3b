/*!
 * Tokio Scheduler
 * Runs jobs on a runtime's blocking pool
 *
 * A runtime that has shut down discards new blocking work without running
 * it. Each job therefore travels inside a `Handoff` that notices being
 * dropped unrun:
 *
 * - dropped while `submit` is still on the stack: the runtime is gone, so
 *   `submit` refuses with `SchedulerShutdown` and the caller undoes the task
 * - dropped after `submit` returned: the job was accepted, so it runs on
 *   the dropping thread like any other drained job
 */

use super::traits::{Job, TaskScheduler};
use super::run_job;
use crate::core::errors::{VolError, VolResult};
use crate::task::TaskHandle;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

/// Where a job stands between `submit` and a blocking-pool thread
enum Stage {
    Submitting,
    Accepted,
    /// Discarded by the runtime before `submit` returned
    Refused,
}

struct Handoff {
    task: TaskHandle,
    job: Option<Job>,
    stage: Arc<Mutex<Stage>>,
}

impl Handoff {
    fn run(mut self) {
        if let Some(job) = self.job.take() {
            run_job(&self.task, job);
        }
    }
}

impl Drop for Handoff {
    fn drop(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };
        let mut stage = self.stage.lock();
        match *stage {
            Stage::Submitting => *stage = Stage::Refused,
            Stage::Accepted | Stage::Refused => {
                drop(stage);
                warn!(task = %self.task.id(), "runtime discarded an accepted job; running it here");
                run_job(&self.task, job);
            }
        }
    }
}

/// Defers jobs with `spawn_blocking`
///
/// Handlers block on the gate and on object settlement, so they never run
/// on the async worker threads.
pub struct TokioScheduler {
    handle: Handle,
    closed: AtomicBool,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            closed: AtomicBool::new(false),
        }
    }

    /// Bind to the runtime the caller is running in
    ///
    /// # Errors
    ///
    /// `Config` when called outside a tokio runtime.
    pub fn current() -> VolResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| VolError::Config(format!("no tokio runtime: {}", e)))
    }
}

impl TaskScheduler for TokioScheduler {
    fn name(&self) -> &'static str {
        "tokio"
    }

    fn submit(&self, task: TaskHandle, job: Job) -> VolResult<()> {
        if self.is_shutdown() {
            return Err(VolError::SchedulerShutdown);
        }

        let stage = Arc::new(Mutex::new(Stage::Submitting));
        let handoff = Handoff {
            task,
            job: Some(job),
            stage: Arc::clone(&stage),
        };
        // Completion is observed through the task handle, not the JoinHandle
        let _ = self.handle.spawn_blocking(move || handoff.run());

        let mut stage = stage.lock();
        match *stage {
            Stage::Refused => {
                drop(stage);
                self.closed.store(true, Ordering::SeqCst);
                warn!("tokio runtime has shut down; refusing work");
                Err(VolError::SchedulerShutdown)
            }
            Stage::Submitting | Stage::Accepted => {
                *stage = Stage::Accepted;
                Ok(())
            }
        }
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{OpKind, TaskId};
    use crate::task::{TaskLedger, TaskState};
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_runs_on_blocking_pool() {
        let rt = runtime();
        let scheduler = TokioScheduler::new(rt.handle().clone());
        let task = TaskHandle::new(TaskId(1), OpKind::Get, TaskLedger::new());
        let (tx, rx) = flume::bounded(1);

        scheduler
            .submit(
                task.clone(),
                Box::new(move || {
                    let _ = tx.send(std::thread::current().name().map(str::to_owned));
                }),
            )
            .unwrap();

        assert!(task.wait_timeout(Duration::from_secs(5)));
        assert!(rx.recv().is_ok());
        assert_eq!(task.state(), TaskState::Done);
    }

    #[test]
    fn test_refuses_after_runtime_shutdown() {
        let rt = runtime();
        let scheduler = TokioScheduler::new(rt.handle().clone());
        rt.shutdown_timeout(Duration::from_millis(100));

        let task = TaskHandle::new(TaskId(2), OpKind::Create, TaskLedger::new());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let result = scheduler.submit(task.clone(), Box::new(move || flag.store(true, Ordering::SeqCst)));

        assert_eq!(result, Err(VolError::SchedulerShutdown));
        assert!(scheduler.is_shutdown());
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(task.state(), TaskState::Queued);
    }
}

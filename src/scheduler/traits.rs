/*!
 * Scheduler Traits
 * The task-submission surface the connector defers work through
 */

use crate::core::errors::VolResult;
use crate::task::TaskHandle;

/// A deferred unit of work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs deferred jobs off the submitting thread
///
/// **Contract:**
/// - `submit()` never blocks on the job itself
/// - jobs submitted from one thread start in submission order
/// - the task handle moves `Queued → Running → Done` around the job, even
///   when the job panics
/// - after `shutdown()` every `submit()` fails with `SchedulerShutdown`
pub trait TaskScheduler: Send + Sync {
    /// Scheduler name for logging
    fn name(&self) -> &'static str;

    /// Enqueue `job`, tracked by `task`
    fn submit(&self, task: TaskHandle, job: Job) -> VolResult<()>;

    /// Stop accepting work; already-queued jobs still run
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}

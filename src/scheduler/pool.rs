/*!
 * Thread Pool Scheduler
 *
 * N named OS threads draining one FIFO channel. Workers may block inside
 * the gate or on an object settling; other workers keep draining.
 */

use super::traits::{Job, TaskScheduler};
use super::run_job;
use crate::core::errors::{VolError, VolResult};
use crate::core::limits::{MAX_WORKER_THREADS, WORKER_THREAD_PREFIX};
use crate::task::TaskHandle;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

type Queued = (TaskHandle, Job);

/// Fixed-size pool of worker threads
pub struct ThreadPoolScheduler {
    sender: Mutex<Option<flume::Sender<Queued>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
    executed: Arc<AtomicU64>,
}

impl ThreadPoolScheduler {
    /// Spawn `workers` threads
    ///
    /// # Errors
    ///
    /// `Config` if `workers` is zero or above the limit, or a thread
    /// cannot be spawned.
    pub fn new(workers: usize) -> VolResult<Self> {
        if workers == 0 || workers > MAX_WORKER_THREADS {
            return Err(VolError::Config(format!(
                "worker count {} outside 1..={}",
                workers, MAX_WORKER_THREADS
            )));
        }

        let (sender, receiver) = flume::unbounded::<Queued>();
        let executed = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let receiver = receiver.clone();
            let executed = Arc::clone(&executed);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", WORKER_THREAD_PREFIX, index))
                .spawn(move || {
                    debug!(worker = index, "worker started");
                    // Ends once every sender is gone and the queue is drained
                    while let Ok((task, job)) = receiver.recv() {
                        run_job(&task, job);
                        executed.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(worker = index, "worker stopped");
                })
                .map_err(|e| VolError::Config(format!("failed to spawn worker: {}", e)))?;
            handles.push(handle);
        }

        info!(workers, "thread pool scheduler started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            size: workers,
            executed,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Jobs run to completion so far
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

impl TaskScheduler for ThreadPoolScheduler {
    fn name(&self) -> &'static str {
        "thread_pool"
    }

    fn submit(&self, task: TaskHandle, job: Job) -> VolResult<()> {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx
                .send((task, job))
                .map_err(|_| VolError::SchedulerShutdown),
            None => Err(VolError::SchedulerShutdown),
        }
    }

    fn shutdown(&self) {
        if self.sender.lock().take().is_none() {
            return;
        }

        let current = thread::current().id();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            // A job that shuts the pool down cannot join its own thread
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("worker thread exited by panic");
            }
        }
        info!(executed = self.executed(), "thread pool scheduler stopped");
    }

    fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }
}

impl Drop for ThreadPoolScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

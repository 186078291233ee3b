/*!
 * Global Serialization Gate
 *
 * The underlying library is not safe for concurrent entry, so every
 * deferred handler enters it through this gate:
 *
 * ```text
 *   acquire:  process mutex ──▶ library token ──▶ call library
 *   release:  library token ──▶ process mutex   (GateGuard::drop)
 * ```
 *
 * One gate exists per library instance. Connectors sharing a library
 * share the gate through an `Arc`.
 */

use crate::backend::LibraryLock;
use crate::core::errors::{VolError, VolResult};
use crate::core::guard::GuardMetadata;
use crate::core::types::TaskId;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// Holder value meaning "nobody"
const NO_HOLDER: u64 = 0;

/// Process-wide mutual exclusion around the underlying library
pub struct SerializationGate {
    mutex: Mutex<()>,
    token: Arc<dyn LibraryLock>,
    timeout: Option<Duration>,
    holder: AtomicU64,
    acquisitions: AtomicU64,
    failures: AtomicU64,
    release_failures: AtomicU64,
}

/// Gate counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub acquisitions: u64,
    pub failures: u64,
    pub release_failures: u64,
}

impl SerializationGate {
    pub fn new(token: Arc<dyn LibraryLock>) -> Self {
        Self {
            mutex: Mutex::new(()),
            token,
            timeout: None,
            holder: AtomicU64::new(NO_HOLDER),
            acquisitions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            release_failures: AtomicU64::new(0),
        }
    }

    /// Bound how long `acquire` waits for the process mutex
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Block until the gate and the library token are both held
    ///
    /// # Errors
    ///
    /// `GateUnavailable` if the timeout expires or the library refuses its
    /// token. Nothing is held when an error is returned.
    pub fn acquire(&self, task: TaskId) -> VolResult<GateGuard<'_>> {
        let lock = match self.timeout {
            None => self.mutex.lock(),
            Some(timeout) => match self.mutex.try_lock_for(timeout) {
                Some(lock) => lock,
                None => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(VolError::GateUnavailable(format!(
                        "timed out after {}ms",
                        timeout.as_millis()
                    )));
                }
            },
        };

        if let Err(e) = self.token.acquire() {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(VolError::GateUnavailable(e.to_string()));
        }

        self.holder.store(task.0, Ordering::SeqCst);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        trace!(task = %task, "serialization gate acquired");

        Ok(GateGuard {
            gate: self,
            task,
            metadata: GuardMetadata::new("gate").with_task(task),
            _lock: lock,
        })
    }

    /// Whether some task currently holds the gate
    #[inline]
    pub fn is_held(&self) -> bool {
        self.mutex.is_locked()
    }

    /// Task currently holding the gate
    pub fn holder(&self) -> Option<TaskId> {
        match self.holder.load(Ordering::SeqCst) {
            NO_HOLDER => None,
            raw => Some(TaskId(raw)),
        }
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            release_failures: self.release_failures.load(Ordering::Relaxed),
        }
    }
}

/// Scoped hold on the gate
///
/// Dropping it releases the library token, then the process mutex.
pub struct GateGuard<'a> {
    gate: &'a SerializationGate,
    task: TaskId,
    metadata: GuardMetadata,
    // Declared last: the mutex is unlocked after `drop` releases the token
    _lock: MutexGuard<'a, ()>,
}

impl GateGuard<'_> {
    #[inline]
    pub fn task(&self) -> TaskId {
        self.task
    }

    #[inline]
    pub fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.holder.store(NO_HOLDER, Ordering::SeqCst);
        if let Err(e) = self.gate.token.release() {
            self.gate.release_failures.fetch_add(1, Ordering::Relaxed);
            warn!(task = %self.task, error = %e, "library token release failed");
        }
        trace!(
            task = %self.task,
            held_us = self.metadata.lifetime_micros(),
            "serialization gate released"
        );
    }
}

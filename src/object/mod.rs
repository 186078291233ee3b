/*!
 * Async Objects
 *
 * A caller-visible container handle that exists before the underlying
 * group does. Its status, underlying handle, pending initialization task
 * and reference count live behind one per-object lock.
 *
 * # Ownership
 *
 * Lifetime is accounted explicitly: the caller's handle and every
 * in-flight task each hold one counted reference. The object is destroyed
 * by whichever `drop_refs` observes zero in a terminal status, not by any
 * `Arc` going out of scope. The `ObjectRegistry` is the arena that keeps
 * live objects reachable until then.
 */

mod registry;
mod state;

pub use registry::ObjectRegistry;
pub use state::{Disposition, ObjectStatus};

pub(crate) use state::ObjectState;

use crate::core::errors::VolError;
use crate::core::types::{BackendId, ObjectId, UnderlyingHandle};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared handle to an async object
pub type ObjectRef = Arc<AsyncObject>;

/// Caller-visible handle to a group that may still be initializing
pub struct AsyncObject {
    id: ObjectId,
    name: String,
    parent: Option<ObjectId>,
    state: Mutex<ObjectState>,
    settled: Condvar,
}

impl AsyncObject {
    pub(crate) fn new(id: ObjectId, name: String, parent: Option<ObjectId>, state: ObjectState) -> Self {
        Self {
            id,
            name,
            parent,
            state: Mutex::new(state),
            settled: Condvar::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Name the object was created or opened under
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn status(&self) -> ObjectStatus {
        self.state.lock().status
    }

    /// Error recorded when initialization failed
    pub fn error(&self) -> Option<VolError> {
        self.state.lock().error.clone()
    }

    pub fn refcount(&self) -> usize {
        self.state.lock().refcount
    }

    pub fn backend(&self) -> Option<BackendId> {
        self.state.lock().backend
    }

    pub fn underlying(&self) -> Option<UnderlyingHandle> {
        self.state.lock().underlying
    }

    pub fn has_pending_task(&self) -> bool {
        self.state.lock().pending_task.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    /// Block until the object leaves `Init`
    ///
    /// Returns the status observed last; still `Init` only if `timeout`
    /// expired first.
    pub fn wait_settled(&self, timeout: Option<Duration>) -> ObjectStatus {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        while state.status == ObjectStatus::Init {
            match deadline {
                None => self.settled.wait(&mut state),
                Some(deadline) => {
                    if self.settled.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        state.status
    }

    /// Lock the object's state
    pub(crate) fn lock(&self) -> MutexGuard<'_, ObjectState> {
        self.state.lock()
    }

    /// Wake everyone blocked in `wait_settled`
    pub(crate) fn notify_settled(&self) {
        self.settled.notify_all();
    }
}

impl fmt::Debug for AsyncObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AsyncObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &state.status)
            .field("refcount", &state.refcount)
            .field("underlying", &state.underlying)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_settled_wakes_on_transition() {
        let obj = Arc::new(AsyncObject::new(ObjectId(1), "g".into(), None, ObjectState::pending(2)));
        let waiter = {
            let obj = obj.clone();
            thread::spawn(move || obj.wait_settled(Some(Duration::from_secs(5))))
        };

        thread::sleep(Duration::from_millis(20));
        {
            let mut state = obj.lock();
            state.underlying = Some(UnderlyingHandle(9));
            state.backend = Some(BackendId(0));
            state.transition(obj.id(), ObjectStatus::Ready);
        }
        obj.notify_settled();

        assert_eq!(waiter.join().unwrap(), ObjectStatus::Ready);
    }

    #[test]
    fn test_wait_settled_timeout() {
        let obj = AsyncObject::new(ObjectId(2), "g".into(), None, ObjectState::pending(2));
        assert_eq!(obj.wait_settled(Some(Duration::from_millis(10))), ObjectStatus::Init);
    }
}

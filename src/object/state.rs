/*!
 * Object Lifecycle State
 *
 * ```text
 *            create/open ok           close ok
 *   Init ───────────────────▶ Ready ───────────▶ Closed
 *     │                         ▲ │
 *     │ create/open failed      └─┘ close failed (retryable)
 *     ▼
 *   Error  (tombstone, terminal)
 * ```
 *
 * Every field is protected by the owning object's lock.
 */

use crate::core::errors::{VolError, VolResult};
use crate::core::types::{BackendId, ObjectId, UnderlyingHandle};
use crate::task::TaskHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    /// Visible to the caller, initialization still pending
    Init,
    /// Underlying handle usable
    Ready,
    /// Initialization failed
    Error,
    /// Underlying handle released
    Closed,
}

impl ObjectStatus {
    /// No further transition is possible
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, ObjectStatus::Error | ObjectStatus::Closed)
    }

    #[inline]
    pub const fn can_transition(self, to: ObjectStatus) -> bool {
        matches!(
            (self, to),
            (ObjectStatus::Init, ObjectStatus::Ready)
                | (ObjectStatus::Init, ObjectStatus::Error)
                | (ObjectStatus::Ready, ObjectStatus::Closed)
        )
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectStatus::Init => "init",
            ObjectStatus::Ready => "ready",
            ObjectStatus::Error => "error",
            ObjectStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What happened to an object after references were dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retained,
    /// Last reference gone in a terminal status; caller must finish destruction
    Destroy,
}

/// Mutable part of an async object
#[derive(Debug)]
pub(crate) struct ObjectState {
    pub status: ObjectStatus,
    pub underlying: Option<UnderlyingHandle>,
    pub backend: Option<BackendId>,
    pub pending_task: Option<TaskHandle>,
    pub refcount: usize,
    pub error: Option<VolError>,
    pub close_pending: bool,
    /// The caller gave up its reference on a tombstone
    pub caller_released: bool,
    pub destroyed: bool,
}

impl ObjectState {
    /// Freshly submitted create/open
    pub fn pending(refcount: usize) -> Self {
        Self {
            status: ObjectStatus::Init,
            underlying: None,
            backend: None,
            pending_task: None,
            refcount,
            error: None,
            close_pending: false,
            caller_released: false,
            destroyed: false,
        }
    }

    /// Object wrapping an already-open handle
    pub fn ready(underlying: UnderlyingHandle, backend: BackendId, refcount: usize) -> Self {
        Self {
            status: ObjectStatus::Ready,
            underlying: Some(underlying),
            backend: Some(backend),
            ..Self::pending(refcount)
        }
    }

    /// Move to `to`, refusing transitions the state machine does not allow
    pub fn transition(&mut self, id: ObjectId, to: ObjectStatus) -> bool {
        if !self.status.can_transition(to) {
            tracing::error!(object = %id, from = %self.status, to = %to, "invalid status transition");
            return false;
        }
        self.status = to;
        true
    }

    /// Record an initialization failure
    pub fn fail(&mut self, id: ObjectId, error: VolError) -> bool {
        self.error = Some(error);
        self.transition(id, ObjectStatus::Error)
    }

    /// Check the object can be used by a new operation
    pub fn check_usable(&self, id: ObjectId) -> VolResult<()> {
        match self.status {
            ObjectStatus::Init | ObjectStatus::Ready => Ok(()),
            ObjectStatus::Error => Err(self.stored_error(id)),
            ObjectStatus::Closed => Err(VolError::ObjectClosed(id)),
        }
    }

    /// Underlying handle and backend of a `Ready` object
    pub fn usable_handle(&self, id: ObjectId) -> VolResult<(UnderlyingHandle, BackendId)> {
        match (self.status, self.underlying, self.backend) {
            (ObjectStatus::Ready, Some(handle), Some(backend)) => Ok((handle, backend)),
            (ObjectStatus::Closed, _, _) => Err(VolError::ObjectClosed(id)),
            (ObjectStatus::Error, _, _) => Err(self.stored_error(id)),
            _ => Err(VolError::NotReady(id)),
        }
    }

    fn stored_error(&self, id: ObjectId) -> VolError {
        self.error.clone().unwrap_or(VolError::InitFailed(id))
    }

    #[inline]
    pub fn take_ref(&mut self) {
        self.refcount += 1;
    }

    /// Drop `count` references
    ///
    /// Reports `Destroy` exactly once: the first time the count reaches
    /// zero while the status is terminal.
    pub fn drop_refs(&mut self, id: ObjectId, count: usize) -> VolResult<Disposition> {
        if count > self.refcount {
            tracing::error!(object = %id, refcount = self.refcount, count, "reference count underflow");
            return Err(VolError::RefcountUnderflow(id));
        }
        self.refcount -= count;

        if self.refcount == 0 && self.status.is_terminal() && !self.destroyed {
            self.destroyed = true;
            self.pending_task = None;
            self.underlying = None;
            return Ok(Disposition::Destroy);
        }
        Ok(Disposition::Retained)
    }
}

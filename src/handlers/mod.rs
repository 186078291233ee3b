/*!
 * Deferred Operation Handlers
 *
 * Every operation kind runs the same template on a scheduler worker:
 *
 * ```text
 *   wait for subject to settle        (no locks held)
 *   acquire gate ──▶ call library     (object locks never held here)
 *   epilogue under target lock:
 *       finalize status ──▶ deliver result ──▶ drop task refs
 *   drop parent ref, release resources
 *   release gate
 * ```
 *
 * The per-kind differences live in the `Operation` implementations in
 * `ops`.
 */

mod ops;

pub(crate) use ops::{CloseGroup, CreateGroup, GetGroup, OpenGroup, OptionalGroup, SpecificGroup};

use crate::backend::{BackendResult, GroupBackend};
use crate::connector::ConnectorStats;
use crate::core::errors::{VolError, VolResult};
use crate::core::guard::{Guard, GuardError};
use crate::core::types::{BackendId, ObjectId, OpKind, TaskId, UnderlyingHandle};
use crate::gate::SerializationGate;
use crate::monitoring::TaskSpan;
use crate::object::{AsyncObject, Disposition, ObjectRegistry, ObjectState};
use crate::plist::PropertyList;
use crate::task::TaskBundle;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Per-kind behaviour plugged into the shared handler template
pub(crate) trait Operation: Send + 'static {
    /// What the library call returns
    type Output: Send + 'static;
    /// What the caller receives
    type Reply: Send + 'static;

    const KIND: OpKind;

    /// The library call, made with the gate held
    fn invoke(
        &self,
        backend: &dyn GroupBackend,
        subject: UnderlyingHandle,
        backend_id: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<Self::Output>;

    /// Apply the outcome to the target's state
    ///
    /// Runs under the target's lock. Returns the reply and how many of the
    /// target's references this task releases.
    fn finalize(
        state: &mut ObjectState,
        id: ObjectId,
        outcome: VolResult<Self::Output>,
    ) -> (VolResult<Self::Reply>, usize);

    /// Release the payload's owned resources
    fn release(self) -> Vec<GuardError>;
}

/// Shared collaborators of every handler
pub(crate) struct HandlerContext {
    pub gate: Arc<SerializationGate>,
    pub backend: Arc<dyn GroupBackend>,
    pub registry: Arc<ObjectRegistry>,
    pub stats: Arc<ConnectorStats>,
    pub slow_task: Duration,
}

/// Run one deferred operation to completion
///
/// Consumes the bundle on every path: the result is delivered, every
/// counted reference the bundle holds is dropped and every resource is
/// released before the gate is.
pub(crate) fn execute<O: Operation>(ctx: &HandlerContext, bundle: TaskBundle<O>) {
    let subject = Arc::clone(bundle.subject());
    let TaskBundle {
        task,
        target,
        parent,
        op,
        mut dxpl,
        delivery,
    } = bundle;

    let span = TaskSpan::new(task, O::KIND, target.id(), ctx.slow_task);
    let _entered = span.enter();

    subject.wait_settled(None);

    let (gate, outcome) = match ctx.gate.acquire(task) {
        Ok(guard) => {
            let outcome = call_library(ctx, task, &op, &target, &subject, &dxpl);
            (Some(guard), outcome)
        }
        Err(e) => (None, Err(e)),
    };

    // Epilogue: finalize, deliver, drop the task's references
    let (success, disposition) = {
        let mut state = target.lock();
        let (reply, refs) = O::finalize(&mut state, target.id(), outcome);
        if O::KIND.initializes() {
            state.pending_task = None;
        }
        span.record_outcome(&reply);
        let success = reply.is_ok();
        if let Err(e) = &reply {
            debug!(error = %e, "task failed");
        }
        delivery.deliver(reply);

        let disposition = state.drop_refs(target.id(), refs);
        (success, disposition)
    };

    if O::KIND.initializes() {
        target.notify_settled();
    }
    match disposition {
        Ok(Disposition::Destroy) => ctx.registry.finish_destroy(&target),
        Ok(Disposition::Retained) => {}
        Err(e) => error!(error = %e, "task reference release failed"),
    }

    // After the target's lock is gone: object locks are never nested
    if let Some(parent) = &parent {
        if let Err(e) = ctx.registry.drop_refs(parent, 1) {
            error!(parent = %parent.id(), error = %e, "parent reference release failed");
        }
    }

    release_resources(op, &mut dxpl);
    ctx.stats.record_completion(O::KIND, success);

    drop(gate);
}

/// Snapshot the subject's handle and make the library call
fn call_library<O: Operation>(
    ctx: &HandlerContext,
    task: TaskId,
    op: &O,
    target: &AsyncObject,
    subject: &AsyncObject,
    dxpl: &PropertyList,
) -> VolResult<O::Output> {
    let (handle, backend_id) = subject.lock().usable_handle(subject.id())?;
    if O::KIND.initializes() {
        target.lock().backend = Some(backend_id);
    }

    let backend = &*ctx.backend;
    match panic::catch_unwind(AssertUnwindSafe(|| op.invoke(backend, handle, backend_id, dxpl))) {
        Ok(result) => result.map_err(|e| VolError::backend(O::KIND, e)),
        Err(_) => {
            error!(backend = backend.name(), "library call panicked");
            Err(VolError::HandlerPanicked(task))
        }
    }
}

fn release_resources<O: Operation>(op: O, dxpl: &mut PropertyList) {
    let mut failures = op.release();
    if let Err(e) = dxpl.release() {
        failures.push(e);
    }
    for e in failures {
        warn!(error = %e, "task resource release failed");
    }
}

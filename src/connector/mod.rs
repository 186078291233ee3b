/*!
 * Connector
 *
 * Caller-facing entry points, one per operation kind. Each entry point
 * checks the object it needs, takes the task's counted references,
 * packages a bundle, submits it and returns without waiting:
 *
 * - create/open return a new object in `Init` plus a completion
 * - get/specific/optional/close return a completion
 *
 * # Reference accounting
 *
 * | event                     | target  | parent |
 * |---------------------------|---------|--------|
 * | create/open submitted     | = 2     | +1     |
 * | create/open handled       | -1      | -1     |
 * | other op submitted        | +1      |        |
 * | other op handled          | -1      |        |
 * | close handled, success    | -2      |        |
 * | tombstone released        | -1      |        |
 */

mod builder;
mod config;
mod stats;

pub use builder::ConnectorBuilder;
pub use config::{
    ConnectorConfig, SchedulerKind, GATE_TIMEOUT_ENV, SCHEDULER_ENV, SLOW_TASK_ENV,
    WAIT_TIMEOUT_ENV, WORKERS_ENV,
};
pub use stats::{ConnectorStats, SnapshotParts, StatsSnapshot};

use crate::backend::{
    GroupCreateArgs, GroupGet, GroupGetOutput, GroupOpenArgs, GroupOptional, GroupSpecific,
    OptionalOutput,
};
use crate::core::errors::{VolError, VolResult};
use crate::core::id::{IdGenerator, TaskIdGenerator};
use crate::core::limits::{INITIAL_OBJECT_REFS, ROOT_OBJECT_REFS};
use crate::core::types::{BackendId, OpKind, UnderlyingHandle};
use crate::gate::SerializationGate;
use crate::handlers::{
    self, CloseGroup, CreateGroup, GetGroup, HandlerContext, OpenGroup, Operation, OptionalGroup,
    SpecificGroup,
};
use crate::object::{Disposition, ObjectRef, ObjectRegistry, ObjectState, ObjectStatus};
use crate::plist::{PlistTracker, PropertyList};
use crate::scheduler::TaskScheduler;
use crate::task::{
    Completion, CompletionMode, Delivery, FreedBy, ResultSlot, TaskBundle, TaskHandle, TaskLedger,
    Waiter,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Asynchronous front end to a non-reentrant group library
pub struct Connector {
    ctx: Arc<HandlerContext>,
    scheduler: Arc<dyn TaskScheduler>,
    plists: Arc<PlistTracker>,
    ledger: Arc<TaskLedger>,
    task_ids: TaskIdGenerator,
    config: ConnectorConfig,
}

impl Connector {
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::new()
    }

    /// Wrap an already-open container (the file that parents top-level groups)
    ///
    /// The returned object is `Ready` and holds only the caller's reference;
    /// close it like any other group.
    pub fn attach_root(
        &self,
        handle: UnderlyingHandle,
        backend: BackendId,
        name: impl Into<String>,
    ) -> ObjectRef {
        self.ctx
            .registry
            .allocate(name, None, ObjectState::ready(handle, backend, ROOT_OBJECT_REFS))
    }

    /// Create a group under `parent`
    ///
    /// The returned object is `Init` until the handler runs. Creation
    /// failure turns it into an `Error` tombstone the caller must `release`.
    pub fn group_create(
        &self,
        parent: &ObjectRef,
        args: GroupCreateArgs,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<(ObjectRef, Completion<()>)> {
        let name = args.name.clone();
        self.submit_init(parent, name, CreateGroup::new(args), dxpl, mode)
    }

    /// Open an existing group under `parent`
    pub fn group_open(
        &self,
        parent: &ObjectRef,
        args: GroupOpenArgs,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<(ObjectRef, Completion<()>)> {
        let name = args.name.clone();
        self.submit_init(parent, name, OpenGroup::new(args), dxpl, mode)
    }

    /// Query group metadata
    pub fn group_get(
        &self,
        target: &ObjectRef,
        args: GroupGet,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<Completion<GroupGetOutput>> {
        self.submit_on(target, GetGroup::new(args), dxpl, mode)
    }

    pub fn group_specific(
        &self,
        target: &ObjectRef,
        args: GroupSpecific,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<Completion<()>> {
        self.submit_on(target, SpecificGroup::new(args), dxpl, mode)
    }

    pub fn group_optional(
        &self,
        target: &ObjectRef,
        args: GroupOptional,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<Completion<OptionalOutput>> {
        self.submit_on(target, OptionalGroup::new(args), dxpl, mode)
    }

    /// Close a group
    ///
    /// Success releases the caller's reference and destroys the object once
    /// in-flight tasks finish. Failure leaves it `Ready`; retry the close.
    ///
    /// # Errors
    ///
    /// `CloseInProgress` if a close is already in flight on `target`.
    pub fn group_close(
        &self,
        target: &ObjectRef,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<Completion<()>> {
        self.submit_on(target, CloseGroup, dxpl, mode)
    }

    /// Give up the caller's reference on an `Error` tombstone
    ///
    /// # Errors
    ///
    /// `StillOpen` for `Init`/`Ready` objects (close them instead),
    /// `ObjectClosed` for closed ones, `RefcountUnderflow` on a second
    /// release.
    pub fn release(&self, object: &ObjectRef) -> VolResult<()> {
        let disposition = {
            let mut state = object.lock();
            match state.status {
                ObjectStatus::Error if state.caller_released => {
                    return Err(VolError::RefcountUnderflow(object.id()));
                }
                ObjectStatus::Error => {
                    let disposition = state.drop_refs(object.id(), 1)?;
                    state.caller_released = true;
                    disposition
                }
                ObjectStatus::Closed => return Err(VolError::ObjectClosed(object.id())),
                ObjectStatus::Init | ObjectStatus::Ready => {
                    return Err(VolError::StillOpen(object.id()))
                }
            }
        };

        if disposition == Disposition::Destroy {
            self.ctx.registry.finish_destroy(object);
        }
        debug!(object = %object.id(), "tombstone released");
        Ok(())
    }

    /// Block on a completion for at most the configured wait bound
    ///
    /// `Ok(None)` for detached completions, whose outcome is only visible
    /// through object status.
    pub fn wait<T>(&self, completion: Completion<T>) -> VolResult<Option<T>> {
        let bound = self.config.wait_timeout();
        let started = Instant::now();
        let timed_out = |what: String| VolError::Timeout {
            what,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        match completion {
            Completion::Wait(waiter) => match waiter.wait_timeout(bound) {
                Ok(result) => result.map(Some),
                Err(waiter) => {
                    let what = waiter
                        .task_id()
                        .map_or_else(|| "task".to_string(), |id| id.to_string());
                    Err(timed_out(what))
                }
            },
            Completion::Detached(task) => {
                if task.wait_timeout(bound) {
                    Ok(None)
                } else {
                    Err(timed_out(task.id().to_string()))
                }
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        let registry = &self.ctx.registry;
        self.ctx.stats.snapshot(SnapshotParts {
            freed_by_caller: self.ledger.freed_by_caller(),
            freed_by_handler: self.ledger.freed_by_handler(),
            outstanding: self.ledger.outstanding(),
            objects_created: registry.created_count(),
            objects_destroyed: registry.destroyed_count(),
            objects_live: registry.live(),
            open_plists: self.plists.open_count(),
            gate: self.ctx.gate.stats(),
        })
    }

    /// Stop accepting work; queued tasks still run
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Factory for the property lists entry points consume
    pub fn plists(&self) -> &Arc<PlistTracker> {
        &self.plists
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.ctx.registry
    }

    pub fn gate(&self) -> &Arc<SerializationGate> {
        &self.ctx.gate
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    pub fn scheduler_name(&self) -> &'static str {
        self.scheduler.name()
    }

    fn new_task(&self, kind: OpKind) -> TaskHandle {
        TaskHandle::new(self.task_ids.next(), kind, Arc::clone(&self.ledger))
    }

    /// Shared path of create and open
    fn submit_init<O: Operation<Reply = ()>>(
        &self,
        parent: &ObjectRef,
        name: String,
        op: O,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<(ObjectRef, Completion<()>)> {
        self.take_task_ref(parent, false)?;

        let task = self.new_task(O::KIND);
        let object = self.ctx.registry.allocate(
            name,
            Some(parent.id()),
            ObjectState::pending(INITIAL_OBJECT_REFS),
        );
        object.lock().pending_task = Some(task.clone());

        match self.dispatch(&task, Arc::clone(&object), Some(Arc::clone(parent)), op, dxpl, mode) {
            Ok(completion) => Ok((object, completion)),
            Err(e) => {
                // Nobody else holds the new object: fail and destroy it
                let disposition = {
                    let mut state = object.lock();
                    state.pending_task = None;
                    state.fail(object.id(), e.clone());
                    state.drop_refs(object.id(), INITIAL_OBJECT_REFS)
                };
                if disposition == Ok(Disposition::Destroy) {
                    self.ctx.registry.finish_destroy(&object);
                }
                object.notify_settled();
                self.undo_ref(parent);
                Err(e)
            }
        }
    }

    /// Shared path of every operation on an existing object
    fn submit_on<O: Operation>(
        &self,
        target: &ObjectRef,
        op: O,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<Completion<O::Reply>> {
        let closing = O::KIND == OpKind::Close;
        self.take_task_ref(target, closing)?;

        let task = self.new_task(O::KIND);
        self.dispatch(&task, Arc::clone(target), None, op, dxpl, mode)
            .map_err(|e| {
                if closing {
                    target.lock().close_pending = false;
                }
                self.undo_ref(target);
                e
            })
    }

    /// Reject unusable objects, otherwise take one task reference
    fn take_task_ref(&self, object: &ObjectRef, closing: bool) -> VolResult<()> {
        let mut state = object.lock();
        let checked = state.check_usable(object.id()).and_then(|()| {
            if closing && state.close_pending {
                Err(VolError::CloseInProgress(object.id()))
            } else {
                Ok(())
            }
        });
        if let Err(e) = checked {
            drop(state);
            self.ctx.stats.inc_rejected();
            debug!(object = %object.id(), error = %e, "request rejected");
            return Err(e);
        }

        if closing {
            state.close_pending = true;
        }
        state.take_ref();
        Ok(())
    }

    fn undo_ref(&self, object: &ObjectRef) {
        if let Err(e) = self.ctx.registry.drop_refs(object, 1) {
            error!(object = %object.id(), error = %e, "undoing task reference failed");
        }
    }

    /// Package the bundle and hand it to the scheduler
    fn dispatch<O: Operation>(
        &self,
        task: &TaskHandle,
        target: ObjectRef,
        parent: Option<ObjectRef>,
        op: O,
        dxpl: PropertyList,
        mode: CompletionMode,
    ) -> VolResult<Completion<O::Reply>> {
        let (delivery, slot) = match mode {
            CompletionMode::Wait => {
                let slot = ResultSlot::new();
                (Delivery::Slot(slot.clone()), Some(slot))
            }
            CompletionMode::Detach => (Delivery::FreeTask(task.clone()), None),
        };

        let bundle = TaskBundle {
            task: task.id(),
            target,
            parent,
            op,
            dxpl,
            delivery,
        };
        let ctx = Arc::clone(&self.ctx);

        if let Err(e) = self
            .scheduler
            .submit(task.clone(), Box::new(move || handlers::execute(&ctx, bundle)))
        {
            warn!(task = %task.id(), op = %O::KIND, error = %e, "submission refused");
            if let Err(e) = task.free(FreedBy::Caller) {
                warn!(task = %task.id(), error = %e, "refused task already freed");
            }
            self.ctx.stats.inc_rejected();
            return Err(e);
        }

        self.ctx.stats.inc_submitted(O::KIND);
        debug!(task = %task.id(), op = %O::KIND, mode = ?mode, "task submitted");

        Ok(match slot {
            Some(slot) => Completion::Wait(Waiter::new(slot, task.clone())),
            None => Completion::Detached(task.observer()),
        })
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("scheduler", &self.scheduler.name())
            .field("config", &self.config)
            .field("live_objects", &self.ctx.registry.live())
            .finish()
    }
}

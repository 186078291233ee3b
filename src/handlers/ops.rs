/*!
 * Operation Kinds
 * The per-kind call and finalization plugged into the handler template
 */

use super::Operation;
use crate::backend::{
    BackendResult, GroupBackend, GroupCreateArgs, GroupGet, GroupGetOutput, GroupOpenArgs,
    GroupOptional, GroupSpecific, OptionalOutput,
};
use crate::core::errors::VolResult;
use crate::core::guard::{Guard, GuardError};
use crate::core::types::{BackendId, ObjectId, OpKind, UnderlyingHandle};
use crate::object::{ObjectState, ObjectStatus};
use crate::plist::PropertyList;

/// References a task on the target holds and releases
const TASK_REF: usize = 1;

fn release_all(lists: [&mut PropertyList; 3]) -> Vec<GuardError> {
    lists.into_iter().filter_map(|plist| plist.release().err()).collect()
}

/// Store the new handle, or turn the object into a tombstone
fn finalize_init(
    state: &mut ObjectState,
    id: ObjectId,
    outcome: VolResult<UnderlyingHandle>,
) -> (VolResult<()>, usize) {
    match outcome {
        Ok(handle) => {
            state.underlying = Some(handle);
            state.transition(id, ObjectStatus::Ready);
            (Ok(()), TASK_REF)
        }
        Err(e) => {
            state.fail(id, e.clone());
            (Err(e), TASK_REF)
        }
    }
}

pub(crate) struct CreateGroup {
    args: GroupCreateArgs,
}

impl CreateGroup {
    pub fn new(args: GroupCreateArgs) -> Self {
        Self { args }
    }
}

impl Operation for CreateGroup {
    type Output = UnderlyingHandle;
    type Reply = ();

    const KIND: OpKind = OpKind::Create;

    fn invoke(
        &self,
        backend: &dyn GroupBackend,
        subject: UnderlyingHandle,
        backend_id: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<UnderlyingHandle> {
        backend.group_create(subject, backend_id, &self.args, dxpl)
    }

    fn finalize(
        state: &mut ObjectState,
        id: ObjectId,
        outcome: VolResult<UnderlyingHandle>,
    ) -> (VolResult<()>, usize) {
        finalize_init(state, id, outcome)
    }

    fn release(mut self) -> Vec<GuardError> {
        let args = &mut self.args;
        release_all([&mut args.lcpl, &mut args.gcpl, &mut args.gapl])
    }
}

pub(crate) struct OpenGroup {
    args: GroupOpenArgs,
}

impl OpenGroup {
    pub fn new(args: GroupOpenArgs) -> Self {
        Self { args }
    }
}

impl Operation for OpenGroup {
    type Output = UnderlyingHandle;
    type Reply = ();

    const KIND: OpKind = OpKind::Open;

    fn invoke(
        &self,
        backend: &dyn GroupBackend,
        subject: UnderlyingHandle,
        backend_id: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<UnderlyingHandle> {
        backend.group_open(subject, backend_id, &self.args, dxpl)
    }

    fn finalize(
        state: &mut ObjectState,
        id: ObjectId,
        outcome: VolResult<UnderlyingHandle>,
    ) -> (VolResult<()>, usize) {
        finalize_init(state, id, outcome)
    }

    fn release(mut self) -> Vec<GuardError> {
        self.args.gapl.release().err().into_iter().collect()
    }
}

pub(crate) struct GetGroup {
    args: GroupGet,
}

impl GetGroup {
    pub fn new(args: GroupGet) -> Self {
        Self { args }
    }
}

impl Operation for GetGroup {
    type Output = GroupGetOutput;
    type Reply = GroupGetOutput;

    const KIND: OpKind = OpKind::Get;

    fn invoke(
        &self,
        backend: &dyn GroupBackend,
        subject: UnderlyingHandle,
        backend_id: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<GroupGetOutput> {
        backend.group_get(subject, backend_id, &self.args, dxpl)
    }

    fn finalize(
        _state: &mut ObjectState,
        _id: ObjectId,
        outcome: VolResult<GroupGetOutput>,
    ) -> (VolResult<GroupGetOutput>, usize) {
        (outcome, TASK_REF)
    }

    fn release(self) -> Vec<GuardError> {
        Vec::new()
    }
}

pub(crate) struct SpecificGroup {
    args: GroupSpecific,
}

impl SpecificGroup {
    pub fn new(args: GroupSpecific) -> Self {
        Self { args }
    }
}

impl Operation for SpecificGroup {
    type Output = ();
    type Reply = ();

    const KIND: OpKind = OpKind::Specific;

    fn invoke(
        &self,
        backend: &dyn GroupBackend,
        subject: UnderlyingHandle,
        backend_id: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<()> {
        backend.group_specific(subject, backend_id, &self.args, dxpl)
    }

    fn finalize(
        _state: &mut ObjectState,
        _id: ObjectId,
        outcome: VolResult<()>,
    ) -> (VolResult<()>, usize) {
        (outcome, TASK_REF)
    }

    fn release(self) -> Vec<GuardError> {
        Vec::new()
    }
}

pub(crate) struct OptionalGroup {
    args: GroupOptional,
}

impl OptionalGroup {
    pub fn new(args: GroupOptional) -> Self {
        Self { args }
    }
}

impl Operation for OptionalGroup {
    type Output = OptionalOutput;
    type Reply = OptionalOutput;

    const KIND: OpKind = OpKind::Optional;

    fn invoke(
        &self,
        backend: &dyn GroupBackend,
        subject: UnderlyingHandle,
        backend_id: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<OptionalOutput> {
        backend.group_optional(subject, backend_id, &self.args, dxpl)
    }

    fn finalize(
        _state: &mut ObjectState,
        _id: ObjectId,
        outcome: VolResult<OptionalOutput>,
    ) -> (VolResult<OptionalOutput>, usize) {
        (outcome, TASK_REF)
    }

    fn release(self) -> Vec<GuardError> {
        Vec::new()
    }
}

pub(crate) struct CloseGroup;

impl Operation for CloseGroup {
    type Output = ();
    type Reply = ();

    const KIND: OpKind = OpKind::Close;

    fn invoke(
        &self,
        backend: &dyn GroupBackend,
        subject: UnderlyingHandle,
        backend_id: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<()> {
        backend.group_close(subject, backend_id, dxpl)
    }

    /// Success also releases the caller's reference; failure keeps the
    /// object `Ready` so the close can be retried.
    fn finalize(
        state: &mut ObjectState,
        id: ObjectId,
        outcome: VolResult<()>,
    ) -> (VolResult<()>, usize) {
        state.close_pending = false;
        match outcome {
            Ok(()) => {
                state.underlying = None;
                state.transition(id, ObjectStatus::Closed);
                (Ok(()), TASK_REF + 1)
            }
            Err(e) => (Err(e), TASK_REF),
        }
    }

    fn release(self) -> Vec<GuardError> {
        Vec::new()
    }
}

/*!
 * Backend Traits
 * The synchronous library surface every deferred handler calls into
 */

use super::types::*;
use crate::core::types::{BackendId, UnderlyingHandle};
use crate::plist::PropertyList;

/// Synchronous group primitives of the underlying I/O library
///
/// Implementations need not be re-entrant: the connector never calls
/// into a backend without holding the serialization gate.
pub trait GroupBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Create a group below `parent`
    fn group_create(
        &self,
        parent: UnderlyingHandle,
        backend: BackendId,
        args: &GroupCreateArgs,
        dxpl: &PropertyList,
    ) -> BackendResult<UnderlyingHandle>;

    /// Open an existing group below `parent`
    fn group_open(
        &self,
        parent: UnderlyingHandle,
        backend: BackendId,
        args: &GroupOpenArgs,
        dxpl: &PropertyList,
    ) -> BackendResult<UnderlyingHandle>;

    /// Query group metadata
    fn group_get(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        args: &GroupGet,
        dxpl: &PropertyList,
    ) -> BackendResult<GroupGetOutput>;

    /// Perform a backend-independent group action
    fn group_specific(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        args: &GroupSpecific,
        dxpl: &PropertyList,
    ) -> BackendResult<()>;

    /// Perform a backend-defined group action
    fn group_optional(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        args: &GroupOptional,
        dxpl: &PropertyList,
    ) -> BackendResult<OptionalOutput>;

    /// Close a group handle
    ///
    /// On error the handle stays valid and the close may be retried.
    fn group_close(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        dxpl: &PropertyList,
    ) -> BackendResult<()>;
}

/// The library's own thread-safety token
///
/// Acquired after the process-wide gate mutex and released before it.
pub trait LibraryLock: Send + Sync {
    fn acquire(&self) -> BackendResult<()>;

    fn release(&self) -> BackendResult<()>;
}

/*!
 * Task Argument Bundle
 * Everything one deferred operation needs, consumed by its handler
 */

use super::completion::Delivery;
use crate::core::types::TaskId;
use crate::handlers::Operation;
use crate::object::ObjectRef;
use crate::plist::PropertyList;

/// Owned inputs and result destination of one deferred operation
///
/// Holds one counted reference on `target` and, for create/open, one on
/// `parent`. Never reused: the handler destructures it on every path.
pub(crate) struct TaskBundle<O: Operation> {
    pub task: TaskId,
    pub target: ObjectRef,
    pub parent: Option<ObjectRef>,
    pub op: O,
    pub dxpl: PropertyList,
    pub delivery: Delivery<O::Reply>,
}

impl<O: Operation> TaskBundle<O> {
    /// The object whose underlying handle the library call is made on
    pub fn subject(&self) -> &ObjectRef {
        self.parent.as_ref().unwrap_or(&self.target)
    }
}

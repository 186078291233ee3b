/*!
 * Deferred Tasks
 *
 * Task handles, argument bundles and the completion channel shared by
 * every operation kind.
 */

mod bundle;
mod completion;
mod handle;

pub use completion::{Completion, CompletionMode, Delivery, ResultSlot, Waiter};
pub use handle::{FreedBy, TaskHandle, TaskLedger, TaskObserver, TaskState};

pub(crate) use bundle::TaskBundle;

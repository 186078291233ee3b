/*!
 * Guard Traits
 * What a task-owned resource exposes to the handler that releases it
 */

use super::{GuardMetadata, GuardResult};

/// A resource a task bundle owns until its handler releases it
///
/// Release happens once, explicitly from the handler epilogue or implicitly
/// on drop when a bundle is discarded without running.
pub trait Guard: Send {
    fn resource_type(&self) -> &'static str;

    fn metadata(&self) -> &GuardMetadata;

    /// False once released
    fn is_active(&self) -> bool;

    /// Give the resource back
    ///
    /// `AlreadyReleased` on a second call; the first release stands.
    fn release(&mut self) -> GuardResult<()>;
}

/// Cleanup run from `Drop` for guards still active
pub trait GuardDrop: Guard {
    /// Must not panic; failures are logged
    fn on_drop(&mut self);
}

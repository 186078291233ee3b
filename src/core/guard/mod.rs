/*!
 * RAII Resource Guards
 *
 * Scoped ownership of the resources a deferred task touches, with
 * automatic cleanup on every exit path.
 *
 * ## Guard Types
 *
 * - **PropertyList** (`crate::plist`): a configuration resource owned by a
 *   task bundle, released exactly once
 *
 * `GateGuard` (`crate::gate`) follows the same drop discipline but holds a
 * thread-bound mutex guard, so it cannot implement the `Send` trait below.
 *
 * ## Example
 *
 * ```ignore
 * let mut dxpl = plists.create(PlistClass::DataTransfer);
 * // Hand to the library
 * dxpl.release()?; // or let drop release it
 * ```
 */

mod traits;

pub use traits::{Guard, GuardDrop};

use crate::core::types::TaskId;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Why a release was refused
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, thiserror::Error,
)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    /// The owning tracker has no record of the resource
    #[error("Resource not tracked: {0}")]
    NotTracked(String),
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub task: Option<TaskId>,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            task: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}

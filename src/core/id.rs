/*!
 * ID Generation System
 * Centralized ID management with type-safe wrappers
 */

use super::types::{ObjectId, PlistId, TaskId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ============================================================================
// ID Generator Trait
// ============================================================================

/// Generic ID generator interface
pub trait IdGenerator<T> {
    /// Generate next ID
    fn next(&self) -> T;

    /// Get current counter value (for debugging)
    fn current(&self) -> T;
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Lock-free monotonically increasing counter
///
/// IDs are never recycled: a stale object or task id can never alias a
/// newer one in logs or in the object registry.
#[repr(C, align(64))]
pub struct AtomicGenerator<T> {
    counter: Arc<AtomicU64>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> AtomicGenerator<T> {
    /// Create new generator starting at given value
    #[inline]
    pub fn new(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(start)),
            _marker: std::marker::PhantomData,
        }
    }

    /// Create new generator starting at 1
    #[inline]
    pub fn default_start() -> Self {
        Self::new(1)
    }
}

impl<T> Clone for AtomicGenerator<T> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Default for AtomicGenerator<T> {
    fn default() -> Self {
        Self::default_start()
    }
}

impl<T: From<u64>> IdGenerator<T> for AtomicGenerator<T> {
    #[inline]
    fn next(&self) -> T {
        T::from(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    #[inline]
    fn current(&self) -> T {
        T::from(self.counter.load(Ordering::Relaxed))
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        ObjectId(raw)
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        TaskId(raw)
    }
}

impl From<u64> for PlistId {
    fn from(raw: u64) -> Self {
        PlistId(raw)
    }
}

// ============================================================================
// Convenience Type Aliases
// ============================================================================

/// Async object ID generator
pub type ObjectIdGenerator = AtomicGenerator<ObjectId>;

/// Task ID generator
pub type TaskIdGenerator = AtomicGenerator<TaskId>;

/// Property list ID generator
pub type PlistIdGenerator = AtomicGenerator<PlistId>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_generator() {
        let gen = TaskIdGenerator::new(100);

        assert_eq!(gen.next(), TaskId(100));
        assert_eq!(gen.next(), TaskId(101));
        assert_eq!(gen.current(), TaskId(102));
    }

    #[test]
    fn test_clones_share_counter() {
        let gen = ObjectIdGenerator::default_start();
        let other = gen.clone();

        assert_eq!(gen.next(), ObjectId(1));
        assert_eq!(other.next(), ObjectId(2));
    }
}

/*!
 * Library Thread-Safety Tokens
 */

use super::traits::LibraryLock;
use super::types::{BackendError, BackendResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Token for libraries that need no extra locking
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLibraryLock;

impl LibraryLock for NoopLibraryLock {
    #[inline]
    fn acquire(&self) -> BackendResult<()> {
        Ok(())
    }

    #[inline]
    fn release(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// Token whose availability can be switched off at runtime
///
/// Models a library whose global mutex can refuse acquisition, e.g. after
/// the library has been torn down.
#[derive(Debug)]
pub struct ToggleLibraryLock {
    available: AtomicBool,
    held: AtomicBool,
    acquisitions: AtomicU64,
    refusals: AtomicU64,
}

impl ToggleLibraryLock {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            held: AtomicBool::new(false),
            acquisitions: AtomicU64::new(0),
            refusals: AtomicU64::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    pub fn refusals(&self) -> u64 {
        self.refusals.load(Ordering::Relaxed)
    }
}

impl Default for ToggleLibraryLock {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryLock for ToggleLibraryLock {
    fn acquire(&self) -> BackendResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            self.refusals.fetch_add(1, Ordering::Relaxed);
            return Err(BackendError::TokenUnavailable("library lock disabled".into()));
        }
        if self.held.swap(true, Ordering::SeqCst) {
            return Err(BackendError::TokenUnavailable("library lock already held".into()));
        }
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self) -> BackendResult<()> {
        if !self.held.swap(false, Ordering::SeqCst) {
            return Err(BackendError::TokenUnavailable("library lock not held".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_lock_refuses_when_disabled() {
        let lock = ToggleLibraryLock::new();
        lock.set_available(false);

        assert!(matches!(lock.acquire(), Err(BackendError::TokenUnavailable(_))));
        assert_eq!(lock.refusals(), 1);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_toggle_lock_pairs() {
        let lock = ToggleLibraryLock::new();

        lock.acquire().unwrap();
        assert!(lock.is_held());
        assert!(lock.acquire().is_err());
        lock.release().unwrap();
        assert!(lock.release().is_err());
        assert_eq!(lock.acquisitions(), 1);
    }
}

/*!
 * Object Registry
 * Arena of live async objects with explicit lifetime accounting
 */

use super::state::{Disposition, ObjectState};
use super::{AsyncObject, ObjectRef};
use crate::core::errors::VolResult;
use crate::core::id::{IdGenerator, ObjectIdGenerator};
use crate::core::types::ObjectId;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Live objects keyed by id
///
/// An object leaves the registry exactly when its reference count drains
/// to zero in a terminal status.
pub struct ObjectRegistry {
    objects: DashMap<ObjectId, ObjectRef, RandomState>,
    ids: ObjectIdGenerator,
    created: AtomicU64,
    destroyed: AtomicU64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            objects: DashMap::with_hasher(RandomState::new()),
            ids: ObjectIdGenerator::default_start(),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
        }
    }

    /// Allocate and register a new object
    pub(crate) fn allocate(
        &self,
        name: impl Into<String>,
        parent: Option<ObjectId>,
        state: ObjectState,
    ) -> ObjectRef {
        let id = self.ids.next();
        let object = Arc::new(AsyncObject::new(id, name.into(), parent, state));
        self.objects.insert(id, Arc::clone(&object));
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(object = %id, parent = ?parent, "object allocated");
        object
    }

    /// Take one reference on `object`
    pub(crate) fn take_ref(&self, object: &AsyncObject) {
        object.lock().take_ref();
    }

    /// Drop `count` references on `object`, destroying it if they were the last
    pub(crate) fn drop_refs(&self, object: &AsyncObject, count: usize) -> VolResult<Disposition> {
        let disposition = object.lock().drop_refs(object.id(), count)?;
        if disposition == Disposition::Destroy {
            self.finish_destroy(object);
        }
        Ok(disposition)
    }

    /// Complete a destruction reported by `ObjectState::drop_refs`
    ///
    /// Must be called without the object's lock held.
    pub(crate) fn finish_destroy(&self, object: &AsyncObject) {
        self.objects.remove(&object.id());
        self.destroyed.fetch_add(1, Ordering::Relaxed);
        object.notify_settled();
        debug!(object = %object.id(), status = %object.status(), "object destroyed");
    }

    pub fn get(&self, id: ObjectId) -> Option<ObjectRef> {
        self.objects.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Number of objects not yet destroyed
    pub fn live(&self) -> usize {
        self.objects.len()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn destroyed_count(&self) -> u64 {
        self.destroyed.load(Ordering::Relaxed)
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/*!
 * Property Lists
 *
 * Configuration resources handed to the underlying library alongside each
 * call (link-creation, group-creation, group-access, data-transfer lists).
 *
 * A property list is owned by exactly one task bundle once submitted and is
 * released exactly once: explicitly by the handler epilogue, or by `Drop`
 * on any path that bypasses it.
 */

use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
use crate::core::id::{IdGenerator, PlistIdGenerator};
use crate::core::types::PlistId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Property values keyed by name
pub type Properties = BTreeMap<String, String>;

/// Well-known property names understood by the bundled backends
pub mod keys {
    /// Link creation: create missing intermediate groups ("true"/"false")
    pub const CREATE_INTERMEDIATE_GROUP: &str = "create_intermediate_group";
    /// Group creation: track link creation order ("true"/"false")
    pub const TRACK_CREATION_ORDER: &str = "link_creation_order";
    /// Group creation: free-form comment stored with the group
    pub const COMMENT: &str = "comment";
}

/// Property list class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlistClass {
    LinkCreate,
    GroupCreate,
    GroupAccess,
    DataTransfer,
}

impl fmt::Display for PlistClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlistClass::LinkCreate => "lcpl",
            PlistClass::GroupCreate => "gcpl",
            PlistClass::GroupAccess => "gapl",
            PlistClass::DataTransfer => "dxpl",
        };
        f.write_str(name)
    }
}

/// Tracks every open property list
///
/// Lets the connector (and tests) verify that task bundles release their
/// configuration resources on every exit path.
pub struct PlistTracker {
    ids: PlistIdGenerator,
    open: DashMap<PlistId, PlistClass, ahash::RandomState>,
    created: AtomicU64,
    released: AtomicU64,
}

impl PlistTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ids: PlistIdGenerator::default_start(),
            open: DashMap::with_hasher(ahash::RandomState::new()),
            created: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    /// Create an empty property list of the given class
    pub fn create(self: &Arc<Self>, class: PlistClass) -> PropertyList {
        self.create_with(class, Properties::new())
    }

    /// Create a property list with initial properties
    pub fn create_with(self: &Arc<Self>, class: PlistClass, properties: Properties) -> PropertyList {
        let id = self.ids.next();
        self.open.insert(id, class);
        self.created.fetch_add(1, Ordering::Relaxed);
        trace!(plist = %id, class = %class, "property list created");

        PropertyList {
            id,
            class,
            properties,
            tracker: Arc::clone(self),
            metadata: GuardMetadata::new("plist"),
            released: false,
        }
    }

    fn on_release(&self, id: PlistId) -> GuardResult<()> {
        match self.open.remove(&id) {
            Some(_) => {
                self.released.fetch_add(1, Ordering::Relaxed);
                trace!(plist = %id, "property list released");
                Ok(())
            }
            None => Err(GuardError::NotTracked(id.to_string())),
        }
    }

    /// Number of property lists created and not yet released
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    pub fn is_open(&self, id: PlistId) -> bool {
        self.open.contains_key(&id)
    }
}

/// An owned configuration resource
pub struct PropertyList {
    id: PlistId,
    class: PlistClass,
    properties: Properties,
    tracker: Arc<PlistTracker>,
    metadata: GuardMetadata,
    released: bool,
}

impl PropertyList {
    #[inline]
    pub fn id(&self) -> PlistId {
        self.id
    }

    #[inline]
    pub fn class(&self) -> PlistClass {
        self.class
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Boolean property; anything but "true"/"1" reads as false
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true") | Some("1"))
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Copy into a new, independently released list
    pub fn duplicate(&self) -> PropertyList {
        self.tracker.create_with(self.class, self.properties.clone())
    }
}

impl fmt::Debug for PropertyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyList")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("properties", &self.properties)
            .field("released", &self.released)
            .finish()
    }
}

impl Guard for PropertyList {
    fn resource_type(&self) -> &'static str {
        "plist"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        !self.released
    }

    fn release(&mut self) -> GuardResult<()> {
        if self.released {
            return Err(GuardError::AlreadyReleased);
        }
        self.released = true;
        self.tracker.on_release(self.id)
    }
}

impl GuardDrop for PropertyList {
    fn on_drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.release() {
            warn!(plist = %self.id, error = %e, "property list release failed on drop");
        }
    }
}

impl Drop for PropertyList {
    fn drop(&mut self) {
        self.on_drop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_exactly_once() {
        let tracker = PlistTracker::new();
        let mut plist = tracker.create(PlistClass::DataTransfer);
        assert_eq!(tracker.open_count(), 1);

        assert!(plist.release().is_ok());
        assert_eq!(plist.release(), Err(GuardError::AlreadyReleased));
        drop(plist);

        assert_eq!(tracker.open_count(), 0);
        assert_eq!(tracker.released_count(), 1);
    }

    #[test]
    fn test_drop_releases() {
        let tracker = PlistTracker::new();
        {
            let _a = tracker.create(PlistClass::GroupCreate);
            let _b = tracker.create(PlistClass::GroupAccess);
            assert_eq!(tracker.open_count(), 2);
        }
        assert_eq!(tracker.open_count(), 0);
        assert_eq!(tracker.created_count(), 2);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let tracker = PlistTracker::new();
        let original = tracker
            .create(PlistClass::LinkCreate)
            .with(keys::CREATE_INTERMEDIATE_GROUP, "true");
        let copy = original.duplicate();

        assert_ne!(original.id(), copy.id());
        assert!(copy.flag(keys::CREATE_INTERMEDIATE_GROUP));

        drop(original);
        assert!(tracker.is_open(copy.id()));
    }
}

/*!
 * In-Memory Group Backend
 * Volatile namespace tree for testing and demos
 *
 * Besides the group primitives it records how many callers are inside the
 * library at once and lets tests inject failures per operation kind.
 */

mod node;

use super::traits::GroupBackend;
use super::types::*;
use crate::core::limits::DEFAULT_BACKEND_ID;
use crate::core::types::{BackendId, OpKind, UnderlyingHandle};
use crate::plist::{keys, PropertyList};
use ahash::HashMap;
use node::{GroupNode, NodeKey, ROOT_NODE};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Opcode of the `Native` optional action that echoes its arguments
pub const NATIVE_ECHO: u32 = 1;

/// Groups above this many links report dense storage
const COMPACT_MAX_LINKS: u64 = 8;

struct Namespace {
    nodes: HashMap<NodeKey, GroupNode>,
    handles: HashMap<UnderlyingHandle, NodeKey>,
    next_node: NodeKey,
    next_handle: u64,
}

impl Namespace {
    fn new() -> Self {
        let mut nodes = HashMap::default();
        nodes.insert(ROOT_NODE, GroupNode::new(Default::default()));
        Self {
            nodes,
            handles: HashMap::default(),
            next_node: ROOT_NODE + 1,
            next_handle: 1,
        }
    }

    fn issue_handle(&mut self, node: NodeKey) -> UnderlyingHandle {
        let handle = UnderlyingHandle(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(handle, node);
        handle
    }

    fn node_of(&self, handle: UnderlyingHandle) -> BackendResult<NodeKey> {
        self.handles
            .get(&handle)
            .copied()
            .ok_or(BackendError::InvalidHandle(handle))
    }

    fn node(&self, key: NodeKey) -> BackendResult<&GroupNode> {
        self.nodes
            .get(&key)
            .ok_or_else(|| BackendError::NotFound(format!("node {}", key)))
    }

    fn walk(&self, start: NodeKey, path: &str) -> BackendResult<NodeKey> {
        let mut current = start;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = self
                .node(current)?
                .child(component)
                .ok_or_else(|| BackendError::NotFound(path.to_string()))?;
        }
        Ok(current)
    }

    fn locate(&self, start: NodeKey, location: &Location) -> BackendResult<NodeKey> {
        match location {
            Location::SelfObject => Ok(start),
            Location::ByName(path) => self.walk(start, path),
            Location::ByCreationIndex(n) => self
                .node(start)?
                .links
                .get(*n as usize)
                .map(|(_, key)| *key)
                .ok_or_else(|| BackendError::NotFound(format!("creation index {}", n))),
        }
    }

    fn insert_group(&mut self, parent: NodeKey, name: &str, node: GroupNode) -> NodeKey {
        let key = self.next_node;
        self.next_node += 1;
        self.nodes.insert(key, node);
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.links.push((name.to_string(), key));
        }
        key
    }
}

/// In-memory implementation of the group primitives
pub struct MemoryBackend {
    id: BackendId,
    namespace: Mutex<Namespace>,
    faults: Mutex<HashMap<OpKind, VecDeque<BackendError>>>,
    call_delay_micros: AtomicU64,
    calls: [AtomicU64; 6],
    inside: AtomicUsize,
    max_inside: AtomicUsize,
}

/// Tracks one caller inside the library
struct EntryProbe<'a> {
    backend: &'a MemoryBackend,
}

impl<'a> EntryProbe<'a> {
    fn enter(backend: &'a MemoryBackend, kind: OpKind) -> Self {
        let now = backend.inside.fetch_add(1, Ordering::SeqCst) + 1;
        backend.max_inside.fetch_max(now, Ordering::SeqCst);
        backend.calls[kind.index()].fetch_add(1, Ordering::Relaxed);

        let delay = backend.call_delay_micros.load(Ordering::Relaxed);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }
        Self { backend }
    }
}

impl Drop for EntryProbe<'_> {
    fn drop(&mut self) {
        self.backend.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_id(BackendId(DEFAULT_BACKEND_ID))
    }

    pub fn with_id(id: BackendId) -> Self {
        Self {
            id,
            namespace: Mutex::new(Namespace::new()),
            faults: Mutex::new(HashMap::default()),
            call_delay_micros: AtomicU64::new(0),
            calls: Default::default(),
            inside: AtomicUsize::new(0),
            max_inside: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn id(&self) -> BackendId {
        self.id
    }

    /// Open a handle to the root group
    ///
    /// Stands in for the file open that precedes any group work.
    pub fn open_root(&self) -> UnderlyingHandle {
        self.namespace.lock().issue_handle(ROOT_NODE)
    }

    /// Fail the next call of `kind` with `error`
    pub fn fail_next(&self, kind: OpKind, error: BackendError) {
        self.faults.lock().entry(kind).or_default().push_back(error);
    }

    /// Sleep inside every call, widening race windows in tests
    pub fn set_call_delay(&self, delay: Duration) {
        self.call_delay_micros
            .store(delay.as_micros() as u64, Ordering::Relaxed);
    }

    /// Number of calls of `kind` that reached the library
    pub fn calls(&self, kind: OpKind) -> u64 {
        self.calls[kind.index()].load(Ordering::Relaxed)
    }

    pub fn total_calls(&self) -> u64 {
        OpKind::ALL.iter().map(|k| self.calls(*k)).sum()
    }

    /// Most callers ever observed inside the library at once
    pub fn max_concurrent_entries(&self) -> usize {
        self.max_inside.load(Ordering::SeqCst)
    }

    /// Handles issued and not yet closed
    pub fn open_handles(&self) -> usize {
        self.namespace.lock().handles.len()
    }

    /// Whether a slash-separated path exists below the root
    pub fn exists(&self, path: &str) -> bool {
        self.namespace.lock().walk(ROOT_NODE, path).is_ok()
    }

    /// Flush count of the group at `path`
    pub fn flushes(&self, path: &str) -> Option<u64> {
        let ns = self.namespace.lock();
        let key = ns.walk(ROOT_NODE, path).ok()?;
        ns.nodes.get(&key).map(|n| n.flushes)
    }

    fn check(&self, backend: BackendId, kind: OpKind) -> BackendResult<()> {
        if let Some(err) = self
            .faults
            .lock()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
        {
            debug!(op = %kind, error = %err, "injected backend failure");
            return Err(err);
        }
        if backend != self.id {
            return Err(BackendError::UnknownBackend(backend));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn group_create(
        &self,
        parent: UnderlyingHandle,
        backend: BackendId,
        args: &GroupCreateArgs,
        _dxpl: &PropertyList,
    ) -> BackendResult<UnderlyingHandle> {
        let _probe = EntryProbe::enter(self, OpKind::Create);
        self.check(backend, OpKind::Create)?;

        let mut ns = self.namespace.lock();
        let start = ns.node_of(parent)?;
        let mut current = ns.locate(start, &args.location)?;

        let components: Vec<&str> = args.name.split('/').filter(|c| !c.is_empty()).collect();
        let (leaf, intermediate) = components
            .split_last()
            .ok_or_else(|| BackendError::NotFound(args.name.clone()))?;

        let create_missing = args.lcpl.flag(keys::CREATE_INTERMEDIATE_GROUP);
        for component in intermediate {
            let existing = ns.node(current)?.child(component);
            current = match existing {
                Some(key) => key,
                None if create_missing => {
                    ns.insert_group(current, component, GroupNode::new(Default::default()))
                }
                None => return Err(BackendError::NotFound(args.name.clone())),
            };
        }

        if ns.node(current)?.child(leaf).is_some() {
            return Err(BackendError::AlreadyExists(args.name.clone()));
        }

        let key = ns.insert_group(current, leaf, GroupNode::new(args.gcpl.properties().clone()));
        Ok(ns.issue_handle(key))
    }

    fn group_open(
        &self,
        parent: UnderlyingHandle,
        backend: BackendId,
        args: &GroupOpenArgs,
        _dxpl: &PropertyList,
    ) -> BackendResult<UnderlyingHandle> {
        let _probe = EntryProbe::enter(self, OpKind::Open);
        self.check(backend, OpKind::Open)?;

        let mut ns = self.namespace.lock();
        let start = ns.node_of(parent)?;
        let base = ns.locate(start, &args.location)?;
        let key = ns.walk(base, &args.name)?;
        Ok(ns.issue_handle(key))
    }

    fn group_get(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        args: &GroupGet,
        _dxpl: &PropertyList,
    ) -> BackendResult<GroupGetOutput> {
        let _probe = EntryProbe::enter(self, OpKind::Get);
        self.check(backend, OpKind::Get)?;

        let ns = self.namespace.lock();
        let start = ns.node_of(group)?;
        match args {
            GroupGet::Info(location) => {
                let node = ns.node(ns.locate(start, location)?)?;
                let nlinks = node.links.len() as u64;
                let max_corder = if node.tracks_creation_order() {
                    nlinks as i64 - 1
                } else {
                    -1
                };
                Ok(GroupGetOutput::Info(GroupInfo {
                    storage_type: if nlinks > COMPACT_MAX_LINKS {
                        StorageType::Dense
                    } else {
                        StorageType::Compact
                    },
                    nlinks,
                    max_corder,
                    mounted: false,
                }))
            }
            GroupGet::CreationProperties => Ok(GroupGetOutput::CreationProperties(
                ns.node(start)?.properties.clone(),
            )),
        }
    }

    fn group_specific(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        args: &GroupSpecific,
        _dxpl: &PropertyList,
    ) -> BackendResult<()> {
        let _probe = EntryProbe::enter(self, OpKind::Specific);
        self.check(backend, OpKind::Specific)?;

        let mut ns = self.namespace.lock();
        let key = ns.node_of(group)?;
        match args {
            GroupSpecific::Flush => {
                if let Some(node) = ns.nodes.get_mut(&key) {
                    node.flushes += 1;
                }
                Ok(())
            }
            // Nothing is cached, so there is nothing to reload
            GroupSpecific::Refresh => Ok(()),
        }
    }

    fn group_optional(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        args: &GroupOptional,
        _dxpl: &PropertyList,
    ) -> BackendResult<OptionalOutput> {
        let _probe = EntryProbe::enter(self, OpKind::Optional);
        self.check(backend, OpKind::Optional)?;

        let ns = self.namespace.lock();
        let key = ns.node_of(group)?;
        match args {
            GroupOptional::IterateLinks => Ok(OptionalOutput::Links(
                ns.node(key)?
                    .links
                    .iter()
                    .map(|(name, _)| name.clone())
                    .collect(),
            )),
            GroupOptional::Native { opcode, args } if *opcode == NATIVE_ECHO => {
                Ok(OptionalOutput::Native(args.clone()))
            }
            GroupOptional::Native { opcode, .. } => {
                Err(BackendError::Unsupported(format!("native opcode {}", opcode)))
            }
        }
    }

    fn group_close(
        &self,
        group: UnderlyingHandle,
        backend: BackendId,
        _dxpl: &PropertyList,
    ) -> BackendResult<()> {
        let _probe = EntryProbe::enter(self, OpKind::Close);
        self.check(backend, OpKind::Close)?;

        let mut ns = self.namespace.lock();
        ns.handles
            .remove(&group)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle(group))
    }
}

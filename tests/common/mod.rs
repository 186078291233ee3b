/*!
 * Shared fixtures for connector integration tests
 */

#![allow(dead_code)]

use std::sync::Arc;
use vol_async::{
    keys, Connector, ConnectorConfig, GroupCreateArgs, GroupOpenArgs, LibraryLock, Location,
    MemoryBackend, ObjectRef, PlistClass, PropertyList, SchedulerKind,
};

pub struct Fixture {
    pub connector: Connector,
    pub backend: Arc<MemoryBackend>,
    pub root: ObjectRef,
}

impl Fixture {
    pub fn dxpl(&self) -> PropertyList {
        self.connector.plists().create(PlistClass::DataTransfer)
    }

    pub fn create_args(&self, name: &str) -> GroupCreateArgs {
        let plists = self.connector.plists();
        GroupCreateArgs {
            location: Location::SelfObject,
            name: name.to_string(),
            lcpl: plists
                .create(PlistClass::LinkCreate)
                .with(keys::CREATE_INTERMEDIATE_GROUP, "true"),
            gcpl: plists
                .create(PlistClass::GroupCreate)
                .with(keys::TRACK_CREATION_ORDER, "true"),
            gapl: plists.create(PlistClass::GroupAccess),
        }
    }

    pub fn open_args(&self, name: &str) -> GroupOpenArgs {
        GroupOpenArgs {
            location: Location::SelfObject,
            name: name.to_string(),
            gapl: self.connector.plists().create(PlistClass::GroupAccess),
        }
    }
}

pub fn config(scheduler: SchedulerKind) -> ConnectorConfig {
    ConnectorConfig {
        scheduler,
        workers: 4,
        wait_timeout_ms: 10_000,
        ..ConnectorConfig::default()
    }
}

pub fn fixture(scheduler: SchedulerKind) -> Fixture {
    fixture_with(config(scheduler), None)
}

pub fn fixture_with(config: ConnectorConfig, lock: Option<Arc<dyn LibraryLock>>) -> Fixture {
    let backend = Arc::new(MemoryBackend::new());
    let mut builder = Connector::builder()
        .with_config(config)
        .with_backend(backend.clone());
    if let Some(lock) = lock {
        builder = builder.with_library_lock(lock);
    }
    let connector = builder.build().expect("connector");
    let root = connector.attach_root(backend.open_root(), backend.id(), "/");
    Fixture {
        connector,
        backend,
        root,
    }
}

/*!
 * Connector Builder
 * Builder pattern for Connector construction
 */

use super::config::{ConnectorConfig, SchedulerKind};
use super::stats::ConnectorStats;
use super::Connector;
use crate::backend::{GroupBackend, LibraryLock, MemoryBackend, NoopLibraryLock};
use crate::core::errors::VolResult;
use crate::core::id::TaskIdGenerator;
use crate::gate::SerializationGate;
use crate::handlers::HandlerContext;
use crate::object::ObjectRegistry;
use crate::plist::PlistTracker;
use crate::scheduler::{InlineScheduler, TaskScheduler, ThreadPoolScheduler, TokioScheduler};
use crate::task::TaskLedger;
use std::sync::Arc;
use tracing::info;

/// Builder for Connector
pub struct ConnectorBuilder {
    config: ConnectorConfig,
    backend: Option<Arc<dyn GroupBackend>>,
    lock: Option<Arc<dyn LibraryLock>>,
    gate: Option<Arc<SerializationGate>>,
    scheduler: Option<Arc<dyn TaskScheduler>>,
    plists: Option<Arc<PlistTracker>>,
}

impl ConnectorBuilder {
    pub fn new() -> Self {
        Self {
            config: ConnectorConfig::default(),
            backend: None,
            lock: None,
            gate: None,
            scheduler: None,
            plists: None,
        }
    }

    pub fn with_config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Underlying library (default: a fresh `MemoryBackend`)
    pub fn with_backend(mut self, backend: Arc<dyn GroupBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Library thread-safety token (default: none needed)
    ///
    /// Ignored when a gate is supplied.
    pub fn with_library_lock(mut self, lock: Arc<dyn LibraryLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Share a gate with other connectors over the same library
    pub fn with_gate(mut self, gate: Arc<SerializationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Scheduler instance overriding `config.scheduler`
    pub fn with_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_plist_tracker(mut self, plists: Arc<PlistTracker>) -> Self {
        self.plists = Some(plists);
        self
    }

    /// Build the connector
    ///
    /// # Errors
    ///
    /// `Config` for an invalid configuration, a pool that cannot spawn, or
    /// the tokio scheduler requested outside a runtime.
    pub fn build(self) -> VolResult<Connector> {
        self.config.validate()?;

        let scheduler: Arc<dyn TaskScheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => match self.config.scheduler {
                SchedulerKind::ThreadPool => Arc::new(ThreadPoolScheduler::new(self.config.workers)?),
                SchedulerKind::Tokio => Arc::new(TokioScheduler::current()?),
                SchedulerKind::Inline => Arc::new(InlineScheduler::new()),
            },
        };

        let gate = match self.gate {
            Some(gate) => gate,
            None => {
                let lock = self.lock.unwrap_or_else(|| Arc::new(NoopLibraryLock));
                Arc::new(SerializationGate::new(lock).with_timeout(self.config.gate_timeout()))
            }
        };

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));

        info!(
            scheduler = scheduler.name(),
            backend = backend.name(),
            workers = self.config.workers,
            "connector built"
        );

        let ctx = HandlerContext {
            gate,
            backend,
            registry: Arc::new(ObjectRegistry::new()),
            stats: Arc::new(ConnectorStats::new()),
            slow_task: self.config.slow_task(),
        };

        Ok(Connector {
            ctx: Arc::new(ctx),
            scheduler,
            plists: self.plists.unwrap_or_else(PlistTracker::new),
            ledger: TaskLedger::new(),
            task_ids: TaskIdGenerator::default_start(),
            config: self.config,
        })
    }
}

impl Default for ConnectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

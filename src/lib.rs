/*!
 * VOL Async Library
 * Asynchronous group operations over a non-reentrant I/O library
 *
 * Entry points on `Connector` defer each operation to a scheduler worker
 * and return immediately. Every call into the library goes through one
 * `SerializationGate`; objects handed out before their create/open has
 * run start in `Init` and settle to `Ready` or `Error`.
 */

pub mod backend;
pub mod connector;
pub mod core;
pub mod gate;
pub mod handlers;
pub mod monitoring;
pub mod object;
pub mod plist;
pub mod scheduler;
pub mod task;

// Re-exports
pub use backend::{
    BackendError, GroupBackend, GroupCreateArgs, GroupGet, GroupGetOutput, GroupInfo,
    GroupOpenArgs, GroupOptional, GroupSpecific, LibraryLock, Location, MemoryBackend,
    NoopLibraryLock, OptionalOutput, StorageType, ToggleLibraryLock,
};
pub use connector::{Connector, ConnectorBuilder, ConnectorConfig, SchedulerKind, StatsSnapshot};
pub use self::core::errors::{VolError, VolResult};
pub use self::core::types::{BackendId, ObjectId, OpKind, TaskId, UnderlyingHandle};
pub use gate::{GateGuard, GateStats, SerializationGate};
pub use monitoring::init_tracing;
pub use object::{AsyncObject, ObjectRef, ObjectStatus};
pub use plist::{keys, PlistClass, PlistTracker, PropertyList};
pub use scheduler::{InlineScheduler, TaskScheduler, ThreadPoolScheduler, TokioScheduler};
pub use task::{Completion, CompletionMode, FreedBy, TaskHandle, TaskObserver, TaskState, Waiter};

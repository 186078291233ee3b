/*!
 * System Limits and Constants
 *
 * Centralized location for connector-wide defaults and thresholds.
 * Performance-related constants are marked with [PERF].
 */

use std::time::Duration;

// =============================================================================
// SCHEDULER
// =============================================================================

/// Default number of worker threads in the thread-pool scheduler
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Upper bound on worker threads accepted from configuration
pub const MAX_WORKER_THREADS: usize = 256;

/// Worker thread name prefix
pub const WORKER_THREAD_PREFIX: &str = "vol-async-worker";

// =============================================================================
// OBJECT LIFECYCLE
// =============================================================================

/// References held by a freshly created/opened object:
/// one for the caller's handle, one for the in-flight initialization task
pub const INITIAL_OBJECT_REFS: usize = 2;

/// References held by an attached root object (caller only)
pub const ROOT_OBJECT_REFS: usize = 1;

/// Backend identifier used when a root is attached without one
pub const DEFAULT_BACKEND_ID: u32 = 0;

// =============================================================================
// TIMEOUTS
// =============================================================================

/// Default bound on a synchronous wait for a result slot
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Handlers slower than this log a warning
/// [PERF] Long gate hold times serialize every other task behind them
pub const DEFAULT_SLOW_TASK_THRESHOLD: Duration = Duration::from_millis(10);

/*!
 * Underlying Library Interface
 *
 * The synchronous, non-reentrant group primitives the connector defers
 * work to, plus the library's thread-safety token.
 */

mod lock;
mod memory;
mod traits;
mod types;

pub use lock::{NoopLibraryLock, ToggleLibraryLock};
pub use memory::{MemoryBackend, NATIVE_ECHO};
pub use traits::{GroupBackend, LibraryLock};
pub use types::*;

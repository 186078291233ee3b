/*!
 * Core Module
 * Fundamental connector types, identifiers and error handling
 */

pub mod errors;
pub mod guard;
pub mod id;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use errors::*;
pub use guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
pub use id::{IdGenerator, ObjectIdGenerator, PlistIdGenerator, TaskIdGenerator};
pub use types::*;

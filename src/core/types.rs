/*!
 * Core Types
 * Common identifiers and handles used across the connector
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a caller-visible async object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

/// Identifier of one deferred task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

/// Identifier of a property list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlistId(pub u64);

/// Identifier of the concrete backend an object talks to
///
/// Copied from the parent into every child at create/open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(pub u32);

/// Opaque handle returned by the underlying library
///
/// Only meaningful to the backend that issued it. An async object owns
/// its handle exclusively between a successful create/open and close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnderlyingHandle(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

impl fmt::Display for PlistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plist#{}", self.0)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UnderlyingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Kind of deferred group operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Open,
    Get,
    Specific,
    Optional,
    Close,
}

impl OpKind {
    /// All operation kinds, in handler table order
    pub const ALL: [OpKind; 6] = [
        OpKind::Create,
        OpKind::Open,
        OpKind::Get,
        OpKind::Specific,
        OpKind::Optional,
        OpKind::Close,
    ];

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            OpKind::Create => "group_create",
            OpKind::Open => "group_open",
            OpKind::Get => "group_get",
            OpKind::Specific => "group_specific",
            OpKind::Optional => "group_optional",
            OpKind::Close => "group_close",
        }
    }

    /// Create and open bring a new object out of `Init`
    #[inline]
    pub const fn initializes(self) -> bool {
        matches!(self, OpKind::Create | OpKind::Open)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

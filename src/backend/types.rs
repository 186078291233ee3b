/*!
 * Backend Types
 * Typed operation payloads and library errors
 */

use crate::core::types::{BackendId, UnderlyingHandle};
use crate::plist::{Properties, PropertyList};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by the underlying library
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum BackendError {
    #[error("Link not found: {0}")]
    #[diagnostic(code(backend::not_found))]
    NotFound(String),

    #[error("Link already exists: {0}")]
    #[diagnostic(code(backend::already_exists))]
    AlreadyExists(String),

    #[error("Invalid handle: {0}")]
    #[diagnostic(code(backend::invalid_handle))]
    InvalidHandle(UnderlyingHandle),

    #[error("Unknown backend: {0}")]
    #[diagnostic(
        code(backend::unknown_backend),
        help("The object was created through a different backend.")
    )]
    UnknownBackend(BackendId),

    #[error("Unsupported operation: {0}")]
    #[diagnostic(code(backend::unsupported))]
    Unsupported(String),

    #[error("Thread-safety token unavailable: {0}")]
    #[diagnostic(code(backend::token_unavailable))]
    TokenUnavailable(String),

    #[error("Injected failure: {0}")]
    #[diagnostic(code(backend::injected))]
    Injected(String),
}

/// Result type for underlying library calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Where an operation is aimed, relative to the subject object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// The subject itself
    SelfObject,
    /// A slash-separated path below the subject
    ByName(String),
    /// The n-th link of the subject in creation order
    ByCreationIndex(u64),
}

/// Arguments of a group create
#[derive(Debug)]
pub struct GroupCreateArgs {
    pub location: Location,
    pub name: String,
    pub lcpl: PropertyList,
    pub gcpl: PropertyList,
    pub gapl: PropertyList,
}

/// Arguments of a group open
#[derive(Debug)]
pub struct GroupOpenArgs {
    pub location: Location,
    pub name: String,
    pub gapl: PropertyList,
}

/// Metadata queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupGet {
    /// Link/storage information for a group at a location
    Info(Location),
    /// A copy of the group-creation properties
    CreationProperties,
}

/// Group storage layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Compact,
    Dense,
}

/// Link and storage information for a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub storage_type: StorageType,
    pub nlinks: u64,
    /// Highest creation-order value handed out, -1 when untracked or empty
    pub max_corder: i64,
    pub mounted: bool,
}

/// Output of a metadata query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupGetOutput {
    Info(GroupInfo),
    CreationProperties(Properties),
}

/// Backend-independent group actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSpecific {
    Flush,
    Refresh,
}

/// Backend-defined group actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOptional {
    /// Link names in creation order
    IterateLinks,
    /// Raw opcode passed straight through to the backend
    Native { opcode: u32, args: Vec<u8> },
}

/// Output of an optional action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalOutput {
    Links(Vec<String>),
    Native(Vec<u8>),
}

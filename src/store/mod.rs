//! Shared key-value storage.
//!
//! The bot keeps its restart token, access grants and glue settings in a small
//! key-value store. The [`KvStore`] trait is the narrow surface the rest of
//! the crate depends on; two backends implement it:
//!
//! - [`MemoryStore`]: process-local, for tests and throwaway deployments.
//! - [`FileStore`]: a JSON document rewritten atomically on every mutation,
//!   so the restart token survives the process being restarted.
//!
//! Every operation touches a single key and is atomic with respect to other
//! operations on the same store.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use async_trait::async_trait;
use thiserror::Error;

mod document;
mod file;
mod fsync;
mod memory;

pub use document::{Document, SCHEMA_VERSION};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Fixed keys used by the bot.
pub mod keys {
    /// The single outstanding restart token.
    pub const RESTART_TOKEN: &str = "restart_token";
    /// Base URL restart links are rendered against.
    pub const DEPLOY_URL: &str = "deploy_url";
    /// Admin principal id.
    pub const ADMIN: &str = "admin";
    /// Set of granted principal ids.
    pub const USER: &str = "user";
    /// Set of URLs checked by the health probe.
    pub const ALIVE: &str = "alive";
    /// Set of edge node names.
    pub const CF_NODE: &str = "cf_node";
    /// Hash of path aliases.
    pub const PATH: &str = "path";
    /// Hash of page name to page content.
    pub const PAGE: &str = "page";
    /// Hash of node name to node address, managed over HTTP.
    pub const NODE: &str = "node";
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while reading or writing the backing file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backing document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backing document was written by an incompatible version.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },

    /// The key exists but holds a different kind of value.
    #[error("key {key:?} holds a value of another type")]
    WrongType { key: String },

    /// A blocking persistence task failed to complete.
    #[error("persistence task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Single-key atomic operations over strings, sets and hashes.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads a string value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a string value, overwriting any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes a key of any type. Returns true if it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Deletes a string key only if it still holds `expected`.
    ///
    /// Returns true if the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Adds members to a set. Returns how many were not already present.
    async fn set_add(&self, key: &str, members: &[String]) -> Result<usize>;

    /// Returns all members of a set (empty if the key is absent).
    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>>;

    /// Checks set membership.
    async fn is_member(&self, key: &str, member: &str) -> Result<bool>;

    /// Sets fields of a hash.
    async fn hash_set(&self, key: &str, entries: &[(String, String)]) -> Result<()>;

    /// Removes fields from a hash. Returns how many existed.
    async fn hash_delete(&self, key: &str, fields: &[String]) -> Result<usize>;

    /// Returns all fields of a hash (empty if the key is absent).
    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>>;
}

//! External resource store contract.
//!
//! The store is an opaque, networked key-value store keyed by name and
//! namespace. Every object carries an opaque version token; a status write
//! carrying a stale token is rejected with `Error::Conflict`. Nothing in this
//! crate caches objects across operations: every mutation re-reads first.

mod memory;
mod retry;
mod status_update;

pub use memory::InMemoryStore;
pub use retry::{retry_on_conflict, RetryPolicy};
pub use status_update::StatusUpdater;

use crate::types::{NamespacedName, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One tracked object as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource<S> {
    pub key: NamespacedName,
    /// Opaque version token captured at read time.
    pub resource_version: String,
    pub status: S,
}

/// Narrow read/write contract over the store.
#[async_trait]
pub trait ResourceStore<S>: Send + Sync + fmt::Debug
where
    S: Send + Sync + 'static,
{
    /// Read one object. Missing objects yield `Error::NotFound`.
    async fn get(&self, key: &NamespacedName) -> Result<Resource<S>>;

    /// Write the status sub-resource. Returns the stored object with its new
    /// version token, or `Error::Conflict` if the token is stale.
    async fn update_status(&self, resource: &Resource<S>) -> Result<Resource<S>>;
}

/// Store handle with schemaless status, as handed to controllers.
pub type DynamicStore = Arc<dyn ResourceStore<serde_json::Value>>;

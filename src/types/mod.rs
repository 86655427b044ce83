//! Core types for the operator.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (IdentityScope, NamespacedName, HolderId)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration surface (mode, identity scopes, namespaces, restart policy)

mod config;
mod errors;
mod ids;

pub use config::{Config, DebugConfig, Mode, SupervisorConfig, DEFAULT_API_GROUP};
pub use errors::{Error, Result};
pub use ids::{HolderId, IdentityScope, NamespacedName};

//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the operator core.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration (fatal at startup).
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure constructing a job's infrastructure.
    #[error("build error: {0}")]
    Build(String),

    /// Type registration failure while assembling a scheme.
    #[error("scheme error: {0}")]
    Scheme(String),

    /// Malformed listen address.
    #[error("invalid address: {0}")]
    Address(String),

    /// Tracked object does not exist in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency conflict: the stored version advanced since the read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Lease could not be acquired or was lost.
    #[error("leader election error: {0}")]
    LeaderElection(String),

    /// Internal errors, including panics recovered at a worker boundary.
    #[error("internal error: {0}")]
    Internal(String),

    /// Long-running infrastructure stopped without being asked to.
    #[error("unexpected exit: {0}")]
    UnexpectedExit(String),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the error is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// True when the tracked object was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

// Convenience constructors
impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    pub fn scheme(msg: impl Into<String>) -> Self {
        Self::Scheme(msg.into())
    }

    pub fn address(msg: impl Into<String>) -> Self {
        Self::Address(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn leader_election(msg: impl Into<String>) -> Self {
        Self::LeaderElection(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn unexpected_exit(msg: impl Into<String>) -> Self {
        Self::UnexpectedExit(msg.into())
    }
}

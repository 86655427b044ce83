//! Worker supervision: restart loop, backoff policy and panic boundary.

pub mod backoff;
pub mod pool;
mod recovery;

pub use pool::{ExitReason, Pool, WorkerPhase, WorkerSnapshot};
pub use recovery::{with_recovery, with_recovery_async};

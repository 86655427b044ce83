//! Debug-only runnables that fail or panic after a delay.
//!
//! Wired into built managers when the corresponding debug settings are
//! present, to exercise the restart path of a live process.

use super::controller::Runnable;
use crate::types::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Return an error.
    Fail,
    /// Panic inside the runnable.
    Panic,
}

#[derive(Debug)]
pub struct FaultInjector {
    name: String,
    kind: FaultKind,
    after: Duration,
}

impl FaultInjector {
    pub fn new(job: &str, kind: FaultKind, after: Duration) -> Self {
        Self {
            name: format!("fault-injector[{job}]"),
            kind,
            after,
        }
    }
}

#[async_trait]
impl Runnable for FaultInjector {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::panic)]
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => Ok(()),
            _ = tokio::time::sleep(self.after) => match self.kind {
                FaultKind::Fail => Err(Error::internal(format!(
                    "debug: forced runtime failure ({}) after {:?}",
                    self.name, self.after
                ))),
                FaultKind::Panic => panic!("debug: forced panic in {}", self.name),
            },
        }
    }
}

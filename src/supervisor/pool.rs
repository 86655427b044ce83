//! Job supervisor.
//!
//! The pool launches one worker per (job, identity scope) and keeps it alive
//! until the process-wide scope is cancelled. Each worker loops through
//! check-cancel, build, run and backoff:
//!
//! ```text
//!   ┌─► cancelled? ──yes──► exit
//!   │       │ no
//!   │   applicable? ──no──► exit (never restarted)
//!   │       │
//!   │     build ──nothing to run──► exit (never restarted)
//!   │       │ exec
//!   │      run ──attempt scope cancelled──► exit
//!   │       │ returned (ok or error)
//!   └── backoff (interruptible)
//! ```
//!
//! Build errors, exec errors, clean exec returns and panics are all retried.

use super::backoff;
use super::recovery::{with_recovery, with_recovery_async};
use crate::jobs::{default_jobs, BuildContext, Job};
use crate::runtime::ControllerFactory;
use crate::types::{Config, Error, IdentityScope, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Why a worker stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The process-wide scope was cancelled.
    Cancelled,
    /// The job does not apply to this configuration.
    NotApplicable,
    /// The job built nothing to run in this scope.
    NothingToRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "reason")]
pub enum WorkerPhase {
    Pending,
    Building,
    Running,
    BackingOff,
    Exited(ExitReason),
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub job: String,
    pub scope: String,
    /// Attempts started, cumulative over the worker's lifetime.
    pub attempts: u32,
    /// Backoff sleeps started.
    pub backoffs: u32,
    pub phase: WorkerPhase,
    pub last_error: Option<String>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct WorkerStatus(Mutex<WorkerSnapshot>);

impl WorkerStatus {
    fn new(job: &str, scope: &IdentityScope) -> Self {
        Self(Mutex::new(WorkerSnapshot {
            job: job.to_string(),
            scope: scope.to_string(),
            attempts: 0,
            backoffs: 0,
            phase: WorkerPhase::Pending,
            last_error: None,
            last_failure_at: None,
        }))
    }

    fn update(&self, f: impl FnOnce(&mut WorkerSnapshot)) {
        let mut snapshot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut snapshot);
    }

    fn snapshot(&self) -> WorkerSnapshot {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Result of one attempt.
#[derive(Debug)]
enum Outcome {
    Exit(ExitReason),
    Failed(Error),
}

/// Restart loop for one (job, scope) pair.
struct Worker {
    job: Arc<dyn Job>,
    scope: IdentityScope,
    config: Arc<Config>,
    factory: Arc<dyn ControllerFactory>,
    cancel: CancellationToken,
    status: Arc<WorkerStatus>,
}

impl Worker {
    async fn run(self) {
        let mut attempt: u32 = 0;
        let reason = loop {
            if self.cancel.is_cancelled() {
                break ExitReason::Cancelled;
            }
            attempt = attempt.saturating_add(1);
            self.status.update(|s| {
                s.attempts = attempt;
                s.phase = WorkerPhase::Building;
            });

            let error = match self.attempt(attempt).await {
                Outcome::Exit(reason) => break reason,
                Outcome::Failed(e) => e,
            };
            match &error {
                Error::UnexpectedExit(_) => {
                    tracing::warn!("worker_unexpected_exit: attempt={}, error={}", attempt, error)
                }
                _ => tracing::error!("worker_attempt_failed: attempt={}, error={}", attempt, error),
            }
            self.status.update(|s| {
                s.last_error = Some(error.to_string());
                s.last_failure_at = Some(Utc::now());
            });

            if self.cancel.is_cancelled() {
                break ExitReason::Cancelled;
            }
            let wait = backoff::delay_with_base(
                attempt,
                self.config.supervisor.backoff_base,
                self.config.supervisor.backoff_ceiling,
            );
            self.status.update(|s| {
                s.backoffs += 1;
                s.phase = WorkerPhase::BackingOff;
            });
            tracing::info!("worker_backoff: attempt={}, delay={:?}", attempt, wait);
            tokio::select! {
                _ = self.cancel.cancelled() => break ExitReason::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }
        };

        self.status.update(|s| s.phase = WorkerPhase::Exited(reason));
        tracing::info!("worker_exited: reason={:?}, attempts={}", reason, attempt);
    }

    /// One check-build-run pass. The attempt's scope is cancelled on every
    /// return path.
    async fn attempt(&self, attempt: u32) -> Outcome {
        let attempt_cancel = self.cancel.child_token();
        let _release = attempt_cancel.clone().drop_guard();
        let name = self.job.name();

        match with_recovery(|| Ok(self.job.is_applicable(&self.config)), name) {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!("worker_not_applicable: skipping");
                return Outcome::Exit(ExitReason::NotApplicable);
            }
            Err(e) => return Outcome::Failed(e),
        }

        let ctx = BuildContext {
            cancel: attempt_cancel.clone(),
            config: self.config.clone(),
            scope: self.scope.clone(),
            factory: self.factory.clone(),
        };
        let exec = match with_recovery_async(self.job.build(ctx), name).await {
            Ok(Some(exec)) => exec,
            Ok(None) => {
                tracing::info!("worker_nothing_to_run: attempt={}", attempt);
                return Outcome::Exit(ExitReason::NothingToRun);
            }
            Err(e) => return Outcome::Failed(e),
        };

        self.status.update(|s| s.phase = WorkerPhase::Running);
        tracing::info!("worker_running: attempt={}", attempt);
        let result = with_recovery_async(exec, name).await;

        if attempt_cancel.is_cancelled() {
            if let Err(e) = result {
                tracing::debug!("worker_exec_error_after_cancel: error={}", e);
            }
            return Outcome::Exit(ExitReason::Cancelled);
        }
        match result {
            Ok(()) => Outcome::Failed(Error::unexpected_exit(format!(
                "{name} returned without being cancelled"
            ))),
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Supervises a fixed job list across the configured identity scopes.
#[derive(Debug)]
pub struct Pool {
    config: Arc<Config>,
    cancel: CancellationToken,
    jobs: Vec<Arc<dyn Job>>,
    factory: Arc<dyn ControllerFactory>,
    tracker: TaskTracker,
    workers: Mutex<Vec<Arc<WorkerStatus>>>,
    started: AtomicBool,
}

impl Pool {
    pub fn new(
        config: Arc<Config>,
        cancel: CancellationToken,
        jobs: Vec<Arc<dyn Job>>,
        factory: Arc<dyn ControllerFactory>,
    ) -> Self {
        Self {
            config,
            cancel,
            jobs,
            factory,
            tracker: TaskTracker::new(),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Pool over [`default_jobs`].
    pub fn with_default_jobs(
        config: Arc<Config>,
        cancel: CancellationToken,
        factory: Arc<dyn ControllerFactory>,
    ) -> Self {
        Self::new(config, cancel, default_jobs(), factory)
    }

    /// Launch one worker per job per configured scope and return.
    ///
    /// Must be called from within a Tokio runtime, at most once.
    pub fn start(&self) -> Result<()> {
        let scopes = self.config.scopes()?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::internal("pool already started"));
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for job in &self.jobs {
            for scope in &scopes {
                let status = Arc::new(WorkerStatus::new(job.name(), scope));
                workers.push(status.clone());

                let worker = Worker {
                    job: job.clone(),
                    scope: scope.clone(),
                    config: self.config.clone(),
                    factory: self.factory.clone(),
                    cancel: self.cancel.clone(),
                    status,
                };
                let span = tracing::info_span!("worker", job = job.name(), scope = %scope);
                tracing::info!("worker_started: job={}, scope={}", job.name(), scope);
                self.tracker.spawn(worker.run().instrument(span));
            }
        }
        self.tracker.close();

        tracing::info!(
            "pool_started: workers={}, scopes={}",
            workers.len(),
            scopes.len()
        );
        Ok(())
    }

    /// Block until every launched worker has exited. Returns at once when
    /// the pool was never started.
    pub async fn wait(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        self.tracker.wait().await;
    }

    /// Number of launched workers.
    pub fn len(&self) -> usize {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of every launched worker, in launch order.
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|w| w.snapshot())
            .collect()
    }
}

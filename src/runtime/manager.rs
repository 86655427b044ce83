//! Controller runtime instance built by each job.
//!
//! A manager owns its scheme, store connection, controllers and endpoints.
//! `start` serves probes and metrics, waits for leadership when election is
//! enabled, then runs every registered runnable until the scope is cancelled
//! or the first one fails.

use super::controller::{Connection, ControllerContext, ReconcileState, Runnable};
use super::leader::{LeaderElector, LeaseTimings};
use super::namespaces::WatchNamespaces;
use super::probes::{self, Check, ProbeResponder};
use super::scheme::Scheme;
use crate::supervisor::with_recovery_async;
use crate::types::{Error, HolderId, IdentityScope, NamespacedName, Result};
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Construction options for one manager.
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Job name, used in logs and metric labels.
    pub name: String,
    pub scope: IdentityScope,
    pub scheme: Arc<Scheme>,
    pub namespaces: WatchNamespaces,
    pub operator_namespace: String,
    /// Admission webhook port. Webhooks are served elsewhere; the port is
    /// reserved per instance so scopes never collide.
    pub webhook_port: u16,
    pub metrics_addr: String,
    pub probe_addr: String,
    pub leader_election: bool,
    pub leader_election_namespace: String,
    pub leader_election_id: String,
    pub lease: LeaseTimings,
}

#[derive(Debug, Default)]
struct ManagerState {
    leader: AtomicBool,
    runnables: AtomicUsize,
}

/// `/metrics` in Prometheus text format.
#[derive(Debug)]
struct Metrics {
    name: String,
    scope: String,
    state: Arc<ManagerState>,
}

impl Metrics {
    fn render(&self) -> String {
        let labels = format!("manager=\"{}\",scope=\"{}\"", self.name, self.scope);
        let leader = u8::from(self.state.leader.load(Ordering::SeqCst));
        let runnables = self.state.runnables.load(Ordering::SeqCst);

        let mut body = String::new();
        let _ = writeln!(body, "# TYPE operator_manager_up gauge");
        let _ = writeln!(body, "operator_manager_up{{{labels}}} 1");
        let _ = writeln!(body, "# TYPE operator_manager_leader gauge");
        let _ = writeln!(body, "operator_manager_leader{{{labels}}} {leader}");
        let _ = writeln!(body, "# TYPE operator_manager_runnables gauge");
        let _ = writeln!(body, "operator_manager_runnables{{{labels}}} {runnables}");
        body
    }

    fn router(self) -> Router {
        Router::new()
            .route("/metrics", get(render_metrics))
            .with_state(Arc::new(self))
    }
}

async fn render_metrics(State(metrics): State<Arc<Metrics>>) -> String {
    metrics.render()
}

#[derive(Debug)]
pub struct Manager {
    options: ManagerOptions,
    connection: Connection,
    holder: HolderId,
    runnables: Vec<Arc<dyn Runnable>>,
    probes: ProbeResponder,
    state: Arc<ManagerState>,
}

impl Manager {
    pub fn new(options: ManagerOptions, connection: Connection) -> Self {
        Self {
            options,
            connection,
            holder: HolderId::new(),
            runnables: Vec::new(),
            probes: ProbeResponder::default(),
            state: Arc::new(ManagerState::default()),
        }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    /// Context for a controller hosted by this manager, with its own fresh
    /// reconcile bookkeeping.
    pub fn controller_context(&self) -> ControllerContext {
        ControllerContext {
            scope: self.options.scope.clone(),
            scheme: self.options.scheme.clone(),
            namespaces: self.options.namespaces.clone(),
            operator_namespace: self.options.operator_namespace.clone(),
            store: self.connection.store.clone(),
            state: Arc::new(Mutex::new(ReconcileState::default())),
        }
    }

    pub fn add(&mut self, runnable: Arc<dyn Runnable>) {
        self.runnables.push(runnable);
    }

    pub fn runnables(&self) -> impl Iterator<Item = &Arc<dyn Runnable>> {
        self.runnables.iter()
    }

    pub fn add_healthz_check(&mut self, name: &str, check: Check) -> Result<()> {
        self.probes.healthz.add(name, check)
    }

    pub fn add_readyz_check(&mut self, name: &str, check: Check) -> Result<()> {
        self.probes.readyz.add(name, check)
    }

    pub fn lease_key(&self) -> NamespacedName {
        NamespacedName::new(
            self.options.leader_election_id.clone(),
            self.options.leader_election_namespace.clone(),
        )
    }

    /// Run until `cancel` fires or a runnable fails.
    ///
    /// Returns `Ok(())` once everything has stopped without error, which
    /// normally means `cancel` fired.
    pub async fn start(self, cancel: CancellationToken) -> Result<()> {
        let lease = self.lease_key();
        let Manager {
            options,
            connection,
            holder,
            runnables,
            probes: probe_responder,
            state,
        } = self;

        tracing::info!(
            "manager_starting: manager={}, scope={}, namespaces={}, webhook_port={}, leader_election={}",
            options.name,
            options.scope,
            options.namespaces,
            options.webhook_port,
            options.leader_election,
        );

        let run_cancel = cancel.child_token();
        let _stop_on_exit = run_cancel.clone().drop_guard();
        // Endpoints and lease renewal live as long as the runnables do.
        let mut endpoints: JoinSet<Result<()>> = JoinSet::new();

        if let Some(listener) = probes::bind(&options.probe_addr).await? {
            endpoints.spawn(probes::serve(
                listener,
                probe_responder.router(),
                run_cancel.clone(),
            ));
        }
        if let Some(listener) = probes::bind(&options.metrics_addr).await? {
            let metrics = Metrics {
                name: options.name.clone(),
                scope: options.scope.to_string(),
                state: state.clone(),
            };
            endpoints.spawn(probes::serve(listener, metrics.router(), run_cancel.clone()));
        }

        if options.leader_election {
            let elected =
                acquire_leadership(&connection.elector, &lease, &holder, &options.lease, &cancel)
                    .await;
            if !elected {
                run_cancel.cancel();
                while endpoints.join_next().await.is_some() {}
                return Ok(());
            }
            endpoints.spawn(renew_lease(
                connection.elector.clone(),
                lease.clone(),
                holder.clone(),
                options.lease.clone(),
                run_cancel.clone(),
            ));
        }
        state.leader.store(true, Ordering::SeqCst);
        state.runnables.store(runnables.len(), Ordering::SeqCst);

        let mut workers: JoinSet<Result<()>> = JoinSet::new();
        for runnable in runnables {
            let token = run_cancel.clone();
            workers.spawn(async move {
                let name = runnable.name().to_string();
                with_recovery_async(runnable.run(token), &name).await
            });
        }

        let mut first_error: Option<Error> = None;
        loop {
            if workers.is_empty() && !run_cancel.is_cancelled() {
                tracing::info!("manager_runnables_finished: manager={}", options.name);
                run_cancel.cancel();
            }
            let joined = tokio::select! {
                Some(joined) = workers.join_next() => joined,
                Some(joined) = endpoints.join_next() => joined,
                else => break,
            };
            let result =
                joined.unwrap_or_else(|e| Err(Error::internal(format!("task aborted: {e}"))));
            if let Err(e) = result {
                if first_error.is_none() {
                    tracing::error!(
                        "manager_runnable_failed: manager={}, error={}",
                        options.name,
                        e
                    );
                    run_cancel.cancel();
                    first_error = Some(e);
                } else {
                    tracing::debug!("manager_runnable_failed_during_stop: error={}", e);
                }
            }
        }

        state.leader.store(false, Ordering::SeqCst);
        if options.leader_election {
            if let Err(e) = connection.elector.release(&lease, &holder).await {
                tracing::warn!("lease_release_failed: lease={}, error={}", lease, e);
            }
        }

        tracing::info!(
            "manager_stopped: manager={}, scope={}",
            options.name,
            options.scope
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Block until the lease is held. Returns `false` if cancelled first.
async fn acquire_leadership(
    elector: &Arc<dyn LeaderElector>,
    lease: &NamespacedName,
    holder: &HolderId,
    timings: &LeaseTimings,
    cancel: &CancellationToken,
) -> bool {
    loop {
        match elector.try_acquire(lease, holder, timings.lease_duration).await {
            Ok(true) => {
                tracing::info!("leader_elected: lease={}, holder={}", lease, holder);
                return true;
            }
            Ok(false) => tracing::debug!("leader_election_waiting: lease={}", lease),
            Err(e) => tracing::warn!("leader_election_error: lease={}, error={}", lease, e),
        }
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(timings.retry_period) => {}
        }
    }
}

/// Keep the lease renewed; losing it is fatal to the manager.
async fn renew_lease(
    elector: Arc<dyn LeaderElector>,
    lease: NamespacedName,
    holder: HolderId,
    timings: LeaseTimings,
    cancel: CancellationToken,
) -> Result<()> {
    let mut last_renewed = Instant::now();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(timings.retry_period) => {}
        }
        match elector.try_acquire(&lease, &holder, timings.lease_duration).await {
            Ok(true) => last_renewed = Instant::now(),
            Ok(false) => {
                return Err(Error::leader_election(format!("lease {lease} lost")));
            }
            Err(e) => {
                tracing::warn!("lease_renew_error: lease={}, error={}", lease, e);
                if last_renewed.elapsed() > timings.renew_deadline {
                    return Err(Error::leader_election(format!(
                        "failed to renew lease {lease} within {:?}",
                        timings.renew_deadline
                    )));
                }
            }
        }
    }
}

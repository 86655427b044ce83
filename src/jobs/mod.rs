//! Supervised units of work.
//!
//! A [`Job`] is a stateless descriptor. Workers ask it whether it applies to
//! the configuration, then build it once per attempt. Building produces an
//! [`Exec`]: the future that runs the job's controller runtime until its
//! scope is cancelled or it fails.
//!
//! Four variants exist, one per controller family:
//!
//! | Job            | Runs when                              | Webhook port |
//! |----------------|----------------------------------------|--------------|
//! | [`KafkaJob`]     | mode set, primary scope only           | 9443         |
//! | [`AkhqJob`]      | mode not `kafka`, collect namespace set | 9542         |
//! | [`KmmJob`]       | mode `kafka-service`                   | 9642         |
//! | [`KafkaUserJob`] | mode set                               | 9742         |

mod akhq;
mod kafka;
mod kafka_user;
mod kmm;
pub mod scoping;

pub use akhq::AkhqJob;
pub use kafka::KafkaJob;
pub use kafka_user::KafkaUserJob;
pub use kmm::KmmJob;

use crate::runtime::probes;
use crate::runtime::{
    ControllerFactory, ControllerKind, FaultInjector, FaultKind, LeaseTimings, Manager,
    ManagerOptions, Scheme, WatchNamespaces,
};
use crate::types::{Config, Error, IdentityScope, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A built job, ready to run. Resolves when the runtime stops.
pub type Exec = BoxFuture<'static, Result<()>>;

/// Inputs to one build attempt.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The attempt's own scope; cancelled when the attempt ends.
    pub cancel: CancellationToken,
    pub config: Arc<Config>,
    pub scope: IdentityScope,
    pub factory: Arc<dyn ControllerFactory>,
}

impl BuildContext {
    /// True when building outside the primary identity scope.
    pub fn is_secondary(&self) -> bool {
        self.config.is_secondary(&self.scope)
    }
}

#[async_trait]
pub trait Job: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Whether the job should run at all under `config`. Must be cheap and
    /// free of side effects.
    fn is_applicable(&self, config: &Config) -> bool;

    /// Construct the job's runtime for one attempt.
    ///
    /// `Ok(None)` means there is nothing to run in this scope and the worker
    /// must not restart. Errors are build failures and are retried.
    async fn build(&self, ctx: BuildContext) -> Result<Option<Exec>>;
}

/// The fixed job list, in launch order.
pub fn default_jobs() -> Vec<Arc<dyn Job>> {
    vec![
        Arc::new(KafkaJob),
        Arc::new(AkhqJob),
        Arc::new(KmmJob),
        Arc::new(KafkaUserJob),
    ]
}

/// Per-variant shape of the manager a job builds.
#[derive(Debug, Clone)]
pub(crate) struct Blueprint {
    pub name: &'static str,
    /// Webhook port in the primary scope.
    pub webhook_port: u16,
    pub metrics_addr: String,
    pub probe_addr: String,
    pub namespaces: WatchNamespaces,
    /// First segment of the leader-election id.
    pub lease_prefix: String,
    pub controllers: Vec<ControllerKind>,
    pub faults: Vec<(FaultKind, Duration)>,
}

/// Build a manager for `blueprint` in the context's identity scope.
///
/// Secondary scopes get their own scheme under the scope's group and shifted
/// listening ports.
pub(crate) async fn build_manager(ctx: &BuildContext, blueprint: Blueprint) -> Result<Manager> {
    let secondary = ctx.is_secondary();
    let config = &ctx.config;

    let scheme = Scheme::for_scope(&ctx.scope)
        .map_err(|e| Error::build(format!("{}: scheme for {}: {e}", blueprint.name, ctx.scope)))?;
    let scheme = Arc::new(scheme);
    let connection = ctx
        .factory
        .connect(&scheme, &ctx.scope)
        .await
        .map_err(|e| Error::build(format!("{}: unable to connect: {e}", blueprint.name)))?;

    let options = ManagerOptions {
        name: blueprint.name.to_string(),
        scope: ctx.scope.clone(),
        scheme,
        namespaces: blueprint.namespaces,
        operator_namespace: config.operator_namespace.clone(),
        webhook_port: scoping::scoped_port(blueprint.webhook_port, secondary),
        metrics_addr: scoping::scoped_addr(&blueprint.metrics_addr, secondary)?,
        probe_addr: scoping::scoped_addr(&blueprint.probe_addr, secondary)?,
        leader_election: config.enable_leader_election,
        leader_election_namespace: config.operator_namespace.clone(),
        leader_election_id: format!(
            "{}.{}.{}",
            blueprint.lease_prefix, config.operator_namespace, ctx.scope
        ),
        lease: LeaseTimings::default(),
    };
    let mut manager = Manager::new(options, connection);

    for kind in blueprint.controllers {
        let controller = ctx
            .factory
            .controller(kind, manager.controller_context())
            .map_err(|e| Error::build(format!("unable to create controller {kind}: {e}")))?;
        manager.add(controller);
    }
    for (kind, after) in blueprint.faults {
        tracing::warn!(
            "fault_injection_enabled: job={}, kind={:?}, after={:?}",
            blueprint.name,
            kind,
            after
        );
        manager.add(Arc::new(FaultInjector::new(blueprint.name, kind, after)));
    }

    manager.add_healthz_check("healthz", probes::ping())?;
    manager.add_readyz_check("readyz", probes::ping())?;
    Ok(manager)
}

/// Exec that runs `manager` until `cancel` fires.
pub(crate) fn run_manager(manager: Manager, cancel: CancellationToken) -> Exec {
    Box::pin(async move {
        tracing::info!(
            "manager_run: job={}, scope={}",
            manager.options().name,
            manager.options().scope
        );
        manager.start(cancel).await
    })
}

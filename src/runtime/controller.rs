//! Seam between built managers and the reconciliation logic they host.
//!
//! Reconcilers live outside this crate. A [`ControllerFactory`] connects a
//! manager to the external store and hands back one [`Runnable`] per
//! registered [`ControllerKind`].

use super::leader::{InMemoryLeaseElector, LeaderElector};
use super::namespaces::WatchNamespaces;
use super::scheme::Scheme;
use crate::store::{DynamicStore, InMemoryStore};
use crate::types::{IdentityScope, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Controllers a job may register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Kafka,
    KafkaService,
    AkhqConfig,
    KmmConfig,
    KafkaUser,
}

impl ControllerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::Kafka => "Kafka",
            ControllerKind::KafkaService => "KafkaService",
            ControllerKind::AkhqConfig => "AkhqConfig",
            ControllerKind::KmmConfig => "KmmConfig",
            ControllerKind::KafkaUser => "KafkaUser",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconcile bookkeeping owned by one built job instance.
///
/// Never shared between workers: each build creates a fresh one.
#[derive(Debug, Default)]
pub struct ReconcileState {
    /// Last applied resource version per managed object.
    pub resource_versions: HashMap<String, String>,
    /// Hash of the last applied spec per managed object.
    pub resource_hashes: HashMap<String, String>,
}

/// Everything a controller needs from the manager hosting it.
#[derive(Debug, Clone)]
pub struct ControllerContext {
    pub scope: IdentityScope,
    pub scheme: Arc<Scheme>,
    pub namespaces: WatchNamespaces,
    pub operator_namespace: String,
    pub store: DynamicStore,
    pub state: Arc<Mutex<ReconcileState>>,
}

/// A long-running component started by a manager.
#[async_trait]
pub trait Runnable: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Run until `cancel` fires (returning `Ok`) or a failure occurs.
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

/// A manager's handle to the external store.
#[derive(Debug, Clone)]
pub struct Connection {
    pub store: DynamicStore,
    pub elector: Arc<dyn LeaderElector>,
}

/// Produces store connections and controllers for built jobs.
#[async_trait]
pub trait ControllerFactory: Send + Sync + fmt::Debug {
    /// Open a connection for one manager. Failures are build errors.
    async fn connect(&self, scheme: &Scheme, scope: &IdentityScope) -> Result<Connection>;

    /// Controller for `kind`, bound to `ctx`.
    fn controller(&self, kind: ControllerKind, ctx: ControllerContext) -> Result<Arc<dyn Runnable>>;
}

/// Controller placeholder that idles until cancelled.
#[derive(Debug)]
pub struct IdleController {
    name: String,
    ctx: ControllerContext,
}

impl IdleController {
    pub fn new(kind: ControllerKind, ctx: ControllerContext) -> Self {
        Self {
            name: format!("{}[{}]", kind, ctx.scope),
            ctx,
        }
    }
}

#[async_trait]
impl Runnable for IdleController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            "controller_started: controller={}, namespaces={}",
            self.name,
            self.ctx.namespaces
        );
        cancel.cancelled().await;
        tracing::info!("controller_stopped: controller={}", self.name);
        Ok(())
    }
}

/// Process-local factory: in-memory store and leases, idle controllers.
#[derive(Debug, Default)]
pub struct StandaloneFactory {
    store: Arc<InMemoryStore<serde_json::Value>>,
    elector: Arc<InMemoryLeaseElector>,
}

impl StandaloneFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> Arc<InMemoryStore<serde_json::Value>> {
        self.store.clone()
    }

    pub fn elector(&self) -> Arc<InMemoryLeaseElector> {
        self.elector.clone()
    }
}

#[async_trait]
impl ControllerFactory for StandaloneFactory {
    async fn connect(&self, _scheme: &Scheme, _scope: &IdentityScope) -> Result<Connection> {
        Ok(Connection {
            store: self.store.clone(),
            elector: self.elector.clone(),
        })
    }

    fn controller(
        &self,
        kind: ControllerKind,
        ctx: ControllerContext,
    ) -> Result<Arc<dyn Runnable>> {
        Ok(Arc::new(IdleController::new(kind, ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_idle_controller_stops_on_cancel() {
        let factory = StandaloneFactory::new();
        let scope = IdentityScope::from_string("qubership.org".to_string()).unwrap();
        let scheme = Scheme::for_scope(&scope).unwrap();
        let connection = factory.connect(&scheme, &scope).await.unwrap();

        let ctx = ControllerContext {
            scope,
            scheme: Arc::new(scheme),
            namespaces: WatchNamespaces::Single("streaming".to_string()),
            operator_namespace: "streaming".to_string(),
            store: connection.store,
            state: Arc::new(Mutex::new(ReconcileState::default())),
        };
        let controller = factory.controller(ControllerKind::Kafka, ctx).unwrap();
        assert_eq!(controller.name(), "Kafka[qubership.org]");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { controller.run(cancel).await }
        });
        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}

//! Primary resource controller.

use super::{build_manager, run_manager, BuildContext, Blueprint, Exec, Job};
use crate::runtime::{ControllerKind, FaultKind, WatchNamespaces};
use crate::types::{Config, Error, Mode, Result};
use async_trait::async_trait;

const WEBHOOK_PORT: u16 = 9443;

/// Reconciles the Kafka (or KafkaService) resource in the operator namespace.
///
/// Runs only in the primary identity scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaJob;

impl KafkaJob {
    fn blueprint(config: &Config, mode: Mode) -> Blueprint {
        let controller = match mode {
            Mode::Kafka => ControllerKind::Kafka,
            Mode::KafkaService => ControllerKind::KafkaService,
        };
        let mut faults = Vec::new();
        if let Some(after) = config.debug.fail_after {
            faults.push((FaultKind::Fail, after));
        }
        if let Some(after) = config.debug.panic_after {
            faults.push((FaultKind::Panic, after));
        }
        Blueprint {
            name: "kafka",
            webhook_port: WEBHOOK_PORT,
            metrics_addr: config.metrics_addr.clone(),
            probe_addr: config.probe_addr.clone(),
            namespaces: WatchNamespaces::Single(config.operator_namespace.clone()),
            lease_prefix: mode.as_str().to_string(),
            controllers: vec![controller],
            faults,
        }
    }
}

#[async_trait]
impl Job for KafkaJob {
    fn name(&self) -> &'static str {
        "kafka"
    }

    fn is_applicable(&self, config: &Config) -> bool {
        config.mode.is_some()
    }

    async fn build(&self, ctx: BuildContext) -> Result<Option<Exec>> {
        let Some(mode) = ctx.config.mode else {
            return Ok(None);
        };
        if ctx.is_secondary() {
            tracing::info!("kafka_job_skipped: scope={} is not primary", ctx.scope);
            return Ok(None);
        }

        let manager = build_manager(&ctx, Self::blueprint(&ctx.config, mode)).await?;
        let cancel = ctx.cancel.clone();
        let run = run_manager(manager, cancel.clone());
        Ok(Some(Box::pin(async move {
            run.await?;
            if cancel.is_cancelled() {
                Ok(())
            } else {
                Err(Error::unexpected_exit("kafka manager stopped without cancellation"))
            }
        })))
    }
}

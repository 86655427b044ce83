//! KafkaUser controller.

use super::{build_manager, run_manager, BuildContext, Blueprint, Exec, Job};
use crate::runtime::probes::DISABLED_ADDR;
use crate::runtime::{ControllerKind, WatchNamespaces};
use crate::types::{Config, Result};
use async_trait::async_trait;

const WEBHOOK_PORT: u16 = 9742;

#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaUserJob;

impl KafkaUserJob {
    fn blueprint(config: &Config) -> Blueprint {
        Blueprint {
            name: "kafka-user",
            webhook_port: WEBHOOK_PORT,
            metrics_addr: DISABLED_ADDR.to_string(),
            probe_addr: DISABLED_ADDR.to_string(),
            namespaces: WatchNamespaces::configure(
                config.watch_namespace.as_deref().unwrap_or_default(),
                &config.operator_namespace,
            ),
            lease_prefix: "kafkauser".to_string(),
            controllers: vec![ControllerKind::KafkaUser],
            faults: Vec::new(),
        }
    }
}

#[async_trait]
impl Job for KafkaUserJob {
    fn name(&self) -> &'static str {
        "kafka-user"
    }

    fn is_applicable(&self, config: &Config) -> bool {
        config.mode.is_some()
    }

    async fn build(&self, ctx: BuildContext) -> Result<Option<Exec>> {
        let manager = build_manager(&ctx, Self::blueprint(&ctx.config)).await?;
        Ok(Some(run_manager(manager, ctx.cancel.clone())))
    }
}

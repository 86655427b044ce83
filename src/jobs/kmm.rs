//! Mirror-maker configuration controller.

use super::{build_manager, run_manager, BuildContext, Blueprint, Exec, Job};
use crate::runtime::probes::DISABLED_ADDR;
use crate::runtime::{ControllerKind, WatchNamespaces};
use crate::types::{Config, Mode, Result};
use async_trait::async_trait;

const WEBHOOK_PORT: u16 = 9642;

#[derive(Debug, Clone, Copy, Default)]
pub struct KmmJob;

#[async_trait]
impl Job for KmmJob {
    fn name(&self) -> &'static str {
        "kmm"
    }

    fn is_applicable(&self, config: &Config) -> bool {
        config.mode == Some(Mode::KafkaService)
    }

    async fn build(&self, ctx: BuildContext) -> Result<Option<Exec>> {
        let config = &ctx.config;
        let blueprint = Blueprint {
            name: "kmm",
            webhook_port: WEBHOOK_PORT,
            metrics_addr: DISABLED_ADDR.to_string(),
            probe_addr: DISABLED_ADDR.to_string(),
            namespaces: WatchNamespaces::configure(
                config.watch_namespace.as_deref().unwrap_or_default(),
                &config.operator_namespace,
            ),
            lease_prefix: "kmmconfig".to_string(),
            controllers: vec![ControllerKind::KmmConfig],
            faults: Vec::new(),
        };
        let manager = build_manager(&ctx, blueprint).await?;
        Ok(Some(run_manager(manager, ctx.cancel.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{config, context};
    use super::*;
    use crate::types::DEFAULT_API_GROUP;

    #[test]
    fn test_applicability() {
        let mut cfg = config();
        assert!(!KmmJob.is_applicable(&cfg));
        cfg.mode = Some(Mode::Kafka);
        assert!(!KmmJob.is_applicable(&cfg));
        cfg.mode = Some(Mode::KafkaService);
        assert!(KmmJob.is_applicable(&cfg));
    }

    #[tokio::test]
    async fn test_build() {
        let mut cfg = config();
        cfg.mode = Some(Mode::KafkaService);
        cfg.watch_namespace = Some("streaming".to_string());
        assert!(KmmJob.build(context(cfg, DEFAULT_API_GROUP)).await.unwrap().is_some());
    }
}

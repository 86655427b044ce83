//! AKHQ configuration collector.

use super::{build_manager, run_manager, BuildContext, Blueprint, Exec, Job};
use crate::runtime::probes::DISABLED_ADDR;
use crate::runtime::{ControllerKind, FaultKind, WatchNamespaces};
use crate::types::{Config, Mode, Result};
use async_trait::async_trait;

const WEBHOOK_PORT: u16 = 9542;

/// Collects AkhqConfig resources from the configured namespaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct AkhqJob;

impl AkhqJob {
    fn blueprint(config: &Config, collect_namespace: &str) -> Blueprint {
        Blueprint {
            name: "akhq",
            webhook_port: WEBHOOK_PORT,
            metrics_addr: DISABLED_ADDR.to_string(),
            probe_addr: DISABLED_ADDR.to_string(),
            namespaces: WatchNamespaces::configure(collect_namespace, &config.operator_namespace),
            lease_prefix: "akhqconfig".to_string(),
            controllers: vec![ControllerKind::AkhqConfig],
            faults: config
                .debug
                .akhq_fail_after
                .map(|after| (FaultKind::Fail, after))
                .into_iter()
                .collect(),
        }
    }
}

#[async_trait]
impl Job for AkhqJob {
    fn name(&self) -> &'static str {
        "akhq"
    }

    fn is_applicable(&self, config: &Config) -> bool {
        config.mode != Some(Mode::Kafka) && config.watch_akhq_collect_namespace.is_some()
    }

    async fn build(&self, ctx: BuildContext) -> Result<Option<Exec>> {
        let Some(collect_namespace) = ctx.config.watch_akhq_collect_namespace.clone() else {
            return Ok(None);
        };
        let manager = build_manager(&ctx, Self::blueprint(&ctx.config, &collect_namespace)).await?;
        Ok(Some(run_manager(manager, ctx.cancel.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{config, context};
    use super::*;

    #[test]
    fn test_applicability() {
        let mut cfg = config();
        assert!(!AkhqJob.is_applicable(&cfg));

        cfg.watch_akhq_collect_namespace = Some("kafka-a".to_string());
        assert!(AkhqJob.is_applicable(&cfg));

        cfg.mode = Some(Mode::KafkaService);
        assert!(AkhqJob.is_applicable(&cfg));

        cfg.mode = Some(Mode::Kafka);
        assert!(!AkhqJob.is_applicable(&cfg));
    }

    #[test]
    fn test_watches_union_with_own_namespace() {
        let bp = AkhqJob::blueprint(&config(), "kafka-a,kafka-b");
        assert_eq!(
            bp.namespaces,
            WatchNamespaces::Multi(vec![
                "kafka-a".to_string(),
                "kafka-b".to_string(),
                "streaming".to_string()
            ])
        );
        assert_eq!(bp.metrics_addr, DISABLED_ADDR);
        assert!(bp.faults.is_empty());
    }

    #[tokio::test]
    async fn test_secondary_scope_builds() {
        let mut cfg = config();
        cfg.watch_akhq_collect_namespace = Some("streaming".to_string());
        cfg.secondary_api_group = "netcracker.com".to_string();
        let exec = AkhqJob.build(context(cfg, "netcracker.com")).await.unwrap();
        assert!(exec.is_some());
    }
}

//! Configuration structures.
//!
//! Configuration is loaded from command-line flags with environment variable
//! fallbacks. Values are validated once at startup; a validation failure is
//! fatal and no workers are launched.

use clap::{Args, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Error, IdentityScope, Result};

/// Primary API group when none is configured.
pub const DEFAULT_API_GROUP: &str = "qubership.org";

/// Selects which primary controller variant runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Operator manages the Kafka cluster itself.
    Kafka,
    /// Operator manages the Kafka service around an existing cluster.
    KafkaService,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Kafka => "kafka",
            Mode::KafkaService => "kafka-service",
        }
    }
}

/// Global operator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "operator", about = "Supervises the operator's reconciliation jobs")]
pub struct Config {
    /// Primary controller variant; unset disables the primary controller.
    #[arg(long, env = "OPERATOR_MODE", value_enum)]
    pub mode: Option<Mode>,

    /// Primary API group (identity scope).
    #[arg(long, env = "API_GROUP", default_value = DEFAULT_API_GROUP)]
    pub api_group: String,

    /// Optional secondary API group; empty runs only the primary scope.
    #[arg(long, env = "SECONDARY_API_GROUP", default_value = "")]
    #[serde(default)]
    pub secondary_api_group: String,

    /// Namespaces (comma separated) the AKHQ collector watches.
    #[arg(long, env = "WATCH_AKHQ_COLLECT_NAMESPACE")]
    #[serde(default)]
    pub watch_akhq_collect_namespace: Option<String>,

    /// Namespaces (comma separated) watched by the user and mirror-maker
    /// controllers. Must be set; empty means cluster scope.
    #[arg(long, env = "WATCH_NAMESPACE")]
    #[serde(default)]
    pub watch_namespace: Option<String>,

    /// Namespace the operator itself runs in.
    #[arg(long, env = "OPERATOR_NAMESPACE", default_value = "")]
    pub operator_namespace: String,

    /// Gate controllers behind a leader-election lease.
    #[arg(long = "leader-elect", env = "ENABLE_LEADER_ELECTION")]
    #[serde(default)]
    pub enable_leader_election: bool,

    /// Metrics endpoint bind address ("0" disables).
    #[arg(long = "metrics-bind-address", default_value = "0.0.0.0:8080")]
    pub metrics_addr: String,

    /// Health/readiness probe bind address ("0" disables).
    #[arg(long = "health-probe-bind-address", default_value = "0.0.0.0:8081")]
    pub probe_addr: String,

    /// Supervisor restart policy.
    #[command(flatten)]
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Fault injection for exercising restarts in a live process.
    #[command(flatten)]
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: None,
            api_group: DEFAULT_API_GROUP.to_string(),
            secondary_api_group: String::new(),
            watch_akhq_collect_namespace: None,
            watch_namespace: Some(String::new()),
            operator_namespace: "default".to_string(),
            enable_leader_election: false,
            metrics_addr: "0.0.0.0:8080".to_string(),
            probe_addr: "0.0.0.0:8081".to_string(),
            supervisor: SupervisorConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Config {
    /// Check startup-critical values. Errors here are fatal.
    pub fn validate(&self) -> Result<()> {
        if self.api_group.is_empty() {
            return Err(Error::config("API_GROUP must not be empty"));
        }
        if self.operator_namespace.is_empty() {
            return Err(Error::config("OPERATOR_NAMESPACE must be set"));
        }
        if self.watch_namespace.is_none() {
            return Err(Error::config("WATCH_NAMESPACE must be set"));
        }
        if self.secondary_api_group == self.api_group {
            return Err(Error::config(format!(
                "secondary API group must differ from primary ({})",
                self.api_group
            )));
        }
        if self.supervisor.backoff_base.is_zero() {
            return Err(Error::config("backoff base must be positive"));
        }
        if self.supervisor.backoff_ceiling < self.supervisor.backoff_base {
            return Err(Error::config("backoff ceiling must not be below backoff base"));
        }
        Ok(())
    }

    /// The process's declared primary identity scope.
    pub fn primary_scope(&self) -> Result<IdentityScope> {
        IdentityScope::from_string(self.api_group.clone()).map_err(Error::config)
    }

    /// Secondary identity scope, if configured and non-empty.
    pub fn secondary_scope(&self) -> Option<IdentityScope> {
        IdentityScope::from_string(self.secondary_api_group.clone()).ok()
    }

    /// Every configured identity scope, primary first.
    pub fn scopes(&self) -> Result<Vec<IdentityScope>> {
        let mut scopes = vec![self.primary_scope()?];
        scopes.extend(self.secondary_scope());
        Ok(scopes)
    }

    /// True when `scope` is not the primary scope.
    pub fn is_secondary(&self, scope: &IdentityScope) -> bool {
        scope.as_str() != self.api_group
    }
}

/// Worker restart policy.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct SupervisorConfig {
    /// Backoff time unit: the delay before jitter after the first failure.
    #[arg(long = "backoff-base", default_value = "1s", value_parser = humantime::parse_duration)]
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    /// Upper bound on the pre-jitter backoff delay.
    #[arg(
        long = "backoff-ceiling",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    #[serde(with = "humantime_serde")]
    pub backoff_ceiling: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(30),
        }
    }
}

/// Test-only faults injected into built managers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Args)]
pub struct DebugConfig {
    /// Primary controller manager fails this long after starting.
    #[arg(
        long = "debug-fail-after",
        env = "DEBUG_FAIL_AFTER",
        hide = true,
        value_parser = humantime::parse_duration
    )]
    #[serde(default, with = "humantime_serde")]
    pub fail_after: Option<Duration>,

    /// Primary controller manager panics this long after starting.
    #[arg(
        long = "debug-panic-after",
        env = "DEBUG_PANIC_AFTER",
        hide = true,
        value_parser = humantime::parse_duration
    )]
    #[serde(default, with = "humantime_serde")]
    pub panic_after: Option<Duration>,

    /// AKHQ collector manager fails this long after starting.
    #[arg(
        long = "debug-fail-after-akhq",
        env = "DEBUG_FAIL_AFTER_AKHQ",
        hide = true,
        value_parser = humantime::parse_duration
    )]
    #[serde(default, with = "humantime_serde")]
    pub akhq_fail_after: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_missing_watch_namespace_is_fatal() {
        let config = Config {
            watch_namespace: None,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("WATCH_NAMESPACE"));
    }

    #[test]
    fn test_missing_operator_namespace_is_fatal() {
        let config = Config {
            operator_namespace: String::new(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_secondary_equal_to_primary_rejected() {
        let config = Config {
            secondary_api_group: DEFAULT_API_GROUP.to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scopes() {
        let mut config = Config::default();
        let scopes: Vec<String> = config
            .scopes()
            .unwrap()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(scopes, vec![DEFAULT_API_GROUP.to_string()]);

        config.secondary_api_group = "netcracker.com".to_string();
        let scopes: Vec<String> = config
            .scopes()
            .unwrap()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            scopes,
            vec![DEFAULT_API_GROUP.to_string(), "netcracker.com".to_string()]
        );
        assert!(config.is_secondary(&config.secondary_scope().unwrap()));
        assert!(!config.is_secondary(&config.primary_scope().unwrap()));
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::try_parse_from([
            "operator",
            "--mode",
            "kafka-service",
            "--api-group",
            "g1",
            "--secondary-api-group",
            "g2",
            "--watch-namespace",
            "a,b",
            "--operator-namespace",
            "streaming",
            "--backoff-ceiling",
            "1m",
        ])
        .unwrap();

        assert_eq!(config.mode, Some(Mode::KafkaService));
        assert_eq!(config.api_group, "g1");
        assert_eq!(config.secondary_api_group, "g2");
        assert_eq!(config.watch_namespace.as_deref(), Some("a,b"));
        assert_eq!(config.supervisor.backoff_ceiling, Duration::from_secs(60));
        assert_eq!(config.supervisor.backoff_base, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_faults_are_opt_in() {
        assert!(Config::default().debug.fail_after.is_none());

        let config = Config::try_parse_from([
            "operator",
            "--watch-namespace",
            "",
            "--operator-namespace",
            "streaming",
            "--debug-fail-after",
            "90s",
        ])
        .unwrap();
        assert_eq!(config.debug.fail_after, Some(Duration::from_secs(90)));
        assert_eq!(config.debug.panic_after, None);
    }

    #[test]
    fn test_supervisor_config_serde_humantime() {
        let json = r#"{"backoff_base":"500ms","backoff_ceiling":"10s"}"#;
        let parsed: SupervisorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.backoff_base, Duration::from_millis(500));
        assert_eq!(parsed.backoff_ceiling, Duration::from_secs(10));
    }
}

//! Watch-namespace selection for a manager.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespaces one manager's caches watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchNamespaces {
    /// Cluster scope.
    All,
    /// Exactly one namespace.
    Single(String),
    /// A multi-namespace cache over the listed namespaces.
    Multi(Vec<String>),
}

impl WatchNamespaces {
    /// Resolve the configured watch namespace against the operator's own.
    ///
    /// An empty value or one equal to `own` collapses to a single-namespace
    /// watch (empty meaning cluster scope). Anything else is read as a
    /// comma-separated list, with `own` appended when absent.
    pub fn configure(namespace: &str, own: &str) -> Self {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return WatchNamespaces::All;
        }
        if namespace == own {
            return WatchNamespaces::Single(own.to_string());
        }

        let mut namespaces: Vec<String> = Vec::new();
        for ns in namespace.split(',').map(str::trim).filter(|ns| !ns.is_empty()) {
            if !namespaces.iter().any(|known| known == ns) {
                namespaces.push(ns.to_string());
            }
        }
        if !own.is_empty() && !namespaces.iter().any(|ns| ns == own) {
            namespaces.push(own.to_string());
        }

        match namespaces.len() {
            0 => WatchNamespaces::All,
            1 => WatchNamespaces::Single(namespaces.remove(0)),
            _ => WatchNamespaces::Multi(namespaces),
        }
    }

    /// True when an object in `namespace` falls under this watch.
    pub fn contains(&self, namespace: &str) -> bool {
        match self {
            WatchNamespaces::All => true,
            WatchNamespaces::Single(ns) => ns == namespace,
            WatchNamespaces::Multi(list) => list.iter().any(|ns| ns == namespace),
        }
    }
}

impl fmt::Display for WatchNamespaces {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchNamespaces::All => write!(f, "*"),
            WatchNamespaces::Single(ns) => write!(f, "{ns}"),
            WatchNamespaces::Multi(list) => write!(f, "{}", list.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_namespace_is_cluster_scope() {
        assert_eq!(WatchNamespaces::configure("", "kafka"), WatchNamespaces::All);
        assert!(WatchNamespaces::All.contains("anything"));
    }

    #[test]
    fn test_own_namespace_collapses_to_single() {
        assert_eq!(
            WatchNamespaces::configure("kafka", "kafka"),
            WatchNamespaces::Single("kafka".to_string())
        );
    }

    #[test]
    fn test_other_namespace_watches_union() {
        let watch = WatchNamespaces::configure("akhq", "kafka");
        assert_eq!(
            watch,
            WatchNamespaces::Multi(vec!["akhq".to_string(), "kafka".to_string()])
        );
        assert!(watch.contains("kafka"));
        assert!(watch.contains("akhq"));
        assert!(!watch.contains("other"));
    }

    #[test]
    fn test_list_already_containing_own() {
        let watch = WatchNamespaces::configure("a, kafka ,b,a", "kafka");
        assert_eq!(
            watch,
            WatchNamespaces::Multi(vec!["a".to_string(), "kafka".to_string(), "b".to_string()])
        );
        assert_eq!(watch.to_string(), "a,kafka,b");
    }
}

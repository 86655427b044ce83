//! Type-registration schemes.
//!
//! A scheme records which (group, version, kind) triples a manager can decode
//! and watch. Every built manager owns its scheme: the primary scope registers
//! the operator's kinds under the primary group, and any other identity scope
//! gets a fresh copy registering the same kinds under its own group, so two
//! instances of a job in one process never share registrations.

use crate::types::{Error, IdentityScope, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Versions of the operator's own API.
pub const OPERATOR_VERSION_V1: &str = "v1";
pub const OPERATOR_VERSION_V7: &str = "v7";

/// Kinds served under `<group>/v1`.
pub const V1_KINDS: &[&str] = &["AkhqConfig", "Kafka", "KafkaUser", "KmmConfig"];

/// Kinds served under `<group>/v7`.
pub const V7_KINDS: &[&str] = &["KafkaService"];

/// Built-in kinds every manager needs (core and apps groups, leases).
const CORE_KINDS: &[(&str, &str, &[&str])] = &[
    ("", "v1", &["ConfigMap", "Secret", "Service", "Pod", "PersistentVolumeClaim", "Event"]),
    ("apps", "v1", &["Deployment", "StatefulSet"]),
    ("coordination.k8s.io", "v1", &["Lease"]),
];

/// A (group, version) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    pub fn with_kind(&self, kind: impl Into<String>) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: kind.into(),
        }
    }
}

/// A fully qualified kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Registry of kinds known to one manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scheme {
    kinds: BTreeSet<GroupVersionKind>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheme for a manager running in `scope`: built-in kinds plus the
    /// operator's kinds (and their list kinds) under the scope's group.
    pub fn for_scope(scope: &IdentityScope) -> Result<Self> {
        let mut scheme = Self::new();
        scheme.add_core_types()?;
        let v1 = GroupVersion::new(scope.as_str(), OPERATOR_VERSION_V1);
        scheme.register_with_lists(&v1, V1_KINDS)?;
        let v7 = GroupVersion::new(scope.as_str(), OPERATOR_VERSION_V7);
        scheme.register_with_lists(&v7, V7_KINDS)?;
        Ok(scheme)
    }

    /// Register the built-in kinds.
    pub fn add_core_types(&mut self) -> Result<()> {
        for (group, version, kinds) in CORE_KINDS {
            self.register(&GroupVersion::new(*group, *version), kinds)?;
        }
        Ok(())
    }

    /// Register `kinds` under `gv`. Duplicate registrations are rejected.
    pub fn register(&mut self, gv: &GroupVersion, kinds: &[&str]) -> Result<()> {
        if gv.version.is_empty() {
            return Err(Error::scheme(format!("empty version for group {:?}", gv.group)));
        }
        for kind in kinds {
            if kind.is_empty() {
                return Err(Error::scheme(format!("empty kind in {}/{}", gv.group, gv.version)));
            }
            let gvk = gv.with_kind(*kind);
            if !self.kinds.insert(gvk.clone()) {
                return Err(Error::scheme(format!("kind {} registered twice", gvk)));
            }
        }
        Ok(())
    }

    /// Register each kind together with its `<Kind>List` companion.
    pub fn register_with_lists(&mut self, gv: &GroupVersion, kinds: &[&str]) -> Result<()> {
        for kind in kinds {
            let list = format!("{kind}List");
            self.register(gv, &[*kind, list.as_str()])?;
        }
        Ok(())
    }

    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds.contains(gvk)
    }

    /// Kinds registered under `group`, across all versions.
    pub fn kinds_for_group(&self, group: &str) -> Vec<&GroupVersionKind> {
        self.kinds.iter().filter(|gvk| gvk.group == group).collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

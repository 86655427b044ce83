//! Leader election over named leases.

use crate::types::{HolderId, NamespacedName, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Lease timings, matching the usual controller defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTimings {
    /// How long a lease stays valid without renewal.
    #[serde(with = "humantime_serde")]
    pub lease_duration: Duration,
    /// How long the holder keeps trying to renew before giving up.
    #[serde(with = "humantime_serde")]
    pub renew_deadline: Duration,
    /// Interval between acquire/renew attempts.
    #[serde(with = "humantime_serde")]
    pub retry_period: Duration,
}

impl Default for LeaseTimings {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(15),
            renew_deadline: Duration::from_secs(10),
            retry_period: Duration::from_secs(2),
        }
    }
}

/// Acquires and renews leases in the external store.
#[async_trait]
pub trait LeaderElector: Send + Sync + fmt::Debug {
    /// Acquire the lease, or renew it if `holder` already owns it. Returns
    /// `false` while another holder owns an unexpired lease.
    async fn try_acquire(
        &self,
        lease: &NamespacedName,
        holder: &HolderId,
        lease_duration: Duration,
    ) -> Result<bool>;

    /// Give the lease up if `holder` owns it.
    async fn release(&self, lease: &NamespacedName, holder: &HolderId) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Lease {
    holder: HolderId,
    expires_at: Instant,
}

/// Process-local leases. Managers sharing one instance contend for leases
/// exactly as they would against the external store.
#[derive(Debug, Default)]
pub struct InMemoryLeaseElector {
    leases: Mutex<HashMap<NamespacedName, Lease>>,
}

impl InMemoryLeaseElector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of `lease`, if unexpired.
    pub async fn holder(&self, lease: &NamespacedName) -> Option<HolderId> {
        let leases = self.leases.lock().await;
        leases
            .get(lease)
            .filter(|l| l.expires_at > Instant::now())
            .map(|l| l.holder.clone())
    }
}

#[async_trait]
impl LeaderElector for InMemoryLeaseElector {
    async fn try_acquire(
        &self,
        lease: &NamespacedName,
        holder: &HolderId,
        lease_duration: Duration,
    ) -> Result<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        match leases.get_mut(lease) {
            Some(current) if &current.holder != holder && current.expires_at > now => Ok(false),
            Some(current) => {
                current.holder = holder.clone();
                current.expires_at = now + lease_duration;
                Ok(true)
            }
            None => {
                leases.insert(
                    lease.clone(),
                    Lease {
                        holder: holder.clone(),
                        expires_at: now + lease_duration,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release(&self, lease: &NamespacedName, holder: &HolderId) -> Result<()> {
        let mut leases = self.leases.lock().await;
        if leases.get(lease).is_some_and(|l| &l.holder == holder) {
            leases.remove(lease);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease() -> NamespacedName {
        NamespacedName::new("kafka.streaming.qubership.org", "streaming")
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_holder_blocked_until_expiry() {
        let elector = InMemoryLeaseElector::new();
        let (a, b) = (HolderId::new(), HolderId::new());
        let ttl = Duration::from_secs(15);

        assert!(elector.try_acquire(&lease(), &a, ttl).await.unwrap());
        assert!(!elector.try_acquire(&lease(), &b, ttl).await.unwrap());
        assert!(elector.try_acquire(&lease(), &a, ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(elector.try_acquire(&lease(), &b, ttl).await.unwrap());
        assert_eq!(elector.holder(&lease()).await, Some(b));
    }

    #[tokio::test]
    async fn test_release_frees_lease() {
        let elector = InMemoryLeaseElector::new();
        let (a, b) = (HolderId::new(), HolderId::new());
        let ttl = Duration::from_secs(15);

        elector.try_acquire(&lease(), &a, ttl).await.unwrap();
        elector.release(&lease(), &b).await.unwrap();
        assert_eq!(elector.holder(&lease()).await, Some(a.clone()));

        elector.release(&lease(), &a).await.unwrap();
        assert!(elector.holder(&lease()).await.is_none());
        assert!(elector.try_acquire(&lease(), &b, ttl).await.unwrap());
    }
}

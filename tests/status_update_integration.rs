//! Status updates against a store with concurrent writers.

use async_trait::async_trait;
use operator_core::store::{InMemoryStore, Resource, ResourceStore, RetryPolicy, StatusUpdater};
use operator_core::types::NamespacedName;
use operator_core::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
struct UserStatus {
    conditions: Vec<String>,
    observed_generation: u32,
}

/// Store where another writer slips in before the first `writes_to_race`
/// status writes.
#[derive(Debug)]
struct RacingStore {
    inner: InMemoryStore<UserStatus>,
    writes_to_race: AtomicU32,
    gets: AtomicU32,
    fail_writes: bool,
}

impl RacingStore {
    fn new(writes_to_race: u32) -> Self {
        Self {
            inner: InMemoryStore::new(),
            writes_to_race: AtomicU32::new(writes_to_race),
            gets: AtomicU32::new(0),
            fail_writes: false,
        }
    }
}

#[async_trait]
impl ResourceStore<UserStatus> for RacingStore {
    async fn get(&self, key: &NamespacedName) -> Result<Resource<UserStatus>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn update_status(&self, resource: &Resource<UserStatus>) -> Result<Resource<UserStatus>> {
        if self.fail_writes {
            return Err(Error::store("connection reset"));
        }
        let race = self
            .writes_to_race
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if race {
            let mut current = self.inner.get(&resource.key).await?;
            current.status.observed_generation += 1;
            self.inner.update_status(&current).await?;
        }
        self.inner.update_status(resource).await
    }
}

fn key() -> NamespacedName {
    NamespacedName::new("alice", "streaming")
}

#[tokio::test]
async fn test_conflict_rereads_and_reapplies() {
    let store = Arc::new(RacingStore::new(1));
    store.inner.put(key(), UserStatus::default()).await;

    let updater = StatusUpdater::new(store.clone(), key());
    let written = updater
        .update_with_retry(|status: &mut UserStatus| {
            status.conditions.push("Ready".to_string());
        })
        .await
        .unwrap();

    assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    assert_eq!(written.status.conditions, vec!["Ready".to_string()]);
    assert_eq!(written.status.observed_generation, 1);

    let stored = updater.get_status().await.unwrap();
    assert_eq!(stored, written.status);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_conflict() {
    let store = Arc::new(RacingStore::new(u32::MAX));
    store.inner.put(key(), UserStatus::default()).await;

    let updater = StatusUpdater::new(store.clone(), key()).with_policy(RetryPolicy {
        steps: 3,
        duration: Duration::from_millis(10),
        factor: 1.0,
        jitter: 0.0,
    });
    let err = updater
        .update_with_retry(|status: &mut UserStatus| status.conditions.push("Ready".to_string()))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(store.gets.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_other_store_errors_are_not_retried() {
    let store = Arc::new(RacingStore {
        fail_writes: true,
        ..RacingStore::new(0)
    });
    store.inner.put(key(), UserStatus::default()).await;

    let updater = StatusUpdater::new(store.clone(), key());
    let err = updater
        .update_with_retry(|status: &mut UserStatus| status.observed_generation = 7)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Store(_)));
    assert_eq!(store.gets.load(Ordering::SeqCst), 1);
}

//! Status sub-resource updates under optimistic concurrency.

use super::{retry_on_conflict, Resource, ResourceStore, RetryPolicy};
use crate::types::{NamespacedName, Result};
use std::fmt;
use std::sync::Arc;

/// Mutates the status of one tracked object, retrying on version conflicts.
///
/// The object's identity is captured at construction and never re-resolved.
pub struct StatusUpdater<S> {
    store: Arc<dyn ResourceStore<S>>,
    key: NamespacedName,
    policy: RetryPolicy,
}

impl<S> fmt::Debug for StatusUpdater<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusUpdater")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S> StatusUpdater<S>
where
    S: Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn ResourceStore<S>>, key: NamespacedName) -> Self {
        Self {
            store,
            key,
            policy: RetryPolicy::default(),
        }
    }

    /// Updater bound to the identity of an object already in hand.
    pub fn for_resource(store: Arc<dyn ResourceStore<S>>, resource: &Resource<S>) -> Self {
        Self::new(store, resource.key.clone())
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn key(&self) -> &NamespacedName {
        &self.key
    }

    /// Read, mutate and write back the status. On conflict the whole sequence
    /// is repeated against a fresh read, so `mutation` may run several times.
    pub async fn update_with_retry<F>(&self, mutation: F) -> Result<Resource<S>>
    where
        F: Fn(&mut S) + Send + Sync,
    {
        let store = &self.store;
        let key = &self.key;
        let mutation = &mutation;
        retry_on_conflict(&self.policy, move || async move {
            let mut resource = store.get(key).await?;
            mutation(&mut resource.status);
            store.update_status(&resource).await
        })
        .await
    }

    /// Single read of the status. A missing object yields `Error::NotFound`.
    pub async fn get_status(&self) -> Result<S> {
        Ok(self.store.get(&self.key).await?.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::Error;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct KafkaStatus {
        phase: String,
        observed: u32,
    }

    #[tokio::test]
    async fn test_update_applies_mutation() {
        let store = Arc::new(InMemoryStore::new());
        let key = NamespacedName::new("kafka", "streaming");
        store.put(key.clone(), KafkaStatus::default()).await;

        let updater = StatusUpdater::new(store.clone(), key);
        let written = updater
            .update_with_retry(|status: &mut KafkaStatus| status.phase = "Ready".to_string())
            .await
            .unwrap();

        assert_eq!(written.status.phase, "Ready");
        assert_eq!(updater.get_status().await.unwrap().phase, "Ready");
    }

    #[tokio::test]
    async fn test_get_status_not_found() {
        let store: Arc<InMemoryStore<KafkaStatus>> = Arc::new(InMemoryStore::new());
        let updater = StatusUpdater::new(store, NamespacedName::new("gone", "streaming"));

        assert!(updater.get_status().await.unwrap_err().is_not_found());
        let err = updater.update_with_retry(|_: &mut KafkaStatus| {}).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_identity_fixed_at_construction() {
        let store = Arc::new(InMemoryStore::new());
        let resource = store
            .put(NamespacedName::new("kafka", "streaming"), KafkaStatus::default())
            .await;
        let updater = StatusUpdater::for_resource(store, &resource);
        assert_eq!(updater.key(), &resource.key);
    }
}

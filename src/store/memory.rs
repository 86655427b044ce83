//! In-process store with optimistic-concurrency checks.
//!
//! Backs the standalone binary and the test suites. Version tokens are
//! monotonically increasing decimal strings shared across all objects.

use super::{Resource, ResourceStore};
use crate::types::{Error, NamespacedName, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct InMemoryStore<S> {
    objects: RwLock<HashMap<NamespacedName, Resource<S>>>,
    next_version: AtomicU64,
}

impl<S> Default for InMemoryStore<S> {
    fn default() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
        }
    }
}

impl<S> InMemoryStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> String {
        self.next_version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Insert or replace an object, assigning a fresh version.
    pub async fn put(&self, key: NamespacedName, status: S) -> Resource<S> {
        let resource = Resource {
            key: key.clone(),
            resource_version: self.bump(),
            status,
        };
        self.objects.write().await.insert(key, resource.clone());
        resource
    }

    pub async fn remove(&self, key: &NamespacedName) -> Option<Resource<S>> {
        self.objects.write().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl<S> ResourceStore<S> for InMemoryStore<S>
where
    S: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    async fn get(&self, key: &NamespacedName) -> Result<Resource<S>> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key.to_string()))
    }

    async fn update_status(&self, resource: &Resource<S>) -> Result<Resource<S>> {
        let mut objects = self.objects.write().await;
        let stored = objects
            .get_mut(&resource.key)
            .ok_or_else(|| Error::not_found(resource.key.to_string()))?;

        if stored.resource_version != resource.resource_version {
            return Err(Error::conflict(format!(
                "{}: version {} is stale, stored {}",
                resource.key, resource.resource_version, stored.resource_version
            )));
        }

        stored.status = resource.status.clone();
        stored.resource_version = self.bump();
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store: InMemoryStore<u32> = InMemoryStore::new();
        let err = store.get(&NamespacedName::new("kafka", "ns")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let store = InMemoryStore::new();
        let key = NamespacedName::new("kafka", "ns");
        let created = store.put(key.clone(), 1u32).await;

        let mut read = store.get(&key).await.unwrap();
        read.status = 2;
        let written = store.update_status(&read).await.unwrap();

        assert_eq!(written.status, 2);
        assert_ne!(written.resource_version, created.resource_version);
    }

    #[tokio::test]
    async fn test_stale_write_conflicts() {
        let store = InMemoryStore::new();
        let key = NamespacedName::new("kafka", "ns");
        store.put(key.clone(), 1u32).await;

        let first = store.get(&key).await.unwrap();
        let second = store.get(&key).await.unwrap();
        store.update_status(&first).await.unwrap();

        let err = store.update_status(&second).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.len().await, 1);
    }
}

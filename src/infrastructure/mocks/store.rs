//! Mock governance store with network-like latency.

use crate::application::ports::{GovernanceStore, StoreError};
use crate::infrastructure::storage::MemoryStore;
use async_trait::async_trait;
use std::time::Duration;

/// A [`MemoryStore`] that sleeps before every operation.
///
/// Each call behaves like a round-trip to a remote store, which widens the
/// gap between two store calls of one request enough for concurrent
/// requests to interleave.
#[derive(Debug)]
pub struct LatencyStore {
    inner: MemoryStore,
    latency: Duration,
}

impl LatencyStore {
    pub fn new(latency: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            latency,
        }
    }

    /// The wrapped store, for direct inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    async fn round_trip(&self) {
        tokio::time::sleep(self.latency).await;
    }
}

#[async_trait]
impl GovernanceStore for LatencyStore {
    async fn get(&self, key: &str, now: i64) -> Result<Option<i64>, StoreError> {
        self.round_trip().await;
        self.inner.get(key, now).await
    }

    async fn put_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        now: i64,
    ) -> Result<(), StoreError> {
        self.round_trip().await;
        self.inner.put_with_expiry(key, value, expires_at, now).await
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<i64, StoreError> {
        self.round_trip().await;
        self.inner.increment_with_expiry(key, expires_at, now).await
    }

    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        now: i64,
    ) -> Result<bool, StoreError> {
        self.round_trip().await;
        self.inner
            .insert_if_absent_with_expiry(key, value, expires_at, now)
            .await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.round_trip().await;
        self.inner.remove(key).await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        self.round_trip().await;
        self.inner.purge_expired(now).await
    }
}

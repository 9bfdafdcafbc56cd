//! In-process governance store.
//!
//! Provides concurrent, sharded storage for rate limit counters and
//! idempotency entries.

use crate::application::ports::{GovernanceStore, StoreError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One stored value and the epoch second it expires at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    value: i64,
    expires_at: i64,
}

impl Slot {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// Thread-safe sharded store backed by DashMap.
///
/// DashMap provides fine-grained per-shard locking, so counters on different
/// keys never contend. Every write runs under the entry lock of its key, which
/// makes increment and insert-if-absent atomic per key.
///
/// Expired slots are invisible to every operation and are physically removed
/// by [`purge_expired`](GovernanceStore::purge_expired).
///
/// With a capacity set, the store never holds more than `max_entries` slots.
/// A new slot claims room from an atomic slot count while its entry lock is
/// held; when the store is full, expired slots are purged once and the claim
/// is retried before failing with [`StoreError::CapacityExhausted`]. Updating
/// an existing slot never fails.
#[derive(Debug)]
pub struct MemoryStore {
    map: DashMap<String, Slot, ahash::RandomState>,
    max_entries: Option<usize>,
    /// Slots claimed by inserts and not yet removed
    slots: AtomicUsize,
}

impl MemoryStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(ahash::RandomState::new()),
            max_entries: None,
            slots: AtomicUsize::new(0),
        }
    }

    /// Create a store holding at most `max_entries` slots.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::new()
        }
    }

    /// Number of slots, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.remove_where(|_| true);
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    /// Claim room for one new slot.
    ///
    /// Touches only the slot count, never the map, so it is safe to call
    /// while an entry lock is held.
    fn try_claim(&self) -> bool {
        match self.max_entries {
            None => {
                self.slots.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(capacity) => self
                .slots
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                    (n < capacity).then_some(n + 1)
                })
                .is_ok(),
        }
    }

    /// Apply a write to the slot under `key`.
    ///
    /// An existing slot goes to `occupied`. A vacant key gets `fresh` and
    /// yields `inserted`, provided room can be claimed.
    fn upsert<T: Copy>(
        &self,
        key: &str,
        now: i64,
        fresh: Slot,
        inserted: T,
        occupied: impl Fn(&mut Slot) -> T,
    ) -> Result<T, StoreError> {
        for attempt in 0..2 {
            match self.map.entry(key.to_owned()) {
                Entry::Occupied(mut entry) => return Ok(occupied(entry.get_mut())),
                Entry::Vacant(entry) => {
                    if self.try_claim() {
                        entry.insert(fresh);
                        return Ok(inserted);
                    }
                }
            }
            // The entry lock is released here; purging visits every shard.
            if attempt == 0 {
                self.purge(now);
            }
        }

        Err(StoreError::CapacityExhausted {
            capacity: self.max_entries.unwrap_or_default(),
        })
    }

    fn purge(&self, now: i64) -> usize {
        self.remove_where(|slot| !slot.is_live(now))
    }

    fn remove_where(&self, doomed: impl Fn(&Slot) -> bool) -> usize {
        let mut removed = 0;
        self.map.retain(|_, slot| {
            let drop_slot = doomed(slot);
            if drop_slot {
                removed += 1;
            }
            !drop_slot
        });
        self.slots.fetch_sub(removed, Ordering::Relaxed);
        removed
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GovernanceStore for MemoryStore {
    async fn get(&self, key: &str, now: i64) -> Result<Option<i64>, StoreError> {
        Ok(self
            .map
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value))
    }

    async fn put_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        now: i64,
    ) -> Result<(), StoreError> {
        let slot = Slot { value, expires_at };
        self.upsert(key, now, slot, (), |existing| *existing = slot)
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<i64, StoreError> {
        let first = Slot {
            value: 1,
            expires_at,
        };
        self.upsert(key, now, first, 1, |slot| {
            if slot.is_live(now) {
                slot.value = slot.value.saturating_add(1);
            } else {
                *slot = first;
            }
            slot.value
        })
    }

    async fn insert_if_absent_with_expiry(
        &self,
        key: &str,
        value: i64,
        expires_at: i64,
        now: i64,
    ) -> Result<bool, StoreError> {
        let slot = Slot { value, expires_at };
        self.upsert(key, now, slot, true, |existing| {
            if existing.is_live(now) {
                return false;
            }
            *existing = slot;
            true
        })
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.map.remove(key).is_some() {
            self.slots.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        Ok(self.purge(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryStore::new();

        store.put_with_expiry("key1", 100, 50, 0).await.unwrap();
        store.put_with_expiry("key2", 200, 50, 0).await.unwrap();

        assert_eq!(store.get("key1", 0).await.unwrap(), Some(100));
        assert_eq!(store.get("key2", 0).await.unwrap(), Some(200));
        assert_eq!(store.get("key3", 0).await.unwrap(), None);
        assert_eq!(store.len(), 2);

        store.remove("key1").await.unwrap();
        assert_eq!(store.get("key1", 0).await.unwrap(), None);
        store.remove("key1").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_slots_are_invisible_before_purge() {
        let store = MemoryStore::new();
        store.put_with_expiry("k", 1, 10, 0).await.unwrap();

        assert_eq!(store.get("k", 9).await.unwrap(), Some(1));
        assert_eq!(store.get("k", 10).await.unwrap(), None);
        assert_eq!(store.len(), 1);

        assert_eq!(store.purge_expired(10).await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_increment_keeps_expiry_until_it_passes() {
        let store = MemoryStore::new();

        assert_eq!(store.increment_with_expiry("c", 60, 0).await.unwrap(), 1);
        assert_eq!(store.increment_with_expiry("c", 999, 30).await.unwrap(), 2);
        // Expiry from the first increment still applies.
        assert_eq!(store.increment_with_expiry("c", 120, 60).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryStore::new();

        assert!(store.insert_if_absent_with_expiry("k", 1, 10, 0).await.unwrap());
        assert!(!store.insert_if_absent_with_expiry("k", 2, 10, 5).await.unwrap());
        assert_eq!(store.get("k", 5).await.unwrap(), Some(1));

        // An expired slot counts as absent.
        assert!(store.insert_if_absent_with_expiry("k", 3, 20, 10).await.unwrap());
        assert_eq!(store.get("k", 10).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_capacity_purges_then_fails_closed() {
        let store = MemoryStore::with_max_entries(2);

        store.put_with_expiry("a", 1, 10, 0).await.unwrap();
        store.put_with_expiry("b", 1, 100, 0).await.unwrap();

        // "a" has expired, so there is room after purging.
        store.put_with_expiry("c", 1, 100, 10).await.unwrap();
        assert_eq!(store.len(), 2);

        let err = store.increment_with_expiry("d", 100, 10).await.unwrap_err();
        assert!(matches!(err, StoreError::CapacityExhausted { capacity: 2 }));

        // Existing keys can still be updated.
        assert_eq!(store.increment_with_expiry("c", 100, 10).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_capacity_is_a_hard_cap_under_concurrency() {
        let store = Arc::new(MemoryStore::with_max_entries(4));
        let mut handles = vec![];

        for i in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert_if_absent_with_expiry(&format!("k{}", i), 1, 100, 0)
                    .await
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(true) => inserted += 1,
                Ok(false) => panic!("keys are distinct"),
                Err(err) => assert!(matches!(err, StoreError::CapacityExhausted { capacity: 4 })),
            }
        }

        assert_eq!(inserted, 4);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_removal_frees_capacity() {
        let store = MemoryStore::with_max_entries(1);

        store.put_with_expiry("a", 1, 100, 0).await.unwrap();
        assert!(store.put_with_expiry("b", 1, 100, 0).await.is_err());

        store.remove("a").await.unwrap();
        store.put_with_expiry("b", 1, 100, 0).await.unwrap();

        store.clear();
        store.put_with_expiry("c", 1, 100, 0).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_exact() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let mut counts = Vec::new();
                for _ in 0..100 {
                    counts.push(store.increment_with_expiry("k", 100, 0).await.unwrap());
                }
                counts
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (1..=800).collect::<Vec<i64>>());
    }
}

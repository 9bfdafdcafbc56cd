//! Short-window duplicate suppression.
//!
//! Requests are identified by their [`Fingerprint`] (scene, address and
//! parameter keys). The send path uses a reservation protocol:
//!
//! 1. [`try_acquire`](IdempotencyGuard::try_acquire) inserts the entry only if
//!    no live one exists, atomically. Of two concurrent identical requests at
//!    most one gets a reservation.
//! 2. After a successful dispatch, [`commit`](IdempotencyGuard::commit)
//!    restarts the window from the dispatch time.
//! 3. After a failed dispatch, [`release`](IdempotencyGuard::release) removes
//!    the entry so the caller may retry within the window.
//!
//! [`check`](IdempotencyGuard::check) and [`mark`](IdempotencyGuard::mark) are
//! the non-reserving primitives, for callers that run their own protocol.

use crate::application::keys;
use crate::application::ports::{Clock, GovernanceStore, StoreError};
use crate::domain::error::SmsError;
use crate::domain::fingerprint::Fingerprint;
use crate::domain::masking::mask_address;
use crate::domain::params::SafeParams;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A live idempotency entry held by one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    key: String,
    fingerprint: Fingerprint,
    window_seconds: i64,
}

impl Reservation {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn window_seconds(&self) -> i64 {
        self.window_seconds
    }
}

/// Suppresses identical requests within a per-scene window.
pub struct IdempotencyGuard {
    store: Arc<dyn GovernanceStore>,
    clock: Arc<dyn Clock>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn GovernanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Fail if an identical request is live. No-op when `window_seconds` is 0.
    ///
    /// # Errors
    /// - `DuplicateRequest` when a live entry exists
    /// - `ClientError` when the store fails
    pub async fn check(
        &self,
        scene: &str,
        address: &str,
        params: &SafeParams,
        window_seconds: u64,
    ) -> Result<(), SmsError> {
        if window_seconds == 0 {
            return Ok(());
        }

        let key = keys::idempotency_key(scene, &Fingerprint::of_request(scene, address, params));
        let now = self.clock.now().timestamp();
        let live = self
            .store
            .get(&key, now)
            .await
            .map_err(|err| store_failure(err, scene, address))?;

        match live {
            Some(_) => Err(duplicate(scene, address)),
            None => Ok(()),
        }
    }

    /// Insert or overwrite the entry with expiry `now + window_seconds`, then
    /// sweep expired entries. No-op when `window_seconds` is 0.
    pub async fn mark(
        &self,
        scene: &str,
        address: &str,
        params: &SafeParams,
        window_seconds: u64,
    ) -> Result<(), SmsError> {
        if window_seconds == 0 {
            return Ok(());
        }

        let key = keys::idempotency_key(scene, &Fingerprint::of_request(scene, address, params));
        self.refresh(&key, window(window_seconds))
            .await
            .map_err(|err| store_failure(err, scene, address))
    }

    /// Reserve the fingerprint for one in-flight request.
    ///
    /// Returns `None` when `window_seconds` is 0.
    ///
    /// # Errors
    /// - `DuplicateRequest` when a live entry exists
    /// - `ClientError` when the store fails
    pub async fn try_acquire(
        &self,
        scene: &str,
        address: &str,
        params: &SafeParams,
        window_seconds: u64,
    ) -> Result<Option<Reservation>, SmsError> {
        if window_seconds == 0 {
            return Ok(None);
        }

        let fingerprint = Fingerprint::of_request(scene, address, params);
        let key = keys::idempotency_key(scene, &fingerprint);
        let window_seconds = window(window_seconds);
        let now = self.clock.now().timestamp();

        let inserted = self
            .store
            .insert_if_absent_with_expiry(&key, now, now.saturating_add(window_seconds), now)
            .await
            .map_err(|err| store_failure(err, scene, address))?;

        if !inserted {
            return Err(duplicate(scene, address));
        }

        Ok(Some(Reservation {
            key,
            fingerprint,
            window_seconds,
        }))
    }

    /// Confirm a reservation after a successful dispatch.
    pub async fn commit(&self, reservation: &Reservation) -> Result<(), SmsError> {
        self.refresh(&reservation.key, reservation.window_seconds)
            .await
            .map_err(SmsError::from)
    }

    /// Drop a reservation after a failed dispatch.
    pub async fn release(&self, reservation: Reservation) -> Result<(), SmsError> {
        self.store
            .remove(&reservation.key)
            .await
            .map_err(SmsError::from)?;
        debug!(fingerprint = %reservation.fingerprint, "idempotency reservation released");
        Ok(())
    }

    async fn refresh(&self, key: &str, window_seconds: i64) -> Result<(), StoreError> {
        let now = self.clock.now().timestamp();
        self.store
            .put_with_expiry(key, now, now.saturating_add(window_seconds), now)
            .await?;

        if let Err(err) = self.store.purge_expired(now).await {
            warn!(error = %err, "idempotency sweep failed");
        }
        Ok(())
    }
}

impl fmt::Debug for IdempotencyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyGuard")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

fn window(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

fn duplicate(scene: &str, address: &str) -> SmsError {
    warn!(
        scene = scene,
        address = %mask_address(address),
        "duplicate request suppressed"
    );
    SmsError::duplicate_request()
        .with_scene(scene)
        .with_address(address)
}

fn store_failure(err: StoreError, scene: &str, address: &str) -> SmsError {
    warn!(
        scene = scene,
        address = %mask_address(address),
        error = %err,
        "idempotency store unavailable"
    );
    SmsError::from(err).with_scene(scene).with_address(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;
    use crate::domain::params::filter_params;
    use crate::domain::scene::ScenePolicy;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::MemoryStore;
    use std::collections::HashMap;
    use std::time::Duration;

    fn guard(clock: &MockClock) -> IdempotencyGuard {
        IdempotencyGuard::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()))
    }

    fn params(code: &str) -> SafeParams {
        let policy = ScenePolicy::verification_code("Acme", "T", "code", 300);
        let raw: HashMap<String, String> = [("code".to_string(), code.to_string())].into();
        filter_params(&policy, &raw).unwrap()
    }

    #[tokio::test]
    async fn test_zero_window_is_noop() {
        let clock = MockClock::at_epoch(1_000);
        let guard = guard(&clock);
        let p = params("1");

        guard.mark("s", "a", &p, 0).await.unwrap();
        guard.check("s", "a", &p, 0).await.unwrap();
        assert!(guard.try_acquire("s", "a", &p, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_check_after_mark_until_window_passes() {
        let clock = MockClock::at_epoch(1_000);
        let guard = guard(&clock);
        let p = params("1");

        guard.check("s", "a", &p, 120).await.unwrap();
        guard.mark("s", "a", &p, 120).await.unwrap();

        clock.advance(Duration::from_secs(119));
        let err = guard.check("s", "a", &p, 120).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRequest);

        clock.advance(Duration::from_secs(1));
        guard.check("s", "a", &p, 120).await.unwrap();
    }

    #[tokio::test]
    async fn test_value_blind() {
        let clock = MockClock::at_epoch(1_000);
        let guard = guard(&clock);

        guard.mark("s", "a", &params("111111"), 120).await.unwrap();
        let err = guard
            .check("s", "a", &params("222222"), 120)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRequest);
    }

    #[tokio::test]
    async fn test_second_acquire_is_duplicate() {
        let clock = MockClock::at_epoch(1_000);
        let guard = guard(&clock);
        let p = params("1");

        let reservation = guard.try_acquire("s", "a", &p, 60).await.unwrap();
        assert!(reservation.is_some());

        let err = guard.try_acquire("s", "a", &p, 60).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateRequest);
    }

    #[tokio::test]
    async fn test_release_allows_retry() {
        let clock = MockClock::at_epoch(1_000);
        let guard = guard(&clock);
        let p = params("1");

        let reservation = guard.try_acquire("s", "a", &p, 60).await.unwrap().unwrap();
        guard.release(reservation).await.unwrap();

        assert!(guard.try_acquire("s", "a", &p, 60).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_commit_restarts_window() {
        let clock = MockClock::at_epoch(1_000);
        let guard = guard(&clock);
        let p = params("1");

        let reservation = guard.try_acquire("s", "a", &p, 60).await.unwrap().unwrap();
        clock.advance(Duration::from_secs(30));
        guard.commit(&reservation).await.unwrap();

        clock.advance(Duration::from_secs(59));
        assert!(guard.check("s", "a", &p, 60).await.is_err());

        clock.advance(Duration::from_secs(1));
        assert!(guard.check("s", "a", &p, 60).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_addresses_do_not_collide() {
        let clock = MockClock::at_epoch(1_000);
        let guard = guard(&clock);
        let p = params("1");

        let _a = guard.try_acquire("s", "a", &p, 60).await.unwrap();
        let _b = guard.try_acquire("s", "b", &p, 60).await.unwrap();
        let _c = guard.try_acquire("s2", "a", &p, 60).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_has_single_winner() {
        let clock = MockClock::at_epoch(1_000);
        let guard = Arc::new(guard(&clock));
        let p = params("1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = Arc::clone(&guard);
            let p = p.clone();
            handles.push(tokio::spawn(async move {
                guard.try_acquire("s", "a", &p, 60).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if let Ok(Some(_)) = handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

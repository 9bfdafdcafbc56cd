//! Rate limiter coordination logic.
//!
//! The rate limiter applies the three per-scene dimensions of a
//! [`RateLimitPolicy`] against the governance store, in a fixed order:
//!
//! 1. per-address interval (`now - last_sent < interval` rejects)
//! 2. per-address calendar-day counter (increment, then compare)
//! 3. per-source minute counter (increment, then compare)
//!
//! Every dimension is a single atomic store operation on its own key. The
//! interval slot is claimed with insert-if-absent and removed again when a
//! counter rejects, so the last send time only moves for accepted attempts.
//! Counters are incremented before they are compared, so a rejected attempt
//! still consumes quota.

use crate::application::keys;
use crate::application::ports::{Clock, GovernanceStore, StoreError};
use crate::domain::error::SmsError;
use crate::domain::masking::mask_address;
use crate::domain::scene::RateLimitPolicy;
use chrono::{DateTime, Days, FixedOffset, Offset, Utc};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::warn;

const SECONDS_PER_DAY: i64 = 86_400;

/// Applies rate limit policies.
pub struct RateLimiter {
    store: Arc<dyn GovernanceStore>,
    clock: Arc<dyn Clock>,
    utc_offset: FixedOffset,
    /// Epoch minute of the last opportunistic sweep
    last_sweep_minute: AtomicI64,
}

impl RateLimiter {
    /// Create a rate limiter whose calendar days follow UTC.
    pub fn new(store: Arc<dyn GovernanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_utc_offset(store, clock, Utc.fix())
    }

    /// Create a rate limiter whose calendar days follow a fixed UTC offset.
    pub fn with_utc_offset(
        store: Arc<dyn GovernanceStore>,
        clock: Arc<dyn Clock>,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            clock,
            utc_offset,
            last_sweep_minute: AtomicI64::new(i64::MIN),
        }
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// Check every enabled dimension and record the attempt.
    ///
    /// A blank `source` skips the per-source dimension.
    ///
    /// # Errors
    /// - `RateLimited` when a dimension is exhausted
    /// - `ClientError` when the store fails; the attempt is rejected
    pub async fn check_and_record(
        &self,
        scene: &str,
        address: &str,
        source: &str,
        policy: &RateLimitPolicy,
    ) -> Result<(), SmsError> {
        let now = self.clock.now();
        let epoch = now.timestamp();

        self.sweep_if_due(epoch).await;

        let interval_key = self.claim_interval(scene, address, epoch, policy).await?;

        let counted = self.check_counters(scene, address, source, now, policy).await;
        if let (Err(_), Some(key)) = (&counted, &interval_key) {
            // A rejected attempt must not move the last send time.
            if let Err(err) = self.store.remove(key).await {
                warn!(
                    scene = scene,
                    address = %mask_address(address),
                    error = %err,
                    "failed to roll back interval slot"
                );
            }
        }
        counted
    }

    /// Record `epoch` as the last send time unless the previous one is still
    /// within the interval. Returns the key of the recorded slot.
    ///
    /// The slot expires when the interval elapses, so insert-if-absent both
    /// compares and records in one atomic step.
    async fn claim_interval(
        &self,
        scene: &str,
        address: &str,
        epoch: i64,
        policy: &RateLimitPolicy,
    ) -> Result<Option<String>, SmsError> {
        let interval = saturating_i64(policy.per_address_interval_seconds);
        if interval == 0 {
            return Ok(None);
        }

        let key = keys::interval_key(scene, address);
        let claimed = self
            .store
            .insert_if_absent_with_expiry(&key, epoch, epoch.saturating_add(interval), epoch)
            .await
            .map_err(|err| store_failure(err, scene, address))?;
        if !claimed {
            return Err(self.reject(scene, address, "interval", "send interval not elapsed"));
        }
        Ok(Some(key))
    }

    async fn check_counters(
        &self,
        scene: &str,
        address: &str,
        source: &str,
        now: DateTime<Utc>,
        policy: &RateLimitPolicy,
    ) -> Result<(), SmsError> {
        let epoch = now.timestamp();

        let daily_limit = saturating_i64(policy.per_address_daily_limit);
        if daily_limit > 0 {
            let (day, expires_at) = self.calendar_day(now);
            let key = keys::daily_key(scene, address, &day);
            let count = self
                .store
                .increment_with_expiry(&key, expires_at, epoch)
                .await
                .map_err(|err| store_failure(err, scene, address))?;
            if count > daily_limit {
                return Err(self.reject(scene, address, "daily", "daily limit reached"));
            }
        }

        let minute_limit = saturating_i64(policy.per_source_minute_limit);
        let source = source.trim();
        if minute_limit > 0 && !source.is_empty() {
            let minute = epoch.div_euclid(60);
            let key = keys::source_minute_key(scene, source, minute);
            let count = self
                .store
                .increment_with_expiry(&key, (minute + 2) * 60, epoch)
                .await
                .map_err(|err| store_failure(err, scene, address))?;
            if count > minute_limit {
                return Err(self.reject(
                    scene,
                    address,
                    "source_minute",
                    "source minute limit reached",
                ));
            }
        }

        Ok(())
    }

    fn reject(&self, scene: &str, address: &str, dimension: &str, message: &str) -> SmsError {
        warn!(
            scene = scene,
            address = %mask_address(address),
            dimension = dimension,
            "send rejected by rate limit"
        );
        SmsError::rate_limited(message)
            .with_scene(scene)
            .with_address(address)
    }

    /// Local calendar day as `yyyyMMdd` and the epoch second it ends at.
    fn calendar_day(&self, now: DateTime<Utc>) -> (String, i64) {
        let local = now.with_timezone(&self.utc_offset);
        let day = local.format("%Y%m%d").to_string();
        let expires_at = local
            .date_naive()
            .checked_add_days(Days::new(1))
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|midnight| {
                midnight.and_utc().timestamp() - i64::from(self.utc_offset.local_minus_utc())
            })
            .unwrap_or(now.timestamp() + SECONDS_PER_DAY);
        (day, expires_at)
    }

    /// Purge expired slots at most once per minute bucket.
    async fn sweep_if_due(&self, epoch: i64) {
        let minute = epoch.div_euclid(60);
        let last = self.last_sweep_minute.load(Ordering::Relaxed);
        if minute <= last {
            return;
        }
        if self
            .last_sweep_minute
            .compare_exchange(last, minute, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        if let Err(err) = self.store.purge_expired(epoch).await {
            warn!(error = %err, "governance store sweep failed");
        }
    }
}

fn store_failure(err: StoreError, scene: &str, address: &str) -> SmsError {
    warn!(
        scene = scene,
        address = %mask_address(address),
        error = %err,
        "rate limit store unavailable"
    );
    SmsError::from(err).with_scene(scene).with_address(address)
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("store", &self.store)
            .field("utc_offset", &self.utc_offset)
            .finish_non_exhaustive()
    }
}

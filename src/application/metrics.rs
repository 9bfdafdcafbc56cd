//! Observability metrics for the send guard.
//!
//! Counts outcomes of guarded sends for monitoring and debugging.

use crate::domain::error::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters of guarded send outcomes.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct GuardMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Sends accepted by the provider
    sends_dispatched: AtomicU64,
    /// Sends rejected by a rate limit dimension
    rejected_rate_limited: AtomicU64,
    /// Sends rejected as duplicates
    rejected_duplicate: AtomicU64,
    /// Sends rejected before governance (unknown scene, malformed request)
    rejected_invalid: AtomicU64,
    /// Dispatches that failed at the provider
    provider_failures: AtomicU64,
}

impl GuardMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatched(&self) {
        self.inner.sends_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed send under the counter for its kind.
    ///
    /// Store failures and configuration errors are not counted.
    pub(crate) fn record_failure(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::RateLimited => &self.inner.rejected_rate_limited,
            ErrorKind::DuplicateRequest => &self.inner.rejected_duplicate,
            ErrorKind::SceneNotFound | ErrorKind::InvalidRequest => &self.inner.rejected_invalid,
            kind if kind.is_provider() => &self.inner.provider_failures,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sends_dispatched(&self) -> u64 {
        self.inner.sends_dispatched.load(Ordering::Relaxed)
    }

    pub fn rejected_rate_limited(&self) -> u64 {
        self.inner.rejected_rate_limited.load(Ordering::Relaxed)
    }

    pub fn rejected_duplicate(&self) -> u64 {
        self.inner.rejected_duplicate.load(Ordering::Relaxed)
    }

    pub fn rejected_invalid(&self) -> u64 {
        self.inner.rejected_invalid.load(Ordering::Relaxed)
    }

    pub fn provider_failures(&self) -> u64 {
        self.inner.provider_failures.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sends_dispatched: self.sends_dispatched(),
            rejected_rate_limited: self.rejected_rate_limited(),
            rejected_duplicate: self.rejected_duplicate(),
            rejected_invalid: self.rejected_invalid(),
            provider_failures: self.provider_failures(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.sends_dispatched.store(0, Ordering::Relaxed);
        self.inner.rejected_rate_limited.store(0, Ordering::Relaxed);
        self.inner.rejected_duplicate.store(0, Ordering::Relaxed);
        self.inner.rejected_invalid.store(0, Ordering::Relaxed);
        self.inner.provider_failures.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub sends_dispatched: u64,
    pub rejected_rate_limited: u64,
    pub rejected_duplicate: u64,
    pub rejected_invalid: u64,
    pub provider_failures: u64,
}

impl MetricsSnapshot {
    /// Sends stopped by governance (rate limit or duplicate).
    pub fn total_rejected(&self) -> u64 {
        self.rejected_rate_limited
            .saturating_add(self.rejected_duplicate)
    }

    /// Ratio of governance rejections to governed sends (0.0 to 1.0).
    ///
    /// Governed sends are those that reached rate limiting: dispatched,
    /// rejected by governance, or failed at the provider. Returns 0.0 if there
    /// were none.
    pub fn rejection_rate(&self) -> f64 {
        let rejected = self.total_rejected();
        let total = rejected
            .saturating_add(self.sends_dispatched)
            .saturating_add(self.provider_failures);
        if total == 0 {
            0.0
        } else {
            rejected as f64 / total as f64
        }
    }
}

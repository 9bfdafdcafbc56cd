//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, enabling deterministic
/// testing of windows, intervals and calendar-day rollover.
///
/// # Examples
///
/// ```
/// use sms_guard::infrastructure::mocks::MockClock;
/// use sms_guard::application::ports::Clock;
/// use std::time::Duration;
///
/// let clock = MockClock::at_epoch(1_700_000_000);
/// assert_eq!(clock.now().timestamp(), 1_700_000_000);
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now().timestamp(), 1_700_000_010);
///
/// clock.set_epoch(0);
/// assert_eq!(clock.now().timestamp(), 0);
/// ```
///
/// # Thread Safety
///
/// `MockClock` is thread-safe and can be cloned to share across threads.
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock starting at a specific time.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Create a mock clock starting at an epoch second.
    pub fn at_epoch(seconds: i64) -> Self {
        Self::new(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let delta = TimeDelta::from_std(duration).expect("MockClock advance out of range");
        let mut time = self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock");
        *time += delta;
    }

    /// Set the clock to a specific time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock") = time;
    }

    /// Set the clock to an epoch second.
    pub fn set_epoch(&self, seconds: i64) {
        self.set(DateTime::from_timestamp(seconds, 0).unwrap_or_default());
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current_time
            .lock()
            .expect("MockClock mutex poisoned - a test thread panicked while holding the lock")
    }
}

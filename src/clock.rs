//! Authoritative time source. All lateness and expiry math goes through this
//! trait so the server never trusts a client-supplied timestamp, and tests can
//! pin the clock.

use time::OffsetDateTime;

/// Supplies the current instant for every time-sensitive decision.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// Production clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[cfg(test)]
pub mod testing {
    //! Deterministic clock for service tests.

    use std::sync::Mutex;

    use time::{Duration, OffsetDateTime};

    use super::Clock;

    /// Clock pinned to a settable instant.
    pub struct FixedClock {
        now: Mutex<OffsetDateTime>,
    }

    impl FixedClock {
        /// Create a clock frozen at `now`.
        pub fn at(now: OffsetDateTime) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        /// Move the clock forward by `delta`.
        pub fn advance(&self, delta: Duration) {
            let mut guard = self.now.lock().unwrap();
            *guard += delta;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }
}

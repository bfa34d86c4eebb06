//! Time source abstraction for TTL freshness checks
//!
//! The resolver and partition cache stamp their snapshots with the time of
//! the last successful refresh and compare that stamp against a configured
//! time-to-live. Putting the clock behind a trait keeps that logic
//! deterministic under test without sleeping.

use std::time::Instant;

/// A source of monotonic timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Production clock backed by the OS monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::ManualClock;
    use super::*;
    use std::time::Duration;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a, "instants must not go backward");
    }

    #[test]
    fn manual_clock_advances_only_on_request() {
        let clock = ManualClock::new();
        let a = clock.now();
        assert_eq!(clock.now(), a);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), a + Duration::from_secs(5));
    }
}

//! Clock abstraction used for strike cooldowns.
//!
//! Cooldown admission compares `Instant`s taken from a [`Clock`], so tests can
//! drive the escalation engine with a [`mock_clock::MockClock`] and async
//! session tests can rely on tokio's paused clock through [`TokioClock`].

use std::fmt::Debug;
use std::time::Instant;

/// Source of "now" for cooldown bookkeeping.
pub trait Clock: Send + Sync + Debug {
    /// Current `Instant`.
    fn now(&self) -> Instant;
}

/// Clock that follows tokio's timer, including paused and auto-advanced time.
///
/// Use this inside a running session so cooldown spacing and sampler ticks
/// observe the same timeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Manually driven clock for tests and simulations.
pub mod mock_clock {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// A clock whose current time only moves when told to.
    #[derive(Debug)]
    pub struct MockClock {
        current_time: Mutex<Instant>,
    }

    impl MockClock {
        /// Creates a new `MockClock` starting at `start_time`.
        pub fn new(start_time: Instant) -> Self {
            Self {
                current_time: Mutex::new(start_time),
            }
        }

        /// Moves the clock forward by `duration`.
        pub fn advance(&self, duration: Duration) {
            let mut current = self
                .current_time
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current += duration;
        }

        /// Moves the clock forward by `millis` milliseconds.
        pub fn advance_millis(&self, millis: u64) {
            self.advance(Duration::from_millis(millis));
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new(Instant::now())
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            *self
                .current_time
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }
}

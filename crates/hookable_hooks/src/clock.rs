//! Time source used for listener timing and performance correlation.
//!
//! Every hook holds a [`Clock`]. It defaults to the system monotonic clock,
//! and can be swapped for a [`MockClock`] (behind the `test-utils` feature)
//! so tests can drive elapsed times deterministically and observe whether
//! time was read at all.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hookable_hooks::clock::{Clock, MockClock};
//! use hookable_hooks::SyncHook;
//!
//! let mock = Arc::new(MockClock::new());
//! let hook: SyncHook = SyncHook::new().with_clock(Clock::with_provider(mock.clone()));
//!
//! let ticker = mock.clone();
//! hook.on_tagged("slow", move |_, _| ticker.advance(Duration::from_millis(5)))?;
//! ```

use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// ClockProvider Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for providing current time.
///
/// Implement this for custom time providers (e.g., a mock clock for testing).
pub trait ClockProvider: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// System clock provider using `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Shared time provider.
///
/// Cheap to clone; clones share the provider.
#[derive(Clone)]
pub struct Clock {
    provider: Arc<dyn ClockProvider>,
}

impl Clock {
    /// Creates a clock backed by the system monotonic clock.
    #[must_use]
    pub fn system() -> Self {
        Self {
            provider: Arc::new(SystemClock),
        }
    }

    /// Creates a clock with a custom provider.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn ClockProvider>) -> Self {
        Self { provider }
    }

    /// Returns the current instant.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.provider.now()
    }

    /// Returns the duration elapsed since the given instant.
    #[must_use]
    pub fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockClock
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockClock;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::ClockProvider;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// A manually driven clock for tests.
    ///
    /// Time only moves when [`advance`](MockClock::advance) or
    /// [`set`](MockClock::set) is called. Every read is counted, so tests can
    /// assert that a code path never consulted the clock.
    #[derive(Debug)]
    pub struct MockClock {
        current: Mutex<Instant>,
        reads: AtomicUsize,
    }

    impl MockClock {
        /// Creates a mock clock starting at the current instant.
        #[must_use]
        pub fn new() -> Self {
            Self {
                current: Mutex::new(Instant::now()),
                reads: AtomicUsize::new(0),
            }
        }

        /// Moves time forward.
        pub fn advance(&self, duration: Duration) {
            *self.current.lock() += duration;
        }

        /// Sets the current instant.
        pub fn set(&self, instant: Instant) {
            *self.current.lock() = instant;
        }

        /// Returns the current instant without counting a read.
        #[must_use]
        pub fn current(&self) -> Instant {
            *self.current.lock()
        }

        /// Returns how many times [`ClockProvider::now`] has been called.
        #[must_use]
        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ClockProvider for MockClock {
        fn now(&self) -> Instant {
            self.reads.fetch_add(1, Ordering::SeqCst);
            *self.current.lock()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_moves_only_when_told() {
        let mock = Arc::new(MockClock::new());
        let clock = Clock::with_provider(mock.clone());

        let start = clock.now();
        assert_eq!(clock.elapsed_since(start), Duration::ZERO);

        mock.advance(Duration::from_millis(40));
        assert_eq!(clock.elapsed_since(start), Duration::from_millis(40));
        assert_eq!(mock.reads(), 3);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = Clock::default();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}

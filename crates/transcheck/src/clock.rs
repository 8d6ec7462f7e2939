//! Clocks for the harness.
//!
//! Every wait in the harness goes through [`Clock`], so the settle poller and
//! the input driver can be tested against [`FakeClock`] without a browser and
//! without real sleeping.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic time source with an async sleep
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock starting now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock for deterministic tests.
///
/// `sleep` advances virtual time instantly and yields once to the runtime.
/// Every requested sleep is recorded so tests can assert on wait patterns.
#[derive(Debug, Default)]
pub struct FakeClock {
    current_ms: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    /// Create a fake clock at t = 0
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared fake clock
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Current virtual time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }

    /// Fast-forward virtual time without recording a sleep
    pub fn advance(&self, duration: Duration) {
        self.current_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Every sleep requested so far, in order
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Sum of all recorded sleeps
    #[must_use]
    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms())
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod fake_clock_tests {
        use super::*;

        #[test]
        fn test_starts_at_zero() {
            let clock = FakeClock::new();
            assert_eq!(clock.now(), Duration::ZERO);
            assert!(clock.sleeps().is_empty());
        }

        #[test]
        fn test_advance_is_not_a_sleep() {
            let clock = FakeClock::new();
            clock.advance(Duration::from_millis(250));
            assert_eq!(clock.now_ms(), 250);
            assert!(clock.sleeps().is_empty());
        }

        #[tokio::test]
        async fn test_sleep_advances_and_records() {
            let clock = FakeClock::new();
            clock.sleep(Duration::from_millis(100)).await;
            clock.sleep(Duration::from_secs(3)).await;
            assert_eq!(clock.now_ms(), 3100);
            assert_eq!(
                clock.sleeps(),
                vec![Duration::from_millis(100), Duration::from_secs(3)]
            );
            assert_eq!(clock.total_slept(), Duration::from_millis(3100));
        }

        #[tokio::test]
        async fn test_shared_clock_through_arc() {
            let clock = FakeClock::shared();
            let handle: Arc<FakeClock> = Arc::clone(&clock);
            handle.sleep(Duration::from_millis(40)).await;
            assert_eq!(clock.now(), Duration::from_millis(40));
        }
    }

    mod system_clock_tests {
        use super::*;

        #[tokio::test]
        async fn test_system_clock_is_monotonic() {
            let clock = SystemClock::new();
            let before = clock.now();
            clock.sleep(Duration::from_millis(5)).await;
            assert!(clock.now() >= before + Duration::from_millis(5));
        }
    }
}

//! Asynchronous UI settle poller.
//!
//! After a stimulus the translator re-renders its output panel some time
//! later, after a debounce and a network round-trip. The poller decides when
//! that output has *settled*: a candidate read is accepted once it is
//! non-empty and differs from the baseline captured before the stimulus.
//!
//! # Algorithm
//!
//! 1. Read, normalize, accept or not. At least one read always happens.
//! 2. Sleep `min(interval, remaining budget)`; grow the interval by `backoff`
//!    up to `max_interval`.
//! 3. When the budget is exhausted, wait exactly once for `grace` and read a
//!    final time.
//!
//! Total time spent is therefore bounded by `budget + grace`. Not settling is
//! reported in [`SettleResult`], never raised.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::driver::PageDriver;
use crate::locator::FieldHandle;
use crate::normalize::normalize;
use crate::result::{ProbeError, ProbeResult};

/// Default settle budget (25 seconds)
pub const DEFAULT_SETTLE_BUDGET_MS: u64 = 25_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default grace wait after the budget is exhausted (3 seconds)
pub const DEFAULT_GRACE_MS: u64 = 3_000;

/// Default ceiling for a backed-off polling interval (1 second)
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 1_000;

/// Settle poller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Polling budget in milliseconds
    pub budget_ms: u64,
    /// Initial polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Interval multiplier applied after every tick (1.0 = fixed)
    pub backoff: f64,
    /// Ceiling for the backed-off interval in milliseconds
    pub max_interval_ms: u64,
    /// Single fallback wait after the budget, in milliseconds
    pub grace_ms: u64,
    /// Accept an empty read as settled
    pub allow_empty: bool,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            budget_ms: DEFAULT_SETTLE_BUDGET_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff: 1.0,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            grace_ms: DEFAULT_GRACE_MS,
            allow_empty: false,
        }
    }
}

impl SettleConfig {
    /// Set budget
    #[must_use]
    pub const fn with_budget(mut self, budget: Duration) -> Self {
        self.budget_ms = budget.as_millis() as u64;
        self
    }

    /// Set polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set backoff multiplier and interval ceiling
    #[must_use]
    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = factor;
        self.max_interval_ms = max_interval.as_millis() as u64;
        self
    }

    /// Set grace wait
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace_ms = grace.as_millis() as u64;
        self
    }

    /// Accept empty reads
    #[must_use]
    pub const fn with_allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Budget as a duration
    #[must_use]
    pub const fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    /// Grace as a duration
    #[must_use]
    pub const fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Check that the configuration can terminate
    ///
    /// # Errors
    ///
    /// Returns a config error for a zero interval or a backoff below 1.0
    pub fn validate(&self) -> ProbeResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ProbeError::config("settle.poll_interval_ms must be positive"));
        }
        if !self.backoff.is_finite() || self.backoff < 1.0 {
            return Err(ProbeError::config(format!(
                "settle.backoff must be a finite number >= 1.0, got {}",
                self.backoff
            )));
        }
        if self.max_interval_ms < self.poll_interval_ms {
            return Err(ProbeError::config(
                "settle.max_interval_ms must not be below settle.poll_interval_ms",
            ));
        }
        Ok(())
    }

    fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 || !self.backoff.is_finite() {
            return current;
        }
        current
            .mul_f64(self.backoff)
            .min(Duration::from_millis(self.max_interval_ms.max(self.poll_interval_ms)))
    }
}

/// Outcome of one settle run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleResult {
    /// Last normalized read
    pub text: String,
    /// Whether an acceptable read was observed
    pub settled: bool,
    /// Time spent, grace included
    pub elapsed: Duration,
    /// Number of reads performed
    pub attempts: u32,
    /// Whether the budget ran out and the grace read produced `text`
    pub via_grace: bool,
}

impl SettleResult {
    /// Elapsed time in milliseconds
    #[must_use]
    pub const fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }

    /// Convert an unsettled result into [`ProbeError::SettleTimeout`]
    ///
    /// # Errors
    ///
    /// Returns `SettleTimeout` when `settled` is false
    pub fn require_settled(self) -> ProbeResult<Self> {
        if self.settled {
            Ok(self)
        } else {
            Err(ProbeError::SettleTimeout {
                elapsed_ms: self.elapsed_ms(),
            })
        }
    }
}

/// Source of candidate output text
#[async_trait]
pub trait TextProbe: Send + Sync {
    /// Raw text of the current candidate; empty when it does not exist
    async fn read(&self) -> ProbeResult<String>;
}

/// Reads the live output element of a page.
///
/// The handle's pick is re-evaluated on every read, so a "last" pick follows
/// panels appended after resolution.
pub struct OutputProbe<'a, P: PageDriver + ?Sized> {
    page: &'a P,
    handle: &'a FieldHandle,
}

impl<'a, P: PageDriver + ?Sized> OutputProbe<'a, P> {
    /// Probe `handle` on `page`
    pub const fn new(page: &'a P, handle: &'a FieldHandle) -> Self {
        Self { page, handle }
    }
}

impl<P: PageDriver + ?Sized> fmt::Debug for OutputProbe<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputProbe")
            .field("target", &self.handle.target)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<'a, P: PageDriver + ?Sized> TextProbe for OutputProbe<'a, P> {
    async fn read(&self) -> ProbeResult<String> {
        Ok(self
            .page
            .text_content(&self.handle.target)
            .await?
            .unwrap_or_default())
    }
}

/// Bounded poller deciding when output has settled
#[derive(Clone)]
pub struct SettlePoller {
    clock: Arc<dyn Clock>,
    config: SettleConfig,
}

impl fmt::Debug for SettlePoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettlePoller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SettlePoller {
    /// Create a poller
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, config: SettleConfig) -> Self {
        Self { clock, config }
    }

    /// Poller configuration
    #[must_use]
    pub const fn config(&self) -> &SettleConfig {
        &self.config
    }

    /// Poll `probe` until its normalized text settles away from `baseline`.
    ///
    /// `baseline` is the normalized output read before the stimulus; `None`
    /// disables the divergence requirement.
    pub async fn settle<T: TextProbe + ?Sized>(
        &self,
        probe: &T,
        baseline: Option<&str>,
    ) -> SettleResult {
        let start = self.clock.now();
        let budget = self.config.budget();
        let mut interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let text = self.read(probe, attempts).await;
            if self.accepts(&text, baseline) {
                let elapsed = self.clock.now().saturating_sub(start);
                tracing::debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "output settled");
                return SettleResult {
                    text,
                    settled: true,
                    elapsed,
                    attempts,
                    via_grace: false,
                };
            }

            let elapsed = self.clock.now().saturating_sub(start);
            if elapsed >= budget {
                break;
            }
            self.clock.sleep(interval.min(budget - elapsed)).await;
            interval = self.config.next_interval(interval);
        }

        tracing::warn!(
            budget_ms = self.config.budget_ms,
            grace_ms = self.config.grace_ms,
            attempts,
            "settle budget exhausted, reading once more after grace"
        );
        self.clock.sleep(self.config.grace()).await;
        attempts += 1;
        let text = self.read(probe, attempts).await;
        let settled = self.accepts(&text, baseline);

        SettleResult {
            text,
            settled,
            elapsed: self.clock.now().saturating_sub(start),
            attempts,
            via_grace: true,
        }
    }

    async fn read<T: TextProbe + ?Sized>(&self, probe: &T, attempt: u32) -> String {
        match probe.read().await {
            Ok(raw) => {
                let text = normalize(&raw);
                tracing::trace!(attempt, chars = text.chars().count(), "poll tick");
                text
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "transient read failure, treating as empty");
                String::new()
            }
        }
    }

    fn accepts(&self, text: &str, baseline: Option<&str>) -> bool {
        (self.config.allow_empty || !text.is_empty()) && baseline.map_or(true, |b| text != b)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns `before` until virtual time reaches `at_ms`, then `after`
    struct TimedProbe {
        clock: Arc<FakeClock>,
        at_ms: Option<u64>,
        before: String,
        after: String,
        failures: AtomicUsize,
        reads: AtomicUsize,
    }

    impl TimedProbe {
        fn new(clock: &Arc<FakeClock>, at_ms: Option<u64>, before: &str, after: &str) -> Self {
            Self {
                clock: Arc::clone(clock),
                at_ms,
                before: before.to_string(),
                after: after.to_string(),
                failures: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
            }
        }

        fn failing_first(self, n: usize) -> Self {
            self.failures.store(n, Ordering::SeqCst);
            self
        }
    }

    #[async_trait]
    impl TextProbe for TimedProbe {
        async fn read(&self) -> ProbeResult<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ProbeError::page("node detached"));
            }
            match self.at_ms {
                Some(at) if self.clock.now_ms() >= at => Ok(self.after.clone()),
                _ => Ok(self.before.clone()),
            }
        }
    }

    fn poller(clock: &Arc<FakeClock>, config: SettleConfig) -> SettlePoller {
        SettlePoller::new(clock.clone(), config)
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = SettleConfig::default();
            assert_eq!(config.budget(), Duration::from_secs(25));
            assert_eq!(config.poll_interval_ms, 100);
            assert_eq!(config.grace(), Duration::from_secs(3));
            assert!(!config.allow_empty);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_validate_rejects_zero_interval_and_shrinking_backoff() {
            assert!(SettleConfig::default()
                .with_poll_interval(Duration::ZERO)
                .validate()
                .is_err());
            assert!(SettleConfig::default()
                .with_backoff(0.5, Duration::from_secs(1))
                .validate()
                .is_err());
            assert!(SettleConfig::default()
                .with_backoff(f64::NAN, Duration::from_secs(1))
                .validate()
                .is_err());
        }

        #[test]
        fn test_backoff_is_capped() {
            let config = SettleConfig::default().with_backoff(2.0, Duration::from_millis(300));
            let mut interval = Duration::from_millis(100);
            interval = config.next_interval(interval);
            assert_eq!(interval, Duration::from_millis(200));
            interval = config.next_interval(interval);
            assert_eq!(interval, Duration::from_millis(300));
            interval = config.next_interval(interval);
            assert_eq!(interval, Duration::from_millis(300));
        }

        #[test]
        fn test_require_settled() {
            let unsettled = SettleResult {
                text: String::new(),
                settled: false,
                elapsed: Duration::from_millis(28_000),
                attempts: 252,
                via_grace: true,
            };
            match unsettled.require_settled() {
                Err(ProbeError::SettleTimeout { elapsed_ms }) => assert_eq!(elapsed_ms, 28_000),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    mod poll_tests {
        use super::*;

        #[tokio::test]
        async fn test_settles_on_first_tick() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, Some(0), "", "  මම ගෙදර යනවා.\n");
            let result = poller(&clock, SettleConfig::default())
                .settle(&probe, Some(""))
                .await;
            assert!(result.settled);
            assert_eq!(result.text, "මම ගෙදර යනවා.");
            assert_eq!(result.attempts, 1);
            assert!(!result.via_grace);
            assert!(clock.sleeps().is_empty());
        }

        #[tokio::test]
        async fn test_settles_after_debounce() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, Some(850), "", "ok");
            let result = poller(&clock, SettleConfig::default())
                .settle(&probe, Some(""))
                .await;
            assert!(result.settled);
            assert_eq!(result.elapsed, Duration::from_millis(900));
            assert_eq!(result.attempts, 10);
        }

        #[tokio::test]
        async fn test_output_equal_to_baseline_is_not_settled() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, None, "previous", "previous");
            let config = SettleConfig::default().with_budget(Duration::from_millis(1000));
            let result = poller(&clock, config).settle(&probe, Some("previous")).await;
            assert!(!result.settled);
            assert!(result.via_grace);
            assert_eq!(result.text, "previous");
        }

        #[tokio::test]
        async fn test_no_baseline_accepts_any_non_empty() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, None, "previous", "previous");
            let result = poller(&clock, SettleConfig::default()).settle(&probe, None).await;
            assert!(result.settled);
            assert_eq!(result.attempts, 1);
        }

        #[tokio::test]
        async fn test_exhaustion_takes_exactly_one_grace_wait() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, None, "", "");
            let config = SettleConfig::default().with_budget(Duration::from_millis(250));
            let result = poller(&clock, config).settle(&probe, Some("")).await;

            assert!(!result.settled);
            assert!(result.via_grace);
            assert_eq!(
                clock.sleeps(),
                vec![
                    Duration::from_millis(100),
                    Duration::from_millis(100),
                    Duration::from_millis(50),
                    Duration::from_secs(3),
                ]
            );
            assert_eq!(result.attempts, 5);
            assert_eq!(result.elapsed, Duration::from_millis(3250));
        }

        #[tokio::test]
        async fn test_grace_read_can_settle() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, Some(26_000), "", "late");
            let result = poller(&clock, SettleConfig::default())
                .settle(&probe, Some(""))
                .await;
            assert!(result.settled);
            assert!(result.via_grace);
            assert_eq!(result.text, "late");
            assert_eq!(result.elapsed, Duration::from_millis(28_000));
        }

        #[tokio::test]
        async fn test_zero_budget_still_reads() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, None, "", "");
            let config = SettleConfig::default()
                .with_budget(Duration::ZERO)
                .with_grace(Duration::ZERO);
            let result = poller(&clock, config).settle(&probe, None).await;
            assert_eq!(result.attempts, 2);
            assert_eq!(probe.reads.load(Ordering::SeqCst), 2);
            assert_eq!(result.elapsed, Duration::ZERO);
        }

        #[tokio::test]
        async fn test_read_errors_count_as_empty() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, Some(0), "", "done").failing_first(3);
            let result = poller(&clock, SettleConfig::default())
                .settle(&probe, Some(""))
                .await;
            assert!(result.settled);
            assert_eq!(result.attempts, 4);
            assert_eq!(result.elapsed, Duration::from_millis(300));
        }

        #[tokio::test]
        async fn test_allow_empty_settles_on_cleared_output() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, Some(200), "stale", "");
            let config = SettleConfig::default().with_allow_empty(true);
            let result = poller(&clock, config).settle(&probe, Some("stale")).await;
            assert!(result.settled);
            assert!(result.text.is_empty());
        }

        #[tokio::test]
        async fn test_backoff_reduces_ticks() {
            let clock = FakeClock::shared();
            let probe = TimedProbe::new(&clock, Some(1500), "", "ok");
            let config = SettleConfig::default().with_backoff(2.0, Duration::from_millis(800));
            let result = poller(&clock, config).settle(&probe, Some("")).await;
            assert!(result.settled);
            // reads at 0, 100, 300, 700, 1500
            assert_eq!(result.attempts, 5);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_bounded_by_budget_plus_grace(
                budget in 0u64..5_000,
                interval in 1u64..700,
                grace in 0u64..4_000,
                backoff in 1.0f64..3.0,
                settle_at in proptest::option::of(0u64..12_000)
            ) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let clock = FakeClock::shared();
                let probe = TimedProbe::new(&clock, settle_at, "", "x");
                let config = SettleConfig::default()
                    .with_budget(Duration::from_millis(budget))
                    .with_poll_interval(Duration::from_millis(interval))
                    .with_backoff(backoff, Duration::from_millis(interval * 4))
                    .with_grace(Duration::from_millis(grace));
                let result = rt.block_on(poller(&clock, config).settle(&probe, Some("")));

                prop_assert!(result.attempts >= 1);
                prop_assert!(result.elapsed <= Duration::from_millis(budget + grace));
                if result.settled {
                    prop_assert_eq!(result.text.as_str(), "x");
                }
                if let Some(at) = settle_at {
                    if at <= budget {
                        prop_assert!(result.settled);
                        prop_assert!(!result.via_grace);
                    }
                }
            }
        }
    }
}

//! Transcheck: settle-aware end-to-end harness for reactive web translators
//!
//! Drives a Singlish → Sinhala translator page through a real browser and
//! judges its output. The page renders asynchronously, so the output is
//! never read once: it is polled until it settles, then normalized and
//! asserted.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   TRANSCHECK Scenario Pipeline                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐        │
//! │   │ Field    │  │ Input    │  │ Settle   │  │ Result   │        │
//! │   │ Resolver │─►│ Driver   │─►│ Poller   │─►│ Normalize│─► ✓/✗  │
//! │   └──────────┘  └──────────┘  └──────────┘  └──────────┘        │
//! │        ▲              ▲             ▲                           │
//! │        └──────────────┴─────────────┴── PageDriver (CDP/mock)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every DOM interaction goes through [`PageDriver`]; every wait goes
//! through [`Clock`]. [`MockBrowser`] and [`FakeClock`] make the whole
//! pipeline testable without a browser.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Browser launch settings and the CDP-backed driver
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod browser;

/// Injectable time source
pub mod clock;

/// Layered harness configuration
pub mod config;

/// Page and browser seams
pub mod driver;

/// Input injection
pub mod input;

/// Selector discovery against a live page
pub mod inspect;

/// Field locator resolution
pub mod locator;

/// In-memory translator page for tests and dry runs
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock_page;

/// Output normalization
pub mod normalize;

/// JSON run reports
pub mod report;

/// Error types
pub mod result;

/// Scenario pipeline execution
pub mod runner;

/// Test cases and outcomes
pub mod scenario;

/// Asynchronous UI settle poller
pub mod settle;

/// Declarative test suites
pub mod suite;

pub use browser::{BrowserConfig, NETWORK_IDLE_THRESHOLD_MS};
#[cfg(feature = "browser")]
pub use browser::{ChromiumBrowser, ChromiumPage};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    HarnessConfig, CI_RETRIES, DEFAULT_BASE_URL, DEFAULT_NAVIGATION_TIMEOUT_MS,
    DEFAULT_NETWORK_IDLE_TIMEOUT_MS, DEFAULT_OUTPUT_DIR, DEFAULT_SETUP_DELAY_MS, ENV_BASE_URL,
    ENV_CHROMIUM_PATH, ENV_CI,
};
pub use driver::{Browser, ElementState, ElementSummary, Key, PageDriver};
pub use input::{
    CommitAction, InputConfig, InputDriver, InputMode, DEFAULT_CLEAR_PAUSE_MS,
    DEFAULT_TYPE_DELAY_MS,
};
pub use inspect::{
    contains_sinhala, inspect_page, InspectReport, DEFAULT_INSPECT_WAIT_MS, DEFAULT_PROBE_TEXT,
};
pub use locator::{
    default_strategies, FieldHandle, FieldResolver, FieldRole, LocateOptions, LocatorStrategy,
    Pick, Target, DEFAULT_LOCATE_POLL_MS, DEFAULT_LOCATE_TIMEOUT_MS, INPUT_PLACEHOLDER_HINT,
    OUTPUT_PANEL_CSS,
};
pub use mock_page::{MockBrowser, MockPage, MockSite, DEFAULT_MOCK_LATENCY_MS};
pub use normalize::{normalize, read_output};
pub use report::{RunReport, SuiteReport, REPORT_FILE_NAME};
pub use result::{ProbeError, ProbeResult};
pub use runner::{RunObserver, ScenarioRunner};
pub use scenario::{has_space_run, Expectation, ScenarioOutcome, Stage, TestCase};
pub use settle::{
    OutputProbe, SettleConfig, SettlePoller, SettleResult, TextProbe, DEFAULT_GRACE_MS,
    DEFAULT_MAX_INTERVAL_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_BUDGET_MS,
};
pub use suite::{builtin, builtin_named, Suite};

/// Prelude for writing scenarios
pub mod prelude {
    pub use crate::clock::{Clock, FakeClock, SystemClock};
    pub use crate::config::HarnessConfig;
    pub use crate::driver::{Browser, PageDriver};
    pub use crate::input::{CommitAction, InputMode};
    pub use crate::mock_page::{MockBrowser, MockSite};
    pub use crate::result::{ProbeError, ProbeResult};
    pub use crate::runner::{RunObserver, ScenarioRunner};
    pub use crate::scenario::{Expectation, Stage, TestCase};
    pub use crate::settle::{SettleConfig, SettlePoller};
    pub use crate::suite::Suite;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_prelude_runs_builtin_ui_suite_against_mock() {
        let clock = FakeClock::shared();
        let site = MockSite::dictionary([("mama gedhara yanavaa", "මම ගෙදර යනවා")]);
        let browser = MockBrowser::new(site, clock.clone());
        let config = HarnessConfig::default().with_screenshots(false);
        let runner = ScenarioRunner::new(browser, clock.clone() as Arc<dyn Clock>, config);

        let suite = crate::builtin_named("ui").unwrap();
        let report = runner.run_suite(&suite, None, &mut ()).await.unwrap();
        assert_eq!(report.total_count(), 1);
        assert!(report.all_passed(), "{:?}", report.failures());
        assert!(clock.total_slept() >= Duration::from_millis(1000));
    }
}

//! Scenario runner.
//!
//! Runs each case on a fresh page through the fixed pipeline
//! setup → resolve → baseline → drive → idle → settle → normalize → assert,
//! strictly in declaration order. A failure at any stage is recorded in the
//! case's [`ScenarioOutcome`] and the runner moves on.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::HarnessConfig;
use crate::driver::{Browser, PageDriver};
use crate::input::InputDriver;
use crate::locator::{default_strategies, FieldResolver, FieldRole};
use crate::normalize::read_output;
use crate::report::{RunReport, SuiteReport};
use crate::result::{ProbeError, ProbeResult};
use crate::scenario::{Expectation, ScenarioOutcome, Stage, TestCase};
use crate::settle::{OutputProbe, SettlePoller};
use crate::suite::Suite;

/// Receives progress while a suite runs
pub trait RunObserver: Send {
    /// A suite is about to run `total` cases
    fn suite_started(&mut self, _suite: &Suite, _total: usize) {}

    /// An attempt of `case` is starting
    fn case_started(&mut self, _case: &TestCase, _attempt: u32) {}

    /// `case` finished, retries included
    fn case_finished(&mut self, _outcome: &ScenarioOutcome) {}
}

impl RunObserver for () {}

type StageResult<T> = Result<T, (Stage, String)>;

fn at<T>(stage: Stage, result: ProbeResult<T>) -> StageResult<T> {
    result.map_err(|e| (stage, e.to_string()))
}

/// Runs suites against pages opened from `B`
pub struct ScenarioRunner<B: Browser> {
    browser: B,
    clock: Arc<dyn Clock>,
    config: HarnessConfig,
    resolver: FieldResolver,
    input: InputDriver,
    poller: SettlePoller,
}

impl<B: Browser + fmt::Debug> fmt::Debug for ScenarioRunner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("browser", &self.browser)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: Browser> ScenarioRunner<B> {
    /// Create a runner
    pub fn new(browser: B, clock: Arc<dyn Clock>, config: HarnessConfig) -> Self {
        let resolver = FieldResolver::new(Arc::clone(&clock), config.locate_options());
        let input = InputDriver::new(Arc::clone(&clock), config.input.clone());
        let poller = SettlePoller::new(Arc::clone(&clock), config.settle.clone());
        Self {
            browser,
            clock,
            config,
            resolver,
            input,
            poller,
        }
    }

    /// Browser pages are opened from
    pub const fn browser(&self) -> &B {
        &self.browser
    }

    /// Harness configuration
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every suite, collecting one run report
    ///
    /// # Errors
    ///
    /// Returns error if a suite has focused cases while forbid-only is on
    pub async fn run_all(
        &self,
        suites: &[Suite],
        filter: Option<&str>,
        observer: &mut dyn RunObserver,
    ) -> ProbeResult<RunReport> {
        if self.config.effective_forbid_only() {
            let ids: Vec<String> = suites.iter().flat_map(Suite::focused_ids).collect();
            if !ids.is_empty() {
                return Err(ProbeError::FocusedTestsForbidden { ids });
            }
        }
        let mut run = RunReport::new(self.config.base_url.clone(), self.config.ci);
        for suite in suites {
            run.push(self.run_suite(suite, filter, observer).await?);
        }
        Ok(run)
    }

    /// Run the selected cases of one suite
    ///
    /// # Errors
    ///
    /// Returns error if the suite has focused cases while forbid-only is on
    pub async fn run_suite(
        &self,
        suite: &Suite,
        filter: Option<&str>,
        observer: &mut dyn RunObserver,
    ) -> ProbeResult<SuiteReport> {
        let cases = suite.select(filter, self.config.effective_forbid_only())?;
        let setup_delay = suite.setup_delay(self.config.setup_delay_ms);
        tracing::info!(suite = %suite.name, cases = cases.len(), "suite started");
        observer.suite_started(suite, cases.len());

        let mut report = SuiteReport::start(suite.name.clone());
        for case in cases {
            let outcome = self.run_case(case, setup_delay, observer).await;
            observer.case_finished(&outcome);
            report.record(outcome);
        }
        tracing::info!("{}", report.summary());
        Ok(report)
    }

    /// Run one case, retrying a failure up to the configured retry count
    pub async fn run_case(
        &self,
        case: &TestCase,
        setup_delay: Duration,
        observer: &mut dyn RunObserver,
    ) -> ScenarioOutcome {
        let max_attempts = self.config.effective_retries() + 1;
        let mut attempt = 1;
        loop {
            observer.case_started(case, attempt);
            let mut outcome = self.run_attempt(case, setup_delay, attempt).await;
            outcome.attempts = attempt;
            if outcome.passed || attempt >= max_attempts {
                return outcome;
            }
            tracing::warn!(
                id = %case.id,
                attempt,
                stage = ?outcome.failed_stage,
                error = outcome.error.as_deref().unwrap_or_default(),
                "scenario failed, retrying on a fresh page"
            );
            attempt += 1;
        }
    }

    async fn run_attempt(&self, case: &TestCase, setup_delay: Duration, attempt: u32) -> ScenarioOutcome {
        let start = self.clock.now();
        tracing::info!(id = %case.id, attempt, "scenario started");
        let mut outcome = ScenarioOutcome::start(case);

        let page = match self.browser.new_page().await {
            Ok(page) => page,
            Err(e) => {
                outcome.duration = self.clock.now().saturating_sub(start);
                return outcome.fail(Stage::Setup, e.to_string());
            }
        };

        let result = self.exercise(&page, case, setup_delay, &mut outcome).await;
        outcome = match result {
            Ok(()) => outcome.pass(),
            Err((stage, message)) => outcome.fail(stage, message),
        };

        if !outcome.passed && self.config.screenshot_on_failure {
            outcome.screenshot = self.capture(&page, case, attempt).await;
        }
        if let Err(e) = page.close().await {
            tracing::debug!(id = %case.id, error = %e, "page close failed");
        }

        outcome.duration = self.clock.now().saturating_sub(start);
        tracing::info!(
            id = %case.id,
            passed = outcome.passed,
            stage = ?outcome.failed_stage,
            duration_ms = outcome.duration_ms(),
            "scenario finished"
        );
        outcome
    }

    async fn exercise(
        &self,
        page: &B::Page,
        case: &TestCase,
        setup_delay: Duration,
        outcome: &mut ScenarioOutcome,
    ) -> StageResult<()> {
        at(Stage::Setup, self.setup(page, setup_delay).await)?;
        if case.pre_delay_ms > 0 {
            self.clock.sleep(Duration::from_millis(case.pre_delay_ms)).await;
        }

        let input = at(
            Stage::Resolve,
            self.resolver.resolve_role(page, FieldRole::Input).await,
        )?;
        let output = at(
            Stage::Resolve,
            self.resolver
                .resolve(
                    page,
                    FieldRole::Output,
                    &default_strategies(FieldRole::Output),
                    false,
                )
                .await,
        )?;
        let baseline = read_output(page, &output).await;

        let mode = case.input_mode.unwrap_or(self.config.input.mode);
        at(
            Stage::Input,
            self.input.drive_with(page, &input, &case.input, mode).await,
        )?;
        self.wait_for_idle(page, "commit").await;
        if case.post_input_delay_ms > 0 {
            self.clock
                .sleep(Duration::from_millis(case.post_input_delay_ms))
                .await;
        }

        let settled = self
            .poller
            .settle(&OutputProbe::new(page, &output), Some(&baseline))
            .await;
        outcome.actual = Some(settled.text.clone());
        outcome.settle = Some(settled.clone());
        outcome.input_enabled_after = page
            .element_state(&input.target)
            .await
            .ok()
            .flatten()
            .map(|state| state.enabled);

        if let Err(mismatch) = case.check(&settled.text) {
            if !settled.settled && case.expectation != Expectation::Completes {
                return Err((
                    Stage::Settle,
                    format!(
                        "output did not settle within {}ms ({} reads): {mismatch}",
                        settled.elapsed_ms(),
                        settled.attempts
                    ),
                ));
            }
            return Err((Stage::Assert, mismatch));
        }
        if case.require_input_enabled && outcome.input_enabled_after != Some(true) {
            return Err((
                Stage::Assert,
                "input field was not enabled after the output settled".to_string(),
            ));
        }
        Ok(())
    }

    /// Navigate, wait for network idle (timeout tolerated), then stabilize
    async fn setup(&self, page: &B::Page, setup_delay: Duration) -> ProbeResult<()> {
        let url = self.config.base_url.as_str();
        let timeout = self.config.navigation_timeout();
        tokio::select! {
            biased;
            navigated = page.navigate(url) => navigated?,
            () = self.clock.sleep(timeout) => {
                return Err(ProbeError::NavigationError {
                    url: url.to_string(),
                    message: format!("no response within {}ms", timeout.as_millis()),
                });
            }
        }

        self.wait_for_idle(page, "navigation").await;
        self.clock.sleep(setup_delay).await;
        Ok(())
    }

    async fn wait_for_idle(&self, page: &B::Page, after: &str) {
        if let Err(e) = page
            .wait_for_network_idle(self.config.network_idle_timeout())
            .await
        {
            tracing::warn!(after, error = %e, "network did not go idle, continuing");
        }
    }

    async fn capture(&self, page: &B::Page, case: &TestCase, attempt: u32) -> Option<PathBuf> {
        let bytes = match page.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(id = %case.id, error = %e, "failure screenshot unavailable");
                return None;
            }
        };
        let dir = self.config.output_dir.join("screenshots");
        let path = dir.join(format!("{}-attempt{attempt}.png", case.id));
        let written = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&path, bytes).await
        };
        match written.await {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failure screenshot not written");
                None
            }
        }
    }
}

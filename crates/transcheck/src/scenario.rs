//! Test cases, expectations and per-scenario outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::input::InputMode;
use crate::settle::SettleResult;

/// How a case's actual output is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Expectation {
    /// `actual == expected`
    #[default]
    Exact,
    /// `actual != expected`
    Diverges,
    /// `actual` is non-empty
    Liveness,
    /// The pipeline reached the assertion; `actual` may be empty
    Completes,
    /// `actual` contains a run of two or more spaces, or `actual != expected`
    SpacingOrDiverges,
}

impl Expectation {
    /// Whether this expectation compares against an expected value
    #[must_use]
    pub const fn needs_expected(self) -> bool {
        matches!(self, Self::Exact | Self::Diverges | Self::SpacingOrDiverges)
    }

    /// Judge `actual`.
    ///
    /// An `Exact` case without an expected value degrades to liveness.
    ///
    /// # Errors
    ///
    /// Returns a human readable mismatch description
    pub fn check(self, expected: Option<&str>, actual: &str) -> Result<(), String> {
        let expected = expected.filter(|e| !e.is_empty());
        match (self, expected) {
            (Self::Completes, _) => Ok(()),
            (Self::Liveness, _) | (Self::Exact, None) => {
                if actual.is_empty() {
                    Err("expected non-empty output, got empty".to_string())
                } else {
                    Ok(())
                }
            }
            (Self::Exact, Some(expected)) => {
                if actual == expected {
                    Ok(())
                } else {
                    Err(format!("expected {expected:?}, got {actual:?}"))
                }
            }
            (Self::Diverges, Some(expected)) => {
                if actual == expected {
                    Err(format!("expected output to differ from {expected:?}"))
                } else {
                    Ok(())
                }
            }
            (Self::SpacingOrDiverges, Some(expected)) => {
                if has_space_run(actual) || actual != expected {
                    Ok(())
                } else {
                    Err(format!(
                        "expected preserved spacing or output differing from {expected:?}"
                    ))
                }
            }
            (Self::Diverges | Self::SpacingOrDiverges, None) => {
                Err(format!("{self} requires an expected value"))
            }
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::Diverges => "diverges",
            Self::Liveness => "liveness",
            Self::Completes => "completes",
            Self::SpacingOrDiverges => "spacing-or-diverges",
        };
        f.write_str(name)
    }
}

/// Whether `text` contains two or more consecutive spaces
#[must_use]
pub fn has_space_run(text: &str) -> bool {
    text.contains("  ")
}

/// One scenario: input, expected output, and how to judge it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Stable identifier (`Pos_Fun_0001`)
    pub id: String,
    /// Human description
    pub title: Option<String>,
    /// Text injected into the input field
    pub input: String,
    /// Expected output, if any
    pub expected: Option<String>,
    /// Judging mode
    pub expectation: Expectation,
    /// Insertion mode override
    pub input_mode: Option<InputMode>,
    /// Extra wait before the stimulus, in milliseconds
    pub pre_delay_ms: u64,
    /// Extra wait after the commit before polling starts, in milliseconds
    pub post_input_delay_ms: u64,
    /// Fail when the input field is disabled after the output settles
    pub require_input_enabled: bool,
    /// Focused ("only") case
    pub focused: bool,
}

impl TestCase {
    /// Case with the given expectation and no expected value
    #[must_use]
    pub fn new(id: impl Into<String>, input: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            id: id.into(),
            title: None,
            input: input.into(),
            expected: None,
            expectation,
            input_mode: None,
            pre_delay_ms: 0,
            post_input_delay_ms: 0,
            require_input_enabled: false,
            focused: false,
        }
    }

    /// Exact-match case
    #[must_use]
    pub fn exact(id: impl Into<String>, input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::new(id, input, Expectation::Exact).with_expected(expected)
    }

    /// Divergence case
    #[must_use]
    pub fn diverges(
        id: impl Into<String>,
        input: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::new(id, input, Expectation::Diverges).with_expected(expected)
    }

    /// Liveness case
    #[must_use]
    pub fn liveness(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(id, input, Expectation::Liveness)
    }

    /// Completion-only case
    #[must_use]
    pub fn completes(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(id, input, Expectation::Completes)
    }

    /// Set expected value
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Set title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Override the insertion mode
    #[must_use]
    pub const fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = Some(mode);
        self
    }

    /// Wait before the stimulus
    #[must_use]
    pub const fn with_pre_delay(mut self, delay: Duration) -> Self {
        self.pre_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Wait after the commit before polling the output
    #[must_use]
    pub const fn with_post_input_delay(mut self, delay: Duration) -> Self {
        self.post_input_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Require the input to stay enabled
    #[must_use]
    pub const fn requiring_input_enabled(mut self) -> Self {
        self.require_input_enabled = true;
        self
    }

    /// Mark as focused
    #[must_use]
    pub const fn focused(mut self) -> Self {
        self.focused = true;
        self
    }

    /// Judge `actual` against this case
    ///
    /// # Errors
    ///
    /// Returns a human readable mismatch description
    pub fn check(&self, actual: &str) -> Result<(), String> {
        self.expectation.check(self.expected.as_deref(), actual)
    }
}

/// Pipeline stage of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Page open, navigation, network idle, setup delay
    Setup,
    /// Field resolution
    Resolve,
    /// Clear, insert, commit
    Input,
    /// Waiting for the output to settle
    Settle,
    /// Judging the output
    Assert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Resolve => "resolve",
            Self::Input => "input",
            Self::Settle => "settle",
            Self::Assert => "assert",
        };
        f.write_str(name)
    }
}

/// What happened to one scenario, after retries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Case id
    pub id: String,
    /// Case title
    pub title: Option<String>,
    /// Injected text
    pub input: String,
    /// Expected output
    pub expected: Option<String>,
    /// Judging mode
    pub expectation: Expectation,
    /// Normalized output, if the scenario got that far
    pub actual: Option<String>,
    /// Whether the case passed
    pub passed: bool,
    /// Stage that failed
    pub failed_stage: Option<Stage>,
    /// Failure description
    pub error: Option<String>,
    /// Settle poller result
    pub settle: Option<SettleResult>,
    /// Runs performed, first run included
    pub attempts: u32,
    /// Wall time of the last attempt
    pub duration: Duration,
    /// Input field still enabled after the output settled
    pub input_enabled_after: Option<bool>,
    /// Failure screenshot
    pub screenshot: Option<PathBuf>,
}

impl ScenarioOutcome {
    /// Fresh outcome for `case`, not yet passed
    #[must_use]
    pub fn start(case: &TestCase) -> Self {
        Self {
            id: case.id.clone(),
            title: case.title.clone(),
            input: case.input.clone(),
            expected: case.expected.clone(),
            expectation: case.expectation,
            actual: None,
            passed: false,
            failed_stage: None,
            error: None,
            settle: None,
            attempts: 1,
            duration: Duration::ZERO,
            input_enabled_after: None,
            screenshot: None,
        }
    }

    /// Record a failure at `stage`
    #[must_use]
    pub fn fail(mut self, stage: Stage, error: impl Into<String>) -> Self {
        self.passed = false;
        self.failed_stage = Some(stage);
        self.error = Some(error.into());
        self
    }

    /// Record a pass
    #[must_use]
    pub fn pass(mut self) -> Self {
        self.passed = true;
        self.failed_stage = None;
        self.error = None;
        self
    }

    /// Duration in milliseconds
    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

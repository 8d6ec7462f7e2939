//! Run reports.
//!
//! A [`RunReport`] collects one [`SuiteReport`] per executed suite and is
//! written as `report.json` into the configured output directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::result::ProbeResult;
use crate::scenario::ScenarioOutcome;

/// File name of the JSON report
pub const REPORT_FILE_NAME: &str = "report.json";

/// Outcomes of one suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub finished_at: DateTime<Utc>,
    /// Outcomes in execution order
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// Empty report for `suite` starting now
    #[must_use]
    pub fn start(suite: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            suite: suite.into(),
            started_at: now,
            finished_at: now,
            outcomes: Vec::new(),
        }
    }

    /// Record an outcome
    pub fn record(&mut self, outcome: ScenarioOutcome) {
        self.outcomes.push(outcome);
        self.finished_at = Utc::now();
    }

    /// Number of passing scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    /// Number of failing scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    /// Number of scenarios
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Scenarios that passed only after a retry
    #[must_use]
    pub fn flaky_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.passed && o.attempts > 1)
            .count()
    }

    /// Pass rate (0.0 to 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pass_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        self.passed_count() as f64 / self.outcomes.len() as f64
    }

    /// Check if every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Sum of scenario durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.outcomes.iter().map(|o| o.duration).sum()
    }

    /// Failing scenarios
    #[must_use]
    pub fn failures(&self) -> Vec<&ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed).collect()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}: {}/{} passed ({:.1}%)",
            self.suite,
            self.passed_count(),
            self.total_count(),
            self.pass_rate() * 100.0
        );
        let flaky = self.flaky_count();
        if flaky > 0 {
            line.push_str(&format!(", {flaky} flaky"));
        }
        line
    }
}

/// Everything one invocation ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run id
    pub run_id: Uuid,
    /// Base URL under test
    pub base_url: String,
    /// Whether the run was a CI run
    pub ci: bool,
    /// Per-suite reports
    pub suites: Vec<SuiteReport>,
}

impl RunReport {
    /// Empty run report
    #[must_use]
    pub fn new(base_url: impl Into<String>, ci: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            base_url: base_url.into(),
            ci,
            suites: Vec::new(),
        }
    }

    /// Add a suite report
    pub fn push(&mut self, suite: SuiteReport) {
        self.suites.push(suite);
    }

    /// Check if every scenario of every suite passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.suites.iter().all(SuiteReport::all_passed)
    }

    /// Total passing scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.suites.iter().map(SuiteReport::passed_count).sum()
    }

    /// Total scenarios
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.suites.iter().map(SuiteReport::total_count).sum()
    }

    /// Serialize to pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `report.json` into `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written
    pub fn write_json(&self, dir: &Path) -> ProbeResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE_NAME);
        std::fs::write(&path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "report written");
        Ok(path)
    }
}

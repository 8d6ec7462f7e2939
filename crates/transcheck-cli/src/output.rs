//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use transcheck::{RunObserver, RunReport, ScenarioOutcome, Suite, TestCase};

/// Live progress for a run, one bar per suite
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
    /// Print settle details per scenario
    pub verbose: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool, verbose: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
            verbose,
        }
    }

    /// Start a progress bar for `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    fn finish_progress(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_and_clear();
        }
    }

    fn write_line(&self, line: &str) {
        match self.progress_bar {
            Some(ref pb) => pb.suspend(|| {
                let _ = self.term.write_line(line);
            }),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        self.write_line("");
        self.write_line(&styled);
    }

    /// Print the closing summary of a run
    pub fn summary(&self, report: &RunReport, duration: Duration) {
        let passed = report.passed_count();
        let total = report.total_count();
        let failed = total - passed;
        if self.quiet && failed == 0 {
            return;
        }

        let _ = self.term.write_line("");
        for suite in &report.suites {
            let _ = self.term.write_line(&format!("  {}", suite.summary()));
        }

        let secs = duration.as_secs_f64();
        if self.use_color {
            let status = if failed > 0 {
                Style::new().red().bold().apply_to("FAILED")
            } else {
                Style::new().green().bold().apply_to("PASSED")
            };
            let _ = self.term.write_line(&format!(
                "{status} {total} scenarios in {secs:.2}s ({passed} passed, {failed} failed)"
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} scenarios in {secs:.2}s ({passed} passed, {failed} failed)"
            ));
        }
    }
}

/// One-line description of a scenario outcome
#[must_use]
pub fn describe_outcome(outcome: &ScenarioOutcome) -> String {
    let mut line = format!("{} ({}ms", outcome.id, outcome.duration_ms());
    if outcome.attempts > 1 {
        line.push_str(&format!(", attempt {}", outcome.attempts));
    }
    line.push(')');
    line
}

/// Multi-line failure description: stage, error, expected and actual
#[must_use]
pub fn describe_failure(outcome: &ScenarioOutcome) -> String {
    let stage = outcome
        .failed_stage
        .map_or_else(|| "unknown".to_string(), |s| s.to_string());
    let mut text = format!(
        "{} failed at {stage}: {}",
        describe_outcome(outcome),
        outcome.error.as_deref().unwrap_or_default()
    );
    text.push_str(&format!("\n    input:    {:?}", outcome.input));
    if let Some(ref expected) = outcome.expected {
        text.push_str(&format!("\n    expected: {expected:?} ({})", outcome.expectation));
    }
    if let Some(ref actual) = outcome.actual {
        text.push_str(&format!("\n    actual:   {actual:?}"));
    }
    if let Some(ref path) = outcome.screenshot {
        text.push_str(&format!("\n    screenshot: {}", path.display()));
    }
    text
}

impl RunObserver for ProgressReporter {
    fn suite_started(&mut self, suite: &Suite, total: usize) {
        self.finish_progress();
        self.header(&suite.name);
        self.start_progress(total as u64, "");
    }

    fn case_started(&mut self, case: &TestCase, attempt: u32) {
        if let Some(ref pb) = self.progress_bar {
            if attempt > 1 {
                pb.set_message(format!("{} (retry {})", case.id, attempt - 1));
            } else {
                pb.set_message(case.id.clone());
            }
        }
    }

    fn case_finished(&mut self, outcome: &ScenarioOutcome) {
        if outcome.passed {
            let mut line = describe_outcome(outcome);
            if self.verbose {
                if let Some(ref settle) = outcome.settle {
                    line.push_str(&format!(
                        " settled in {}ms after {} reads",
                        settle.elapsed_ms(),
                        settle.attempts
                    ));
                }
            }
            self.success(&line);
        } else {
            self.failure(&describe_failure(outcome));
        }
        let done = self.progress_bar.as_ref().is_some_and(|pb| {
            pb.inc(1);
            pb.position() >= pb.length().unwrap_or(0)
        });
        if done {
            self.finish_progress();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use transcheck::Stage;

    fn failed() -> ScenarioOutcome {
        let case = TestCase::exact("Pos_Fun_0001", "mama gedhara yanavaa.", "මම ගෙදර යනවා.");
        let mut outcome = ScenarioOutcome::start(&case);
        outcome.actual = Some("මම ගෙදර".to_string());
        outcome.attempts = 3;
        outcome.duration = Duration::from_millis(4200);
        outcome.fail(Stage::Assert, "expected exact match")
    }

    #[test]
    fn test_describe_outcome_mentions_retries() {
        assert_eq!(describe_outcome(&failed()), "Pos_Fun_0001 (4200ms, attempt 3)");
    }

    #[test]
    fn test_describe_failure() {
        let text = describe_failure(&failed());
        assert!(text.starts_with("Pos_Fun_0001 (4200ms, attempt 3) failed at assert: expected exact match"));
        assert!(text.contains("expected: \"මම ගෙදර යනවා.\" (exact)"));
        assert!(text.contains("actual:   \"මම ගෙදර\""));
    }

    #[test]
    fn test_quiet_reporter_has_no_bar() {
        let mut reporter = ProgressReporter::new(false, true, false);
        reporter.start_progress(3, "suite");
        assert!(reporter.progress_bar.is_none());
    }

    #[test]
    fn test_bar_cleared_after_last_case() {
        let mut reporter = ProgressReporter::new(false, false, false);
        let case = TestCase::liveness("A", "api");
        reporter.suite_started(&Suite::new("s").with_case(case.clone()), 1);
        reporter.case_started(&case, 1);
        reporter.case_finished(&ScenarioOutcome::start(&case).pass());
        assert!(reporter.progress_bar.is_none());
    }
}

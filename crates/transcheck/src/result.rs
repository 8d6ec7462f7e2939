//! Result and error types for transcheck.

use thiserror::Error;

/// Result type for transcheck operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a page
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No element matched any strategy for a role within the locate timeout
    #[error("Element not found for role '{role}' (tried: {strategies})")]
    ElementNotFound {
        /// Role that was being resolved
        role: String,
        /// Every strategy attempted, in order
        strategies: String,
    },

    /// Field exists but is not interactable
    #[error("Input rejected by {role} field: {reason}")]
    InputRejected {
        /// Role of the field
        role: String,
        /// Why the field rejected input
        reason: String,
    },

    /// The focus-change commit could not be dispatched
    #[error("Commit via {action} failed: {message}")]
    CommitFailed {
        /// Commit action that was attempted
        action: String,
        /// Error message
        message: String,
    },

    /// Output never settled. The poller reports this as data; callers that
    /// require settlement convert it with [`crate::SettleResult::require_settled`].
    #[error("Output did not settle within {elapsed_ms}ms")]
    SettleTimeout {
        /// Time spent polling, grace included
        elapsed_ms: u64,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Focused cases present while forbid-only is active
    #[error("Focused test cases are forbidden in this run: {}", ids.join(", "))]
    FocusedTestsForbidden {
        /// Ids of the focused cases
        ids: Vec<String>,
    },

    /// Invalid suite definition
    #[error("Invalid suite '{suite}': {message}")]
    Suite {
        /// Suite name
        suite: String,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::PageError {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a suite error
    #[must_use]
    pub fn suite(suite: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Suite {
            suite: suite.into(),
            message: message.into(),
        }
    }

    /// Whether the error ends only the current scenario, not the suite
    #[must_use]
    pub const fn is_scenario_scoped(&self) -> bool {
        matches!(
            self,
            Self::ElementNotFound { .. }
                | Self::InputRejected { .. }
                | Self::CommitFailed { .. }
                | Self::SettleTimeout { .. }
                | Self::PageError { .. }
                | Self::NavigationError { .. }
                | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_not_found_names_role_and_strategies() {
        let err = ProbeError::ElementNotFound {
            role: "output".to_string(),
            strategies: "structural `div.out` (last)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("output"));
        assert!(msg.contains("div.out"));
    }

    #[test]
    fn test_focused_tests_forbidden_lists_ids() {
        let err = ProbeError::FocusedTestsForbidden {
            ids: vec!["Pos_Fun_0001".to_string(), "Neg_Fun_0002".to_string()],
        };
        assert!(err.to_string().contains("Pos_Fun_0001, Neg_Fun_0002"));
    }

    #[test]
    fn test_scenario_scoped() {
        assert!(ProbeError::page("boom").is_scenario_scoped());
        assert!(ProbeError::Timeout { ms: 10 }.is_scenario_scoped());
        assert!(!ProbeError::config("bad").is_scenario_scoped());
        assert!(!ProbeError::FocusedTestsForbidden { ids: vec![] }.is_scenario_scoped());
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ProbeError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}

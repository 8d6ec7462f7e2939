//! Harness configuration.
//!
//! Layers, lowest precedence first: defaults, optional YAML file,
//! environment (`CI`, `TRANSCHECK_BASE_URL`, `CHROMIUM_PATH`), then
//! explicit overrides applied by the caller (CLI flags).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::BrowserConfig;
use crate::input::InputConfig;
use crate::locator::{LocateOptions, DEFAULT_LOCATE_POLL_MS, DEFAULT_LOCATE_TIMEOUT_MS};
use crate::result::{ProbeError, ProbeResult};
use crate::settle::SettleConfig;

/// Translator under test
pub const DEFAULT_BASE_URL: &str = "https://www.swifttranslator.com/";

/// Navigation timeout (30 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// Network idle wait in the setup hook (10 seconds)
pub const DEFAULT_NETWORK_IDLE_TIMEOUT_MS: u64 = 10_000;

/// Stabilization wait at the end of the setup hook (2 seconds)
pub const DEFAULT_SETUP_DELAY_MS: u64 = 2_000;

/// Retries per failing scenario when running under CI
pub const CI_RETRIES: u32 = 2;

/// Default report directory
pub const DEFAULT_OUTPUT_DIR: &str = "target/transcheck";

/// Environment variable overriding the base URL
pub const ENV_BASE_URL: &str = "TRANSCHECK_BASE_URL";

/// Environment variable naming the Chromium binary
pub const ENV_CHROMIUM_PATH: &str = "CHROMIUM_PATH";

/// Environment variable marking a CI run
pub const ENV_CI: &str = "CI";

/// Full harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Page under test
    pub base_url: String,
    /// Run the browser headless
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Disable the Chromium sandbox
    pub no_sandbox: bool,
    /// Navigation timeout in milliseconds
    pub navigation_timeout_ms: u64,
    /// Field resolution timeout in milliseconds
    pub locate_timeout_ms: u64,
    /// Field resolution poll interval in milliseconds
    pub locate_poll_ms: u64,
    /// Network idle wait in the setup hook, in milliseconds
    pub network_idle_timeout_ms: u64,
    /// Wait after the setup hook, in milliseconds (suites may override)
    pub setup_delay_ms: u64,
    /// Input driver settings
    pub input: InputConfig,
    /// Settle poller settings
    pub settle: SettleConfig,
    /// Retries per failing scenario (None = derive from CI)
    pub retries: Option<u32>,
    /// Refuse focused cases (None = derive from CI)
    pub forbid_only: Option<bool>,
    /// Running under CI
    pub ci: bool,
    /// Capture a screenshot when a scenario fails
    pub screenshot_on_failure: bool,
    /// Where reports and screenshots go
    pub output_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            no_sandbox: false,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            locate_timeout_ms: DEFAULT_LOCATE_TIMEOUT_MS,
            locate_poll_ms: DEFAULT_LOCATE_POLL_MS,
            network_idle_timeout_ms: DEFAULT_NETWORK_IDLE_TIMEOUT_MS,
            setup_delay_ms: DEFAULT_SETUP_DELAY_MS,
            input: InputConfig::default(),
            settle: SettleConfig::default(),
            retries: None,
            forbid_only: None,
            ci: false,
            screenshot_on_failure: true,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl HarnessConfig {
    /// Create default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document; missing keys keep their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_yaml_file(path: &Path) -> ProbeResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Defaults, then `path` if given, then the process environment
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be loaded or the result is invalid
    pub fn load(path: Option<&Path>) -> ProbeResult<Self> {
        let config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// `CI` counts as set when it holds any non-empty value.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if non_empty(ENV_CI).is_some() {
            self.ci = true;
        }
        if let Some(url) = non_empty(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(path) = non_empty(ENV_CHROMIUM_PATH) {
            self.chromium_path = Some(path);
        }
        self
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set retries
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set forbid-only
    #[must_use]
    pub const fn with_forbid_only(mut self, forbid: bool) -> Self {
        self.forbid_only = Some(forbid);
        self
    }

    /// Mark the run as CI
    #[must_use]
    pub const fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    /// Set setup delay
    #[must_use]
    pub const fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set input settings
    #[must_use]
    pub fn with_input(mut self, input: InputConfig) -> Self {
        self.input = input;
        self
    }

    /// Set settle settings
    #[must_use]
    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    /// Set screenshot capture
    #[must_use]
    pub const fn with_screenshots(mut self, enabled: bool) -> Self {
        self.screenshot_on_failure = enabled;
        self
    }

    /// Set output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Retries in effect: explicit value, else 2 under CI and 0 locally
    #[must_use]
    pub fn effective_retries(&self) -> u32 {
        self.retries
            .unwrap_or(if self.ci { CI_RETRIES } else { 0 })
    }

    /// Forbid-only in effect: explicit value, else on exactly under CI
    #[must_use]
    pub fn effective_forbid_only(&self) -> bool {
        self.forbid_only.unwrap_or(self.ci)
    }

    /// Field resolution options
    #[must_use]
    pub const fn locate_options(&self) -> LocateOptions {
        LocateOptions {
            timeout: Duration::from_millis(self.locate_timeout_ms),
            poll_interval: Duration::from_millis(self.locate_poll_ms),
            require_visible: true,
        }
    }

    /// Browser launch settings
    #[must_use]
    pub fn browser_config(&self) -> BrowserConfig {
        let mut config = BrowserConfig::default()
            .with_headless(self.headless)
            .with_viewport(self.viewport_width, self.viewport_height);
        if let Some(path) = &self.chromium_path {
            config = config.with_chromium_path(path.clone());
        }
        if self.no_sandbox {
            config = config.with_no_sandbox();
        }
        config
    }

    /// Navigation timeout
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Network idle timeout
    #[must_use]
    pub const fn network_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.network_idle_timeout_ms)
    }

    /// Check the configuration
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first problem found
    pub fn validate(&self) -> ProbeResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ProbeError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.locate_poll_ms == 0 {
            return Err(ProbeError::config("locate_poll_ms must be positive"));
        }
        if self.navigation_timeout_ms == 0 {
            return Err(ProbeError::config("navigation_timeout_ms must be positive"));
        }
        self.settle.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = HarnessConfig::default();
            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert_eq!(config.navigation_timeout(), Duration::from_secs(30));
            assert_eq!(config.network_idle_timeout(), Duration::from_secs(10));
            assert_eq!(config.setup_delay_ms, 2000);
            assert_eq!(config.effective_retries(), 0);
            assert!(!config.effective_forbid_only());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_locate_options_follow_config() {
            let config = HarnessConfig {
                locate_timeout_ms: 1500,
                ..HarnessConfig::default()
            };
            let options = config.locate_options();
            assert_eq!(options.timeout, Duration::from_millis(1500));
            assert!(options.require_visible);
        }

        #[test]
        fn test_browser_config_mapping() {
            let config = HarnessConfig {
                no_sandbox: true,
                chromium_path: Some("/opt/chromium".to_string()),
                ..HarnessConfig::default()
            }
            .with_headless(false);
            let browser = config.browser_config();
            assert!(!browser.headless);
            assert!(!browser.sandbox);
            assert_eq!(browser.chromium_path.as_deref(), Some("/opt/chromium"));
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_ci_enables_retries_and_forbid_only() {
            let config = HarnessConfig::default().with_env(env(&[("CI", "true")]));
            assert!(config.ci);
            assert_eq!(config.effective_retries(), 2);
            assert!(config.effective_forbid_only());
        }

        #[test]
        fn test_empty_ci_is_unset() {
            let config = HarnessConfig::default().with_env(env(&[("CI", "")]));
            assert!(!config.ci);
        }

        #[test]
        fn test_explicit_retries_beat_ci() {
            let config = HarnessConfig::default()
                .with_retries(5)
                .with_env(env(&[("CI", "1")]));
            assert_eq!(config.effective_retries(), 5);
        }

        #[test]
        fn test_base_url_and_chromium_from_env() {
            let config = HarnessConfig::default().with_env(env(&[
                ("TRANSCHECK_BASE_URL", "http://127.0.0.1:8080/"),
                ("CHROMIUM_PATH", "/usr/bin/chromium"),
            ]));
            assert_eq!(config.base_url, "http://127.0.0.1:8080/");
            assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = HarnessConfig::from_yaml_str(
                "base_url: http://localhost:3000/\nsettle:\n  budget_ms: 5000\ninput:\n  commit: click-outside\n",
            )
            .unwrap();
            assert_eq!(config.base_url, "http://localhost:3000/");
            assert_eq!(config.settle.budget_ms, 5000);
            assert_eq!(config.settle.poll_interval_ms, 100);
            assert_eq!(config.input.commit, crate::input::CommitAction::ClickOutside);
            assert_eq!(config.input.clear_pause_ms, 500);
        }

        #[test]
        fn test_load_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "retries: 1\nheadless: false").unwrap();
            let config = HarnessConfig::from_yaml_file(file.path()).unwrap();
            assert_eq!(config.effective_retries(), 1);
            assert!(!config.headless);
        }

        #[test]
        fn test_missing_file_is_config_error() {
            let err = HarnessConfig::from_yaml_file(Path::new("/nonexistent/transcheck.yaml"))
                .unwrap_err();
            assert!(matches!(err, ProbeError::Config { .. }));
        }

        #[test]
        fn test_invalid_values_rejected() {
            let config = HarnessConfig::default().with_base_url("ftp://example.com");
            assert!(config.validate().is_err());
            let config = HarnessConfig::default()
                .with_settle(SettleConfig::default().with_poll_interval(Duration::ZERO));
            assert!(config.validate().is_err());
        }
    }
}

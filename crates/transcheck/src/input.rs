//! Input driver: clear, inject, commit.
//!
//! The translator starts its pipeline on focus loss, so every injection ends
//! with a commit action that moves focus away from the field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::driver::{Key, PageDriver};
use crate::locator::FieldHandle;
use crate::result::{ProbeError, ProbeResult};

/// Pause between clearing the field and inserting new text (500ms)
pub const DEFAULT_CLEAR_PAUSE_MS: u64 = 500;

/// Per-key delay used when typing without an explicit delay (100ms)
pub const DEFAULT_TYPE_DELAY_MS: u64 = 100;

/// How text reaches the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InputMode {
    /// Replace the value in one step
    #[default]
    Fill,
    /// Per-key events with a delay between keys
    Type {
        /// Delay between keys in milliseconds
        delay_ms: u64,
    },
}

impl InputMode {
    /// Typed mode with the given per-key delay
    #[must_use]
    pub const fn typed(delay: Duration) -> Self {
        Self::Type {
            delay_ms: delay.as_millis() as u64,
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill => write!(f, "fill"),
            Self::Type { delay_ms } => write!(f, "type({delay_ms}ms)"),
        }
    }
}

/// How focus leaves the field after injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitAction {
    /// Press Tab in the field
    #[default]
    Tab,
    /// Click the page away from the field
    ClickOutside,
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tab => write!(f, "tab"),
            Self::ClickOutside => write!(f, "click-outside"),
        }
    }
}

/// Input driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Default insertion mode
    pub mode: InputMode,
    /// Commit action
    pub commit: CommitAction,
    /// Pause after clearing, in milliseconds
    pub clear_pause_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: InputMode::Fill,
            commit: CommitAction::Tab,
            clear_pause_ms: DEFAULT_CLEAR_PAUSE_MS,
        }
    }
}

impl InputConfig {
    /// Set insertion mode
    #[must_use]
    pub const fn with_mode(mut self, mode: InputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set commit action
    #[must_use]
    pub const fn with_commit(mut self, commit: CommitAction) -> Self {
        self.commit = commit;
        self
    }

    /// Set clear pause
    #[must_use]
    pub const fn with_clear_pause(mut self, pause: Duration) -> Self {
        self.clear_pause_ms = pause.as_millis() as u64;
        self
    }

    /// Clear pause as a duration
    #[must_use]
    pub const fn clear_pause(&self) -> Duration {
        Duration::from_millis(self.clear_pause_ms)
    }
}

/// Drives text into a resolved input field
#[derive(Clone)]
pub struct InputDriver {
    clock: Arc<dyn Clock>,
    config: InputConfig,
}

impl fmt::Debug for InputDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputDriver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InputDriver {
    /// Create a driver
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, config: InputConfig) -> Self {
        Self { clock, config }
    }

    /// Driver configuration
    #[must_use]
    pub const fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Clear the field, insert `text` with the configured mode, commit
    pub async fn drive<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        handle: &FieldHandle,
        text: &str,
    ) -> ProbeResult<()> {
        self.drive_with(page, handle, text, self.config.mode).await
    }

    /// Same as [`drive`](Self::drive) with an explicit insertion mode
    pub async fn drive_with<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        handle: &FieldHandle,
        text: &str,
        mode: InputMode,
    ) -> ProbeResult<()> {
        self.acquire(page, handle).await?;

        page.clear(&handle.target)
            .await
            .map_err(|e| rejected(handle, format!("clear failed: {e}")))?;
        self.clock.sleep(self.config.clear_pause()).await;

        self.acquire(page, handle).await?;

        tracing::debug!(role = %handle.role, %mode, chars = text.chars().count(), "inserting text");
        let inserted = match mode {
            InputMode::Fill => page.fill(&handle.target, text).await,
            InputMode::Type { delay_ms } => {
                page.type_text(&handle.target, text, Duration::from_millis(delay_ms))
                    .await
            }
        };
        inserted.map_err(|e| rejected(handle, format!("{mode} failed: {e}")))?;

        self.commit(page, handle).await
    }

    async fn acquire<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        handle: &FieldHandle,
    ) -> ProbeResult<()> {
        let state = page
            .element_state(&handle.target)
            .await
            .map_err(|e| rejected(handle, e.to_string()))?;
        match state {
            None => Err(rejected(handle, "element is gone")),
            Some(s) if !s.visible => Err(rejected(handle, "element is not visible")),
            Some(s) if !s.enabled => Err(rejected(handle, "element is disabled")),
            Some(_) => Ok(()),
        }
    }

    async fn commit<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        handle: &FieldHandle,
    ) -> ProbeResult<()> {
        let action = self.config.commit;
        let dispatched = match action {
            CommitAction::Tab => page.press(&handle.target, Key::Tab).await,
            CommitAction::ClickOutside => page.click_outside().await,
        };
        dispatched.map_err(|e| ProbeError::CommitFailed {
            action: action.to_string(),
            message: e.to_string(),
        })
    }
}

fn rejected(handle: &FieldHandle, reason: impl Into<String>) -> ProbeError {
    ProbeError::InputRejected {
        role: handle.role.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::locator::{FieldResolver, FieldRole, LocateOptions};
    use crate::mock_page::{MockPage, MockSite};

    async fn setup(site: MockSite) -> (Arc<FakeClock>, MockPage, FieldHandle) {
        let clock = FakeClock::shared();
        let page = MockPage::new(site, clock.clone());
        let handle = FieldResolver::new(clock.clone(), LocateOptions::default())
            .resolve_role(&page, FieldRole::Input)
            .await
            .unwrap();
        (clock, page, handle)
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = InputConfig::default();
            assert_eq!(config.mode, InputMode::Fill);
            assert_eq!(config.commit, CommitAction::Tab);
            assert_eq!(config.clear_pause(), Duration::from_millis(500));
        }

        #[test]
        fn test_mode_yaml() {
            let mode: InputMode = serde_yaml_ng::from_str("kind: type\ndelay_ms: 150").unwrap();
            assert_eq!(mode, InputMode::typed(Duration::from_millis(150)));
            assert_eq!(mode.to_string(), "type(150ms)");
        }
    }

    mod drive_tests {
        use super::*;

        #[tokio::test]
        async fn test_clear_pause_fill_commit_order() {
            let (clock, page, handle) = setup(MockSite::echo()).await;
            let driver = InputDriver::new(clock.clone(), InputConfig::default());
            driver.drive(&page, &handle, "mama gedhara yanavaa.").await.unwrap();

            let calls = page.history();
            assert_eq!(
                calls,
                vec![
                    "clear".to_string(),
                    "fill:mama gedhara yanavaa.".to_string(),
                    "press:Tab".to_string()
                ]
            );
            assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);
            assert_eq!(page.input_value(), "mama gedhara yanavaa.");
        }

        #[tokio::test]
        async fn test_typed_mode_spaces_keys() {
            let (clock, page, handle) = setup(MockSite::echo()).await;
            let driver = InputDriver::new(clock.clone(), InputConfig::default());
            driver
                .drive_with(&page, &handle, "mama", InputMode::typed(Duration::from_millis(150)))
                .await
                .unwrap();
            assert!(page.was_called("type:mama"));
            assert_eq!(clock.now_ms(), 500 + 4 * 150);
        }

        #[tokio::test]
        async fn test_click_outside_commit() {
            let (clock, page, handle) = setup(MockSite::echo()).await;
            let config = InputConfig::default().with_commit(CommitAction::ClickOutside);
            InputDriver::new(clock.clone(), config)
                .drive(&page, &handle, "api")
                .await
                .unwrap();
            assert!(page.was_called("click_outside"));
            assert!(!page.was_called("press"));
        }

        #[tokio::test]
        async fn test_field_disabled_after_clear_is_rejected() {
            let (clock, page, handle) = setup(MockSite::echo().disabling_on_clear()).await;
            let err = InputDriver::new(clock.clone(), InputConfig::default())
                .drive(&page, &handle, "api")
                .await
                .unwrap_err();
            match err {
                ProbeError::InputRejected { role, reason } => {
                    assert_eq!(role, "input");
                    assert!(reason.contains("disabled"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(!page.was_called("fill"));
        }

        #[tokio::test]
        async fn test_commit_failure_is_typed() {
            let (clock, page, handle) = setup(MockSite::echo().with_failing_commit()).await;
            let err = InputDriver::new(clock.clone(), InputConfig::default())
                .drive(&page, &handle, "api")
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::CommitFailed { ref action, .. } if action == "tab"));
        }
    }
}

//! Page driver seam.
//!
//! Every harness function takes an explicit page handle implementing
//! [`PageDriver`]; nothing touches ambient browser state. Implementations:
//!
//! - `ChromiumBrowser` / `ChromiumPage` - CDP via chromiumoxide (`browser` feature)
//! - [`MockBrowser`](crate::MockBrowser) / [`MockPage`](crate::MockPage) - scripted
//!   in-memory translator page for unit tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::locator::Target;
use crate::result::ProbeResult;

/// Interactability of a single element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Element is rendered and takes up space
    pub visible: bool,
    /// Element accepts input (not `disabled`, not `readonly`)
    pub enabled: bool,
}

impl ElementState {
    /// Visible and enabled
    #[must_use]
    pub const fn interactable() -> Self {
        Self {
            visible: true,
            enabled: true,
        }
    }

    /// Whether input can be sent to the element
    #[must_use]
    pub const fn is_interactable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// Attribute snapshot of an element, used by page inspection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSummary {
    /// Index in document order among the matches
    pub index: usize,
    /// `id` attribute
    pub id: Option<String>,
    /// `class` attribute
    pub class: Option<String>,
    /// `placeholder` attribute
    pub placeholder: Option<String>,
    /// `readonly` attribute present
    pub readonly: bool,
    /// Rendered (has an offset parent)
    pub visible: bool,
    /// Text content (or value for form fields)
    pub text: String,
}

/// Keys the harness presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    /// Tab (moves focus away)
    Tab,
}

impl Key {
    /// DOM key name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tab => "Tab",
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One browser page: the session handle the harness drives
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to URL
    async fn navigate(&self, url: &str) -> ProbeResult<()>;

    /// Wait until no network activity is observed, bounded by `timeout`
    async fn wait_for_network_idle(&self, timeout: Duration) -> ProbeResult<()>;

    /// Number of elements matching the target's selector and text filter
    async fn count(&self, target: &Target) -> ProbeResult<usize>;

    /// State of the picked element, `None` if it does not exist
    async fn element_state(&self, target: &Target) -> ProbeResult<Option<ElementState>>;

    /// Text content of the picked element (value for form fields)
    async fn text_content(&self, target: &Target) -> ProbeResult<Option<String>>;

    /// Clear the picked form field
    async fn clear(&self, target: &Target) -> ProbeResult<()>;

    /// Replace the field's value in one step, firing a single input event
    async fn fill(&self, target: &Target, text: &str) -> ProbeResult<()>;

    /// Send per-character key events with `delay` between keys
    async fn type_text(&self, target: &Target, text: &str, delay: Duration) -> ProbeResult<()>;

    /// Press a key with the picked element focused
    async fn press(&self, target: &Target, key: Key) -> ProbeResult<()>;

    /// Click the page body away from any field
    async fn click_outside(&self) -> ProbeResult<()>;

    /// Attribute snapshots of every element matching `css`
    async fn describe_all(&self, css: &str) -> ProbeResult<Vec<ElementSummary>>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> ProbeResult<Vec<u8>>;

    /// Close the page
    async fn close(&self) -> ProbeResult<()>;
}

/// Source of fresh pages, one per scenario
#[async_trait]
pub trait Browser: Send + Sync {
    /// Page type produced by this browser
    type Page: PageDriver;

    /// Open a fresh page
    async fn new_page(&self) -> ProbeResult<Self::Page>;

    /// Shut the browser down
    async fn close(&self) -> ProbeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactable() {
        assert!(ElementState::interactable().is_interactable());
        let disabled = ElementState {
            visible: true,
            enabled: false,
        };
        assert!(!disabled.is_interactable());
        let hidden = ElementState {
            visible: false,
            enabled: true,
        };
        assert!(!hidden.is_interactable());
    }

    #[test]
    fn test_key_names() {
        assert_eq!(Key::Tab.to_string(), "Tab");
        assert_eq!(serde_json::from_str::<Key>("\"Tab\"").unwrap(), Key::Tab);
        // Only the focus-change commit is ever pressed
        assert!(serde_json::from_str::<Key>("\"Enter\"").is_err());
    }

    #[test]
    fn test_summary_default() {
        let summary = ElementSummary::default();
        assert!(summary.id.is_none());
        assert!(!summary.readonly);
        assert!(summary.text.is_empty());
    }
}

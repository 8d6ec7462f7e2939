//! Field locator resolution.
//!
//! Maps a semantic [`FieldRole`] to exactly one live element. Strategies are
//! tried most-specific first; structural fallbacks cover pages whose
//! attribute hints disappear between deployments.
//!
//! # Design Philosophy
//!
//! - **Auto-Waiting**: resolution polls until a strategy matches a visible element
//! - **Last Match Wins**: output panels may stack, the newest is last in document order
//! - **Loud Failure**: exhaustion names the role and every strategy attempted

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::driver::PageDriver;
use crate::result::{ProbeError, ProbeResult};

/// Default timeout for locating a field (5 seconds)
pub const DEFAULT_LOCATE_TIMEOUT_MS: u64 = 5000;

/// Default polling interval while locating (50ms)
pub const DEFAULT_LOCATE_POLL_MS: u64 = 50;

/// JavaScript string literal for `text`
pub(crate) fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// Double-quoted CSS string for an attribute selector value
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c if c.is_ascii_control() => out.push_str(&format!("\\{:x} ", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Placeholder hint carried by the translator's input textarea
pub const INPUT_PLACEHOLDER_HINT: &str = "Input Your Singlish Text";

/// Structural class pattern of the translator's output panel
pub const OUTPUT_PANEL_CSS: &str = "div.whitespace-pre-wrap.overflow-y-auto";

/// Which of several matching elements to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pick {
    /// First match in document order
    #[default]
    First,
    /// Last match in document order
    Last,
    /// Zero-based index in document order
    Nth(usize),
}

impl Pick {
    /// Resolve to a concrete index given the number of matches
    #[must_use]
    pub const fn index(self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        match self {
            Self::First => Some(0),
            Self::Last => Some(count - 1),
            Self::Nth(n) if n < count => Some(n),
            Self::Nth(_) => None,
        }
    }

    /// JavaScript expression picking from an array named `els`
    fn to_js(self) -> String {
        match self {
            Self::First => "els[0]".to_string(),
            Self::Last => "els[els.length - 1]".to_string(),
            Self::Nth(n) => format!("els[{n}]"),
        }
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Last => write!(f, "last"),
            Self::Nth(n) => write!(f, "nth({n})"),
        }
    }
}

/// A concrete element address: CSS selector, optional text filter, pick.
///
/// Picks are re-evaluated on every access so "last" follows panels the page
/// appends after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// CSS selector
    pub css: String,
    /// Keep only elements whose text content contains this
    pub text: Option<String>,
    /// Which match to take
    pub pick: Pick,
}

impl Target {
    /// Target the first match of a CSS selector
    #[must_use]
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
            pick: Pick::First,
        }
    }

    /// Take a different match
    #[must_use]
    pub const fn pick(mut self, pick: Pick) -> Self {
        self.pick = pick;
        self
    }

    /// Filter matches by text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// JavaScript expression evaluating to the array of matching elements
    #[must_use]
    pub fn to_all_query(&self) -> String {
        let base = format!(
            "Array.from(document.querySelectorAll({}))",
            js_string(&self.css)
        );
        match &self.text {
            Some(text) => format!(
                "{base}.filter(el => (el.textContent || '').includes({}))",
                js_string(text)
            ),
            None => base,
        }
    }

    /// JavaScript expression evaluating to the picked element (or undefined)
    #[must_use]
    pub fn to_query(&self) -> String {
        format!(
            "(() => {{ const els = {}; return {}; }})()",
            self.to_all_query(),
            self.pick.to_js()
        )
    }

    /// JavaScript expression evaluating to the number of matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("{}.length", self.to_all_query())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.css)?;
        if let Some(text) = &self.text {
            write!(f, " containing {text:?}")?;
        }
        write!(f, " ({})", self.pick)
    }
}

/// Semantic role of a field on the page under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldRole {
    /// Primary text input
    Input,
    /// Primary text output
    Output,
}

impl fmt::Display for FieldRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// One way of finding an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LocatorStrategy {
    /// `tag[attribute*="contains"]`
    Attribute {
        /// Element tag
        tag: String,
        /// Attribute name
        attribute: String,
        /// Substring the attribute must contain
        contains: String,
        /// Which match to take
        pick: Pick,
    },
    /// Structural CSS pattern (tag, classes)
    Structural {
        /// CSS selector
        css: String,
        /// Which match to take
        pick: Pick,
    },
    /// CSS selector filtered by text content
    TextMatch {
        /// CSS selector
        css: String,
        /// Text the element must contain
        text: String,
        /// Which match to take
        pick: Pick,
    },
}

impl LocatorStrategy {
    /// Attribute-contains strategy
    #[must_use]
    pub fn attribute(
        tag: impl Into<String>,
        attribute: impl Into<String>,
        contains: impl Into<String>,
    ) -> Self {
        Self::Attribute {
            tag: tag.into(),
            attribute: attribute.into(),
            contains: contains.into(),
            pick: Pick::First,
        }
    }

    /// Structural strategy
    #[must_use]
    pub fn structural(css: impl Into<String>, pick: Pick) -> Self {
        Self::Structural {
            css: css.into(),
            pick,
        }
    }

    /// Text-match strategy
    #[must_use]
    pub fn text_match(css: impl Into<String>, text: impl Into<String>, pick: Pick) -> Self {
        Self::TextMatch {
            css: css.into(),
            text: text.into(),
            pick,
        }
    }

    /// Concrete element address for this strategy
    #[must_use]
    pub fn target(&self) -> Target {
        match self {
            Self::Attribute {
                tag,
                attribute,
                contains,
                pick,
            } => Target::css(format!("{tag}[{attribute}*={}]", css_string(contains))).pick(*pick),
            Self::Structural { css, pick } => Target::css(css.clone()).pick(*pick),
            Self::TextMatch { css, text, pick } => {
                Target::css(css.clone()).with_text(text.clone()).pick(*pick)
            }
        }
    }

    /// Short strategy name
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Attribute { .. } => "attribute",
            Self::Structural { .. } => "structural",
            Self::TextMatch { .. } => "text-match",
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}

/// Default strategy chain for a role
#[must_use]
pub fn default_strategies(role: FieldRole) -> Vec<LocatorStrategy> {
    match role {
        FieldRole::Input => vec![
            LocatorStrategy::attribute("textarea", "placeholder", INPUT_PLACEHOLDER_HINT),
            LocatorStrategy::structural("textarea", Pick::First),
        ],
        FieldRole::Output => vec![LocatorStrategy::structural(OUTPUT_PANEL_CSS, Pick::Last)],
    }
}

/// A resolved field: role, the strategy that matched, and its address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldHandle {
    /// Role this handle was resolved for
    pub role: FieldRole,
    /// Strategy that produced the match
    pub strategy: LocatorStrategy,
    /// Element address
    pub target: Target,
}

/// Options for field resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateOptions {
    /// Bound on the whole resolution
    pub timeout: Duration,
    /// Delay between strategy sweeps
    pub poll_interval: Duration,
    /// Whether the element must be visible, not merely present
    pub require_visible: bool,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_LOCATE_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_LOCATE_POLL_MS),
            require_visible: true,
        }
    }
}

impl LocateOptions {
    /// Set timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set visibility requirement
    #[must_use]
    pub const fn with_visible(mut self, visible: bool) -> Self {
        self.require_visible = visible;
        self
    }
}

/// Resolves roles to field handles with bounded auto-waiting
#[derive(Clone)]
pub struct FieldResolver {
    clock: Arc<dyn Clock>,
    options: LocateOptions,
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldResolver")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl FieldResolver {
    /// Create a resolver
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, options: LocateOptions) -> Self {
        Self { clock, options }
    }

    /// Resolver options
    #[must_use]
    pub const fn options(&self) -> &LocateOptions {
        &self.options
    }

    /// Resolve a role with its default strategy chain
    pub async fn resolve_role<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        role: FieldRole,
    ) -> ProbeResult<FieldHandle> {
        self.resolve(page, role, &default_strategies(role), self.options.require_visible)
            .await
    }

    /// Resolve a role, trying `strategies` in order on every sweep.
    ///
    /// At least one sweep runs even with a zero timeout.
    pub async fn resolve<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        role: FieldRole,
        strategies: &[LocatorStrategy],
        require_visible: bool,
    ) -> ProbeResult<FieldHandle> {
        let start = self.clock.now();
        loop {
            for strategy in strategies {
                if let Some(handle) = self.try_strategy(page, role, strategy, require_visible).await
                {
                    tracing::debug!(%role, strategy = %strategy, "field resolved");
                    return Ok(handle);
                }
            }

            let elapsed = self.clock.now().saturating_sub(start);
            if elapsed >= self.options.timeout {
                break;
            }
            let remaining = self.options.timeout - elapsed;
            self.clock
                .sleep(self.options.poll_interval.min(remaining))
                .await;
        }

        Err(ProbeError::ElementNotFound {
            role: role.to_string(),
            strategies: strategies
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        })
    }

    async fn try_strategy<P: PageDriver + ?Sized>(
        &self,
        page: &P,
        role: FieldRole,
        strategy: &LocatorStrategy,
        require_visible: bool,
    ) -> Option<FieldHandle> {
        let target = strategy.target();
        let count = match page.count(&target).await {
            Ok(count) => count,
            Err(e) => {
                tracing::debug!(%role, strategy = %strategy, error = %e, "count failed");
                return None;
            }
        };
        target.pick.index(count)?;

        if require_visible {
            match page.element_state(&target).await {
                Ok(Some(state)) if state.visible => {}
                Ok(_) => return None,
                Err(e) => {
                    tracing::debug!(%role, strategy = %strategy, error = %e, "state failed");
                    return None;
                }
            }
        }

        Some(FieldHandle {
            role,
            strategy: strategy.clone(),
            target,
        })
    }
}

//! Scripted in-memory translator page.
//!
//! Models the page under test closely enough to exercise every harness path
//! without a browser: a textarea with a placeholder hint, stacked output
//! panels, and a debounced translation that renders `latency` after the last
//! input change, measured on the injected [`Clock`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::Clock;
use crate::driver::{Browser, ElementState, ElementSummary, Key, PageDriver};
use crate::locator::{LocatorStrategy, Target, INPUT_PLACEHOLDER_HINT, OUTPUT_PANEL_CSS};
use crate::result::{ProbeError, ProbeResult};

/// Default debounce latency of the scripted page (800ms)
pub const DEFAULT_MOCK_LATENCY_MS: u64 = 800;

type Translator = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Behaviour of the scripted page
#[derive(Clone)]
pub struct MockSite {
    translator: Translator,
    latency: Duration,
    placeholder: bool,
    live_panel: bool,
    stale_panels: usize,
    stale_text: String,
    input_hidden_for: Duration,
    disable_on_clear: bool,
    failing_commit: bool,
    network_busy: bool,
    stalled_navigation: bool,
    flaky_reads: usize,
    padding: bool,
}

impl fmt::Debug for MockSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSite")
            .field("latency", &self.latency)
            .field("placeholder", &self.placeholder)
            .field("live_panel", &self.live_panel)
            .field("stale_panels", &self.stale_panels)
            .finish_non_exhaustive()
    }
}

impl MockSite {
    /// Page rendering `translator(input)` after the debounce latency
    pub fn new(translator: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            translator: Arc::new(translator),
            latency: Duration::from_millis(DEFAULT_MOCK_LATENCY_MS),
            placeholder: true,
            live_panel: true,
            stale_panels: 0,
            stale_text: String::new(),
            input_hidden_for: Duration::ZERO,
            disable_on_clear: false,
            failing_commit: false,
            network_busy: false,
            stalled_navigation: false,
            flaky_reads: 0,
            padding: false,
        }
    }

    /// Page echoing its input
    #[must_use]
    pub fn echo() -> Self {
        Self::new(str::to_string)
    }

    /// Page translating through a fixed dictionary, echoing unknown input
    #[must_use]
    pub fn dictionary<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let table: HashMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(move |input| {
            table
                .get(input)
                .cloned()
                .unwrap_or_else(|| input.to_string())
        })
    }

    /// Page that never renders any output
    #[must_use]
    pub fn silent() -> Self {
        Self::new(|_| String::new())
    }

    /// Set debounce latency
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Drop the placeholder hint from the textarea
    #[must_use]
    pub const fn without_placeholder(mut self) -> Self {
        self.placeholder = false;
        self
    }

    /// Remove the output panel entirely
    #[must_use]
    pub fn without_output(mut self) -> Self {
        self.live_panel = false;
        self.stale_panels = 0;
        self
    }

    /// Stack `count` leftover panels showing `text` before the live one
    #[must_use]
    pub fn with_stale_panels(mut self, count: usize, text: impl Into<String>) -> Self {
        self.stale_panels = count;
        self.stale_text = text.into();
        self
    }

    /// Keep the textarea hidden for `duration` after the page opens
    #[must_use]
    pub const fn with_input_hidden_for(mut self, duration: Duration) -> Self {
        self.input_hidden_for = duration;
        self
    }

    /// Disable the textarea as soon as it is cleared
    #[must_use]
    pub const fn disabling_on_clear(mut self) -> Self {
        self.disable_on_clear = true;
        self
    }

    /// Reject focus-change key presses and clicks
    #[must_use]
    pub const fn with_failing_commit(mut self) -> Self {
        self.failing_commit = true;
        self
    }

    /// Never report network idle
    #[must_use]
    pub const fn with_busy_network(mut self) -> Self {
        self.network_busy = true;
        self
    }

    /// Never answer navigation
    #[must_use]
    pub const fn with_stalled_navigation(mut self) -> Self {
        self.stalled_navigation = true;
        self
    }

    /// Fail the first `count` output reads with a transient page error
    #[must_use]
    pub const fn with_flaky_reads(mut self, count: usize) -> Self {
        self.flaky_reads = count;
        self
    }

    /// Wrap rendered output in surrounding whitespace
    #[must_use]
    pub const fn with_padding(mut self) -> Self {
        self.padding = true;
        self
    }

    fn render(&self, input: &str) -> String {
        if input.is_empty() {
            return String::new();
        }
        let out = (self.translator)(input);
        if self.padding && !out.is_empty() {
            format!("\n   {out}  \n")
        } else {
            out
        }
    }

    fn panel_count(&self) -> usize {
        self.stale_panels + usize::from(self.live_panel)
    }
}

#[derive(Debug, Default)]
struct PageState {
    url: String,
    value: String,
    enabled: bool,
    rendered: String,
    pending: Option<(String, Duration)>,
    reads_failed: usize,
    closed: bool,
    history: Vec<String>,
}

/// One scripted page
pub struct MockPage {
    site: Arc<MockSite>,
    clock: Arc<dyn Clock>,
    opened_at: Duration,
    failing_navigation: bool,
    state: Mutex<PageState>,
}

impl fmt::Debug for MockPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPage")
            .field("site", &self.site)
            .field("opened_at", &self.opened_at)
            .finish_non_exhaustive()
    }
}

enum Element {
    Input,
    Panel(usize),
}

impl MockPage {
    /// Open a scripted page on `clock`
    pub fn new(site: MockSite, clock: Arc<dyn Clock>) -> Self {
        Self::shared(Arc::new(site), clock, false)
    }

    fn shared(site: Arc<MockSite>, clock: Arc<dyn Clock>, failing_navigation: bool) -> Self {
        let opened_at = clock.now();
        Self {
            site,
            clock,
            opened_at,
            failing_navigation,
            state: Mutex::new(PageState {
                enabled: true,
                ..PageState::default()
            }),
        }
    }

    fn lock(&self) -> ProbeResult<MutexGuard<'_, PageState>> {
        self.state
            .lock()
            .map_err(|_| ProbeError::page("mock page state poisoned"))
    }

    /// Current textarea value
    #[must_use]
    pub fn input_value(&self) -> String {
        self.lock().map(|s| s.value.clone()).unwrap_or_default()
    }

    /// Current URL
    #[must_use]
    pub fn url(&self) -> String {
        self.lock().map(|s| s.url.clone()).unwrap_or_default()
    }

    /// Recorded calls, in order
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().map(|s| s.history.clone()).unwrap_or_default()
    }

    /// Check if a call with this prefix was recorded
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.history().iter().any(|c| c.starts_with(method))
    }

    fn record(&self, call: impl Into<String>) -> ProbeResult<()> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(ProbeError::page("page is closed"));
        }
        state.history.push(call.into());
        Ok(())
    }

    fn matches(&self, target: &Target) -> Vec<Element> {
        let attr_css = LocatorStrategy::attribute("textarea", "placeholder", INPUT_PLACEHOLDER_HINT)
            .target()
            .css;
        let mut found = Vec::new();
        if target.css == "textarea" || (self.site.placeholder && target.css == attr_css) {
            found.push(Element::Input);
        } else if target.css == OUTPUT_PANEL_CSS || target.css == "div" {
            found.extend((0..self.site.panel_count()).map(Element::Panel));
        }

        if let Some(filter) = &target.text {
            let texts: Vec<String> = found.iter().map(|el| self.peek_text(el)).collect();
            found = found
                .into_iter()
                .zip(texts)
                .filter(|(_, text)| text.contains(filter.as_str()))
                .map(|(el, _)| el)
                .collect();
        }
        found
    }

    fn pick(&self, target: &Target) -> Option<Element> {
        let mut found = self.matches(target);
        let index = target.pick.index(found.len())?;
        Some(found.swap_remove(index))
    }

    fn peek_text(&self, element: &Element) -> String {
        match element {
            Element::Input => self.input_value(),
            Element::Panel(i) if *i < self.site.stale_panels => self.site.stale_text.clone(),
            Element::Panel(_) => self.live_text().unwrap_or_default(),
        }
    }

    fn live_text(&self) -> ProbeResult<String> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        if let Some((value, changed_at)) = state.pending.clone() {
            if now >= changed_at + self.site.latency {
                state.rendered = self.site.render(&value);
                state.pending = None;
            }
        }
        Ok(state.rendered.clone())
    }

    fn input_visible(&self) -> bool {
        self.clock.now().saturating_sub(self.opened_at) >= self.site.input_hidden_for
    }

    fn change_value(&self, value: String) -> ProbeResult<()> {
        let now = self.clock.now();
        let mut state = self.lock()?;
        if !state.enabled {
            return Err(ProbeError::page("element is disabled"));
        }
        // A debounce that already fired keeps its render even if nobody read it
        if let Some((previous, changed_at)) = state.pending.take() {
            if now >= changed_at + self.site.latency {
                state.rendered = self.site.render(&previous);
            }
        }
        state.pending = Some((value.clone(), now));
        state.value = value;
        Ok(())
    }

    fn require_input(&self, target: &Target) -> ProbeResult<()> {
        match self.pick(target) {
            Some(Element::Input) => Ok(()),
            Some(Element::Panel(_)) => Err(ProbeError::page("element is not editable")),
            None => Err(ProbeError::page(format!("no element matches {target}"))),
        }
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        self.record(format!("navigate:{url}"))?;
        if self.failing_navigation {
            return Err(ProbeError::NavigationError {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        if self.site.stalled_navigation {
            std::future::pending::<()>().await;
        }
        self.lock()?.url = url.to_string();
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> ProbeResult<()> {
        self.record("wait_for_network_idle")?;
        if self.site.network_busy {
            self.clock.sleep(timeout).await;
            return Err(ProbeError::Timeout {
                ms: timeout.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn count(&self, target: &Target) -> ProbeResult<usize> {
        Ok(self.matches(target).len())
    }

    async fn element_state(&self, target: &Target) -> ProbeResult<Option<ElementState>> {
        Ok(self.pick(target).map(|el| match el {
            Element::Input => ElementState {
                visible: self.input_visible(),
                enabled: self.lock().map(|s| s.enabled).unwrap_or(false),
            },
            Element::Panel(_) => ElementState {
                visible: true,
                enabled: false,
            },
        }))
    }

    async fn text_content(&self, target: &Target) -> ProbeResult<Option<String>> {
        self.record("text_content")?;
        let Some(element) = self.pick(target) else {
            return Ok(None);
        };
        if matches!(element, Element::Panel(_)) {
            let mut state = self.lock()?;
            if state.reads_failed < self.site.flaky_reads {
                state.reads_failed += 1;
                return Err(ProbeError::page("execution context was destroyed"));
            }
        }
        Ok(Some(self.peek_text(&element)))
    }

    async fn clear(&self, target: &Target) -> ProbeResult<()> {
        self.record("clear")?;
        self.require_input(target)?;
        self.change_value(String::new())?;
        if self.site.disable_on_clear {
            self.lock()?.enabled = false;
        }
        Ok(())
    }

    async fn fill(&self, target: &Target, text: &str) -> ProbeResult<()> {
        self.record(format!("fill:{text}"))?;
        self.require_input(target)?;
        self.change_value(text.to_string())
    }

    async fn type_text(&self, target: &Target, text: &str, delay: Duration) -> ProbeResult<()> {
        self.record(format!("type:{text}"))?;
        self.require_input(target)?;
        let mut value = self.input_value();
        for ch in text.chars() {
            self.clock.sleep(delay).await;
            value.push(ch);
            self.change_value(value.clone())?;
        }
        Ok(())
    }

    async fn press(&self, target: &Target, key: Key) -> ProbeResult<()> {
        self.record(format!("press:{key}"))?;
        self.require_input(target)?;
        if self.site.failing_commit {
            return Err(ProbeError::page("Input.dispatchKeyEvent failed"));
        }
        Ok(())
    }

    async fn click_outside(&self) -> ProbeResult<()> {
        self.record("click_outside")?;
        if self.site.failing_commit {
            return Err(ProbeError::page("Input.dispatchMouseEvent failed"));
        }
        Ok(())
    }

    async fn describe_all(&self, css: &str) -> ProbeResult<Vec<ElementSummary>> {
        let target = Target::css(css);
        let summaries = self
            .matches(&target)
            .iter()
            .enumerate()
            .map(|(index, el)| match el {
                Element::Input => ElementSummary {
                    index,
                    id: None,
                    class: Some("w-full h-full resize-none".to_string()),
                    placeholder: self
                        .site
                        .placeholder
                        .then(|| format!("{INPUT_PLACEHOLDER_HINT} Here...")),
                    readonly: false,
                    visible: self.input_visible(),
                    text: self.input_value(),
                },
                Element::Panel(_) => ElementSummary {
                    index,
                    class: Some("whitespace-pre-wrap overflow-y-auto".to_string()),
                    visible: true,
                    text: self.peek_text(el),
                    ..ElementSummary::default()
                },
            })
            .collect();
        Ok(summaries)
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        self.record("screenshot")?;
        Ok(vec![0x89, 0x50, 0x4E, 0x47])
    }

    async fn close(&self) -> ProbeResult<()> {
        self.record("close")?;
        self.lock()?.closed = true;
        Ok(())
    }
}

/// Opens scripted pages sharing one site definition and clock
pub struct MockBrowser {
    site: Arc<MockSite>,
    clock: Arc<dyn Clock>,
    opened: AtomicUsize,
    failing_navigation: Vec<usize>,
    page_limit: Option<usize>,
    closed: AtomicBool,
}

impl fmt::Debug for MockBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBrowser")
            .field("site", &self.site)
            .field("opened", &self.opened)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl MockBrowser {
    /// Create a browser for `site`
    pub fn new(site: MockSite, clock: Arc<dyn Clock>) -> Self {
        Self {
            site: Arc::new(site),
            clock,
            opened: AtomicUsize::new(0),
            failing_navigation: Vec::new(),
            page_limit: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Make navigation fail on the page opened at `index` (zero-based)
    #[must_use]
    pub fn with_failing_navigation(mut self, index: usize) -> Self {
        self.failing_navigation.push(index);
        self
    }

    /// Refuse to open more than `limit` pages
    #[must_use]
    pub const fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Number of pages opened so far
    #[must_use]
    pub fn pages_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for MockBrowser {
    type Page = MockPage;

    async fn new_page(&self) -> ProbeResult<MockPage> {
        if self.is_closed() {
            return Err(ProbeError::page("browser is closed"));
        }
        if self.page_limit.is_some_and(|limit| self.pages_opened() >= limit) {
            return Err(ProbeError::page("Target.createTarget failed"));
        }
        let index = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockPage::shared(
            Arc::clone(&self.site),
            Arc::clone(&self.clock),
            self.failing_navigation.contains(&index),
        ))
    }

    async fn close(&self) -> ProbeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

//! Browser control for the live translator.
//!
//! When compiled with the `browser` feature, [`ChromiumBrowser`] launches a
//! real Chromium over the Chrome `DevTools` Protocol via chromiumoxide and
//! hands out one [`ChromiumPage`] per scenario. Without the feature only
//! [`BrowserConfig`] is available; unit tests drive
//! [`MockBrowser`](crate::MockBrowser) instead.

use serde::{Deserialize, Serialize};

use crate::locator::js_string;

/// Quiet period after which the network counts as idle (500ms)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Script setting a form field's value through the native setter so
/// framework-managed inputs observe the change, then firing `input`
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn set_value_script(query: &str, text: &str) -> String {
    format!(
        "(() => {{ const el = {query}; if (!el) return {{ ok: false, reason: 'missing' }}; \
         if (el.disabled || el.readOnly) return {{ ok: false, reason: 'not editable' }}; \
         el.focus(); \
         const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype; \
         const setter = Object.getOwnPropertyDescriptor(proto, 'value').set; \
         setter.call(el, {value}); \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         return {{ ok: true, reason: '' }}; }})()",
        value = js_string(text),
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn state_script(query: &str) -> String {
    format!(
        "(() => {{ const el = {query}; if (!el) return {{ found: false, visible: false, enabled: false }}; \
         const style = window.getComputedStyle(el); \
         const visible = !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length) \
           && style.visibility !== 'hidden' && style.display !== 'none'; \
         return {{ found: true, visible, enabled: !el.disabled && !el.readOnly }}; }})()"
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn text_script(query: &str) -> String {
    format!(
        "(() => {{ const el = {query}; if (!el) return {{ found: false, text: '' }}; \
         const field = el instanceof HTMLTextAreaElement || el instanceof HTMLInputElement; \
         return {{ found: true, text: field ? el.value : (el.textContent || '') }}; }})()"
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn describe_script(css: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({css})).map((el, index) => {{ \
         const field = el instanceof HTMLTextAreaElement || el instanceof HTMLInputElement; \
         return {{ index, id: el.id || null, class: el.getAttribute('class'), \
           placeholder: el.getAttribute('placeholder'), readonly: el.hasAttribute('readonly'), \
           visible: el.offsetParent !== null, text: field ? el.value : (el.textContent || '') }}; }})",
        css = js_string(css),
    )
}

#[cfg(feature = "browser")]
#[allow(clippy::cast_possible_truncation, clippy::significant_drop_tightening)]
mod cdp {
    use super::*;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::element::Element;
    use chromiumoxide::layout::Point;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::Mutex;

    use crate::driver::{Browser, ElementState, ElementSummary, Key, PageDriver};
    use crate::locator::Target;
    use crate::result::{ProbeError, ProbeResult};

    /// Chromium instance with a live CDP connection
    #[derive(Debug)]
    pub struct ChromiumBrowser {
        config: BrowserConfig,
        inner: Arc<Mutex<CdpBrowser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumBrowser {
        /// Launch a new browser instance
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: BrowserConfig) -> ProbeResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            let cdp_config = builder
                .build()
                .map_err(|message| ProbeError::BrowserLaunchError { message })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                ProbeError::BrowserLaunchError {
                    message: e.to_string(),
                }
            })?;

            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            tracing::info!(headless = config.headless, "browser launched");
            Ok(Self {
                config,
                inner: Arc::new(Mutex::new(browser)),
                handle,
            })
        }

        /// Get the browser configuration
        #[must_use]
        pub const fn config(&self) -> &BrowserConfig {
            &self.config
        }
    }

    #[async_trait]
    impl Browser for ChromiumBrowser {
        type Page = ChromiumPage;

        async fn new_page(&self) -> ProbeResult<ChromiumPage> {
            let browser = self.inner.lock().await;
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?;
            Ok(ChromiumPage { inner: page })
        }

        async fn close(&self) -> ProbeResult<()> {
            let mut browser = self.inner.lock().await;
            browser
                .close()
                .await
                .map_err(|e| ProbeError::BrowserLaunchError {
                    message: e.to_string(),
                })?;
            let _ = browser.wait().await;
            self.handle.abort();
            Ok(())
        }
    }

    #[derive(Debug, Deserialize)]
    struct SetValueReply {
        ok: bool,
        reason: String,
    }

    #[derive(Debug, Deserialize)]
    struct StateReply {
        found: bool,
        visible: bool,
        enabled: bool,
    }

    #[derive(Debug, Deserialize)]
    struct TextReply {
        found: bool,
        text: String,
    }

    /// One Chromium tab
    #[derive(Debug, Clone)]
    pub struct ChromiumPage {
        inner: CdpPage,
    }

    impl ChromiumPage {
        async fn eval<T: DeserializeOwned>(&self, script: String) -> ProbeResult<T> {
            self.inner
                .evaluate(script)
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?
                .into_value::<T>()
                .map_err(|e| ProbeError::page(e.to_string()))
        }

        async fn element(&self, target: &Target) -> ProbeResult<Element> {
            let mut elements = self
                .inner
                .find_elements(target.css.as_str())
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?;
            if let Some(filter) = &target.text {
                let mut kept = Vec::with_capacity(elements.len());
                for element in elements {
                    let text = element.inner_text().await.ok().flatten().unwrap_or_default();
                    if text.contains(filter.as_str()) {
                        kept.push(element);
                    }
                }
                elements = kept;
            }
            let index = target
                .pick
                .index(elements.len())
                .ok_or_else(|| ProbeError::page(format!("no element matches {target}")))?;
            Ok(elements.swap_remove(index))
        }

        async fn set_value(&self, target: &Target, text: &str) -> ProbeResult<()> {
            let reply: SetValueReply = self
                .eval(set_value_script(&target.to_query(), text))
                .await?;
            if reply.ok {
                Ok(())
            } else {
                Err(ProbeError::page(format!("{target}: {}", reply.reason)))
            }
        }

        async fn resource_count(&self) -> ProbeResult<u64> {
            self.eval("performance.getEntriesByType('resource').length".to_string())
                .await
        }
    }

    #[async_trait]
    impl PageDriver for ChromiumPage {
        async fn navigate(&self, url: &str) -> ProbeResult<()> {
            self.inner
                .goto(url)
                .await
                .map_err(|e| ProbeError::NavigationError {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn wait_for_network_idle(&self, timeout: Duration) -> ProbeResult<()> {
            let start = Instant::now();
            let quiet = Duration::from_millis(NETWORK_IDLE_THRESHOLD_MS);
            let mut last_count = self.resource_count().await?;
            let mut last_change = Instant::now();
            loop {
                if last_change.elapsed() >= quiet {
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    return Err(ProbeError::Timeout {
                        ms: timeout.as_millis() as u64,
                    });
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
                let count = self.resource_count().await?;
                if count != last_count {
                    last_count = count;
                    last_change = Instant::now();
                }
            }
        }

        async fn count(&self, target: &Target) -> ProbeResult<usize> {
            self.eval(target.to_count_query()).await
        }

        async fn element_state(&self, target: &Target) -> ProbeResult<Option<ElementState>> {
            let reply: StateReply = self.eval(state_script(&target.to_query())).await?;
            Ok(reply.found.then_some(ElementState {
                visible: reply.visible,
                enabled: reply.enabled,
            }))
        }

        async fn text_content(&self, target: &Target) -> ProbeResult<Option<String>> {
            let reply: TextReply = self.eval(text_script(&target.to_query())).await?;
            Ok(reply.found.then_some(reply.text))
        }

        async fn clear(&self, target: &Target) -> ProbeResult<()> {
            self.set_value(target, "").await
        }

        async fn fill(&self, target: &Target, text: &str) -> ProbeResult<()> {
            self.set_value(target, text).await
        }

        async fn type_text(&self, target: &Target, text: &str, delay: Duration) -> ProbeResult<()> {
            let element = self.element(target).await?;
            element
                .focus()
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?;
            let mut buf = [0u8; 4];
            for ch in text.chars() {
                element
                    .type_str(ch.encode_utf8(&mut buf))
                    .await
                    .map_err(|e| ProbeError::page(e.to_string()))?;
                tokio::time::sleep(delay).await;
            }
            Ok(())
        }

        async fn press(&self, target: &Target, key: Key) -> ProbeResult<()> {
            let element = self.element(target).await?;
            element
                .focus()
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?;
            element
                .press_key(key.as_str())
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?;
            Ok(())
        }

        async fn click_outside(&self) -> ProbeResult<()> {
            self.inner
                .click(Point::new(1.0, 1.0))
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?;
            Ok(())
        }

        async fn describe_all(&self, css: &str) -> ProbeResult<Vec<ElementSummary>> {
            self.eval(describe_script(css)).await
        }

        async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let shot = self
                .inner
                .execute(params)
                .await
                .map_err(|e| ProbeError::page(e.to_string()))?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&shot.data)
                .map_err(|e| ProbeError::page(e.to_string()))
        }

        async fn close(&self) -> ProbeResult<()> {
            self.inner
                .clone()
                .close()
                .await
                .map_err(|e| ProbeError::page(e.to_string()))
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumBrowser, ChromiumPage};

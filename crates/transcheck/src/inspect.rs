//! Page inspection for selector discovery.
//!
//! Lists the page's text areas, fills a probe sentence, then lists visible
//! `div`s whose text contains Sinhala, with a structural selector suggestion
//! for the output panel. Useful when the translator's markup changes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use crate::clock::Clock;
use crate::driver::{ElementSummary, PageDriver};
use crate::locator::Target;
use crate::result::{ProbeError, ProbeResult};

/// Sentence filled in during inspection
pub const DEFAULT_PROBE_TEXT: &str = "mama gedhara yanavaa";

/// Wait between filling the probe and scanning for output (3 seconds)
pub const DEFAULT_INSPECT_WAIT_MS: u64 = 3_000;

/// Minimum length of a candidate output's text
const MIN_OUTPUT_CHARS: usize = 5;

fn sinhala() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x{0D80}-\x{0DFF}]").ok())
        .as_ref()
}

/// Whether `text` contains a code point from the Sinhala block
#[must_use]
pub fn contains_sinhala(text: &str) -> bool {
    sinhala().is_some_and(|re| re.is_match(text))
}

/// What inspection found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectReport {
    /// Probe sentence that was filled in
    pub probe_text: String,
    /// Every textarea on the page
    pub textareas: Vec<ElementSummary>,
    /// Visible divs showing Sinhala after the probe
    pub outputs: Vec<ElementSummary>,
    /// Structural selector built from the last output's classes
    pub suggested_output_css: Option<String>,
}

/// Inspect `page`, which must already be loaded
///
/// # Errors
///
/// Returns error if the page has no textarea or a page call fails
pub async fn inspect_page<P: PageDriver + ?Sized>(
    page: &P,
    clock: &dyn Clock,
    probe_text: &str,
    wait: Duration,
) -> ProbeResult<InspectReport> {
    let textareas = page.describe_all("textarea").await?;
    if textareas.is_empty() {
        return Err(ProbeError::ElementNotFound {
            role: "input".to_string(),
            strategies: "structural `textarea` (first)".to_string(),
        });
    }
    tracing::info!(count = textareas.len(), "textareas found");

    page.fill(&Target::css("textarea"), probe_text).await?;
    clock.sleep(wait).await;

    let outputs: Vec<ElementSummary> = page
        .describe_all("div")
        .await?
        .into_iter()
        .filter(|div| {
            let text = div.text.trim();
            div.visible && contains_sinhala(text) && text.chars().count() > MIN_OUTPUT_CHARS
        })
        .collect();
    tracing::info!(count = outputs.len(), "sinhala outputs found");

    let suggested_output_css = outputs
        .last()
        .and_then(|div| div.class.as_deref())
        .and_then(class_selector);

    Ok(InspectReport {
        probe_text: probe_text.to_string(),
        textareas,
        outputs,
        suggested_output_css,
    })
}

/// `div.a.b` from a `class` attribute value
fn class_selector(class: &str) -> Option<String> {
    let classes: Vec<&str> = class.split_whitespace().collect();
    if classes.is_empty() {
        None
    } else {
        Some(format!("div.{}", classes.join(".")))
    }
}

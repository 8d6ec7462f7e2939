//! Suites: named, ordered lists of test cases loaded from YAML.
//!
//! ```yaml
//! name: smoke
//! setup_delay_ms: 1000
//! cases:
//!   - id: Smoke_0001
//!     input: "mama gedhara yanavaa."
//!     expected: "මම ගෙදර යනවා."
//!     expect: exact
//!   - id: Smoke_0002
//!     input: "mama gedhara yanavaa"
//!     expect: liveness
//!     mode: type
//!     type_delay_ms: 150
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::input::{InputMode, DEFAULT_TYPE_DELAY_MS};
use crate::result::{ProbeError, ProbeResult};
use crate::scenario::{Expectation, TestCase};

const POSITIVE_YAML: &str = include_str!("../suites/positive.yaml");
const NEGATIVE_YAML: &str = include_str!("../suites/negative.yaml");
const UI_YAML: &str = include_str!("../suites/ui.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ModeName {
    Fill,
    Type,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseDoc {
    id: String,
    #[serde(default)]
    title: Option<String>,
    input: String,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    expect: Expectation,
    #[serde(default)]
    mode: Option<ModeName>,
    #[serde(default)]
    type_delay_ms: Option<u64>,
    #[serde(default)]
    pre_delay_ms: u64,
    #[serde(default)]
    post_input_delay_ms: u64,
    #[serde(default)]
    require_input_enabled: bool,
    #[serde(default)]
    only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteDoc {
    name: String,
    #[serde(default)]
    setup_delay_ms: Option<u64>,
    cases: Vec<CaseDoc>,
}

/// A named, ordered list of test cases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    /// Suite name
    pub name: String,
    /// Setup delay override in milliseconds
    pub setup_delay_ms: Option<u64>,
    /// Cases in declaration order
    pub cases: Vec<TestCase>,
}

impl Suite {
    /// Create an empty suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup_delay_ms: None,
            cases: Vec::new(),
        }
    }

    /// Append a case
    #[must_use]
    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    /// Override the setup delay
    #[must_use]
    pub const fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay_ms = Some(delay.as_millis() as u64);
        self
    }

    /// Parse and validate a YAML suite
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed or the suite is invalid
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let doc: SuiteDoc = serde_yaml_ng::from_str(yaml)?;
        let name = doc.name.clone();
        let cases = doc
            .cases
            .into_iter()
            .map(|case| case_from_doc(&name, case))
            .collect::<ProbeResult<Vec<_>>>()?;
        let suite = Self {
            name,
            setup_delay_ms: doc.setup_delay_ms,
            cases,
        };
        suite.validate()?;
        Ok(suite)
    }

    /// Load and validate a YAML suite file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the suite is invalid
    pub fn from_yaml_file(path: &Path) -> ProbeResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check ids and expected values
    ///
    /// # Errors
    ///
    /// Returns a suite error describing the first problem found
    pub fn validate(&self) -> ProbeResult<()> {
        if self.name.trim().is_empty() {
            return Err(ProbeError::suite("<unnamed>", "suite name is empty"));
        }
        let mut seen = HashSet::new();
        for case in &self.cases {
            if case.id.trim().is_empty() {
                return Err(ProbeError::suite(&self.name, "case with empty id"));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(ProbeError::suite(
                    &self.name,
                    format!("duplicate case id '{}'", case.id),
                ));
            }
            let has_expected = case.expected.as_deref().is_some_and(|e| !e.is_empty());
            if case.expectation.needs_expected() && !has_expected {
                return Err(ProbeError::suite(
                    &self.name,
                    format!("case '{}' uses '{}' without an expected value", case.id, case.expectation),
                ));
            }
        }
        Ok(())
    }

    /// Setup delay for this suite, falling back to `default_ms`
    #[must_use]
    pub fn setup_delay(&self, default_ms: u64) -> Duration {
        Duration::from_millis(self.setup_delay_ms.unwrap_or(default_ms))
    }

    /// Ids of focused cases
    #[must_use]
    pub fn focused_ids(&self) -> Vec<String> {
        self.cases
            .iter()
            .filter(|c| c.focused)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Cases to run.
    ///
    /// Focused cases narrow the run to themselves unless `forbid_only` is on,
    /// in which case their presence is an error. `filter` then keeps cases
    /// whose id contains it.
    ///
    /// # Errors
    ///
    /// Returns `FocusedTestsForbidden` when focused cases exist and
    /// `forbid_only` is set
    pub fn select(&self, filter: Option<&str>, forbid_only: bool) -> ProbeResult<Vec<&TestCase>> {
        let focused = self.focused_ids();
        if forbid_only && !focused.is_empty() {
            return Err(ProbeError::FocusedTestsForbidden { ids: focused });
        }
        Ok(self
            .cases
            .iter()
            .filter(|c| focused.is_empty() || c.focused)
            .filter(|c| filter.map_or(true, |f| c.id.contains(f)))
            .collect())
    }
}

fn case_from_doc(suite: &str, doc: CaseDoc) -> ProbeResult<TestCase> {
    let input_mode = match (doc.mode, doc.type_delay_ms) {
        (None, None) => None,
        (Some(ModeName::Fill), None) => Some(InputMode::Fill),
        (Some(ModeName::Type) | None, delay) => Some(InputMode::Type {
            delay_ms: delay.unwrap_or(DEFAULT_TYPE_DELAY_MS),
        }),
        (Some(ModeName::Fill), Some(_)) => {
            return Err(ProbeError::suite(
                suite,
                format!("case '{}' sets type_delay_ms with mode 'fill'", doc.id),
            ));
        }
    };
    Ok(TestCase {
        id: doc.id,
        title: doc.title,
        input: doc.input,
        expected: doc.expected,
        expectation: doc.expect,
        input_mode,
        pre_delay_ms: doc.pre_delay_ms,
        post_input_delay_ms: doc.post_input_delay_ms,
        require_input_enabled: doc.require_input_enabled,
        focused: doc.only,
    })
}

/// The built-in suites: positive functional, negative functional, UI
///
/// # Errors
///
/// Returns error only if an embedded suite fails validation
pub fn builtin() -> ProbeResult<Vec<Suite>> {
    [POSITIVE_YAML, NEGATIVE_YAML, UI_YAML]
        .into_iter()
        .map(Suite::from_yaml_str)
        .collect()
}

/// A built-in suite by name
///
/// # Errors
///
/// Returns a suite error if no built-in suite has that name
pub fn builtin_named(name: &str) -> ProbeResult<Suite> {
    builtin()?
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| ProbeError::suite(name, "no built-in suite with this name"))
}

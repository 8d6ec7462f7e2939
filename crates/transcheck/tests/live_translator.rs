//! Live scenarios against the real translator.
//!
//! Need chromium and network access:
//! `cargo test -p transcheck --features browser -- --ignored`

#![cfg(feature = "browser")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use transcheck::prelude::*;
use transcheck::{ChromiumBrowser, RunReport};

async fn runner() -> ScenarioRunner<ChromiumBrowser> {
    let config = HarnessConfig::load(None).expect("config").with_screenshots(false);
    let browser = ChromiumBrowser::launch(config.browser_config())
        .await
        .expect("chromium launch");
    ScenarioRunner::new(browser, Arc::new(SystemClock::new()), config)
}

async fn run(case: TestCase) -> transcheck::ScenarioOutcome {
    let runner = runner().await;
    let suite = Suite::new("live").with_case(case);
    let report = runner.run_suite(&suite, None, &mut ()).await.expect("suite");
    report.outcomes.into_iter().next().expect("one outcome")
}

#[tokio::test]
#[ignore = "Launches chromium and hits the live translator"]
async fn test_simple_sentence_translates_exactly() {
    let outcome = run(TestCase::exact(
        "Pos_Fun_0001",
        "mama gedhara yanavaa.",
        "මම ගෙදර යනවා.",
    ))
    .await;
    assert!(outcome.passed, "{:?}", outcome.error);
}

#[tokio::test]
#[ignore = "Launches chromium and hits the live translator"]
async fn test_joined_words_diverge_from_spaced_form() {
    let outcome = run(TestCase::diverges(
        "Neg_Fun_0001",
        "mamagedharayanavaa",
        "මම ගෙදර යනවා",
    ))
    .await;
    assert!(outcome.passed, "{:?}", outcome.error);
}

#[tokio::test]
#[ignore = "Launches chromium and hits the live translator"]
async fn test_repeated_punctuation_survives() {
    let case = TestCase::liveness("Neg_Fun_0012", "oyaa enavadha???  mama dennee naee!!!");
    let outcome = run(case).await;
    assert!(outcome.passed, "{:?}", outcome.error);
    let actual = outcome.actual.unwrap();
    assert_eq!(actual.matches('?').count(), 3);
    assert_eq!(actual.matches('!').count(), 3);
}

#[tokio::test]
#[ignore = "Launches chromium and hits the live translator"]
async fn test_double_line_break_completes() {
    let outcome = run(TestCase::completes("Neg_Fun_0009", "api passee\n\nkathaa karamu.")).await;
    assert!(outcome.passed, "{:?}", outcome.error);
    assert!(outcome.actual.is_some());
}

#[tokio::test]
#[ignore = "Launches chromium and hits the live translator"]
async fn test_builtin_ui_suite() {
    let runner = runner().await;
    let suite = transcheck::builtin_named("ui").unwrap();
    let mut run = RunReport::new(runner.config().base_url.clone(), false);
    run.push(runner.run_suite(&suite, None, &mut ()).await.unwrap());
    assert!(run.all_passed(), "{}", run.to_json().unwrap());
}

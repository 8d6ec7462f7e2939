//! Command handlers

use std::path::Path;
use std::time::Duration;

use transcheck::{
    inspect_page, Browser, Clock, HarnessConfig, InspectReport, PageDriver, ProbeResult, Suite,
};

use crate::commands::{
    ConfigArgs, ConfigFormat, InspectArgs, ListArgs, ListFormat, RunArgs, SuiteArgs,
};
use crate::config::CliConfig;
use crate::error::CliResult;

/// Load the harness configuration: defaults, `--config` file, environment
///
/// # Errors
///
/// Returns error if the file cannot be loaded or the result is invalid
pub fn load_config(path: Option<&Path>) -> CliResult<HarnessConfig> {
    Ok(HarnessConfig::load(path)?)
}

/// Apply `run` flag overrides on top of the loaded configuration
///
/// # Errors
///
/// Returns error if the overridden configuration is invalid
pub fn apply_run_args(mut config: HarnessConfig, args: &RunArgs) -> CliResult<HarnessConfig> {
    if let Some(ref url) = args.base_url {
        config = config.with_base_url(url.clone());
    }
    if args.headed {
        config = config.with_headless(false);
    }
    if let Some(retries) = args.retries {
        config = config.with_retries(retries);
    }
    if let Some(budget) = args.settle_budget {
        config.settle.budget_ms = budget;
    }
    if let Some(ref dir) = args.output_dir {
        config = config.with_output_dir(dir.clone());
    }
    if args.no_screenshots {
        config = config.with_screenshots(false);
    }
    config.validate()?;
    Ok(config)
}

/// Resolve `--suite` names and `--suite-file` paths; all built-ins when neither is given
///
/// # Errors
///
/// Returns error if a suite name is unknown or a file cannot be loaded
pub fn select_suites(selection: &SuiteArgs) -> CliResult<Vec<Suite>> {
    if selection.suites.is_empty() && selection.suite_files.is_empty() {
        return Ok(transcheck::builtin()?);
    }
    let mut suites = Vec::new();
    for name in &selection.suites {
        suites.push(transcheck::builtin_named(name)?);
    }
    for path in &selection.suite_files {
        suites.push(Suite::from_yaml_file(path)?);
    }
    Ok(suites)
}

/// `transcheck list`
///
/// # Errors
///
/// Returns error if the suites cannot be loaded
pub fn run_list(args: &ListArgs) -> CliResult<()> {
    let suites = select_suites(&args.selection)?;
    let filter = args.selection.filter.as_deref();
    match args.format {
        ListFormat::Json => {
            let selected = suites
                .iter()
                .map(|suite| {
                    Ok(serde_json::json!({
                        "name": suite.name,
                        "setup_delay_ms": suite.setup_delay_ms,
                        "cases": suite.select(filter, false)?,
                    }))
                })
                .collect::<CliResult<Vec<_>>>()?;
            println!("{}", serde_json::to_string_pretty(&selected)?);
        }
        ListFormat::Text => {
            for suite in &suites {
                let cases = suite.select(filter, false)?;
                println!("{} ({} cases)", suite.name, cases.len());
                for case in cases {
                    let focus = if case.focused { " [only]" } else { "" };
                    println!(
                        "  {:<14} {:<20} {:?}{focus}",
                        case.id,
                        case.expectation.to_string(),
                        case.input
                    );
                }
            }
        }
    }
    Ok(())
}

/// `transcheck config`
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or serialized
pub fn run_config(config_path: Option<&Path>, args: &ConfigArgs) -> CliResult<()> {
    let config = load_config(config_path)?;
    let text = match args.format {
        ConfigFormat::Yaml => serde_yaml_ng::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };
    println!("{}", text.trim_end());
    Ok(())
}

/// `transcheck run`; returns whether every scenario passed
///
/// # Errors
///
/// Returns error if the run cannot start or the report cannot be written
#[cfg(feature = "browser")]
pub async fn run_suites(
    cli: &CliConfig,
    config_path: Option<&Path>,
    args: &RunArgs,
) -> CliResult<bool> {
    use crate::output::ProgressReporter;
    use std::sync::Arc;
    use std::time::Instant;
    use transcheck::{Browser, ChromiumBrowser, ScenarioRunner, SystemClock};

    let config = apply_run_args(load_config(config_path)?, args)?;
    let suites = select_suites(&args.selection)?;
    let mut reporter = ProgressReporter::new(
        cli.color.should_color(),
        cli.verbosity.is_quiet(),
        cli.verbosity.is_verbose(),
    );
    reporter.info(&format!(
        "{} suite(s) against {}{}",
        suites.len(),
        config.base_url,
        if config.ci { " (CI)" } else { "" }
    ));

    let started = Instant::now();
    let browser = ChromiumBrowser::launch(config.browser_config()).await?;
    let runner = ScenarioRunner::new(browser, Arc::new(SystemClock::new()), config.clone());
    let result = runner
        .run_all(&suites, args.selection.filter.as_deref(), &mut reporter)
        .await;
    if let Err(e) = runner.browser().close().await {
        tracing::warn!(error = %e, "browser did not close cleanly");
    }
    let report = result?;

    let path = report.write_json(&config.output_dir)?;
    reporter.summary(&report, started.elapsed());
    reporter.info(&format!("report: {}", path.display()));
    if args.json {
        println!("{}", report.to_json()?);
    }
    Ok(report.all_passed())
}

/// `transcheck run` without browser support
///
/// # Errors
///
/// Always returns [`crate::error::CliError::FeatureDisabled`]
#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
pub async fn run_suites(
    _cli: &CliConfig,
    _config_path: Option<&Path>,
    _args: &RunArgs,
) -> CliResult<bool> {
    Err(crate::error::CliError::feature_disabled("browser"))
}

/// `transcheck inspect`
///
/// # Errors
///
/// Returns error if the browser cannot be driven or the page has no input
#[cfg(feature = "browser")]
pub async fn run_inspect(
    cli: &CliConfig,
    config_path: Option<&Path>,
    args: &InspectArgs,
) -> CliResult<()> {
    use crate::output::ProgressReporter;
    use transcheck::{ChromiumBrowser, SystemClock};

    let mut config = load_config(config_path)?;
    if let Some(ref url) = args.base_url {
        config = config.with_base_url(url.clone());
    }
    if args.headed {
        config = config.with_headless(false);
    }
    let reporter = ProgressReporter::new(cli.color.should_color(), cli.verbosity.is_quiet(), false);
    reporter.info(&format!("inspecting {}", config.base_url));

    let browser = ChromiumBrowser::launch(config.browser_config()).await?;
    let report = inspect_and_close(&browser, &SystemClock::new(), &config, args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    reporter.header("textareas");
    for area in &report.textareas {
        println!(
            "  [{}] placeholder={:?} id={:?} readonly={}",
            area.index, area.placeholder, area.id, area.readonly
        );
    }
    reporter.header("sinhala outputs");
    for div in &report.outputs {
        println!("  [{}] class={:?} text={:?}", div.index, div.class, div.text);
    }
    match report.suggested_output_css {
        Some(ref css) => reporter.success(&format!("suggested output selector: {css}")),
        None => reporter.failure("no Sinhala output found; try a longer --wait-ms"),
    }
    Ok(())
}

/// Inspect the configured page on a fresh tab, then shut `browser` down
/// whether or not a page could be opened
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
async fn inspect_and_close<B: Browser>(
    browser: &B,
    clock: &dyn Clock,
    config: &HarnessConfig,
    args: &InspectArgs,
) -> ProbeResult<InspectReport> {
    let result = match browser.new_page().await {
        Ok(page) => {
            let inspected = visit_and_inspect(&page, clock, config, args).await;
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "page close failed");
            }
            inspected
        }
        Err(e) => Err(e),
    };
    if let Err(e) = browser.close().await {
        tracing::debug!(error = %e, "browser close failed");
    }
    result
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
async fn visit_and_inspect<P: PageDriver + ?Sized>(
    page: &P,
    clock: &dyn Clock,
    config: &HarnessConfig,
    args: &InspectArgs,
) -> ProbeResult<InspectReport> {
    page.navigate(&config.base_url).await?;
    if let Err(e) = page.wait_for_network_idle(config.network_idle_timeout()).await {
        tracing::warn!(error = %e, "network did not go idle, continuing");
    }
    inspect_page(page, clock, &args.probe_text, Duration::from_millis(args.wait_ms)).await
}

/// `transcheck inspect` without browser support
///
/// # Errors
///
/// Always returns [`crate::error::CliError::FeatureDisabled`]
#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
pub async fn run_inspect(
    _cli: &CliConfig,
    _config_path: Option<&Path>,
    _args: &InspectArgs,
) -> CliResult<()> {
    Err(crate::error::CliError::feature_disabled("browser"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::commands::{Cli, Commands};

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["transcheck", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("expected run, got {other:?}"),
        }
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_default_selection_is_every_builtin() {
            let suites = select_suites(&SuiteArgs::default()).unwrap();
            let names: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["positive-functional", "negative-functional", "ui"]);
        }

        #[test]
        fn test_named_and_file_suites() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("extra.yaml");
            std::fs::write(
                &path,
                "name: extra\ncases:\n  - id: X_1\n    input: \"api\"\n    expect: liveness\n",
            )
            .unwrap();
            let selection = SuiteArgs {
                suites: vec!["ui".to_string()],
                suite_files: vec![path],
                filter: None,
            };
            let suites = select_suites(&selection).unwrap();
            assert_eq!(suites.len(), 2);
            assert_eq!(suites[1].name, "extra");
        }

        #[test]
        fn test_unknown_suite_rejected() {
            let selection = SuiteArgs {
                suites: vec!["smoke".to_string()],
                ..SuiteArgs::default()
            };
            assert!(select_suites(&selection).is_err());
        }
    }

    mod override_tests {
        use super::*;

        #[test]
        fn test_run_flags_override_config() {
            let args = run_args(&[
                "--base-url",
                "http://localhost:8080/",
                "--headed",
                "--retries",
                "1",
                "--settle-budget",
                "5000",
                "--no-screenshots",
            ]);
            let config = apply_run_args(HarnessConfig::default(), &args).unwrap();
            assert_eq!(config.base_url, "http://localhost:8080/");
            assert!(!config.headless);
            assert_eq!(config.effective_retries(), 1);
            assert_eq!(config.settle.budget_ms, 5000);
            assert!(!config.screenshot_on_failure);
        }

        #[test]
        fn test_invalid_override_rejected() {
            let args = run_args(&["--base-url", "ftp://example.com/"]);
            assert!(apply_run_args(HarnessConfig::default(), &args).is_err());
        }
    }

    mod inspect_tests {
        use super::*;
        use transcheck::{FakeClock, MockBrowser, MockSite};

        fn inspect_args() -> InspectArgs {
            match Cli::try_parse_from(["transcheck", "inspect", "--wait-ms", "1000"])
                .unwrap()
                .command
            {
                Commands::Inspect(args) => args,
                other => panic!("expected inspect, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_inspect_reports_fields_and_closes_browser() {
            let clock = FakeClock::shared();
            let site = MockSite::new(|_| "මම ගෙදර යනවා.".to_string());
            let browser = MockBrowser::new(site, clock.clone());
            let report = inspect_and_close(&browser, clock.as_ref(), &HarnessConfig::default(), &inspect_args())
                .await
                .unwrap();
            assert_eq!(report.textareas.len(), 1);
            assert_eq!(report.outputs.len(), 1);
            assert!(browser.is_closed());
        }

        #[tokio::test]
        async fn test_browser_closed_when_no_page_opens() {
            let clock = FakeClock::shared();
            let browser = MockBrowser::new(MockSite::echo(), clock.clone()).with_page_limit(0);
            let err = inspect_and_close(&browser, clock.as_ref(), &HarnessConfig::default(), &inspect_args())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("createTarget"));
            assert!(browser.is_closed());
        }

        #[tokio::test]
        async fn test_browser_closed_when_navigation_fails() {
            let clock = FakeClock::shared();
            let browser = MockBrowser::new(MockSite::echo(), clock.clone()).with_failing_navigation(0);
            let result =
                inspect_and_close(&browser, clock.as_ref(), &HarnessConfig::default(), &inspect_args()).await;
            assert!(result.is_err());
            assert!(browser.is_closed());
        }
    }
}

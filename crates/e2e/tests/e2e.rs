//! E2E test harness entry point
//!
//! This file is the test binary that runs E2E scenarios from YAML files.
//! It needs a running application and a node project with Playwright, so it
//! only runs when `FLOWTEST_E2E=1` is set:
//!
//!   FLOWTEST_E2E=1 cargo test --package flowtest-e2e --test e2e -- --tag cta
//!
//! `--dry-run` executes every scenario against recording pages instead of a
//! browser and prints the actions each one would perform.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use flowtest_e2e::backend::{BackendApi, BackendConfig};
use flowtest_e2e::playwright::{Browser, BrowserConfig};
use flowtest_e2e::recording::RecordingDriver;
use flowtest_e2e::runner::{PlaywrightDriver, RunnerConfig, TestSuiteResult};
use flowtest_e2e::{E2eResult, TestRunner};

const GATE_VAR: &str = "FLOWTEST_E2E";

#[derive(Parser, Debug)]
#[command(name = "flowtest-e2e")]
#[command(about = "E2E scenario runner for the workflow editor")]
struct Args {
    /// Path to scenarios directory
    #[arg(short, long, env = "FLOWTEST_SCENARIOS", default_value = "scenarios")]
    scenarios: PathBuf,

    /// Path to fixtures directory (workflow JSON lives under workflows/)
    #[arg(long, env = "FLOWTEST_FIXTURES", default_value = "fixtures")]
    fixtures: PathBuf,

    /// Run only scenarios matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    name: Option<String>,

    /// Base URL of the application under test
    #[arg(long, env = "FLOWTEST_BASE_URL", default_value = "http://127.0.0.1:5678")]
    base_url: String,

    /// Seconds to wait for the application to become healthy
    #[arg(long, default_value = "30")]
    startup_timeout: u64,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, env = "FLOWTEST_BROWSER", default_value = "chromium")]
    browser: String,

    /// Run in headless mode (`--headless false` shows the browser)
    #[arg(long, env = "FLOWTEST_HEADLESS", default_value_t = true, action = clap::ArgAction::Set)]
    headless: bool,

    /// Viewport width
    #[arg(long, default_value = "1536")]
    viewport_width: u32,

    /// Viewport height
    #[arg(long, default_value = "960")]
    viewport_height: u32,

    /// Directory whose node_modules provides playwright
    #[arg(long, env = "FLOWTEST_NODE_PROJECT", default_value = ".")]
    node_project_dir: PathBuf,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    output: PathBuf,

    /// Run against recording pages and print the planned actions
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    if std::env::var(GATE_VAR).map(|v| v != "1").unwrap_or(true) {
        println!("skipping flowtest e2e scenarios (set {}=1 to run them)", GATE_VAR);
        return;
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    // Run async main
    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = rt.block_on(async_main(args));

    match result {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    let config = RunnerConfig {
        scenarios_dir: args.scenarios.clone(),
        fixtures_dir: args.fixtures.clone(),
        output_dir: args.output.clone(),
    };

    if args.dry_run {
        let recorder = Arc::new(RecordingDriver::new());
        let runner = TestRunner::new(recorder.clone(), recorder.clone(), config);
        let results = run_selected(&runner, &args).await?;

        for (result, page) in results.results.iter().zip(recorder.pages()) {
            println!("== {}", result.name);
            for action in page.actions() {
                println!("   {}", action);
            }
        }
        runner.write_results(&results)?;
        return Ok(results.failed == 0);
    }

    let browser: Browser = args.browser.parse()?;
    let backend = Arc::new(BackendApi::new(BackendConfig {
        base_url: args.base_url.clone(),
        startup_timeout: Duration::from_secs(args.startup_timeout),
        ..Default::default()
    })?);
    backend.wait_for_healthy().await?;

    let driver = Arc::new(PlaywrightDriver::new(BrowserConfig {
        base_url: args.base_url.clone(),
        browser,
        headless: args.headless,
        viewport_width: args.viewport_width,
        viewport_height: args.viewport_height,
        node_project_dir: args.node_project_dir.clone(),
        ..Default::default()
    }));

    let runner = TestRunner::new(driver, backend, config);
    let results = run_selected(&runner, &args).await?;

    // Write results
    runner.write_results(&results)?;

    Ok(results.failed == 0)
}

async fn run_selected(runner: &TestRunner, args: &Args) -> E2eResult<TestSuiteResult> {
    if let Some(name) = &args.name {
        runner.run_named(name).await
    } else if let Some(tag) = &args.tag {
        runner.run_tagged(tag).await
    } else {
        runner.run_all().await
    }
}

//! Main test runner that opens a page per scenario, applies its requirements
//! and executes its steps

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::backend::FeatureControl;
use crate::composer::WorkflowComposer;
use crate::error::{E2eError, E2eResult};
use crate::expect::expect;
use crate::page::{Page, ResponseMatcher, ResponseWaiter};
use crate::pages::AppPage;
use crate::playwright::{BrowserConfig, PlaywrightSession};
use crate::requirements::setup_test_requirements;
use crate::scenario::{expand_name, Scenario, Step};

/// Bound for a response awaited by a `goto` step
const NAVIGATION_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// Opens a fresh page for every scenario
#[async_trait]
pub trait Driver: Send + Sync {
    async fn open_page(&self) -> E2eResult<Arc<dyn Page>>;
}

/// Driver launching a real browser through Playwright
pub struct PlaywrightDriver {
    config: BrowserConfig,
}

impl PlaywrightDriver {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Driver for PlaywrightDriver {
    async fn open_page(&self) -> E2eResult<Arc<dyn Page>> {
        let session = PlaywrightSession::launch(&self.config).await?;
        Ok(Arc::new(session))
    }
}

/// How a scenario ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { error: String },
    Skipped { reason: String },
}

/// Result of executing one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepRecord>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

enum Flow {
    Continue,
    Skip(String),
}

/// Main E2E test runner
pub struct TestRunner {
    driver: Arc<dyn Driver>,
    features: Arc<dyn FeatureControl>,
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new(driver: Arc<dyn Driver>, features: Arc<dyn FeatureControl>, config: RunnerConfig) -> Self {
        Self {
            driver,
            features,
            config,
        }
    }

    /// Run all scenarios in the scenarios directory
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        self.run_scenarios(&scenarios).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        let filtered: Vec<Scenario> = Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_scenarios(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<TestSuiteResult> {
        let scenarios = Scenario::load_all(&self.config.scenarios_dir)?;
        let scenario = scenarios
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::ScenarioParse(format!("Scenario not found: {}", name)))?;

        self.run_scenarios(std::slice::from_ref(&scenario)).await
    }

    /// Run a list of scenarios, each on its own page
    pub async fn run_scenarios(&self, scenarios: &[Scenario]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let result = self.run_scenario(scenario).await;
            match &result.outcome {
                Outcome::Passed => {
                    passed += 1;
                    info!("✓ {} ({} ms)", result.name, result.duration_ms);
                }
                Outcome::Failed { error } => {
                    failed += 1;
                    error!("✗ {} - {}", result.name, error);
                }
                Outcome::Skipped { reason } => {
                    skipped += 1;
                    info!("- {} skipped: {}", result.name, reason);
                }
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(TestSuiteResult {
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Run a single scenario on a fresh page
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let (outcome, steps) = match self.driver.open_page().await {
            Ok(page) => {
                let run = self.execute(page.as_ref(), scenario).await;
                if let Err(e) = page.close().await {
                    warn!("Failed to close page for '{}': {}", scenario.name, e);
                }
                run
            }
            Err(e) => (Outcome::Failed { error: e.to_string() }, Vec::new()),
        };

        ScenarioResult {
            name: scenario.name.clone(),
            outcome,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
        }
    }

    async fn execute(&self, page: &dyn Page, scenario: &Scenario) -> (Outcome, Vec<StepRecord>) {
        let app = AppPage::new(page, &self.config.fixtures_dir);
        let mut records = Vec::with_capacity(scenario.steps.len() + 1);

        let start = Instant::now();
        let setup = setup_test_requirements(&app, self.features.as_ref(), &scenario.requirements).await;
        records.push(StepRecord {
            step_name: "requirements".to_string(),
            success: setup.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: setup.as_ref().err().map(ToString::to_string),
        });
        if let Err(e) = setup {
            return (Outcome::Failed { error: e.to_string() }, records);
        }

        let mut armed = None;
        for step in &scenario.steps {
            let step_name = step.name();
            debug!("Executing step: {}", step_name);

            let start = Instant::now();
            let result = run_step(app, step, &mut armed).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(Flow::Continue) => records.push(StepRecord {
                    step_name,
                    success: true,
                    duration_ms,
                    error: None,
                }),
                Ok(Flow::Skip(reason)) => {
                    records.push(StepRecord {
                        step_name,
                        success: true,
                        duration_ms,
                        error: None,
                    });
                    return (Outcome::Skipped { reason }, records);
                }
                Err(e) => {
                    let error = format!("{}: {}", step_name, e);
                    records.push(StepRecord {
                        step_name,
                        success: false,
                        duration_ms,
                        error: Some(e.to_string()),
                    });
                    return (Outcome::Failed { error }, records);
                }
            }
        }

        (Outcome::Passed, records)
    }

    /// Write suite results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// `armed` carries a waiter from a `goto` with `arm_response` to the
/// `await_response` step that consumes it
async fn run_step(app: AppPage<'_>, step: &Step, armed: &mut Option<ResponseWaiter>) -> E2eResult<Flow> {
    let page = app.page();

    match step {
        Step::Goto {
            url,
            await_response,
            arm_response,
        } => {
            let waiter = match await_response {
                Some(glob) => Some(
                    page.expect_response(ResponseMatcher::glob(glob.clone()), NAVIGATION_RESPONSE_TIMEOUT)
                        .await?,
                ),
                None => None,
            };
            if let Some(glob) = arm_response {
                *armed = Some(
                    page.expect_response(ResponseMatcher::glob(glob.clone()), NAVIGATION_RESPONSE_TIMEOUT)
                        .await?,
                );
            }
            page.goto(url).await?;
            page.wait_for_load_state().await?;
            if let Some(waiter) = waiter {
                waiter.await?;
            }
        }
        Step::AwaitResponse => {
            let waiter = armed
                .take()
                .ok_or_else(|| E2eError::Config("await_response without a goto arming a response".into()))?;
            let response = waiter.await?;
            debug!("Armed response answered {} ({})", response.status, response.url);
        }
        Step::GoHome => app.go_home().await?,
        Step::WaitForLoad => page.wait_for_load_state().await?,
        Step::Click { target } => page.click(target).await?,
        Step::DoubleClick { target } => page.dblclick(target).await?,
        Step::Fill { target, value } => page.fill(target, value).await?,
        Step::Hover { target } => page.hover(target).await?,
        Step::Press { key } => page.press_key(key).await?,
        Step::Sleep { ms } => page.wait_for_timeout(Duration::from_millis(*ms)).await?,
        Step::Expect {
            target,
            visible,
            enabled,
            count,
            text,
            contains,
            value,
            attribute,
            timeout_ms,
        } => {
            let mut expectation = expect(page, target.clone());
            if let Some(ms) = timeout_ms {
                expectation = expectation.with_timeout(Duration::from_millis(*ms));
            }

            match visible {
                Some(true) => expectation.to_be_visible().await?,
                Some(false) => expectation.to_be_hidden().await?,
                None => {}
            }
            match enabled {
                Some(true) => expectation.to_be_enabled().await?,
                Some(false) => expectation.to_be_disabled().await?,
                None => {}
            }
            if let Some(count) = count {
                expectation.to_have_count(*count).await?;
            }
            if let Some(text) = text {
                expectation.to_have_text(text).await?;
            }
            if let Some(fragment) = contains {
                expectation.to_contain_text(fragment).await?;
            }
            if let Some(value) = value {
                expectation.to_have_value(value).await?;
            }
            if let Some(attr) = attribute {
                expectation.to_have_attribute(&attr.name, &attr.value).await?;
            }
        }
        Step::SkipUnlessVisible { target, reason } => {
            if !page.is_visible(target).await? {
                return Ok(Flow::Skip(reason.clone()));
            }
        }
        Step::AddWorkflow => app.workflows().click_add_workflow_button().await?,
        Step::CreateWorkflow { name } => {
            let name = name.as_deref().map(expand_name);
            WorkflowComposer::new(app)
                .create_workflow(name.as_deref())
                .await?;
        }
        Step::ImportWorkflow { file, name } => {
            let name = expand_name(name.as_deref().unwrap_or("Imported Workflow {id}"));
            app.canvas().import_workflow(file, &name).await?;
        }
        Step::SetupWorkflow { workflow } => {
            let mut config = workflow.clone();
            config.name = config.name.as_deref().map(expand_name);
            let name = WorkflowComposer::new(app).setup_test_workflow(config).await?;
            debug!("Workflow ready: {}", name);
        }
        Step::OpenNode { name } => app.canvas().open_node(name).await?,
        Step::ExecuteNode => app.ndv().execute().await?,
        Step::BackToCanvas => app.ndv().click_back_to_canvas_button().await?,
        Step::ZoomToFit => app.canvas().click_zoom_to_fit_button().await?,
        Step::ExecuteWorkflow {
            notification,
            timeout_ms,
        } => {
            WorkflowComposer::new(app)
                .execute_workflow_and_wait_for_notification(
                    notification,
                    timeout_ms.map(Duration::from_millis),
                )
                .await?
        }
        Step::AssertInlineExpressionValid => app.ndv().assert_inline_expression_valid().await?,
        Step::OpenAssistant => app.ai_assistant().open_chat().await?,
        Step::CloseAssistant => app.ai_assistant().close_chat().await?,
        Step::SendAssistantMessage { text } => app.ai_assistant().send_message(text).await?,
        Step::AskAssistantAboutError => app.ai_assistant().ask_about_node_error().await?,
        Step::StartNewAssistantSession => app.ai_assistant().start_new_session().await?,
        Step::CloseCta => app.become_creator_cta().close_cta().await?,
        Step::OpenVersionsPanel => app.versions().open_version_updates_panel().await?,
        Step::CloseVersionsPanel => app.versions().close_version_updates_panel().await?,
        Step::Log { message } => info!("[SCENARIO LOG] {}", message),
    }

    Ok(Flow::Continue)
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub scenarios_dir: PathBuf,
    pub fixtures_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scenarios_dir: PathBuf::from("scenarios"),
            fixtures_dir: PathBuf::from("fixtures"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

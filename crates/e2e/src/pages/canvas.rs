//! Workflow canvas

use std::time::Duration;
use tracing::debug;

use super::AppPage;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Delay for the editor to load an imported file before renaming it
const IMPORT_SETTLE: Duration = Duration::from_millis(250);

pub struct CanvasPage<'a> {
    app: AppPage<'a>,
}

impl<'a> CanvasPage<'a> {
    pub fn new(app: AppPage<'a>) -> Self {
        Self { app }
    }

    pub fn execute_workflow_button() -> Locator {
        Locator::test_id("execute-workflow-button")
    }

    pub fn workflow_name_preview() -> Locator {
        Locator::test_id("inline-edit-preview")
    }

    pub fn workflow_name_input() -> Locator {
        Locator::test_id("inline-edit-input")
    }

    pub fn save_button() -> Locator {
        Locator::test_id("workflow-save-button")
    }

    pub fn workflow_menu() -> Locator {
        Locator::test_id("workflow-menu")
    }

    pub fn import_from_file_item() -> Locator {
        Locator::test_id("workflow-menu-item-import-from-file")
    }

    pub fn node_creator_plus_button() -> Locator {
        Locator::test_id("node-creator-plus-button")
    }

    pub fn node_creator_search_bar() -> Locator {
        Locator::test_id("node-creator-search-bar")
    }

    pub fn zoom_to_fit_button() -> Locator {
        Locator::test_id("zoom-to-fit")
    }

    pub fn canvas_node_by_name(name: &str) -> Locator {
        Locator::css(format!(
            "[data-test-id=\"canvas-node\"][data-node-name=\"{}\"]",
            name
        ))
    }

    pub async fn click_execute_workflow_button(&self) -> E2eResult<()> {
        self.app.page().click(&Self::execute_workflow_button()).await
    }

    pub async fn set_workflow_name(&self, name: &str) -> E2eResult<()> {
        let page = self.app.page();
        page.click(&Self::workflow_name_preview()).await?;
        page.fill(&Self::workflow_name_input(), name).await?;
        page.press_key("Enter").await
    }

    pub async fn save_workflow(&self) -> E2eResult<()> {
        self.app.page().click(&Self::save_button()).await
    }

    /// Import a fixture through the workflow menu and rename it
    pub async fn import_workflow(&self, file_name: &str, workflow_name: &str) -> E2eResult<()> {
        let path = self.app.workflow_fixture(file_name);
        if !path.is_file() {
            return Err(E2eError::FixtureNotFound(path.display().to_string()));
        }

        debug!("Importing {} as '{}'", path.display(), workflow_name);

        let page = self.app.page();
        page.click(&Self::workflow_menu()).await?;
        page.upload_file(&Self::import_from_file_item(), &path).await?;
        page.wait_for_timeout(IMPORT_SETTLE).await?;
        self.set_workflow_name(workflow_name).await
    }

    pub async fn add_node(&self, node_name: &str) -> E2eResult<()> {
        let page = self.app.page();
        page.click(&Self::node_creator_plus_button()).await?;
        page.fill(&Self::node_creator_search_bar(), node_name).await?;
        page.press_key("Enter").await
    }

    /// Open the node details view of a canvas node
    pub async fn open_node(&self, node_name: &str) -> E2eResult<()> {
        self.app.page().dblclick(&Self::canvas_node_by_name(node_name)).await
    }

    pub async fn click_zoom_to_fit_button(&self) -> E2eResult<()> {
        self.app.page().click(&Self::zoom_to_fit_button()).await
    }
}

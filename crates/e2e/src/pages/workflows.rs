use crate::error::E2eResult;
use crate::locator::Locator;
use crate::page::Page;

/// Workflows list on the home view
pub struct WorkflowsPage<'a> {
    page: &'a dyn Page,
}

impl<'a> WorkflowsPage<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub fn add_workflow_button() -> Locator {
        Locator::test_id("add-resource-workflow")
    }

    pub async fn click_add_workflow_button(&self) -> E2eResult<()> {
        self.page.click(&Self::add_workflow_button()).await
    }
}

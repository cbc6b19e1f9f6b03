use crate::error::E2eResult;
use crate::expect::expect;
use crate::locator::Locator;
use crate::page::Page;

/// Node details view
pub struct NodeDetailsView<'a> {
    page: &'a dyn Page,
}

impl<'a> NodeDetailsView<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub fn execute_button() -> Locator {
        Locator::test_id("node-execute-button")
    }

    pub fn back_to_canvas_button() -> Locator {
        Locator::test_id("back-to-canvas")
    }

    pub fn parameter_expression_preview_value() -> Locator {
        Locator::test_id("parameter-expression-preview-value")
    }

    /// Resolvable segment highlighted inside the inline expression editor
    pub fn valid_inline_expression() -> Locator {
        Locator::test_id("inline-expression-editor-input").locate(Locator::css(".cm-valid-resolvable"))
    }

    pub async fn execute(&self) -> E2eResult<()> {
        self.page.click(&Self::execute_button()).await
    }

    pub async fn click_back_to_canvas_button(&self) -> E2eResult<()> {
        self.page.click(&Self::back_to_canvas_button()).await
    }

    pub async fn assert_inline_expression_valid(&self) -> E2eResult<()> {
        expect(self.page, Self::valid_inline_expression())
            .to_be_visible()
            .await
    }
}

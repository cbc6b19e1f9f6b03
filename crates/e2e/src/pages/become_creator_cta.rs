use crate::error::E2eResult;
use crate::intercept::InterceptRule;
use crate::locator::Locator;
use crate::page::Page;

/// URL the application asks whether to show the CTA
pub const CTA_ENDPOINT: &str = "**/rest/cta/become-creator";

/// "Become a template creator" call to action
pub struct BecomeCreatorCta<'a> {
    page: &'a dyn Page,
}

impl<'a> BecomeCreatorCta<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub fn cta() -> Locator {
        Locator::test_id("become-template-creator-cta")
    }

    pub fn close_button() -> Locator {
        Locator::test_id("close-become-template-creator-cta")
    }

    pub async fn close_cta(&self) -> E2eResult<()> {
        self.page.click(&Self::close_button()).await
    }

    /// Answer the eligibility check with `become_creator`
    pub async fn intercept_cta_request_with_response(&self, become_creator: bool) -> E2eResult<()> {
        self.page
            .route(&Self::cta_rule(become_creator))
            .await
    }

    pub fn cta_rule(become_creator: bool) -> InterceptRule {
        InterceptRule::new(CTA_ENDPOINT, serde_json::Value::Bool(become_creator))
    }
}

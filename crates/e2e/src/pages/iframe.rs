use std::time::Duration;

use crate::error::E2eResult;
use crate::intercept::InterceptRule;
use crate::locator::Locator;
use crate::page::{Page, ResponseMatcher, ResponseWaiter};

/// Embedded n8n.io iframe shown on the home view when telemetry is on
pub struct IframeEmbed<'a> {
    page: &'a dyn Page,
}

impl<'a> IframeEmbed<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub fn iframe() -> Locator {
        Locator::css("iframe")
    }

    pub fn iframe_by_src(src: &str) -> Locator {
        Locator::css(format!("iframe[src=\"{}\"]", src))
    }

    /// Serve an empty document for the iframe so tests never reach the internet
    pub async fn intercept_iframe_request(&self, url: &str) -> E2eResult<()> {
        let rule = InterceptRule::new(url, serde_json::Value::String(String::new()))
            .with_content_type("text/html");
        self.page.route(&rule).await
    }

    /// Arm a waiter for the iframe document request
    pub async fn wait_for_iframe_request(&self, url: &str, timeout: Duration) -> E2eResult<ResponseWaiter> {
        self.page
            .expect_response(ResponseMatcher::glob(url), timeout)
            .await
    }
}

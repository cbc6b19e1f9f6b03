use std::time::Duration;

use crate::error::E2eResult;
use crate::locator::Locator;
use crate::page::{Page, WaitState};

/// Toast notifications
pub struct NotificationsPage<'a> {
    page: &'a dyn Page,
}

impl<'a> NotificationsPage<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub fn notification_with_text(text: &str) -> Locator {
        Locator::css(".el-notification").has_text(text)
    }

    pub fn close_button(text: &str) -> Locator {
        Self::notification_with_text(text).locate(Locator::css(".el-notification__closeBtn"))
    }

    pub async fn wait_for_notification(&self, text: &str, timeout: Duration) -> E2eResult<()> {
        self.page
            .wait_for(&Self::notification_with_text(text), WaitState::Visible, timeout)
            .await
    }

    /// Close the notification and wait for it to disappear
    pub async fn close_notification(&self, text: &str, timeout: Duration) -> E2eResult<()> {
        self.page.click(&Self::close_button(text)).await?;
        self.page
            .wait_for(&Self::notification_with_text(text), WaitState::Hidden, timeout)
            .await
    }

    pub async fn wait_for_notification_and_close(&self, text: &str, timeout: Duration) -> E2eResult<()> {
        self.wait_for_notification(text, timeout).await?;
        self.close_notification(text, timeout).await
    }
}

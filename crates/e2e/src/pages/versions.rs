use crate::error::E2eResult;
use crate::locator::Locator;
use crate::page::Page;

/// Version updates side panel
pub struct VersionsPanel<'a> {
    page: &'a dyn Page,
}

impl<'a> VersionsPanel<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub fn open_button() -> Locator {
        Locator::test_id("version-updates-panel-button")
    }

    pub fn panel() -> Locator {
        Locator::test_id("version-updates-panel")
    }

    pub fn version_card() -> Locator {
        Locator::test_id("version-card")
    }

    pub fn close_button() -> Locator {
        Locator::test_id("close-version-updates-panel")
    }

    pub async fn open_version_updates_panel(&self) -> E2eResult<()> {
        self.page.click(&Self::open_button()).await
    }

    pub async fn close_version_updates_panel(&self) -> E2eResult<()> {
        self.page.click(&Self::close_button()).await
    }
}

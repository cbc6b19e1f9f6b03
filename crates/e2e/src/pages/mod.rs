//! Page objects for the workflow editor
//!
//! Each page object borrows the [`Page`] and exposes locators (plain
//! functions returning [`Locator`]) plus the actions a test performs on that
//! surface. [`AppPage`] groups them the way a test sees the application.

use std::path::{Path, PathBuf};

use crate::error::E2eResult;
use crate::page::Page;

mod ai_assistant;
mod become_creator_cta;
mod canvas;
mod iframe;
mod ndv;
mod notifications;
mod versions;
mod workflows;

pub use ai_assistant::AiAssistantPanel;
pub use become_creator_cta::BecomeCreatorCta;
pub use canvas::CanvasPage;
pub use iframe::IframeEmbed;
pub use ndv::NodeDetailsView;
pub use notifications::NotificationsPage;
pub use versions::VersionsPanel;
pub use workflows::WorkflowsPage;

/// Route of the application home view
pub const HOME_PATH: &str = "/home/workflows";

/// Entry point to every page object for one browser page
#[derive(Clone, Copy)]
pub struct AppPage<'a> {
    page: &'a dyn Page,
    fixtures_dir: &'a Path,
}

impl<'a> AppPage<'a> {
    /// `fixtures_dir` holds the `workflows/` directory imported fixtures come from
    pub fn new(page: &'a dyn Page, fixtures_dir: &'a Path) -> Self {
        Self { page, fixtures_dir }
    }

    pub fn page(&self) -> &'a dyn Page {
        self.page
    }

    pub fn fixtures_dir(&self) -> &'a Path {
        self.fixtures_dir
    }

    /// Path of a workflow fixture file
    pub fn workflow_fixture(&self, file_name: &str) -> PathBuf {
        self.fixtures_dir.join("workflows").join(file_name)
    }

    pub async fn go_home(&self) -> E2eResult<()> {
        self.page.goto(HOME_PATH).await?;
        self.page.wait_for_load_state().await
    }

    pub fn workflows(&self) -> WorkflowsPage<'a> {
        WorkflowsPage::new(self.page)
    }

    pub fn canvas(&self) -> CanvasPage<'a> {
        CanvasPage::new(*self)
    }

    pub fn notifications(&self) -> NotificationsPage<'a> {
        NotificationsPage::new(self.page)
    }

    pub fn ndv(&self) -> NodeDetailsView<'a> {
        NodeDetailsView::new(self.page)
    }

    pub fn ai_assistant(&self) -> AiAssistantPanel<'a> {
        AiAssistantPanel::new(self.page)
    }

    pub fn become_creator_cta(&self) -> BecomeCreatorCta<'a> {
        BecomeCreatorCta::new(self.page)
    }

    pub fn iframe(&self) -> IframeEmbed<'a> {
        IframeEmbed::new(self.page)
    }

    pub fn versions(&self) -> VersionsPanel<'a> {
        VersionsPanel::new(self.page)
    }
}

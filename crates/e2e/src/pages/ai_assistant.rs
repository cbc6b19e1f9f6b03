use crate::error::E2eResult;
use crate::locator::Locator;
use crate::page::Page;

/// AI assistant chat panel and its entry points
pub struct AiAssistantPanel<'a> {
    page: &'a dyn Page,
}

impl<'a> AiAssistantPanel<'a> {
    pub fn new(page: &'a dyn Page) -> Self {
        Self { page }
    }

    pub fn floating_button() -> Locator {
        Locator::test_id("ask-assistant-floating-button")
    }

    pub fn canvas_action_button() -> Locator {
        Locator::test_id("ask-assistant-canvas-action-button")
    }

    pub fn chat() -> Locator {
        Locator::test_id("ask-assistant-chat")
    }

    pub fn sidebar_resizer() -> Locator {
        Locator::test_id("ask-assistant-sidebar-resizer")
    }

    pub fn placeholder_message() -> Locator {
        Locator::test_id("placeholder-message")
    }

    pub fn chat_input() -> Locator {
        Locator::test_id("chat-input")
    }

    pub fn send_message_button() -> Locator {
        Locator::test_id("send-message-button")
    }

    pub fn close_chat_button() -> Locator {
        Locator::test_id("close-chat-button")
    }

    pub fn node_error_view_button() -> Locator {
        Locator::test_id("node-error-view-ask-assistant-button")
    }

    pub fn chat_messages_all() -> Locator {
        Locator::css("[data-test-id^=\"chat-message\"]")
    }

    pub fn chat_messages_user() -> Locator {
        Locator::test_id("chat-message-user")
    }

    pub fn chat_messages_system() -> Locator {
        Locator::test_id("chat-message-system")
    }

    pub fn quick_reply_buttons() -> Locator {
        Locator::test_id("quick-replies").locate(Locator::role("button"))
    }

    pub fn new_session_modal() -> Locator {
        Locator::test_id("new-assistant-session-modal")
    }

    pub fn start_new_session_button() -> Locator {
        Self::new_session_modal().locate(Locator::role_with_name("button", "Start new session"))
    }

    /// Open the chat from the canvas action button
    pub async fn open_chat(&self) -> E2eResult<()> {
        self.page.click(&Self::canvas_action_button()).await
    }

    /// Ask for help from the error shown in the node details view
    pub async fn ask_about_node_error(&self) -> E2eResult<()> {
        self.page.click(&Self::node_error_view_button()).await
    }

    pub async fn close_chat(&self) -> E2eResult<()> {
        self.page.click(&Self::close_chat_button()).await
    }

    pub async fn send_message(&self, text: &str) -> E2eResult<()> {
        self.page.fill(&Self::chat_input(), text).await?;
        self.page.click(&Self::send_message_button()).await
    }

    /// Accept the warning shown when a new session would replace the current one
    pub async fn start_new_session(&self) -> E2eResult<()> {
        self.page.click(&Self::start_new_session_button()).await
    }
}

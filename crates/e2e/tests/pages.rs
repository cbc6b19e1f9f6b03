use std::path::PathBuf;
use std::time::Duration;

use flowtest_e2e::intercept::InterceptOutcome;
use flowtest_e2e::page::ResponseMatcher;
use flowtest_e2e::pages::{AiAssistantPanel, BecomeCreatorCta, IframeEmbed, NodeDetailsView, VersionsPanel};
use flowtest_e2e::recording::{Action, RecordingPage};
use flowtest_e2e::{AppPage, E2eError};

const SELF_INSTALL: &str = "https://n8n.io/self-install?instanceId=test-instance-id&userId=test-user-id";

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

#[tokio::test]
async fn cta_eligibility_is_answered_from_the_route() {
    let page = RecordingPage::new();
    let fixtures = fixtures_dir();
    let app = AppPage::new(&page, &fixtures);

    app.become_creator_cta()
        .intercept_cta_request_with_response(true)
        .await
        .unwrap();
    app.become_creator_cta().close_cta().await.unwrap();

    match page
        .simulate_request("http://localhost:5678/rest/cta/become-creator")
        .unwrap()
    {
        Some(InterceptOutcome::Fulfill { status, body, .. }) => {
            assert_eq!(status, 200);
            assert_eq!(body, "true");
        }
        other => panic!("expected fulfilled response, got {:?}", other),
    }
    assert_eq!(page.actions().last(), Some(&Action::Click(BecomeCreatorCta::close_button())));
}

#[tokio::test]
async fn iframe_request_is_served_locally_and_awaited() {
    let page = RecordingPage::new();
    let fixtures = fixtures_dir();
    let app = AppPage::new(&page, &fixtures);
    let iframe = app.iframe();

    iframe.intercept_iframe_request(SELF_INSTALL).await.unwrap();
    let waiter = iframe
        .wait_for_iframe_request(SELF_INSTALL, Duration::from_secs(1))
        .await
        .unwrap();
    let response = waiter.await.unwrap();
    assert_eq!(response.url, SELF_INSTALL);

    match page.simulate_request(SELF_INSTALL).unwrap() {
        Some(InterceptOutcome::Fulfill { content_type, body, .. }) => {
            assert_eq!(content_type, "text/html");
            assert!(body.is_empty(), "{:?}", body);
        }
        other => panic!("expected fulfilled response, got {:?}", other),
    }
    assert_eq!(
        IframeEmbed::iframe_by_src(SELF_INSTALL).to_string(),
        format!("iframe[src=\"{}\"]", SELF_INSTALL)
    );
    assert!(page
        .actions()
        .contains(&Action::ExpectResponse(ResponseMatcher::glob(SELF_INSTALL))));
}

#[tokio::test]
async fn assistant_chat_round_trip() {
    let page = RecordingPage::new();
    let fixtures = fixtures_dir();
    let app = AppPage::new(&page, &fixtures);
    let assistant = app.ai_assistant();

    assistant.open_chat().await.unwrap();
    assistant.send_message("Test message").await.unwrap();
    assistant.start_new_session().await.unwrap();
    assistant.close_chat().await.unwrap();

    assert_eq!(
        page.actions(),
        vec![
            Action::Click(AiAssistantPanel::canvas_action_button()),
            Action::Fill {
                target: AiAssistantPanel::chat_input(),
                value: "Test message".into(),
            },
            Action::Click(AiAssistantPanel::send_message_button()),
            Action::Click(AiAssistantPanel::start_new_session_button()),
            Action::Click(AiAssistantPanel::close_chat_button()),
        ]
    );
    assert_eq!(
        AiAssistantPanel::start_new_session_button().to_string(),
        "[data-test-id=\"new-assistant-session-modal\"] >> role=button[name=\"Start new session\"]"
    );
}

#[tokio::test]
async fn versions_panel_opens_and_closes() {
    let page = RecordingPage::new();
    let fixtures = fixtures_dir();
    let versions = AppPage::new(&page, &fixtures).versions();

    versions.open_version_updates_panel().await.unwrap();
    versions.close_version_updates_panel().await.unwrap();

    assert_eq!(
        page.actions(),
        vec![
            Action::Click(VersionsPanel::open_button()),
            Action::Click(VersionsPanel::close_button()),
        ]
    );
}

#[tokio::test]
async fn inline_expression_assertion_follows_the_editor() {
    let fixtures = fixtures_dir();

    let page = RecordingPage::new();
    let app = AppPage::new(&page, &fixtures);
    app.canvas().open_node("Repro1").await.unwrap();
    app.ndv().execute().await.unwrap();
    app.ndv().assert_inline_expression_valid().await.unwrap();
    app.ndv().click_back_to_canvas_button().await.unwrap();

    let page = RecordingPage::new().with_absent(NodeDetailsView::valid_inline_expression());
    let app = AppPage::new(&page, &fixtures);
    // Default expect timeout applies here
    let err = app.ndv().assert_inline_expression_valid().await.unwrap_err();
    assert!(matches!(err, E2eError::AssertionFailed(_)));
}

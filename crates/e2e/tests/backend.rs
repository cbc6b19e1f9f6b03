//! Backend control client against a local mock server

use std::time::Duration;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowtest_e2e::backend::{BackendApi, BackendConfig};
use flowtest_e2e::{E2eError, FeatureControl};

fn api_for(server: &MockServer) -> BackendApi {
    BackendApi::new(BackendConfig {
        base_url: server.uri(),
        startup_timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn feature_flags_are_patched() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/e2e/feature"))
        .and(body_json(serde_json::json!({ "feature": "aiAssistant", "enabled": true })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/e2e/feature"))
        .and(body_json(serde_json::json!({ "feature": "aiAssistant", "enabled": false })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = api_for(&server);
    api.set_feature("aiAssistant", true).await.unwrap();
    api.disable_feature("aiAssistant").await.unwrap();
}

#[tokio::test]
async fn rejected_flag_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/e2e/feature"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown feature"))
        .mount(&server)
        .await;

    let err = api_for(&server).enable_feature("noSuchFlag").await.unwrap_err();

    match err {
        E2eError::Feature { feature, reason } => {
            assert_eq!(feature, "noSuchFlag");
            assert!(reason.contains("400"), "{}", reason);
            assert!(reason.contains("unknown feature"), "{}", reason);
        }
        other => panic!("expected feature error, got {:?}", other),
    }
}

#[tokio::test]
async fn health_check_waits_for_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .mount(&server)
        .await;

    api_for(&server).wait_for_healthy().await.unwrap();
}

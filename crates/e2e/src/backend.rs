//! Backend control surface - health checks and feature flags

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Out-of-process feature flag control
#[async_trait]
pub trait FeatureControl: Send + Sync {
    async fn enable_feature(&self, feature: &str) -> E2eResult<()>;

    async fn disable_feature(&self, feature: &str) -> E2eResult<()>;

    async fn set_feature(&self, feature: &str, enabled: bool) -> E2eResult<()> {
        if enabled {
            self.enable_feature(feature).await
        } else {
            self.disable_feature(feature).await
        }
    }
}

/// Configuration for talking to the application backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the application under test
    pub base_url: String,

    /// Path of the health endpoint
    pub health_path: String,

    /// Timeout for the application to become healthy
    pub startup_timeout: Duration,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5678".to_string(),
            health_path: "/healthz".to_string(),
            startup_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
struct FeatureToggle<'a> {
    feature: &'a str,
    enabled: bool,
}

/// HTTP client for the application's E2E control endpoints
pub struct BackendApi {
    client: reqwest::Client,
    config: BackendConfig,
}

impl BackendApi {
    pub fn new(config: BackendConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Wait for the application to respond to health checks
    pub async fn wait_for_healthy(&self) -> E2eResult<()> {
        let health_url = self.url(&self.config.health_path);
        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < self.config.startup_timeout {
            attempts += 1;

            match self.client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Application is healthy at {}", self.config.base_url);
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application at {}...", self.config.base_url);
                    }
                    // Connection refused is expected while the app is booting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::BackendHealthCheck(attempts))
    }

    async fn toggle(&self, feature: &str, enabled: bool) -> E2eResult<()> {
        debug!("Setting feature '{}' to {}", feature, enabled);

        let resp = self
            .client
            .patch(self.url("/rest/e2e/feature"))
            .json(&FeatureToggle { feature, enabled })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(E2eError::Feature {
                feature: feature.to_string(),
                reason: format!("{} {}", status, body),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl FeatureControl for BackendApi {
    async fn enable_feature(&self, feature: &str) -> E2eResult<()> {
        self.toggle(feature, true).await
    }

    async fn disable_feature(&self, feature: &str) -> E2eResult<()> {
        self.toggle(feature, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let api = BackendApi::new(BackendConfig {
            base_url: "http://127.0.0.1:5678/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(api.url("/healthz"), "http://127.0.0.1:5678/healthz");
    }

    #[test]
    fn test_feature_toggle_body() {
        let body = serde_json::to_value(FeatureToggle {
            feature: "aiAssistant",
            enabled: false,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "feature": "aiAssistant", "enabled": false }));
    }

    #[tokio::test]
    async fn test_health_check_gives_up() {
        let api = BackendApi::new(BackendConfig {
            // Reserved port, nothing listens here
            base_url: "http://127.0.0.1:9".to_string(),
            startup_timeout: Duration::from_millis(250),
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        })
        .unwrap();

        match api.wait_for_healthy().await {
            Err(E2eError::BackendHealthCheck(attempts)) => assert!(attempts >= 1),
            other => panic!("expected health check failure, got {:?}", other),
        }
    }
}

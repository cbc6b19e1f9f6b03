//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Invalid test configuration: {0}")]
    Config(String),

    #[error("Backend health check failed after {0} attempts")]
    BackendHealthCheck(usize),

    #[error("Feature flag '{feature}' could not be set: {reason}")]
    Feature { feature: String, reason: String },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Workflow fixture not found: {0}")]
    FixtureNotFound(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// True for errors caused by a missed wait bound
    pub fn is_timeout(&self) -> bool {
        matches!(self, E2eError::Timeout(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

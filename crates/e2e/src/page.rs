//! Browser page seam
//!
//! Everything above this module (requirements setup, page objects, the
//! workflow composer, scenario steps) talks to the browser through the
//! [`Page`] trait. The production implementation is
//! [`crate::playwright::PlaywrightSession`]; [`crate::recording::RecordingPage`]
//! records calls instead of driving a browser.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::intercept::{InterceptRule, UrlGlob};
use crate::locator::Locator;

/// Element state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// Criteria a network response must meet to complete a response waiter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_glob: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_contains: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ResponseMatcher {
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self {
            url_glob: Some(pattern.into()),
            ..Default::default()
        }
    }

    /// POST responses whose URL contains every fragment
    pub fn post_containing<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url_glob: None,
            url_contains: fragments.into_iter().map(Into::into).collect(),
            method: Some("POST".to_string()),
        }
    }

    /// A URL glob is matched by the browser itself, so it stands alone
    pub fn validate(&self) -> E2eResult<()> {
        match &self.url_glob {
            Some(glob) if self.method.is_some() || !self.url_contains.is_empty() => Err(E2eError::Config(format!(
                "response matcher combines URL glob '{}' with other criteria",
                glob
            ))),
            Some(glob) => UrlGlob::new(glob).map(drop),
            None => Ok(()),
        }
    }
}

/// A network response observed by a waiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub url: String,
    pub status: u16,
    pub method: String,
}

/// Pending response waiter, armed before the action that triggers it
pub type ResponseWaiter = BoxFuture<'static, E2eResult<ResponseInfo>>;

/// Browser primitives for a single page
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a path relative to the base URL (or an absolute URL)
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn wait_for_load_state(&self) -> E2eResult<()>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn dblclick(&self, locator: &Locator) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn hover(&self, locator: &Locator) -> E2eResult<()>;

    /// Press a key on the page keyboard
    async fn press_key(&self, key: &str) -> E2eResult<()>;

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool>;

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool>;

    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    async fn inner_text(&self, locator: &Locator) -> E2eResult<String>;

    async fn input_value(&self, locator: &Locator) -> E2eResult<String>;

    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;

    /// Wait until the element reaches `state`, failing with a timeout error
    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()>;

    /// Click `trigger`, catch the file chooser it opens and hand it `path`
    async fn upload_file(&self, trigger: &Locator, path: &Path) -> E2eResult<()>;

    /// Register a route handler that lives as long as the page
    async fn route(&self, rule: &InterceptRule) -> E2eResult<()>;

    /// Write entries to localStorage before any page script runs
    async fn seed_local_storage(&self, entries: &BTreeMap<String, String>) -> E2eResult<()>;

    /// Arm a waiter for the first response matching `matcher`
    ///
    /// The waiter is armed when this returns; the returned future completes
    /// when the response arrives or `timeout` passes.
    async fn expect_response(&self, matcher: ResponseMatcher, timeout: Duration) -> E2eResult<ResponseWaiter>;

    async fn wait_for_timeout(&self, duration: Duration) -> E2eResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    /// Take an assertion about `locator` as satisfied without polling
    ///
    /// Pages that plan actions rather than drive a browser note the
    /// assertion and return `true`. Browser-backed pages never do.
    fn assume_expectation(&self, _locator: &Locator, _what: &str) -> bool {
        false
    }

    /// Release the browser resources behind this page
    async fn close(&self) -> E2eResult<()> {
        Ok(())
    }
}

/// Map a missed `tokio::time::timeout` onto the crate error
pub fn elapsed(what: impl Into<String>) -> impl FnOnce(tokio::time::error::Elapsed) -> E2eError {
    let what = what.into();
    move |_| E2eError::Timeout(what)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_shapes_validate() {
        ResponseMatcher::post_containing(["/rest/workflows/", "/run"])
            .validate()
            .unwrap();
        ResponseMatcher::glob("**/rest/cta/become-creator")
            .validate()
            .unwrap();

        let mixed = ResponseMatcher {
            url_contains: vec!["/run".into()],
            ..ResponseMatcher::glob("**/rest/**")
        };
        assert!(matches!(mixed.validate(), Err(E2eError::Config(_))));
    }
}

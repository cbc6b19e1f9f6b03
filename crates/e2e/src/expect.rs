//! Auto-waiting assertions over the page seam
//!
//! Each assertion polls the page until the condition holds or the timeout
//! expires, then fails with the last observed value. Read errors along the
//! way are retried like any other unmet condition.

use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::page::Page;

/// Default timeout for an assertion
pub const DEFAULT_EXPECT_TIMEOUT_MS: u64 = 5000;

/// Polling interval between checks
pub const POLL_INTERVAL_MS: u64 = 100;

/// Start an assertion about `locator`
pub fn expect<'a>(page: &'a dyn Page, locator: Locator) -> Expectation<'a> {
    Expectation {
        page,
        locator,
        timeout: Duration::from_millis(DEFAULT_EXPECT_TIMEOUT_MS),
    }
}

pub struct Expectation<'a> {
    page: &'a dyn Page,
    locator: Locator,
    timeout: Duration,
}

impl<'a> Expectation<'a> {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn to_be_visible(&self) -> E2eResult<()> {
        self.poll("to be visible", Reading::Visible, |v| v == &Observed::Flag(true))
            .await
    }

    pub async fn to_be_hidden(&self) -> E2eResult<()> {
        self.poll("to be hidden", Reading::Visible, |v| v == &Observed::Flag(false))
            .await
    }

    pub async fn to_be_enabled(&self) -> E2eResult<()> {
        self.poll("to be enabled", Reading::Enabled, |v| v == &Observed::Flag(true))
            .await
    }

    pub async fn to_be_disabled(&self) -> E2eResult<()> {
        self.poll("to be disabled", Reading::Enabled, |v| v == &Observed::Flag(false))
            .await
    }

    pub async fn to_have_count(&self, expected: usize) -> E2eResult<()> {
        self.poll(&format!("to have count {}", expected), Reading::Count, |v| {
            v == &Observed::Count(expected)
        })
        .await
    }

    pub async fn to_have_text(&self, expected: &str) -> E2eResult<()> {
        self.poll(&format!("to have text {:?}", expected), Reading::Text, |v| {
            matches!(v, Observed::Text(t) if t.trim() == expected)
        })
        .await
    }

    pub async fn to_contain_text(&self, expected: &str) -> E2eResult<()> {
        self.poll(&format!("to contain text {:?}", expected), Reading::Text, |v| {
            matches!(v, Observed::Text(t) if t.contains(expected))
        })
        .await
    }

    pub async fn to_have_value(&self, expected: &str) -> E2eResult<()> {
        self.poll(&format!("to have value {:?}", expected), Reading::Value, |v| {
            matches!(v, Observed::Text(t) if t == expected)
        })
        .await
    }

    pub async fn to_have_attribute(&self, name: &str, expected: &str) -> E2eResult<()> {
        self.poll(
            &format!("to have attribute {}={:?}", name, expected),
            Reading::Attribute(name),
            |v| matches!(v, Observed::Attribute(Some(a)) if a == expected),
        )
        .await
    }

    async fn observe(&self, reading: &Reading<'_>) -> E2eResult<Observed> {
        let page = self.page;
        let locator = &self.locator;
        Ok(match reading {
            Reading::Visible => Observed::Flag(page.is_visible(locator).await?),
            Reading::Enabled => Observed::Flag(page.is_enabled(locator).await?),
            Reading::Count => Observed::Count(page.count(locator).await?),
            Reading::Text => Observed::Text(page.inner_text(locator).await?),
            Reading::Value => Observed::Text(page.input_value(locator).await?),
            Reading::Attribute(name) => Observed::Attribute(page.attribute(locator, name).await?),
        })
    }

    async fn poll<C>(&self, what: &str, reading: Reading<'_>, check: C) -> E2eResult<()>
    where
        C: Fn(&Observed) -> bool,
    {
        if self.page.assume_expectation(&self.locator, what) {
            return Ok(());
        }

        let start = Instant::now();
        loop {
            // A read on a detached element throws; that is "not yet", not a failure
            let last = match self.observe(&reading).await {
                Ok(observed) if check(&observed) => return Ok(()),
                Ok(observed) => observed.to_string(),
                Err(e) => format!("error ({})", e),
            };
            if start.elapsed() >= self.timeout {
                return Err(E2eError::AssertionFailed(format!(
                    "expected {} {} within {}ms, last observed {}",
                    self.locator,
                    what,
                    self.timeout.as_millis(),
                    last
                )));
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}

enum Reading<'n> {
    Visible,
    Enabled,
    Count,
    Text,
    Value,
    Attribute(&'n str),
}

#[derive(Debug, PartialEq)]
enum Observed {
    Flag(bool),
    Count(usize),
    Text(String),
    Attribute(Option<String>),
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Flag(v) => write!(f, "{}", v),
            Observed::Count(n) => write!(f, "{}", n),
            Observed::Text(t) => write!(f, "{:?}", t),
            Observed::Attribute(Some(a)) => write!(f, "{:?}", a),
            Observed::Attribute(None) => write!(f, "no attribute"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Action, RecordingPage};

    #[tokio::test]
    async fn test_visible_passes_immediately() {
        let page = RecordingPage::new();
        expect(&page, Locator::test_id("ask-assistant-chat"))
            .to_be_visible()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_count_mismatch_reports_last_value() {
        let messages = Locator::test_id("chat-message-user");
        let page = RecordingPage::new().with_count(messages.clone(), 2);

        let err = expect(&page, messages)
            .with_timeout(Duration::from_millis(50))
            .to_have_count(1)
            .await
            .unwrap_err();

        match err {
            E2eError::AssertionFailed(msg) => {
                assert!(msg.contains("to have count 1"));
                assert!(msg.contains("last observed 2"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_contain_text_and_attribute() {
        let message = Locator::test_id("chat-message-system").first();
        let iframe = Locator::css("iframe");
        let page = RecordingPage::new()
            .with_text(message.clone(), "The session has ended")
            .with_attribute(iframe.clone(), "src", "https://example.test/embed");

        expect(&page, message)
            .to_contain_text("session has ended")
            .await
            .unwrap();
        expect(&page, iframe)
            .to_have_attribute("src", "https://example.test/embed")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_detached_read_is_retried() {
        let preview = Locator::test_id("parameter-expression-preview-value");
        let page = RecordingPage::new()
            .with_text(preview.clone(), "hello there")
            .with_detached_reads(preview.clone(), 2);

        expect(&page, preview)
            .with_timeout(Duration::from_secs(2))
            .to_have_text("hello there")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_errors_until_timeout_fail_the_assertion() {
        let preview = Locator::test_id("parameter-expression-preview-value");
        let page = RecordingPage::new().with_detached_reads(preview.clone(), usize::MAX);

        let err = expect(&page, preview)
            .with_timeout(Duration::from_millis(250))
            .to_have_text("hello there")
            .await
            .unwrap_err();

        match err {
            E2eError::AssertionFailed(msg) => {
                assert!(msg.contains("within 250ms"), "{}", msg);
                assert!(msg.contains("not attached"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_assumed_expectation_is_recorded() {
        let cta = Locator::test_id("become-template-creator-cta");
        let page = RecordingPage::new().assuming_expectations();

        expect(&page, cta.clone())
            .with_timeout(Duration::from_millis(10))
            .to_be_hidden()
            .await
            .unwrap();

        assert_eq!(
            page.actions(),
            vec![Action::Expect {
                target: cta,
                what: "to be hidden".into(),
            }]
        );
    }
}

//! In-process page that records actions instead of driving a browser
//!
//! `RecordingPage` implements both [`Page`] and [`FeatureControl`], logging
//! every call in order into one action list. Registered routes can be queried
//! with [`RecordingPage::simulate_request`], and seeded storage is applied on
//! each navigation the way an init script would be. Locators are present and
//! visible unless marked absent. A page built with
//! [`RecordingPage::assuming_expectations`] records assertions instead of
//! checking them, which is how dry runs walk a whole scenario.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::FeatureControl;
use crate::error::{E2eError, E2eResult};
use crate::intercept::{InterceptOutcome, InterceptRule, UrlGlob};
use crate::locator::Locator;
use crate::page::{Page, ResponseInfo, ResponseMatcher, ResponseWaiter, WaitState};
use crate::runner::Driver;

/// One recorded primitive call
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    EnableFeature(String),
    DisableFeature(String),
    Goto(String),
    WaitForLoad,
    Click(Locator),
    DoubleClick(Locator),
    Fill { target: Locator, value: String },
    Hover(Locator),
    PressKey(String),
    WaitFor { target: Locator, state: WaitState },
    Upload { trigger: Locator, file: PathBuf },
    Route(InterceptRule),
    SeedStorage(BTreeMap<String, String>),
    ExpectResponse(ResponseMatcher),
    Expect { target: Locator, what: String },
    Sleep(Duration),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::EnableFeature(name) => write!(f, "enable-feature {}", name),
            Action::DisableFeature(name) => write!(f, "disable-feature {}", name),
            Action::Goto(url) => write!(f, "goto {}", url),
            Action::WaitForLoad => write!(f, "wait-for-load"),
            Action::Click(target) => write!(f, "click {}", target),
            Action::DoubleClick(target) => write!(f, "dblclick {}", target),
            Action::Fill { target, value } => write!(f, "fill {} {:?}", target, value),
            Action::Hover(target) => write!(f, "hover {}", target),
            Action::PressKey(key) => write!(f, "press {}", key),
            Action::WaitFor { target, state } => write!(f, "wait-for {} {}", target, state.as_str()),
            Action::Upload { trigger, file } => write!(f, "upload {} via {}", file.display(), trigger),
            Action::Route(rule) => write!(f, "route {}", rule.url),
            Action::SeedStorage(entries) => write!(f, "seed-storage {} key(s)", entries.len()),
            Action::ExpectResponse(matcher) => write!(f, "expect-response {:?}", matcher),
            Action::Expect { target, what } => write!(f, "expect {} {}", target, what),
            Action::Sleep(d) => write!(f, "sleep {}ms", d.as_millis()),
        }
    }
}

#[derive(Default)]
struct Recorded {
    actions: Vec<Action>,
    routes: Vec<(UrlGlob, InterceptRule)>,
    seeds: Vec<BTreeMap<String, String>>,
    local_storage: BTreeMap<String, String>,
    values: HashMap<Locator, String>,
    detached_reads: HashMap<Locator, usize>,
}

/// Page double that records calls in order
#[derive(Default)]
pub struct RecordingPage {
    state: Mutex<Recorded>,
    absent: HashSet<Locator>,
    sticky: HashSet<Locator>,
    disabled: HashSet<Locator>,
    failing_keys: HashSet<String>,
    texts: HashMap<Locator, String>,
    counts: HashMap<Locator, usize>,
    attributes: HashMap<(Locator, String), String>,
    silent_network: bool,
    assume_expectations: bool,
}

impl RecordingPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The locator is not on the page: waits for it time out, it is invisible
    #[must_use]
    pub fn with_absent(mut self, locator: Locator) -> Self {
        self.absent.insert(locator);
        self
    }

    /// The locator never goes away once shown
    #[must_use]
    pub fn with_sticky(mut self, locator: Locator) -> Self {
        self.sticky.insert(locator);
        self
    }

    #[must_use]
    pub fn with_disabled(mut self, locator: Locator) -> Self {
        self.disabled.insert(locator);
        self
    }

    /// Pressing `key` fails
    #[must_use]
    pub fn with_failing_key(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, locator: Locator, text: impl Into<String>) -> Self {
        self.texts.insert(locator, text.into());
        self
    }

    #[must_use]
    pub fn with_count(mut self, locator: Locator, count: usize) -> Self {
        self.counts.insert(locator, count);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, locator: Locator, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert((locator, name.into()), value.into());
        self
    }

    /// Response waiters never complete and time out instead
    #[must_use]
    pub fn without_network_responses(mut self) -> Self {
        self.silent_network = true;
        self
    }

    /// The next `reads` text, value or attribute reads of `locator` fail as
    /// if the element were not attached yet
    #[must_use]
    pub fn with_detached_reads(mut self, locator: Locator, reads: usize) -> Self {
        self.state.get_mut().detached_reads.insert(locator, reads);
        self
    }

    /// Record assertions as [`Action::Expect`] and treat them as met
    #[must_use]
    pub fn assuming_expectations(mut self) -> Self {
        self.assume_expectations = true;
        self
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().actions.clone()
    }

    pub fn local_storage(&self) -> BTreeMap<String, String> {
        self.state.lock().local_storage.clone()
    }

    /// What a request to `url` receives from the registered routes
    ///
    /// The most recently registered matching route wins. `None` means the
    /// request goes to the network untouched.
    pub fn simulate_request(&self, url: &str) -> E2eResult<Option<InterceptOutcome>> {
        let state = self.state.lock();
        state
            .routes
            .iter()
            .rev()
            .find(|(glob, _)| glob.matches(url))
            .map(|(_, rule)| rule.outcome())
            .transpose()
    }

    fn record(&self, action: Action) {
        self.state.lock().actions.push(action);
    }

    fn present(&self, locator: &Locator) -> bool {
        !self.absent.contains(locator)
    }

    fn attached(&self, locator: &Locator, op: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        match state.detached_reads.get_mut(locator) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(E2eError::Playwright(format!(
                    "locator.{}: Element is not attached to the DOM",
                    op
                )))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Page for RecordingPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.actions.push(Action::Goto(url.to_string()));
        let seeded: Vec<_> = state.seeds.iter().flatten().map(|(k, v)| (k.clone(), v.clone())).collect();
        state.local_storage.extend(seeded);
        Ok(())
    }

    async fn wait_for_load_state(&self) -> E2eResult<()> {
        self.record(Action::WaitForLoad);
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        if !self.present(locator) {
            return Err(E2eError::Timeout(format!("click {}", locator)));
        }
        self.record(Action::Click(locator.clone()));
        Ok(())
    }

    async fn dblclick(&self, locator: &Locator) -> E2eResult<()> {
        if !self.present(locator) {
            return Err(E2eError::Timeout(format!("dblclick {}", locator)));
        }
        self.record(Action::DoubleClick(locator.clone()));
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        if !self.present(locator) {
            return Err(E2eError::Timeout(format!("fill {}", locator)));
        }
        let mut state = self.state.lock();
        state.actions.push(Action::Fill {
            target: locator.clone(),
            value: value.to_string(),
        });
        state.values.insert(locator.clone(), value.to_string());
        Ok(())
    }

    async fn hover(&self, locator: &Locator) -> E2eResult<()> {
        self.record(Action::Hover(locator.clone()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        if self.failing_keys.contains(key) {
            return Err(E2eError::Playwright(format!("keyboard.press({}) failed", key)));
        }
        self.record(Action::PressKey(key.to_string()));
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.present(locator))
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.present(locator) && !self.disabled.contains(locator))
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        if !self.present(locator) {
            return Ok(0);
        }
        Ok(self.counts.get(locator).copied().unwrap_or(1))
    }

    async fn inner_text(&self, locator: &Locator) -> E2eResult<String> {
        self.attached(locator, "innerText")?;
        Ok(self.texts.get(locator).cloned().unwrap_or_default())
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<String> {
        self.attached(locator, "inputValue")?;
        Ok(self.state.lock().values.get(locator).cloned().unwrap_or_default())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        self.attached(locator, "getAttribute")?;
        Ok(self.attributes.get(&(locator.clone(), name.to_string())).cloned())
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, _timeout: Duration) -> E2eResult<()> {
        self.record(Action::WaitFor {
            target: locator.clone(),
            state,
        });
        let reached = match state {
            WaitState::Visible | WaitState::Attached => self.present(locator),
            WaitState::Hidden | WaitState::Detached => !self.sticky.contains(locator),
        };
        if reached {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} to be {}", locator, state.as_str())))
        }
    }

    async fn upload_file(&self, trigger: &Locator, path: &Path) -> E2eResult<()> {
        self.record(Action::Upload {
            trigger: trigger.clone(),
            file: path.to_path_buf(),
        });
        Ok(())
    }

    async fn route(&self, rule: &InterceptRule) -> E2eResult<()> {
        let glob = UrlGlob::new(&rule.url)?;
        let mut state = self.state.lock();
        state.actions.push(Action::Route(rule.clone()));
        state.routes.push((glob, rule.clone()));
        Ok(())
    }

    async fn seed_local_storage(&self, entries: &BTreeMap<String, String>) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.actions.push(Action::SeedStorage(entries.clone()));
        state.seeds.push(entries.clone());
        Ok(())
    }

    async fn expect_response(&self, matcher: ResponseMatcher, timeout: Duration) -> E2eResult<ResponseWaiter> {
        matcher.validate()?;
        self.record(Action::ExpectResponse(matcher.clone()));

        if self.silent_network {
            let what = format!("response matching {:?}", matcher);
            return Ok(async move {
                tokio::time::sleep(timeout).await;
                Err(E2eError::Timeout(what))
            }
            .boxed());
        }

        let url = matcher
            .url_glob
            .clone()
            .unwrap_or_else(|| matcher.url_contains.concat());
        let info = ResponseInfo {
            url,
            status: 200,
            method: matcher.method.clone().unwrap_or_else(|| "GET".to_string()),
        };
        Ok(futures::future::ready(Ok(info)).boxed())
    }

    async fn wait_for_timeout(&self, duration: Duration) -> E2eResult<()> {
        self.record(Action::Sleep(duration));
        Ok(())
    }

    fn assume_expectation(&self, locator: &Locator, what: &str) -> bool {
        if self.assume_expectations {
            self.record(Action::Expect {
                target: locator.clone(),
                what: what.to_string(),
            });
        }
        self.assume_expectations
    }
}

#[async_trait]
impl FeatureControl for RecordingPage {
    async fn enable_feature(&self, feature: &str) -> E2eResult<()> {
        self.record(Action::EnableFeature(feature.to_string()));
        Ok(())
    }

    async fn disable_feature(&self, feature: &str) -> E2eResult<()> {
        self.record(Action::DisableFeature(feature.to_string()));
        Ok(())
    }
}

/// Driver handing out a fresh recording page per scenario
///
/// Pages assume every assertion holds, so a scenario runs to its end and its
/// full action list can be printed. Feature flag calls are recorded on the
/// most recently opened page, which is the one whose requirements are being
/// applied.
#[derive(Default)]
pub struct RecordingDriver {
    pages: Mutex<Vec<Arc<RecordingPage>>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every page opened so far, in order
    pub fn pages(&self) -> Vec<Arc<RecordingPage>> {
        self.pages.lock().clone()
    }

    fn current(&self) -> E2eResult<Arc<RecordingPage>> {
        self.pages
            .lock()
            .last()
            .cloned()
            .ok_or_else(|| E2eError::Config("feature flag set before any page was opened".into()))
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn open_page(&self) -> E2eResult<Arc<dyn Page>> {
        let page = Arc::new(RecordingPage::new().assuming_expectations());
        self.pages.lock().push(page.clone());
        Ok(page)
    }
}

#[async_trait]
impl FeatureControl for RecordingDriver {
    async fn enable_feature(&self, feature: &str) -> E2eResult<()> {
        let page = self.current()?;
        page.enable_feature(feature).await
    }

    async fn disable_feature(&self, feature: &str) -> E2eResult<()> {
        let page = self.current()?;
        page.disable_feature(feature).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_route_wins() {
        let page = RecordingPage::new();
        page.route(&InterceptRule::new("**/rest/**", serde_json::json!("first")))
            .await
            .unwrap();
        page.route(&InterceptRule::network_error("**/rest/ai/chat"))
            .await
            .unwrap();

        assert!(matches!(
            page.simulate_request("http://h/rest/ai/chat").unwrap(),
            Some(InterceptOutcome::Abort { .. })
        ));
        assert!(matches!(
            page.simulate_request("http://h/rest/settings").unwrap(),
            Some(InterceptOutcome::Fulfill { .. })
        ));
        assert_eq!(page.simulate_request("http://h/static/app.js").unwrap(), None);
    }

    #[tokio::test]
    async fn test_absent_locator_times_out() {
        let missing = Locator::test_id("version-updates-panel-button");
        let page = RecordingPage::new().with_absent(missing.clone());

        assert!(!page.is_visible(&missing).await.unwrap());
        assert_eq!(page.count(&missing).await.unwrap(), 0);
        let err = page
            .wait_for(&missing, WaitState::Visible, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_silent_network_times_out() {
        let page = RecordingPage::new().without_network_responses();
        let waiter = page
            .expect_response(ResponseMatcher::glob("**/run"), Duration::from_millis(10))
            .await
            .unwrap();
        assert!(waiter.await.unwrap_err().is_timeout());
    }
}

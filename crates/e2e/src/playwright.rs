//! Playwright browser automation
//!
//! A [`PlaywrightSession`] owns one `node` process running the embedded
//! driver script, which in turn owns one browser, context and page. Commands
//! go to the driver as JSON lines on stdin, tagged with a request id; replies
//! come back on stdout with the same id and complete the matching pending
//! request. A single writer task keeps commands in order, so a response
//! waiter registered before a click is armed before the click runs.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::intercept::{InterceptRule, UrlGlob};
use crate::locator::{Locator, TEST_ID_ATTRIBUTE};
use crate::page::{Page, ResponseInfo, ResponseMatcher, ResponseWaiter, WaitState};

/// Driver script run by node; speaks the JSON-lines protocol on stdio
const DRIVER_JS: &str = r#"
const { createRequire } = require('module');
const readline = require('readline');
const playwright = createRequire(process.cwd() + '/')('playwright');

const cfg = JSON.parse(process.argv[2]);

function reply(id, ok, payload) {
  const msg = ok ? { id, ok, result: payload === undefined ? null : payload } : { id, ok, error: String(payload && payload.message || payload) };
  process.stdout.write(JSON.stringify(msg) + '\n');
}

function resolve(page, loc) {
  switch (loc.kind) {
    case 'test_id': return page.getByTestId(loc.id);
    case 'css': return page.locator(loc.selector);
    case 'text': return page.getByText(loc.text);
    case 'role': return page.getByRole(loc.role, loc.name ? { name: loc.name } : {});
    case 'has_text': return resolve(page, loc.of).filter({ hasText: loc.text });
    case 'nth': return resolve(page, loc.of).nth(loc.index);
    case 'within': return resolve(resolve(page, loc.parent), loc.child);
    default: throw new Error('unknown locator kind ' + loc.kind);
  }
}

function matches(a, response) {
  const url = response.url();
  if (a.method && response.request().method().toUpperCase() !== a.method.toUpperCase()) return false;
  return (a.urlContains || []).every((f) => url.includes(f));
}

(async () => {
  const browser = await playwright[cfg.browser].launch({ headless: cfg.headless });
  const context = await browser.newContext({
    baseURL: cfg.baseUrl,
    viewport: { width: cfg.viewportWidth, height: cfg.viewportHeight },
  });
  context.setDefaultTimeout(cfg.actionTimeoutMs);
  playwright.selectors.setTestIdAttribute(cfg.testIdAttribute);
  const page = await context.newPage();

  const ops = {
    goto: (a) => page.goto(a.url).then(() => null),
    waitForLoadState: () => page.waitForLoadState(),
    click: (a) => resolve(page, a.target).click(),
    dblclick: (a) => resolve(page, a.target).dblclick(),
    fill: (a) => resolve(page, a.target).fill(a.value),
    hover: (a) => resolve(page, a.target).hover(),
    pressKey: (a) => page.keyboard.press(a.key),
    isVisible: (a) => resolve(page, a.target).isVisible(),
    isEnabled: (a) => resolve(page, a.target).isEnabled(),
    count: (a) => resolve(page, a.target).count(),
    innerText: (a) => resolve(page, a.target).innerText(),
    inputValue: (a) => resolve(page, a.target).inputValue(),
    attribute: (a) => resolve(page, a.target).getAttribute(a.name),
    waitFor: (a) => resolve(page, a.target).waitFor({ state: a.state, timeout: a.timeoutMs }),
    uploadFile: async (a) => {
      const chooser = page.waitForEvent('filechooser');
      await resolve(page, a.trigger).click();
      await (await chooser).setFiles(a.path);
    },
    route: (a) => page.route(a.url, (route) => a.outcome.type === 'abort'
      ? route.abort(a.outcome.reason)
      : route.fulfill({
        status: a.outcome.status,
        headers: a.outcome.headers,
        contentType: a.outcome.content_type,
        body: a.outcome.body,
      })),
    seedLocalStorage: (a) => page.addInitScript((storage) => {
      for (const [key, value] of Object.entries(storage)) {
        window.localStorage.setItem(key, value);
      }
    }, a.entries),
    expectResponse: (a) => page
      .waitForResponse(a.glob !== undefined ? a.glob : (r) => matches(a, r), { timeout: a.timeoutMs })
      .then((r) => ({ url: r.url(), status: r.status(), method: r.request().method() })),
    close: async () => {
      await browser.close();
      setImmediate(() => process.exit(0));
    },
  };

  reply(0, true, 'ready');

  const rl = readline.createInterface({ input: process.stdin });
  rl.on('line', (line) => {
    let cmd;
    try { cmd = JSON.parse(line); } catch (e) { return; }
    let pending;
    try {
      const op = ops[cmd.op];
      if (!op) throw new Error('unknown op ' + cmd.op);
      pending = op(cmd.args || {});
    } catch (e) {
      pending = Promise.reject(e);
    }
    Promise.resolve(pending).then((r) => reply(cmd.id, true, r), (e) => reply(cmd.id, false, e));
  });
  rl.on('close', async () => {
    await browser.close();
    process.exit(0);
  });
})().catch((e) => {
  reply(0, false, e);
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(name: &str) -> E2eResult<Self> {
        match name {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!(
                "unknown browser '{}' (expected chromium, firefox or webkit)",
                other
            ))),
        }
    }
}

/// Configuration for a browser session
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Default timeout for every Playwright action
    pub action_timeout: Duration,

    /// Timeout for node to launch the browser
    pub launch_timeout: Duration,

    /// Directory whose node_modules provides `playwright`
    pub node_project_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5678".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1536,
            viewport_height: 960,
            action_timeout: Duration::from_secs(10),
            launch_timeout: Duration::from_secs(60),
            node_project_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Serialize)]
struct BridgeCommand<'a> {
    id: u64,
    op: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeReply>>>>;

/// A live browser page driven through the node bridge
pub struct PlaywrightSession {
    outgoing: mpsc::UnboundedSender<String>,
    pending: Pending,
    next_id: AtomicU64,
    child: tokio::sync::Mutex<Child>,
    _driver_dir: tempfile::TempDir,
}

impl PlaywrightSession {
    /// Launch node, the browser and a fresh page
    pub async fn launch(config: &BrowserConfig) -> E2eResult<Self> {
        check_playwright_installed(&config.node_project_dir)?;

        let driver_dir = tempfile::tempdir()?;
        let driver_path = driver_dir.path().join("driver.js");
        std::fs::write(&driver_path, DRIVER_JS)?;

        let launch_args = json!({
            "baseUrl": config.base_url,
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "viewportWidth": config.viewport_width,
            "viewportHeight": config.viewport_height,
            "actionTimeoutMs": config.action_timeout.as_millis() as u64,
            "testIdAttribute": TEST_ID_ATTRIBUTE,
        });

        info!("Launching {} against {}", config.browser.as_str(), config.base_url);

        let mut child = TokioCommand::new("node")
            .arg(&driver_path)
            .arg(launch_args.to_string())
            .current_dir(&config.node_project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("Failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".into()))?;
        let stderr = child.stderr.take();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        pending.lock().insert(0, ready_tx);

        let (outgoing, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = rx.recv().await {
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<BridgeReply>(&line) {
                    Ok(reply) => {
                        if let Some(tx) = reader_pending.lock().remove(&reply.id) {
                            let _ = tx.send(reply);
                        }
                    }
                    Err(_) => debug!("[driver] {}", line),
                }
            }
            // Dropping the senders fails every request still in flight
            reader_pending.lock().clear();
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("[driver] {}", line);
                }
            });
        }

        let ready = tokio::time::timeout(config.launch_timeout, ready_rx)
            .await
            .map_err(|_| E2eError::Timeout("browser launch".into()))?
            .map_err(|_| E2eError::Playwright("driver exited during launch".into()))?;
        if !ready.ok {
            return Err(E2eError::Playwright(format!(
                "browser launch failed: {}",
                ready.error.unwrap_or_default()
            )));
        }

        Ok(Self {
            outgoing,
            pending,
            next_id: AtomicU64::new(1),
            child: tokio::sync::Mutex::new(child),
            _driver_dir: driver_dir,
        })
    }

    /// Send a command and hand back the receiver for its reply
    fn dispatch(&self, op: &str, args: Value) -> E2eResult<oneshot::Receiver<BridgeReply>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&BridgeCommand { id, op, args })?;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        debug!("-> {} #{}", op, id);
        if self.outgoing.send(line).is_err() {
            self.pending.lock().remove(&id);
            return Err(E2eError::Playwright("bridge closed".into()));
        }
        Ok(rx)
    }

    async fn call(&self, op: &str, args: Value) -> E2eResult<Value> {
        let rx = self.dispatch(op, args)?;
        settle(op, rx).await
    }

    async fn call_as<T: serde::de::DeserializeOwned>(&self, op: &str, args: Value) -> E2eResult<T> {
        let value = self.call(op, args).await?;
        Ok(serde_json::from_value(value)?)
    }
}

async fn settle(op: &str, rx: oneshot::Receiver<BridgeReply>) -> E2eResult<Value> {
    let reply = rx
        .await
        .map_err(|_| E2eError::Playwright("bridge closed".into()))?;
    if reply.ok {
        return Ok(reply.result);
    }

    let message = reply.error.unwrap_or_default();
    if message.contains("Timeout") || message.contains("timeout") {
        Err(E2eError::Timeout(format!("{}: {}", op, message)))
    } else {
        Err(E2eError::Playwright(format!("{}: {}", op, message)))
    }
}

/// Route arguments: the glob and the response every match receives, already
/// resolved so the driver only aborts or fulfils
fn route_args(rule: &InterceptRule) -> E2eResult<Value> {
    UrlGlob::new(&rule.url)?;
    Ok(json!({ "url": rule.url, "outcome": rule.outcome()? }))
}

/// Response waiter arguments; a glob goes to Playwright untouched
fn response_args(matcher: &ResponseMatcher, timeout: Duration) -> E2eResult<Value> {
    matcher.validate()?;
    let timeout_ms = timeout.as_millis() as u64;
    Ok(match &matcher.url_glob {
        Some(glob) => json!({ "glob": glob, "timeoutMs": timeout_ms }),
        None => json!({
            "urlContains": matcher.url_contains,
            "method": matcher.method,
            "timeoutMs": timeout_ms,
        }),
    })
}

/// Check that `playwright` resolves from `project_dir`
fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .current_dir(project_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

#[async_trait]
impl Page for PlaywrightSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call("goto", json!({ "url": url })).await.map(drop)
    }

    async fn wait_for_load_state(&self) -> E2eResult<()> {
        self.call("waitForLoadState", Value::Null).await.map(drop)
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.call("click", json!({ "target": locator })).await.map(drop)
    }

    async fn dblclick(&self, locator: &Locator) -> E2eResult<()> {
        self.call("dblclick", json!({ "target": locator })).await.map(drop)
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call("fill", json!({ "target": locator, "value": value }))
            .await
            .map(drop)
    }

    async fn hover(&self, locator: &Locator) -> E2eResult<()> {
        self.call("hover", json!({ "target": locator })).await.map(drop)
    }

    async fn press_key(&self, key: &str) -> E2eResult<()> {
        self.call("pressKey", json!({ "key": key })).await.map(drop)
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        self.call_as("isVisible", json!({ "target": locator })).await
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        self.call_as("isEnabled", json!({ "target": locator })).await
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        self.call_as("count", json!({ "target": locator })).await
    }

    async fn inner_text(&self, locator: &Locator) -> E2eResult<String> {
        self.call_as("innerText", json!({ "target": locator })).await
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<String> {
        self.call_as("inputValue", json!({ "target": locator })).await
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        self.call_as("attribute", json!({ "target": locator, "name": name }))
            .await
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        self.call(
            "waitFor",
            json!({
                "target": locator,
                "state": state.as_str(),
                "timeoutMs": timeout.as_millis() as u64,
            }),
        )
        .await
        .map(drop)
    }

    async fn upload_file(&self, trigger: &Locator, path: &Path) -> E2eResult<()> {
        let path = std::fs::canonicalize(path)?;
        self.call("uploadFile", json!({ "trigger": trigger, "path": path }))
            .await
            .map(drop)
    }

    async fn route(&self, rule: &InterceptRule) -> E2eResult<()> {
        self.call("route", route_args(rule)?).await.map(drop)
    }

    async fn seed_local_storage(&self, entries: &BTreeMap<String, String>) -> E2eResult<()> {
        self.call("seedLocalStorage", json!({ "entries": entries }))
            .await
            .map(drop)
    }

    async fn expect_response(&self, matcher: ResponseMatcher, timeout: Duration) -> E2eResult<ResponseWaiter> {
        let rx = self.dispatch("expectResponse", response_args(&matcher, timeout)?)?;

        Ok(async move {
            let value = settle("expectResponse", rx).await?;
            Ok(serde_json::from_value::<ResponseInfo>(value)?)
        }
        .boxed())
    }

    async fn wait_for_timeout(&self, duration: Duration) -> E2eResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        // The driver exits right after replying; an early "bridge closed" is fine
        if let Err(e) = self.call("close", Value::Null).await {
            debug!("close: {}", e);
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => {
                debug!("driver exited: {:?}", status?);
            }
            Err(_) => {
                warn!("driver did not exit, killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

//! Browser session acquisition and page operations
//!
//! A session attaches to an already-running browser exposing the DevTools
//! remote debugging endpoint, or launches a fresh one when nothing is
//! listening. Acquisition retries up to a fixed attempt count with a fixed
//! backoff; exhausting the retries is fatal.
//!
//! Once acquired, the same session is reused for every task in the process
//! via [`SessionCache`]; a new task only resets the page to `about:blank`
//! instead of tearing the browser down.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio::sync::Mutex;
use url::Url;

use crate::browser::cdp::CdpClient;
use crate::browser::keys::parse_combination;
use crate::browser::{Browser, BrowserError, MouseButton};
use crate::core::config::BrowserConfig;

/// A live connection to one browser page target
pub struct BrowserSession {
    cdp: CdpClient,
    viewport: (u32, u32),
    navigation_timeout: Duration,
}

impl BrowserSession {
    /// Acquire a session: attach to a running browser or launch one.
    ///
    /// Retries `connect_attempts` times with `connect_backoff_ms` between
    /// attempts; the browser is launched at most once, on the first attempt
    /// that finds nothing listening.
    pub async fn acquire(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let mut last_error: Option<BrowserError> = None;
        let mut launched = false;

        for attempt in 1..=config.connect_attempts {
            match Self::try_attach(config).await {
                Ok(session) => {
                    tracing::info!(attempt, "browser session acquired");
                    return Ok(session);
                }
                Err(BrowserError::ConnectionFailed { url, reason }) if !launched => {
                    tracing::info!(
                        port = config.debug_port,
                        "no running browser found, launching {}",
                        config.executable
                    );
                    launch_browser(config)?;
                    launched = true;
                    last_error = Some(BrowserError::ConnectionFailed { url, reason });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "session acquisition attempt failed");
                    last_error = Some(e);
                }
            }

            tokio::time::sleep(Duration::from_millis(config.connect_backoff_ms)).await;
        }

        Err(BrowserError::AcquisitionFailed {
            attempts: config.connect_attempts,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    /// One attach attempt against the discovery endpoints
    async fn try_attach(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let ws_url = discover_page_target(config.debug_port).await?;
        let cdp = CdpClient::connect(
            &ws_url,
            Duration::from_millis(config.command_timeout_ms),
        )
        .await?;

        cdp.enable_domain("Page").await?;

        // Pin the viewport so coordinate normalization has a stable basis.
        cdp.send_command(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": config.viewport_width,
                "height": config.viewport_height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await?;

        Ok(Self {
            cdp,
            viewport: (config.viewport_width, config.viewport_height),
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
        })
    }

    /// Reset the page to a blank address between tasks
    pub async fn reset(&self) -> Result<(), BrowserError> {
        self.navigate("about:blank").await
    }

    async fn dispatch_mouse(&self, params: Value) -> Result<(), BrowserError> {
        self.cdp
            .send_command("Input.dispatchMouseEvent", params)
            .await?;
        Ok(())
    }

    /// Current navigation history: (current index, entries)
    async fn navigation_history(&self) -> Result<(i64, Vec<Value>), BrowserError> {
        let result = self
            .cdp
            .send_command("Page.getNavigationHistory", json!({}))
            .await?;

        let index = result
            .get("currentIndex")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                BrowserError::Protocol("navigation history missing currentIndex".to_string())
            })?;
        let entries = result
            .get("entries")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok((index, entries))
    }

    /// Jump to a neighboring history entry; out-of-range is a no-op, matching
    /// what the browser's own back/forward buttons do at a boundary.
    async fn navigate_history(&self, offset: i64) -> Result<(), BrowserError> {
        let (index, entries) = self.navigation_history().await?;
        let target = index + offset;
        if target < 0 || target >= entries.len() as i64 {
            return Ok(());
        }

        let entry_id = entries[target as usize]
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                BrowserError::Protocol("navigation history entry missing id".to_string())
            })?;

        self.cdp
            .send_command("Page.navigateToHistoryEntry", json!({ "entryId": entry_id }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Browser for BrowserSession {
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        let result = self
            .cdp
            .send_command(
                "Page.captureScreenshot",
                json!({ "format": "jpeg", "quality": 80 }),
            )
            .await?;

        let data = result
            .get("data")
            .and_then(|d| d.as_str())
            .ok_or_else(|| {
                BrowserError::Protocol("captureScreenshot returned no data".to_string())
            })?;

        B64.decode(data)
            .map_err(|e| BrowserError::Protocol(format!("bad screenshot base64: {}", e)))
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let (index, entries) = self.navigation_history().await?;
        let url = entries
            .get(index.max(0) as usize)
            .and_then(|e| e.get("url"))
            .and_then(|u| u.as_str())
            .unwrap_or("about:blank");
        Ok(url.to_string())
    }

    async fn pointer_move(&self, x: u32, y: u32) -> Result<(), BrowserError> {
        self.dispatch_mouse(json!({ "type": "mouseMoved", "x": x, "y": y }))
            .await
    }

    async fn pointer_click(
        &self,
        x: u32,
        y: u32,
        button: MouseButton,
        click_count: u32,
    ) -> Result<(), BrowserError> {
        self.dispatch_mouse(json!({
            "type": "mousePressed",
            "x": x,
            "y": y,
            "button": button.as_str(),
            "clickCount": click_count,
        }))
        .await?;
        self.dispatch_mouse(json!({
            "type": "mouseReleased",
            "x": x,
            "y": y,
            "button": button.as_str(),
            "clickCount": click_count,
        }))
        .await
    }

    async fn pointer_down(&self, x: u32, y: u32, button: MouseButton) -> Result<(), BrowserError> {
        self.dispatch_mouse(json!({
            "type": "mousePressed",
            "x": x,
            "y": y,
            "button": button.as_str(),
            "clickCount": 1,
        }))
        .await
    }

    async fn pointer_up(&self, x: u32, y: u32, button: MouseButton) -> Result<(), BrowserError> {
        self.dispatch_mouse(json!({
            "type": "mouseReleased",
            "x": x,
            "y": y,
            "button": button.as_str(),
            "clickCount": 1,
        }))
        .await
    }

    async fn type_text(&self, text: &str) -> Result<(), BrowserError> {
        self.cdp
            .send_command("Input.insertText", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn press_keys(&self, keys: &str) -> Result<(), BrowserError> {
        let stroke = parse_combination(keys)?;

        let mut down = json!({
            "type": if stroke.text.is_some() { "keyDown" } else { "rawKeyDown" },
            "key": stroke.key,
            "code": stroke.code,
            "windowsVirtualKeyCode": stroke.windows_virtual_key_code,
            "modifiers": stroke.modifiers,
        });
        if let Some(ref text) = stroke.text {
            down["text"] = json!(text);
            down["unmodifiedText"] = json!(text);
        }
        self.cdp.send_command("Input.dispatchKeyEvent", down).await?;

        self.cdp
            .send_command(
                "Input.dispatchKeyEvent",
                json!({
                    "type": "keyUp",
                    "key": stroke.key,
                    "code": stroke.code,
                    "windowsVirtualKeyCode": stroke.windows_virtual_key_code,
                    "modifiers": stroke.modifiers,
                }),
            )
            .await?;
        Ok(())
    }

    async fn wheel_scroll(&self, x: u32, y: u32, dx: f64, dy: f64) -> Result<(), BrowserError> {
        self.dispatch_mouse(json!({
            "type": "mouseWheel",
            "x": x,
            "y": y,
            "deltaX": dx,
            "deltaY": dy,
        }))
        .await
    }

    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        // Subscribe before sending so the DOMContentLoaded event cannot slip
        // past between the reply and the wait.
        let mut events = self.cdp.subscribe();

        let result = self
            .cdp
            .send_command("Page.navigate", json!({ "url": url }))
            .await?;

        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(BrowserError::NavigationFailed(error_text.to_string()));
        }

        let deadline = tokio::time::Instant::now() + self.navigation_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(BrowserError::PageLoadTimeout(self.navigation_timeout));
            }

            match tokio::time::timeout(remaining, events.recv()).await {
                Ok(Ok(event)) if event.method == "Page.domContentEventFired" => return Ok(()),
                Ok(Ok(_)) => continue,
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => {
                    return Err(BrowserError::Protocol(
                        "connection closed while waiting for page load".to_string(),
                    ));
                }
                Err(_) => return Err(BrowserError::PageLoadTimeout(self.navigation_timeout)),
            }
        }
    }

    async fn go_back(&self) -> Result<(), BrowserError> {
        self.navigate_history(-1).await
    }

    async fn go_forward(&self) -> Result<(), BrowserError> {
        self.navigate_history(1).await
    }

    async fn wait_ms(&self, ms: u64) -> Result<(), BrowserError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }
}

/// Find the WebSocket URL of a page target via the discovery endpoints.
///
/// Attaches to the most recently opened page; creates one when the browser
/// has none (newer Chrome wants PUT for /json/new).
async fn discover_page_target(port: u16) -> Result<String, BrowserError> {
    let base = Url::parse(&format!("http://127.0.0.1:{}", port))
        .map_err(|e| BrowserError::Protocol(format!("bad discovery URL: {}", e)))?;
    let join = |path: &str| {
        base.join(path)
            .map_err(|e| BrowserError::Protocol(format!("bad discovery URL: {}", e)))
    };
    let http = reqwest::Client::new();

    let version_url = join("/json/version")?;
    let version: Value = http
        .get(version_url.clone())
        .send()
        .await
        .map_err(|e| BrowserError::ConnectionFailed {
            url: version_url.to_string(),
            reason: e.to_string(),
        })?
        .json()
        .await
        .map_err(|e| BrowserError::Protocol(format!("bad /json/version payload: {}", e)))?;

    tracing::debug!(
        browser = version.get("Browser").and_then(|b| b.as_str()).unwrap_or("?"),
        "found running browser"
    );

    let list_url = join("/json/list")?;
    let targets: Vec<Value> = http
        .get(list_url)
        .send()
        .await
        .map_err(|e| BrowserError::Protocol(format!("target list request failed: {}", e)))?
        .json()
        .await
        .map_err(|e| BrowserError::Protocol(format!("bad /json/list payload: {}", e)))?;

    if let Some(ws) = pick_page_target(&targets) {
        return Ok(ws);
    }

    // No page target; ask the browser to open one.
    let new_url = join("/json/new?about:blank")?;
    let created: Value = http
        .put(new_url)
        .send()
        .await
        .map_err(|e| BrowserError::Protocol(format!("target creation failed: {}", e)))?
        .json()
        .await
        .map_err(|e| BrowserError::Protocol(format!("bad /json/new payload: {}", e)))?;

    created
        .get("webSocketDebuggerUrl")
        .and_then(|u| u.as_str())
        .map(|u| u.to_string())
        .ok_or_else(|| BrowserError::Protocol("new target has no WebSocket URL".to_string()))
}

/// Pick the most recent page target's WebSocket URL from /json/list output
fn pick_page_target(targets: &[Value]) -> Option<String> {
    targets
        .iter()
        .rev()
        .find(|t| t.get("type").and_then(|ty| ty.as_str()) == Some("page"))
        .and_then(|t| t.get("webSocketDebuggerUrl"))
        .and_then(|u| u.as_str())
        .map(|u| u.to_string())
}

/// Spawn a browser process with the remote debugging port open.
///
/// The child is detached: the session outlives this call and the process is
/// left running when webpilot exits, like any externally managed browser.
fn launch_browser(config: &BrowserConfig) -> Result<(), BrowserError> {
    Command::new(&config.executable)
        .arg(format!("--remote-debugging-port={}", config.debug_port))
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("about:blank")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| BrowserError::Launch(format!("{}: {}", config.executable, e)))?;
    Ok(())
}

/// Single-slot lazy session cache shared by sequential tasks.
///
/// The slot is created on first use and reused thereafter; a dead cached
/// session is dropped and re-acquired rather than surfaced to the caller.
pub struct SessionCache {
    slot: Mutex<Option<std::sync::Arc<BrowserSession>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Get the shared session, acquiring it on first use. The page is reset
    /// to a blank address so tasks do not bleed into each other.
    pub async fn session(
        &self,
        config: &BrowserConfig,
    ) -> Result<std::sync::Arc<BrowserSession>, BrowserError> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = slot.as_ref() {
            match session.reset().await {
                Ok(()) => return Ok(std::sync::Arc::clone(session)),
                Err(e) => {
                    tracing::warn!(error = %e, "cached session is dead, re-acquiring");
                    *slot = None;
                }
            }
        }

        let session = std::sync::Arc::new(BrowserSession::acquire(config).await?);
        session.reset().await?;
        *slot = Some(std::sync::Arc::clone(&session));
        Ok(session)
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

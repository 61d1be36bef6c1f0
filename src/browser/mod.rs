//! Browser session collaborator
//!
//! Everything the agent loop needs from a live browser: screenshots, pointer
//! and keyboard input, scrolling, navigation and history. The [`Browser`]
//! trait is the seam the executor and loop are written against; the real
//! implementation speaks the Chrome DevTools Protocol over a WebSocket.

pub mod cdp;
pub mod keys;
pub mod session;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::WebpilotError;

pub use session::{BrowserSession, SessionCache};

/// Browser-layer errors
#[derive(Debug, Error)]
pub enum BrowserError {
    /// WebSocket or discovery-endpoint connection failure
    #[error("failed to connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// All session acquisition attempts exhausted
    #[error("no debuggable browser reachable after {attempts} attempts: {last}")]
    AcquisitionFailed { attempts: u32, last: String },

    /// The browser process could not be started
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// An error object returned by the DevTools endpoint
    #[error("CDP error {code}: {message}")]
    Cdp { code: i64, message: String },

    /// Malformed or unexpected protocol traffic
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A CDP command did not answer in time
    #[error("command {method} timed out after {timeout:?}")]
    CommandTimeout { method: String, timeout: Duration },

    /// Navigation was rejected by the browser (bad URL, DNS failure, ...)
    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    /// DOMContentLoaded never fired
    #[error("page load timed out after {0:?}")]
    PageLoadTimeout(Duration),

    /// A key combination referenced a key we cannot map
    #[error("unknown key '{0}' in combination")]
    UnknownKey(String),
}

impl From<BrowserError> for WebpilotError {
    fn from(err: BrowserError) -> Self {
        WebpilotError::Browser(err.to_string())
    }
}

/// Pointer button identifiers understood by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Wire name used by `Input.dispatchMouseEvent`
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl std::str::FromStr for MouseButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(format!("unknown mouse button '{}'", other)),
        }
    }
}

/// Operations the agent loop may perform against a live browser page.
///
/// One implementor per real session; tests substitute scripted fakes. All
/// input methods take viewport pixel coordinates that have already been
/// normalized and clamped.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Capture the current page as JPEG bytes
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// URL of the current history entry
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Move the pointer without pressing
    async fn pointer_move(&self, x: u32, y: u32) -> Result<(), BrowserError>;

    /// Press and release at a point
    async fn pointer_click(
        &self,
        x: u32,
        y: u32,
        button: MouseButton,
        click_count: u32,
    ) -> Result<(), BrowserError>;

    /// Press the button down at a point
    async fn pointer_down(&self, x: u32, y: u32, button: MouseButton) -> Result<(), BrowserError>;

    /// Release the button at a point
    async fn pointer_up(&self, x: u32, y: u32, button: MouseButton) -> Result<(), BrowserError>;

    /// Insert text into the focused element
    async fn type_text(&self, text: &str) -> Result<(), BrowserError>;

    /// Press a key or key combination, e.g. "Enter" or "Control+A"
    async fn press_keys(&self, keys: &str) -> Result<(), BrowserError>;

    /// Dispatch a wheel scroll at a point with signed deltas
    async fn wheel_scroll(&self, x: u32, y: u32, dx: f64, dy: f64) -> Result<(), BrowserError>;

    /// Load a URL and wait for DOMContentLoaded
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// History navigation
    async fn go_back(&self) -> Result<(), BrowserError>;

    /// History navigation
    async fn go_forward(&self) -> Result<(), BrowserError>;

    /// Pause execution
    async fn wait_ms(&self, ms: u64) -> Result<(), BrowserError>;

    /// Fixed viewport size as (width, height)
    fn viewport(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_mouse_button_round_trip() {
        for name in ["left", "right", "middle"] {
            assert_eq!(MouseButton::from_str(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_mouse_button_rejects_unknown() {
        assert!(MouseButton::from_str("fourth").is_err());
    }

    #[test]
    fn test_browser_error_converts_to_crate_error() {
        let err: WebpilotError = BrowserError::NavigationFailed("net::ERR_FAILED".into()).into();
        assert!(err.to_string().contains("net::ERR_FAILED"));
    }
}

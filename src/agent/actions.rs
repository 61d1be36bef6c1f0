//! Action vocabulary and executor
//!
//! Function calls from the model are parsed into a closed [`Action`] set with
//! per-action argument schemas, then executed against the [`Browser`] seam.
//! Parsing and execution are split so argument errors surface before any
//! browser traffic happens.

use serde_json::{json, Map};
use std::str::FromStr;

use crate::agent::coords::{coerce_number, normalize};
use crate::browser::{Browser, MouseButton};
use crate::core::{ActionOutcome, FunctionCall, Result, WebpilotError};

const DEFAULT_SCROLL_MAGNITUDE: f64 = 800.0;
const DRAG_STEPS: u32 = 20;

/// Scroll direction for document and point scrolls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }

    /// Wheel deltas for a scroll of `magnitude` in this direction
    fn deltas(&self, magnitude: f64) -> (f64, f64) {
        match self {
            ScrollDirection::Up => (0.0, -magnitude),
            ScrollDirection::Down => (0.0, magnitude),
            ScrollDirection::Left => (-magnitude, 0.0),
            ScrollDirection::Right => (magnitude, 0.0),
        }
    }
}

impl FromStr for ScrollDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            other => Err(format!("unknown scroll direction '{}'", other)),
        }
    }
}

/// The closed set of browser actions the model may request.
///
/// Coordinates here are still model-scale; they are normalized to viewport
/// pixels at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    OpenWebBrowser,
    Navigate {
        url: String,
    },
    Search,
    ClickAt {
        x: f64,
        y: f64,
        button: MouseButton,
        click_count: u32,
    },
    HoverAt {
        x: f64,
        y: f64,
    },
    TypeTextAt {
        x: f64,
        y: f64,
        text: String,
        press_enter: bool,
        clear_before_typing: bool,
    },
    KeyCombination {
        keys: String,
    },
    ScrollDocument {
        direction: ScrollDirection,
        magnitude: f64,
    },
    ScrollAt {
        x: f64,
        y: f64,
        direction: ScrollDirection,
        magnitude: f64,
    },
    DragAndDrop {
        x: f64,
        y: f64,
        destination_x: f64,
        destination_y: f64,
    },
    GoBack,
    GoForward,
    Wait {
        seconds: f64,
    },
}

impl Action {
    /// Parse a model function call into an action, validating arguments.
    ///
    /// Unknown action names are rejected rather than guessed at; the error
    /// text is fed back to the model so it can self-correct.
    pub fn parse(call: &FunctionCall) -> Result<Self> {
        let name = call.name.as_str();

        // "wait_3_seconds" style names carry the duration in the name.
        if let Some(seconds) = parse_wait_name(name) {
            return Ok(Action::Wait { seconds });
        }

        match name {
            "open_web_browser" => Ok(Action::OpenWebBrowser),
            "navigate" => {
                // An empty url is as useless as an absent one.
                let url = call.str_arg("url").map(str::trim).unwrap_or_default();
                if url.is_empty() {
                    return Err(WebpilotError::missing_argument(name, "url"));
                }
                Ok(Action::Navigate {
                    url: url.to_string(),
                })
            }
            "search" => Ok(Action::Search),
            "click_at" => Ok(Action::ClickAt {
                x: required_coord(call, name, "x")?,
                y: required_coord(call, name, "y")?,
                button: parse_button(call, name)?,
                click_count: parse_click_count(call, name)?,
            }),
            "hover_at" => Ok(Action::HoverAt {
                x: required_coord(call, name, "x")?,
                y: required_coord(call, name, "y")?,
            }),
            "type_text_at" => Ok(Action::TypeTextAt {
                x: required_coord(call, name, "x")?,
                y: required_coord(call, name, "y")?,
                // Absent text still clears the field and presses Enter.
                text: call.str_arg("text").unwrap_or_default().to_string(),
                press_enter: call.bool_arg("press_enter").unwrap_or(true),
                clear_before_typing: call.bool_arg("clear_before_typing").unwrap_or(true),
            }),
            "key_combination" => {
                let keys = required_str(call, name, "keys")?;
                Ok(Action::KeyCombination {
                    keys: keys.to_string(),
                })
            }
            "scroll_document" => Ok(Action::ScrollDocument {
                direction: parse_direction(call, name)?,
                magnitude: optional_magnitude(call, name)?,
            }),
            "scroll_at" => Ok(Action::ScrollAt {
                x: required_coord(call, name, "x")?,
                y: required_coord(call, name, "y")?,
                direction: parse_direction(call, name)?,
                magnitude: optional_magnitude(call, name)?,
            }),
            "drag_and_drop" => Ok(Action::DragAndDrop {
                x: required_coord(call, name, "x")?,
                y: required_coord(call, name, "y")?,
                destination_x: required_coord_aliased(call, name, "destination_x", "destinationX")?,
                destination_y: required_coord_aliased(call, name, "destination_y", "destinationY")?,
            }),
            "go_back" => Ok(Action::GoBack),
            "go_forward" => Ok(Action::GoForward),
            "wait" | "wait_seconds" | "wait_for_seconds" => {
                let seconds = match call.arg("seconds").or_else(|| call.arg("duration")) {
                    Some(v) => coerce_number(v).map_err(|_| {
                        WebpilotError::invalid_argument(name, "seconds", "must be a number")
                    })?,
                    None => 1.0,
                };
                Ok(Action::Wait { seconds })
            }
            other => Err(WebpilotError::UnsupportedAction(other.to_string())),
        }
    }
}

/// "wait_5_seconds" and "wait_1_second" carry the count in the name
fn parse_wait_name(name: &str) -> Option<f64> {
    let inner = name.strip_prefix("wait_")?;
    let count = inner
        .strip_suffix("_seconds")
        .or_else(|| inner.strip_suffix("_second"))?;
    count.parse::<f64>().ok().filter(|s| *s >= 0.0)
}

fn required_str<'a>(call: &'a FunctionCall, action: &str, key: &str) -> Result<&'a str> {
    call.str_arg(key)
        .ok_or_else(|| WebpilotError::missing_argument(action, key))
}

fn required_coord(call: &FunctionCall, action: &str, key: &str) -> Result<f64> {
    let value = call
        .arg(key)
        .ok_or_else(|| WebpilotError::missing_argument(action, key))?;
    coerce_number(value)
        .map_err(|e| WebpilotError::invalid_argument(action, key, e.to_string()))
}

fn required_coord_aliased(
    call: &FunctionCall,
    action: &str,
    key: &str,
    alias: &str,
) -> Result<f64> {
    let value = call
        .arg(key)
        .or_else(|| call.arg(alias))
        .ok_or_else(|| WebpilotError::missing_argument(action, key))?;
    coerce_number(value)
        .map_err(|e| WebpilotError::invalid_argument(action, key, e.to_string()))
}

fn parse_button(call: &FunctionCall, action: &str) -> Result<MouseButton> {
    match call.str_arg("button") {
        None => Ok(MouseButton::Left),
        Some(name) => MouseButton::from_str(name)
            .map_err(|e| WebpilotError::invalid_argument(action, "button", e)),
    }
}

fn parse_click_count(call: &FunctionCall, action: &str) -> Result<u32> {
    match call.arg("click_count") {
        None => Ok(1),
        Some(v) => {
            let count = coerce_number(v).map_err(|_| {
                WebpilotError::invalid_argument(action, "click_count", "must be a number")
            })?;
            if count < 1.0 {
                return Err(WebpilotError::invalid_argument(
                    action,
                    "click_count",
                    "must be at least 1",
                ));
            }
            Ok(count.round() as u32)
        }
    }
}

fn parse_direction(call: &FunctionCall, action: &str) -> Result<ScrollDirection> {
    match call.str_arg("direction") {
        None => Ok(ScrollDirection::Down),
        Some(name) => ScrollDirection::from_str(name)
            .map_err(|e| WebpilotError::invalid_argument(action, "direction", e)),
    }
}

fn optional_magnitude(call: &FunctionCall, action: &str) -> Result<f64> {
    match call.arg("magnitude").or_else(|| call.arg("scroll_amount")) {
        None => Ok(DEFAULT_SCROLL_MAGNITUDE),
        Some(v) => {
            let magnitude = coerce_number(v).map_err(|_| {
                WebpilotError::invalid_argument(action, "magnitude", "must be a number")
            })?;
            if magnitude < 0.0 {
                return Err(WebpilotError::invalid_argument(
                    action,
                    "magnitude",
                    "must not be negative",
                ));
            }
            Ok(magnitude)
        }
    }
}

/// Executes parsed actions against a browser session
pub struct ActionExecutor {
    search_url: String,
}

impl ActionExecutor {
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            search_url: search_url.into(),
        }
    }

    /// Execute one function call end to end.
    ///
    /// A call whose safety decision requires confirmation is never executed:
    /// the browser sees no traffic and a skipped outcome is returned for the
    /// caller to relay.
    pub async fn execute(
        &self,
        browser: &dyn Browser,
        call: &FunctionCall,
    ) -> Result<ActionOutcome> {
        if let Some(decision) = call.safety_decision.as_ref() {
            if decision.requires_confirmation() {
                let explanation = decision
                    .explanation
                    .clone()
                    .unwrap_or_else(|| "the model flagged this action as sensitive".to_string());
                tracing::warn!(action = %call.name, %explanation, "action requires confirmation");

                let mut data = Map::new();
                if let Ok(value) = serde_json::to_value(decision) {
                    data.insert("safety_decision".to_string(), value);
                }
                return Ok(ActionOutcome::skipped(
                    format!("Action requires user confirmation: {}", explanation),
                    data,
                ));
            }
        }

        let action = Action::parse(call)?;
        tracing::debug!(action = %call.name, "executing action");
        self.run(browser, action).await
    }

    async fn run(&self, browser: &dyn Browser, action: Action) -> Result<ActionOutcome> {
        let (width, height) = browser.viewport();

        match action {
            Action::OpenWebBrowser => Ok(ActionOutcome::success("Browser is ready")),
            Action::Navigate { url } => {
                browser.navigate(&url).await?;
                let mut data = Map::new();
                data.insert("url".to_string(), json!(url));
                Ok(ActionOutcome::success_with_data(
                    format!("Navigated to {}", url),
                    data,
                ))
            }
            Action::Search => {
                browser.navigate(&self.search_url).await?;
                let mut data = Map::new();
                data.insert("url".to_string(), json!(self.search_url));
                Ok(ActionOutcome::success_with_data("Opened search page", data))
            }
            Action::ClickAt {
                x,
                y,
                button,
                click_count,
            } => {
                let px = normalize(x, width)?;
                let py = normalize(y, height)?;
                browser.pointer_move(px, py).await?;
                browser.pointer_click(px, py, button, click_count).await?;
                let verb = if click_count > 1 {
                    "Double-clicked"
                } else {
                    "Clicked"
                };
                Ok(ActionOutcome::success(format!(
                    "{} {} at ({}, {})",
                    verb,
                    button.as_str(),
                    px,
                    py
                )))
            }
            Action::HoverAt { x, y } => {
                let px = normalize(x, width)?;
                let py = normalize(y, height)?;
                browser.pointer_move(px, py).await?;
                Ok(ActionOutcome::success(format!("Hovered at ({}, {})", px, py)))
            }
            Action::TypeTextAt {
                x,
                y,
                text,
                press_enter,
                clear_before_typing,
            } => {
                let px = normalize(x, width)?;
                let py = normalize(y, height)?;
                browser.pointer_move(px, py).await?;
                browser.pointer_click(px, py, MouseButton::Left, 1).await?;

                if clear_before_typing {
                    browser.press_keys(select_all_combo()).await?;
                    browser.press_keys("Backspace").await?;
                }
                if !text.is_empty() {
                    browser.type_text(&text).await?;
                }
                if press_enter {
                    browser.press_keys("Enter").await?;
                }

                Ok(ActionOutcome::success(format!(
                    "Typed '{}' at ({}, {})",
                    text, px, py
                )))
            }
            Action::KeyCombination { keys } => {
                browser.press_keys(&keys).await?;
                Ok(ActionOutcome::success(format!("Pressed {}", keys)))
            }
            Action::ScrollDocument {
                direction,
                magnitude,
            } => {
                let (dx, dy) = direction.deltas(magnitude);
                browser
                    .wheel_scroll(width / 2, height / 2, dx, dy)
                    .await?;
                Ok(ActionOutcome::success(format!(
                    "Scrolled {} by {}",
                    direction.as_str(),
                    magnitude
                )))
            }
            Action::ScrollAt {
                x,
                y,
                direction,
                magnitude,
            } => {
                let px = normalize(x, width)?;
                let py = normalize(y, height)?;
                let (dx, dy) = direction.deltas(magnitude);
                browser.wheel_scroll(px, py, dx, dy).await?;
                Ok(ActionOutcome::success(format!(
                    "Scrolled {} at ({}, {})",
                    direction.as_str(),
                    px,
                    py
                )))
            }
            Action::DragAndDrop {
                x,
                y,
                destination_x,
                destination_y,
            } => {
                let sx = normalize(x, width)?;
                let sy = normalize(y, height)?;
                let ex = normalize(destination_x, width)?;
                let ey = normalize(destination_y, height)?;

                browser.pointer_move(sx, sy).await?;
                browser.pointer_down(sx, sy, MouseButton::Left).await?;

                // Interpolated moves so drop targets see a real drag gesture.
                for step in 1..=DRAG_STEPS {
                    let t = step as f64 / DRAG_STEPS as f64;
                    let ix = (sx as f64 + (ex as f64 - sx as f64) * t).round() as u32;
                    let iy = (sy as f64 + (ey as f64 - sy as f64) * t).round() as u32;
                    browser.pointer_move(ix, iy).await?;
                }

                browser.pointer_up(ex, ey, MouseButton::Left).await?;
                Ok(ActionOutcome::success(format!(
                    "Dragged from ({}, {}) to ({}, {})",
                    sx, sy, ex, ey
                )))
            }
            Action::GoBack => {
                browser.go_back().await?;
                Ok(ActionOutcome::success("Navigated back"))
            }
            Action::GoForward => {
                browser.go_forward().await?;
                Ok(ActionOutcome::success("Navigated forward"))
            }
            Action::Wait { seconds } => {
                browser.wait_ms((seconds * 1000.0) as u64).await?;
                Ok(ActionOutcome::success(format!(
                    "Waited {} second(s)",
                    seconds
                )))
            }
        }
    }
}

fn select_all_combo() -> &'static str {
    if cfg!(target_os = "macos") {
        "Meta+A"
    } else {
        "Control+A"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;
    use crate::core::{OutcomeStatus, SafetyDecision};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Records every browser call so tests can assert on exact sequences
    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Move(u32, u32),
        Click(u32, u32, &'static str, u32),
        Down(u32, u32),
        Up(u32, u32),
        Type(String),
        Keys(String),
        Wheel(u32, u32, f64, f64),
        Navigate(String),
        Back,
        Forward,
        Wait(u64),
    }

    struct FakeBrowser {
        ops: Mutex<Vec<Op>>,
    }

    impl FakeBrowser {
        fn new() -> Self {
            Self {
                ops: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, op: Op) {
            self.ops.lock().unwrap().push(op);
        }

        fn ops(&self) -> Vec<Op> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Browser for FakeBrowser {
        async fn screenshot(&self) -> std::result::Result<Vec<u8>, BrowserError> {
            Ok(vec![0xFF, 0xD8])
        }

        async fn current_url(&self) -> std::result::Result<String, BrowserError> {
            Ok("https://example.com/".to_string())
        }

        async fn pointer_move(&self, x: u32, y: u32) -> std::result::Result<(), BrowserError> {
            self.record(Op::Move(x, y));
            Ok(())
        }

        async fn pointer_click(
            &self,
            x: u32,
            y: u32,
            button: MouseButton,
            click_count: u32,
        ) -> std::result::Result<(), BrowserError> {
            self.record(Op::Click(x, y, button.as_str(), click_count));
            Ok(())
        }

        async fn pointer_down(
            &self,
            x: u32,
            y: u32,
            _button: MouseButton,
        ) -> std::result::Result<(), BrowserError> {
            self.record(Op::Down(x, y));
            Ok(())
        }

        async fn pointer_up(
            &self,
            x: u32,
            y: u32,
            _button: MouseButton,
        ) -> std::result::Result<(), BrowserError> {
            self.record(Op::Up(x, y));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> std::result::Result<(), BrowserError> {
            self.record(Op::Type(text.to_string()));
            Ok(())
        }

        async fn press_keys(&self, keys: &str) -> std::result::Result<(), BrowserError> {
            self.record(Op::Keys(keys.to_string()));
            Ok(())
        }

        async fn wheel_scroll(
            &self,
            x: u32,
            y: u32,
            dx: f64,
            dy: f64,
        ) -> std::result::Result<(), BrowserError> {
            self.record(Op::Wheel(x, y, dx, dy));
            Ok(())
        }

        async fn navigate(&self, url: &str) -> std::result::Result<(), BrowserError> {
            self.record(Op::Navigate(url.to_string()));
            Ok(())
        }

        async fn go_back(&self) -> std::result::Result<(), BrowserError> {
            self.record(Op::Back);
            Ok(())
        }

        async fn go_forward(&self) -> std::result::Result<(), BrowserError> {
            self.record(Op::Forward);
            Ok(())
        }

        async fn wait_ms(&self, ms: u64) -> std::result::Result<(), BrowserError> {
            self.record(Op::Wait(ms));
            Ok(())
        }

        fn viewport(&self) -> (u32, u32) {
            (1440, 900)
        }
    }

    fn call(name: &str, pairs: &[(&str, Value)]) -> FunctionCall {
        FunctionCall::new(
            name,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn executor() -> ActionExecutor {
        ActionExecutor::new("https://www.google.com/")
    }

    #[tokio::test]
    async fn test_click_normalizes_coordinates() {
        let browser = FakeBrowser::new();
        let outcome = executor()
            .execute(
                &browser,
                &call("click_at", &[("x", json!(500)), ("y", json!(500))]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.message, "Clicked left at (720, 450)");
        assert_eq!(
            browser.ops(),
            vec![Op::Move(720, 450), Op::Click(720, 450, "left", 1)]
        );
    }

    #[tokio::test]
    async fn test_click_pixel_coordinates_pass_through() {
        let browser = FakeBrowser::new();
        executor()
            .execute(
                &browser,
                &call("click_at", &[("x", json!(1200)), ("y", json!(500))]),
            )
            .await
            .unwrap();

        // x above 1000 is already pixels; y at 500 is normalized scale.
        assert_eq!(
            browser.ops(),
            vec![Op::Move(1200, 450), Op::Click(1200, 450, "left", 1)]
        );
    }

    #[tokio::test]
    async fn test_type_text_at_full_sequence() {
        let browser = FakeBrowser::new();
        executor()
            .execute(
                &browser,
                &call(
                    "type_text_at",
                    &[
                        ("x", json!(500)),
                        ("y", json!(100)),
                        ("text", json!("rust async book")),
                    ],
                ),
            )
            .await
            .unwrap();

        let combo = if cfg!(target_os = "macos") {
            "Meta+A"
        } else {
            "Control+A"
        };
        assert_eq!(
            browser.ops(),
            vec![
                Op::Move(720, 90),
                Op::Click(720, 90, "left", 1),
                Op::Keys(combo.to_string()),
                Op::Keys("Backspace".to_string()),
                Op::Type("rust async book".to_string()),
                Op::Keys("Enter".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_type_text_at_flags_off() {
        let browser = FakeBrowser::new();
        executor()
            .execute(
                &browser,
                &call(
                    "type_text_at",
                    &[
                        ("x", json!(0)),
                        ("y", json!(0)),
                        ("text", json!("abc")),
                        ("press_enter", json!(false)),
                        ("clear_before_typing", json!(false)),
                    ],
                ),
            )
            .await
            .unwrap();

        assert_eq!(
            browser.ops(),
            vec![
                Op::Move(0, 0),
                Op::Click(0, 0, "left", 1),
                Op::Type("abc".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_scroll_document_defaults_to_down_at_center() {
        let browser = FakeBrowser::new();
        executor()
            .execute(&browser, &call("scroll_document", &[]))
            .await
            .unwrap();

        assert_eq!(browser.ops(), vec![Op::Wheel(720, 450, 0.0, 800.0)]);
    }

    #[tokio::test]
    async fn test_scroll_at_up_negates_delta() {
        let browser = FakeBrowser::new();
        executor()
            .execute(
                &browser,
                &call(
                    "scroll_at",
                    &[
                        ("x", json!(500)),
                        ("y", json!(500)),
                        ("direction", json!("up")),
                        ("magnitude", json!(300)),
                    ],
                ),
            )
            .await
            .unwrap();

        assert_eq!(browser.ops(), vec![Op::Wheel(720, 450, 0.0, -300.0)]);
    }

    #[tokio::test]
    async fn test_drag_and_drop_interpolates() {
        let browser = FakeBrowser::new();
        executor()
            .execute(
                &browser,
                &call(
                    "drag_and_drop",
                    &[
                        ("x", json!(0)),
                        ("y", json!(0)),
                        ("destination_x", json!(1000)),
                        ("destination_y", json!(1000)),
                    ],
                ),
            )
            .await
            .unwrap();

        let ops = browser.ops();
        assert_eq!(ops[0], Op::Move(0, 0));
        assert_eq!(ops[1], Op::Down(0, 0));
        assert_eq!(ops.len() as u32, 2 + DRAG_STEPS + 1);
        assert_eq!(*ops.last().unwrap(), Op::Up(1440, 900));
        // The final interpolated move lands on the destination.
        assert_eq!(ops[ops.len() - 2], Op::Move(1440, 900));
    }

    #[tokio::test]
    async fn test_wait_name_variants() {
        let browser = FakeBrowser::new();
        executor()
            .execute(&browser, &call("wait_3_seconds", &[]))
            .await
            .unwrap();
        executor()
            .execute(&browser, &call("wait", &[]))
            .await
            .unwrap();
        executor()
            .execute(&browser, &call("wait", &[("seconds", json!(2.5))]))
            .await
            .unwrap();

        assert_eq!(
            browser.ops(),
            vec![Op::Wait(3000), Op::Wait(1000), Op::Wait(2500)]
        );
    }

    #[tokio::test]
    async fn test_navigate_empty_url_reported_as_missing() {
        let browser = FakeBrowser::new();
        for bad in [call("navigate", &[("url", json!("  "))]), call("navigate", &[])] {
            let err = executor().execute(&browser, &bad).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                "Missing 'url' argument for navigate action"
            );
        }
        assert!(browser.ops().is_empty());
    }

    #[tokio::test]
    async fn test_missing_argument_reported_with_action_name() {
        let browser = FakeBrowser::new();
        let err = executor()
            .execute(&browser, &call("click_at", &[("x", json!(10))]))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Missing 'y' argument for click_at action");
    }

    #[tokio::test]
    async fn test_unknown_action_rejected() {
        let browser = FakeBrowser::new();
        for name in ["summon_dialog", "navigate_to", "go_to_url", "double_click_at"] {
            let err = executor()
                .execute(&browser, &call(name, &[]))
                .await
                .unwrap_err();
            assert!(matches!(err, WebpilotError::UnsupportedAction(_)));
        }
        assert!(browser.ops().is_empty());
    }

    #[tokio::test]
    async fn test_click_count_argument_is_honored() {
        let browser = FakeBrowser::new();
        let outcome = executor()
            .execute(
                &browser,
                &call(
                    "click_at",
                    &[("x", json!(500)), ("y", json!(500)), ("click_count", json!(2))],
                ),
            )
            .await
            .unwrap();

        assert_eq!(outcome.message, "Double-clicked left at (720, 450)");
        assert_eq!(
            browser.ops(),
            vec![Op::Move(720, 450), Op::Click(720, 450, "left", 2)]
        );
    }

    #[tokio::test]
    async fn test_click_count_rejects_zero() {
        let browser = FakeBrowser::new();
        let err = executor()
            .execute(
                &browser,
                &call(
                    "click_at",
                    &[("x", json!(10)), ("y", json!(10)), ("click_count", json!(0))],
                ),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WebpilotError::InvalidArgument { .. }));
        assert!(browser.ops().is_empty());
    }

    #[tokio::test]
    async fn test_type_text_at_without_text_clears_and_presses_enter() {
        let browser = FakeBrowser::new();
        let outcome = executor()
            .execute(
                &browser,
                &call("type_text_at", &[("x", json!(500)), ("y", json!(100))]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Success);
        let combo = if cfg!(target_os = "macos") {
            "Meta+A"
        } else {
            "Control+A"
        };
        // No Type op: empty text only clears the field and submits.
        assert_eq!(
            browser.ops(),
            vec![
                Op::Move(720, 90),
                Op::Click(720, 90, "left", 1),
                Op::Keys(combo.to_string()),
                Op::Keys("Backspace".to_string()),
                Op::Keys("Enter".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_confirmation_gate_skips_without_browser_traffic() {
        let browser = FakeBrowser::new();
        let mut gated = call("click_at", &[("x", json!(500)), ("y", json!(500))]);
        gated.safety_decision = Some(SafetyDecision {
            decision: "require_confirmation".to_string(),
            explanation: Some("This will place an order.".to_string()),
        });

        let outcome = executor().execute(&browser, &gated).await.unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(outcome.requires_confirmation);
        assert!(outcome.message.contains("This will place an order."));
        assert!(outcome.data.contains_key("safety_decision"));
        assert!(browser.ops().is_empty());
    }

    #[tokio::test]
    async fn test_proceed_decision_executes_normally() {
        let browser = FakeBrowser::new();
        let mut ok = call("go_back", &[]);
        ok.safety_decision = Some(SafetyDecision {
            decision: "proceed".to_string(),
            explanation: None,
        });

        let outcome = executor().execute(&browser, &ok).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(browser.ops(), vec![Op::Back]);
    }

    #[test]
    fn test_parse_wait_names() {
        assert_eq!(parse_wait_name("wait_3_seconds"), Some(3.0));
        assert_eq!(parse_wait_name("wait_1_second"), Some(1.0));
        assert_eq!(parse_wait_name("wait"), None);
        assert_eq!(parse_wait_name("wait_x_seconds"), None);
    }

    #[test]
    fn test_string_coordinates_accepted() {
        let parsed = Action::parse(&call(
            "click_at",
            &[("x", json!("500")), ("y", json!("250"))],
        ))
        .unwrap();
        assert!(matches!(parsed, Action::ClickAt { x, y, .. } if x == 500.0 && y == 250.0));
    }
}

//! Custom error types for webpilot
//!
//! Provides a unified error handling system across all modules. Action-local
//! failures (bad coordinates, missing arguments, unknown actions, browser
//! hiccups during a single action) are reported back to the model and the
//! task continues; model-side failures, session acquisition failures and the
//! iteration cap are fatal for the task.

use thiserror::Error;

/// Main error type for webpilot operations
#[derive(Error, Debug)]
pub enum WebpilotError {
    /// A coordinate argument was not a finite number
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A required action argument was absent or empty
    #[error("Missing '{argument}' argument for {action} action")]
    MissingArgument { action: String, argument: String },

    /// An action argument had the wrong shape or an unsupported value
    #[error("Invalid '{argument}' argument for {action} action: {reason}")]
    InvalidArgument {
        action: String,
        argument: String,
        reason: String,
    },

    /// The model requested an action outside the vocabulary
    #[error("unknown or unsupported action: {0}")]
    UnsupportedAction(String),

    /// Browser automation errors
    #[error("browser error: {0}")]
    Browser(String),

    /// The model refused the request with a prompt-feedback block
    #[error("model blocked the request: {0}")]
    ModelBlocked(String),

    /// The model returned a candidate with no content
    #[error("model returned an empty response")]
    EmptyModelResponse,

    /// The agent loop hit its liveness ceiling
    #[error("reached the maximum of {0} iterations without completing the task")]
    IterationLimitExceeded(usize),

    /// The task was cancelled by the caller; not a failure
    #[error("task cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for webpilot operations
pub type Result<T> = std::result::Result<T, WebpilotError>;

impl WebpilotError {
    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a missing-argument error for an action
    pub fn missing_argument(action: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::MissingArgument {
            action: action.into(),
            argument: argument.into(),
        }
    }

    /// Create an invalid-argument error for an action
    pub fn invalid_argument(
        action: impl Into<String>,
        argument: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            action: action.into(),
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a cancellation rather than a real failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

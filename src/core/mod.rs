//! Core module containing shared types, configuration, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Result, WebpilotError};
pub use types::{
    ActionOutcome, ConversationTurn, FunctionCall, FunctionResponse, InlineImage, OutcomeStatus,
    Part, Role, SafetyDecision,
};

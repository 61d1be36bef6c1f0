//! Shared types used across webpilot modules
//!
//! Contains the conversation data model exchanged with the model client and
//! the structured outcomes produced by the action executor.
//!
//! Turns are strictly append-only: once a `ConversationTurn` has been pushed
//! into a task's history it is never mutated, and every function-call part in
//! a model turn is answered by exactly one function-response part in the next
//! user turn.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of the conversation: an ordered sequence of parts
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    /// Create a user turn
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Create a model turn
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Iterate the function calls in this turn, in emission order
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|p| match p {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    /// Concatenate the text parts of this turn, newline separated
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// An inline image payload (screenshot bytes plus mime type)
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    /// Wrap JPEG bytes
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

/// A single content part within a conversation turn
#[derive(Debug, Clone)]
pub enum Part {
    /// Plain text
    Text(String),
    /// An inline image, e.g. a screenshot
    Image(InlineImage),
    /// A function call emitted by the model
    FunctionCall(FunctionCall),
    /// The response to a function call, sent back as user content
    FunctionResponse(FunctionResponse),
}

impl Part {
    /// Create a text part
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }
}

/// The model's verdict on whether an action needs human sign-off first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyDecision {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl SafetyDecision {
    /// Whether this decision blocks automatic execution
    pub fn requires_confirmation(&self) -> bool {
        self.decision == "require_confirmation"
    }
}

/// A function call produced by the model
///
/// The wire format buries the safety decision inside the argument bag; it is
/// split out at parse time so the executor can gate on it without rummaging
/// through `args`, and re-embedded when the call is serialized back into a
/// model-turn replay.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: Map<String, Value>,
    pub safety_decision: Option<SafetyDecision>,
}

impl FunctionCall {
    /// Create a call with no safety decision (the common case in tests)
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
            safety_decision: None,
        }
    }

    /// Build a call from raw wire arguments, extracting `safety_decision`
    pub fn from_wire(name: impl Into<String>, mut args: Map<String, Value>) -> Self {
        let safety_decision = args
            .remove("safety_decision")
            .and_then(|v| serde_json::from_value(v).ok());
        Self {
            name: name.into(),
            args,
            safety_decision,
        }
    }

    /// Rebuild the wire-format argument bag with the safety decision embedded
    pub fn wire_args(&self) -> Map<String, Value> {
        let mut args = self.args.clone();
        if let Some(ref decision) = self.safety_decision {
            if let Ok(value) = serde_json::to_value(decision) {
                args.insert("safety_decision".to_string(), value);
            }
        }
        args
    }

    /// Get a raw argument value by key
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    /// Get a string argument by key
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }

    /// Get a boolean argument by key
    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        self.args.get(key).and_then(|v| v.as_bool())
    }
}

/// The response to one function call
#[derive(Debug, Clone)]
pub struct FunctionResponse {
    /// Name of the call this responds to
    pub name: String,
    /// Structured response fields (status, message, url, action data)
    pub response: Map<String, Value>,
    /// Post-action screenshot, when one could be captured
    pub image: Option<InlineImage>,
}

/// Terminal status of one executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Skipped,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Error => "error",
        }
    }
}

/// Result of executing exactly one function call; immutable once returned
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    pub data: Map<String, Value>,
    pub requires_confirmation: bool,
}

impl ActionOutcome {
    /// Create a successful outcome
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            data: Map::new(),
            requires_confirmation: false,
        }
    }

    /// Create a successful outcome carrying action-specific data
    pub fn success_with_data(message: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
            data,
            requires_confirmation: false,
        }
    }

    /// Create a skipped outcome for an action gated on confirmation
    pub fn skipped(message: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            status: OutcomeStatus::Skipped,
            message: message.into(),
            data,
            requires_confirmation: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_from_wire_extracts_safety_decision() {
        let call = FunctionCall::from_wire(
            "click_at",
            args(&[
                ("x", json!(500)),
                (
                    "safety_decision",
                    json!({"decision": "require_confirmation", "explanation": "destructive"}),
                ),
            ]),
        );

        assert!(!call.args.contains_key("safety_decision"));
        let decision = call.safety_decision.as_ref().unwrap();
        assert!(decision.requires_confirmation());
        assert_eq!(decision.explanation.as_deref(), Some("destructive"));
    }

    #[test]
    fn test_wire_args_round_trip() {
        let call = FunctionCall::from_wire(
            "navigate",
            args(&[
                ("url", json!("https://example.com")),
                ("safety_decision", json!({"decision": "proceed"})),
            ]),
        );

        let wire = call.wire_args();
        assert_eq!(wire["url"], json!("https://example.com"));
        assert_eq!(wire["safety_decision"]["decision"], json!("proceed"));
    }

    #[test]
    fn test_turn_function_calls_in_order() {
        let turn = ConversationTurn::model(vec![
            Part::text("thinking"),
            Part::FunctionCall(FunctionCall::new("first", Map::new())),
            Part::FunctionCall(FunctionCall::new("second", Map::new())),
        ]);

        let names: Vec<&str> = turn.function_calls().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_turn_text_concatenation() {
        let turn = ConversationTurn::model(vec![
            Part::text("Done."),
            Part::Image(InlineImage::jpeg(vec![1, 2, 3])),
            Part::text("All tabs closed."),
        ]);
        assert_eq!(turn.text(), "Done.\nAll tabs closed.");
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = ActionOutcome::success("clicked");
        assert_eq!(ok.status, OutcomeStatus::Success);
        assert!(!ok.requires_confirmation);

        let skipped = ActionOutcome::skipped("needs sign-off", Map::new());
        assert_eq!(skipped.status, OutcomeStatus::Skipped);
        assert!(skipped.requires_confirmation);
    }
}

//! Model client abstraction
//!
//! The agent loop talks to a [`ModelClient`] and never to a concrete API, so
//! tests can script turns and a different backend can be dropped in without
//! touching the loop.

use async_trait::async_trait;

use crate::core::{ConversationTurn, FunctionCall, Part, Result};

/// One model reply: the parts of the candidate's content
#[derive(Debug, Clone)]
pub struct ModelTurn {
    pub parts: Vec<Part>,
}

impl ModelTurn {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Function calls in this turn, in emission order
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|p| match p {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    /// Concatenated text parts, newline separated
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

    /// Whether the turn contains at least one function call
    pub fn has_function_calls(&self) -> bool {
        self.function_calls().next().is_some()
    }
}

/// A vision model that plans browser actions from conversation history
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the full history and get the next model turn
    async fn generate(&self, history: &[ConversationTurn]) -> Result<ModelTurn>;

    /// Model name, for logging
    fn name(&self) -> &str;
}

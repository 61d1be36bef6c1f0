//! Model client collaborator
//!
//! The [`ModelClient`] trait is the seam between the agent loop and the
//! backing API; [`GeminiClient`] is the production implementation.

pub mod gemini;
pub mod traits;

pub use gemini::GeminiClient;
pub use traits::{ModelClient, ModelTurn};

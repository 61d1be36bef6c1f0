//! Agent loop and action execution
//!
//! [`TaskRunner`] drives the request/act cycle, [`ActionExecutor`] turns
//! model function calls into browser input, and `coords` holds the
//! coordinate normalization both rely on.

pub mod actions;
pub mod coords;
pub mod task;

pub use actions::{Action, ActionExecutor, ScrollDirection};
pub use task::{AgentTask, TaskRunner, TaskState};

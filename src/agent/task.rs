//! The request/act agent loop
//!
//! Each iteration captures a screenshot, sends the full history to the model,
//! executes whatever function calls come back, and feeds the outcomes (with
//! fresh screenshots) into the next request. The loop ends when the model
//! stops calling functions, a fatal error occurs, cancellation fires, or the
//! iteration cap is hit.

use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use crate::agent::actions::ActionExecutor;
use crate::browser::Browser;
use crate::core::{
    ActionOutcome, ConversationTurn, FunctionResponse, InlineImage, Part, Result, WebpilotError,
};
use crate::llm::ModelClient;

const FALLBACK_COMPLETION_MESSAGE: &str = "Task completed successfully";

/// Lifecycle state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    /// A batch was cut short by a confirmation-gated action; the loop keeps
    /// going so the model can react to the skip.
    RequiresConfirmation,
    Completed,
    Failed,
}

/// Mutable task bookkeeping carried across iterations
pub struct AgentTask {
    pub description: String,
    pub iteration: usize,
    pub max_iterations: usize,
    pub history: Vec<ConversationTurn>,
    pub state: TaskState,
}

impl AgentTask {
    pub fn new(description: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            description: description.into(),
            iteration: 0,
            max_iterations,
            history: Vec::new(),
            state: TaskState::Running,
        }
    }

    /// Whether another iteration may start
    pub fn should_continue(&self) -> bool {
        matches!(
            self.state,
            TaskState::Running | TaskState::RequiresConfirmation
        ) && self.iteration < self.max_iterations
    }

    fn begin_iteration(&mut self) {
        if self.state == TaskState::RequiresConfirmation {
            self.state = TaskState::Running;
        }
        self.iteration += 1;
    }
}

/// Drives one task to completion against a browser and a model
pub struct TaskRunner<'a> {
    browser: &'a dyn Browser,
    model: &'a dyn ModelClient,
    executor: ActionExecutor,
    settle_delay: Duration,
    max_iterations: usize,
}

impl<'a> TaskRunner<'a> {
    pub fn new(
        browser: &'a dyn Browser,
        model: &'a dyn ModelClient,
        executor: ActionExecutor,
        settle_delay: Duration,
        max_iterations: usize,
    ) -> Self {
        Self {
            browser,
            model,
            executor,
            settle_delay,
            max_iterations,
        }
    }

    /// Run the loop until the model declares the task done.
    ///
    /// Returns the model's final text. Cancellation is checked before every
    /// external operation so a cancelled task never starts another browser
    /// action or model request.
    pub async fn run(&self, description: &str, cancel: &CancellationToken) -> Result<String> {
        let started = Instant::now();
        let mut task = AgentTask::new(description, self.max_iterations);

        tracing::info!(model = self.model.name(), task = description, "starting task");

        while task.should_continue() {
            task.begin_iteration();
            ensure_live(cancel)?;

            tracing::debug!(iteration = task.iteration, "capturing page state");
            let screenshot = self.browser.screenshot().await?;
            let url = self.browser.current_url().await?;

            let mut parts = Vec::new();
            if task.iteration == 1 {
                parts.push(Part::text(task.description.clone()));
            }
            parts.push(Part::text(format!("Current URL: {}", url)));
            parts.push(Part::Image(InlineImage::jpeg(screenshot)));
            task.history.push(ConversationTurn::user(parts));

            ensure_live(cancel)?;
            let turn = match self.model.generate(&task.history).await {
                Ok(turn) => turn,
                Err(e) => {
                    task.state = TaskState::Failed;
                    return Err(e);
                }
            };

            let commentary = turn.text();
            if !commentary.is_empty() {
                tracing::info!(iteration = task.iteration, "{}", commentary);
            }

            task.history
                .push(ConversationTurn::model(turn.parts.clone()));

            if !turn.has_function_calls() {
                task.state = TaskState::Completed;
                let summary = if commentary.is_empty() {
                    FALLBACK_COMPLETION_MESSAGE.to_string()
                } else {
                    commentary
                };
                tracing::info!(
                    iterations = task.iteration,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "task finished"
                );
                return Ok(summary);
            }

            let calls: Vec<_> = turn.function_calls().cloned().collect();
            let mut responses: Vec<FunctionResponse> = Vec::new();
            let mut confirmation_hit = false;

            for call in &calls {
                ensure_live(cancel)?;

                match self.executor.execute(self.browser, call).await {
                    Ok(outcome) => {
                        ensure_live(cancel)?;
                        let screenshot = self.browser.screenshot().await.ok();
                        let url = self.browser.current_url().await.unwrap_or_default();
                        responses.push(build_response(&call.name, &outcome, &url, screenshot));

                        if outcome.requires_confirmation {
                            // Remaining calls in this batch must not run until
                            // the user has answered.
                            confirmation_hit = true;
                            break;
                        }

                        tokio::time::sleep(self.settle_delay).await;
                    }
                    Err(e) if e.is_cancelled() => {
                        task.state = TaskState::Failed;
                        return Err(e);
                    }
                    Err(e) => {
                        tracing::warn!(action = %call.name, error = %e, "action failed");
                        ensure_live(cancel)?;
                        let screenshot = self.browser.screenshot().await.ok();
                        let url = self.browser.current_url().await.unwrap_or_default();
                        responses.push(error_response(&call.name, &e, &url, screenshot));
                    }
                }
            }

            if confirmation_hit {
                task.state = TaskState::RequiresConfirmation;
                for response in &mut responses {
                    response
                        .response
                        .insert("safety_acknowledgement".to_string(), json!("true"));
                }
            }

            task.history.push(ConversationTurn::user(
                responses.into_iter().map(Part::FunctionResponse).collect(),
            ));
        }

        task.state = TaskState::Failed;
        Err(WebpilotError::IterationLimitExceeded(task.max_iterations))
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(WebpilotError::Cancelled)
    } else {
        Ok(())
    }
}

/// Assemble the function response for a completed or skipped action
fn build_response(
    name: &str,
    outcome: &ActionOutcome,
    url: &str,
    screenshot: Option<Vec<u8>>,
) -> FunctionResponse {
    let mut response: Map<String, Value> = Map::new();
    response.insert("status".to_string(), json!(outcome.status.as_str()));
    response.insert("message".to_string(), json!(outcome.message));
    response.insert("url".to_string(), json!(url));
    for (key, value) in &outcome.data {
        response.insert(key.clone(), value.clone());
    }

    FunctionResponse {
        name: name.to_string(),
        response,
        image: screenshot.map(InlineImage::jpeg),
    }
}

/// Assemble the function response for an action that errored.
///
/// Action errors are recoverable: the model sees what went wrong plus the
/// current page and decides how to proceed.
fn error_response(
    name: &str,
    error: &WebpilotError,
    url: &str,
    screenshot: Option<Vec<u8>>,
) -> FunctionResponse {
    let mut response: Map<String, Value> = Map::new();
    response.insert("status".to_string(), json!("error"));
    response.insert("message".to_string(), json!(error.to_string()));
    response.insert("url".to_string(), json!(url));

    FunctionResponse {
        name: name.to_string(),
        response,
        image: screenshot.map(InlineImage::jpeg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutcomeStatus;

    #[test]
    fn test_task_iteration_budget() {
        let mut task = AgentTask::new("find the docs", 2);
        assert!(task.should_continue());
        task.begin_iteration();
        assert!(task.should_continue());
        task.begin_iteration();
        assert!(!task.should_continue());
    }

    #[test]
    fn test_terminal_state_stops_task() {
        let mut task = AgentTask::new("find the docs", 50);
        task.state = TaskState::Completed;
        assert!(!task.should_continue());
    }

    #[test]
    fn test_confirmation_state_allows_the_next_iteration() {
        let mut task = AgentTask::new("clean up", 50);
        task.state = TaskState::RequiresConfirmation;
        assert!(task.should_continue());
        task.begin_iteration();
        assert_eq!(task.state, TaskState::Running);
    }

    #[test]
    fn test_build_response_merges_outcome_data() {
        let mut data = Map::new();
        data.insert("url".to_string(), json!("https://target.example"));
        let outcome = ActionOutcome::success_with_data("Navigated", data);

        let response = build_response("navigate", &outcome, "https://target.example", None);
        assert_eq!(response.response["status"], json!("success"));
        assert_eq!(response.response["message"], json!("Navigated"));
        assert_eq!(response.response["url"], json!("https://target.example"));
        assert!(response.image.is_none());
    }

    #[test]
    fn test_skipped_outcome_keeps_skipped_status() {
        let outcome = ActionOutcome::skipped("needs sign-off", Map::new());
        let response = build_response("click_at", &outcome, "https://a", Some(vec![1]));
        assert_eq!(response.response["status"], json!("skipped"));
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(response.image.is_some());
    }

    #[test]
    fn test_error_response_shape() {
        let err = WebpilotError::missing_argument("navigate", "url");
        let response = error_response("navigate", &err, "https://a", None);
        assert_eq!(response.response["status"], json!("error"));
        assert_eq!(
            response.response["message"],
            json!("Missing 'url' argument for navigate action")
        );
    }
}

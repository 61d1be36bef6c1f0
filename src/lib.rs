//! Webpilot - Vision-Model Browser Automation Agent
//!
//! Drives a real browser from natural-language tasks: a computer-use model
//! looks at screenshots, answers with function calls, and webpilot executes
//! them over the Chrome DevTools Protocol.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Model client abstraction with the Gemini implementation
//! - **Browser**: CDP session, input dispatch, and key mapping
//! - **Agent**: The request/act loop, action executor, and coordinate
//!   normalization
//!
//! # Usage
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use webpilot::agent::{ActionExecutor, TaskRunner};
//! use webpilot::browser::BrowserSession;
//! use webpilot::llm::GeminiClient;
//! use webpilot::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load();
//!     let session = BrowserSession::acquire(&config.browser).await?;
//!     let model = GeminiClient::new(&config)?;
//!
//!     let runner = TaskRunner::new(
//!         &session,
//!         &model,
//!         ActionExecutor::new(config.agent.search_url.clone()),
//!         std::time::Duration::from_millis(config.agent.settle_delay_ms),
//!         config.agent.max_iterations,
//!     );
//!
//!     let result = runner
//!         .run("Find the Rust book and open chapter 4", &CancellationToken::new())
//!         .await?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod browser;
pub mod core;
pub mod llm;

// Re-export commonly used items
pub use crate::core::{Config, Result, WebpilotError};

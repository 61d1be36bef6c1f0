//! Webpilot - Vision-Model Browser Automation Agent
//!
//! Main entry point for the CLI application.

use std::time::{Duration, Instant};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use webpilot::agent::{ActionExecutor, TaskRunner};
use webpilot::browser::SessionCache;
use webpilot::llm::{GeminiClient, ModelClient};
use webpilot::Config;

/// Webpilot - Vision-Model Browser Automation Agent
#[derive(Parser, Debug)]
#[command(name = "webpilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The task to perform, in natural language
    task: String,

    /// Model name override
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// DevTools debugging port override
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Maximum agent iterations before giving up
    #[arg(long)]
    max_iterations: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("webpilot=info")),
        )
        .init();

    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.model.name = model.clone();
    }

    if let Some(port) = args.port {
        config.browser.debug_port = port;
    }

    if let Some(max_iterations) = args.max_iterations {
        config.agent.max_iterations = max_iterations;
    }

    let cache = SessionCache::new();
    let session = cache.session(&config.browser).await?;
    let model = GeminiClient::new(&config)?;

    // Ctrl-C cancels the task between operations instead of killing the
    // process mid-action.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling task");
            ctrl_c_cancel.cancel();
        }
    });

    let runner = TaskRunner::new(
        session.as_ref(),
        &model,
        ActionExecutor::new(config.agent.search_url.clone()),
        Duration::from_millis(config.agent.settle_delay_ms),
        config.agent.max_iterations,
    );

    tracing::info!(model = model.name(), "webpilot starting");
    let started = Instant::now();

    let result = runner.run(&args.task, &cancel).await?;

    tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "done");
    println!("{}", result);

    Ok(())
}

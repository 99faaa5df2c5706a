//! minagent: run one task through the agent loop
//!
//! Example:
//!   minagent "Create a file called hello.py that prints Hello World"

mod display;
mod summary;
mod transcript;

use std::path::PathBuf;
use std::sync::Arc;

use agent_core::tools::builtin::default_registry;
use agent_core::{
    provider, AgentError, AgentLoop, AgentObserver, Config, Decision, Message, ProviderKind,
    ToolInvocation, ToolResult, ToolSpec,
};
use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use display::Display;
use transcript::Transcript;

#[derive(Debug, Parser)]
#[command(name = "minagent")]
#[command(about = "A minimal autonomous coding agent", version)]
#[command(after_help = "Examples:
    minagent \"Create a hello.py file that prints Hello World\"
    minagent \"Read the contents of main.py\" -o run.md
    minagent --provider ollama --model qwen2.5-coder \"List all Rust files\"")]
struct Cli {
    /// The task for the agent to perform
    task: String,

    /// Model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,

    /// Backend to use: anthropic or ollama (overrides config)
    #[arg(short, long)]
    provider: Option<ProviderKind>,

    /// Save transcript to file (.md for Markdown, anything else for plain text)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Maximum provider turns; 0 for no limit (overrides config)
    #[arg(long)]
    max_turns: Option<usize>,

    /// Path to minagent.toml (default: search current directory and parents)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Only print the final answer
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Fans run events out to the terminal and the optional transcript
struct CliObserver {
    display: Display,
    transcript: Option<Transcript>,
}

impl AgentObserver for CliObserver {
    fn on_task(&mut self, task: &str) {
        self.display.show_task(task);
        if let Some(t) = self.transcript.as_mut() {
            t.write_task(task);
        }
    }

    fn on_request(&mut self, turn: usize, history: &[Message], tools: &[ToolSpec]) {
        self.display.show_request(turn, history, tools);
        if let Some(t) = self.transcript.as_mut() {
            t.write_request(history, tools);
        }
    }

    fn on_decision(&mut self, _turn: usize, decision: &Decision) {
        self.display.show_response(decision);
        if let Some(t) = self.transcript.as_mut() {
            t.write_response(decision);
        }
    }

    fn on_tool_call(&mut self, invocation: &ToolInvocation) {
        self.display.show_tool_call(invocation);
        if let Some(t) = self.transcript.as_mut() {
            t.write_tool_call(invocation);
        }
    }

    fn on_tool_result(&mut self, _invocation: &ToolInvocation, result: &ToolResult) {
        self.display.show_tool_result(result);
        if let Some(t) = self.transcript.as_mut() {
            t.write_tool_result(result);
        }
    }

    fn on_answer(&mut self, answer: &str) {
        if let Some(t) = self.transcript.as_mut() {
            t.write_answer(answer);
        }
    }

    fn on_error(&mut self, error: &AgentError) {
        self.display.show_error(&error.to_string());
        if let Some(t) = self.transcript.as_mut() {
            t.write_error(&error.to_string());
        }
    }
}

/// Merge command-line overrides into the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(kind) = cli.provider {
        if kind != config.provider.kind {
            // Model and URL defaults belong to the backend they were written for
            config.provider.model = None;
            config.provider.base_url = None;
        }
        config.provider.kind = kind;
    }
    if let Some(ref model) = cli.model {
        config.provider.model = Some(model.clone());
    }
    if let Some(max) = cli.max_turns {
        config.agent.max_turns = max;
    }
    config.provider.api_key = cli
        .api_key
        .as_ref()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());
}

fn load_config(cli: &Cli) -> Result<Config> {
    match cli.config {
        Some(ref path) => Config::load_from(path),
        None => Config::load_or_default(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(&cli)?;
    apply_overrides(&mut config, &cli);

    if config.provider.requires_api_key() && config.provider.api_key.is_none() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set");
        eprintln!("Get your API key from https://console.anthropic.com/ or pass --api-key");
        std::process::exit(1);
    }

    let provider: Arc<dyn agent_core::Provider> =
        Arc::from(provider::from_config(&config.provider)?);
    info!(
        provider = %config.provider.kind,
        model = %config.provider.model(),
        "Using provider"
    );

    let agent = AgentLoop::new(provider, Arc::new(default_registry()), config.agent_config());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let mut observer = CliObserver {
        display: Display::new(cli.quiet),
        transcript: cli.output.as_ref().map(Transcript::new),
    };

    let outcome = agent.run_detailed(&cli.task, &cancel, &mut observer).await;

    if let Some(ref transcript) = observer.transcript {
        match transcript.save() {
            Ok(()) => info!(path = %transcript.path().display(), "Transcript saved"),
            Err(e) => warn!(error = %e, "Failed to save transcript"),
        }
    }

    match outcome {
        Ok(run) => {
            if cli.quiet {
                println!("{}", run.answer);
            } else {
                observer.display.show_answer(&run.answer);
            }
            Ok(())
        }
        Err(_) => std::process::exit(1),
    }
}

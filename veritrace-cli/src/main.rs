//! Veritrace CLI — run a cross-validated browsing research session.

mod commands;
mod console;
mod runner;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Veritrace: browse, verify, and only then answer
#[derive(Parser, Debug)]
#[command(name = "veritrace", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Research command to start from (defaults to the configured initial command)
    task: Option<String>,

    /// LLM model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Time budget for the whole session, in seconds
    #[arg(long)]
    time_budget: Option<u64>,

    /// Maximum browsing steps per command
    #[arg(long)]
    max_browser_steps: Option<usize>,

    /// Print the session report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable layer for stderr; RUST_LOG wins over -v/-q when set
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, cli.quiet)));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "veritrace", "veritrace")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "veritrace.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if let Some(command) = cli.command {
        return commands::handle_command(command, &workspace, cli.config.as_deref());
    }

    let mut config =
        veritrace_core::config::load_config(Some(&workspace), cli.config.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Apply CLI overrides
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(secs) = cli.time_budget {
        config.research.time_budget_secs = secs;
    }
    if let Some(steps) = cli.max_browser_steps {
        config.browser.max_steps = steps;
    }
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let command = cli
        .task
        .unwrap_or_else(|| config.research.initial_command.clone());
    runner::run_research(config, &command, cli.json, cli.quiet).await
}

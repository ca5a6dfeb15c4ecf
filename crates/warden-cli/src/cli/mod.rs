//! CLI entry and dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use warden_core::config::{self, Config};
use warden_core::session::{AgentSession, Chunk};

mod interrupt;
mod render;

#[derive(Parser)]
#[command(name = "warden")]
#[command(version)]
#[command(about = "Session warden for the Claude Code CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// The prompt to send to the agent
    #[arg(value_name = "PROMPT")]
    prompt: Option<String>,

    /// Override the configured vault path
    #[arg(long, value_name = "PATH")]
    vault: Option<PathBuf>,

    /// Do not print tool invocations or tool results
    #[arg(long = "quiet-tools")]
    quiet_tools: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr; stdout belongs to the chunk renderer.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("WARDEN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Path => {
                println!("{}", config::paths::config_path().display());
                Ok(())
            }
            ConfigCommands::Init => {
                let path = Config::init_default_config().context("init config")?;
                println!("{}", path.display());
                Ok(())
            }
        },
        None => {
            let Some(prompt) = cli.prompt else {
                anyhow::bail!("a prompt is required; see `warden --help`");
            };

            let mut config = Config::load().context("load config")?;
            if let Some(vault) = cli.vault {
                config.vault = Some(vault);
            }
            if cli.quiet_tools {
                config.display.show_tool_use = false;
            }

            run_query(&prompt, &config).await
        }
    }
}

async fn run_query(prompt: &str, config: &Config) -> Result<()> {
    let session = Arc::new(AgentSession::from_config(config));
    interrupt::install(Arc::clone(&session));

    let mut stream = session.query(prompt);
    let mut saw_error = false;

    while let Some(chunk) = stream.next().await {
        if matches!(chunk, Chunk::Error { .. }) {
            saw_error = true;
        }
        render::chunk(&chunk, &config.display);
        if chunk == Chunk::Done {
            break;
        }
    }

    if saw_error {
        std::process::exit(1);
    }
    Ok(())
}

//! robovox CLI: the main entry point.
//!
//! Commands:
//! - `run`    : Talk to the simulated arm (one typed line per utterance)
//! - `plan`   : Plan a single utterance and print it as JSON
//! - `skills` : List the skill catalogue
//! - `doctor` : Diagnose config and LLM reachability
//! - `config` : Print the default, effective or path of the config

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "robovox",
    about = "robovox — voice-driven robot orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.robovox/config.toml
    #[arg(short, long, global = true, env = "ROBOVOX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversation loop against the simulated arm
    Run {
        /// Answer from a recorded replay table instead of the live LLM
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Plan one utterance and print the result
    Plan {
        /// The utterance
        #[arg(short, long)]
        message: String,

        /// Run the plan on the simulated arm
        #[arg(long)]
        execute: bool,

        /// Answer from a recorded replay table instead of the live LLM
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// List the skills the planner may use
    Skills {
        /// Print the tool definitions sent to the LLM
        #[arg(long)]
        json: bool,
    },

    /// Diagnose system health
    Doctor,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML
    Default,
    /// Print the effective configuration (file + environment)
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run { replay } => commands::run::run(config_path, replay.as_deref()).await?,
        Commands::Plan {
            message,
            execute,
            replay,
        } => commands::plan::run(config_path, &message, execute, replay.as_deref()).await?,
        Commands::Skills { json } => commands::skills::run(json)?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Default) {
            ConfigAction::Default => commands::config_cmd::print_default(),
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
        },
    }

    Ok(())
}

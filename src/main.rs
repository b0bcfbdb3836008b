mod chat;
mod commands;
mod config;
mod error;
mod extract;
mod level;
mod llm;
mod prompts;
mod session;
mod weather;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::level::Level;
use crate::prompts::{build_system_prompt, PromptMode};

#[derive(Parser)]
#[command(name = "tutorchat")]
#[command(version)]
#[command(about = "Level-aware tutoring chat over hosted LLMs", long_about = None)]
struct Cli {
    /// Learning level: beginner, intermediate or advanced
    #[arg(short, long, global = true)]
    level: Option<Level>,

    /// Prompt mode: single or multi
    #[arg(short, long, global = true)]
    mode: Option<PromptMode>,

    /// Subject the tutor sticks to
    #[arg(short, long, global = true)]
    subject: Option<String>,

    /// Config file (defaults to ~/.tutorchat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Print the system prompt for the chosen level and mode
    Prompt,
    /// Write a default config file if none exists
    Init,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutorchat=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(level) = cli.level {
        config.default_level = level;
    }
    if let Some(mode) = cli.mode {
        config.default_mode = mode;
    }
    if let Some(subject) = &cli.subject {
        config.subject = subject.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat::run_chat(&config).await,
        Commands::Ask { question } => chat::ask_once(&config, &question.join(" ")).await,
        Commands::Prompt => {
            println!(
                "{}",
                build_system_prompt(config.default_level, config.default_mode, &config.subject)
            );
            Ok(())
        }
        Commands::Init => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => Config::default_path()?,
            };
            if path.exists() {
                println!("📄 Config already exists at {}", path.display());
            } else {
                config.save_to(&path)?;
                println!("📝 Wrote default config to {}", path.display());
            }
            Ok(())
        }
    }
}

//! kiln CLI - front-end asset build tool.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;
mod tasks;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Compile, bundle, minify, serve and deploy front-end assets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to kiln.toml config file
    #[arg(short, long, global = true, default_value = "kiln.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tasks and their prerequisites, in the order given
    Run {
        /// Task names (defaults to "default")
        tasks: Vec<String>,
    },

    /// List declared tasks and their prerequisites
    List,

    /// Scaffold kiln.toml and a src/ skeleton
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        None => {
            commands::run::run(&cli.config, Vec::new()).await?;
        }
        Some(Commands::Run { tasks }) => {
            commands::run::run(&cli.config, tasks).await?;
        }
        Some(Commands::List) => {
            commands::list::run(&cli.config)?;
        }
        Some(Commands::Init { yes }) => {
            commands::init::run(&cli.config, yes)?;
        }
    }

    Ok(())
}

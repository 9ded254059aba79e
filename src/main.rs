use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use memgate::cli;
use memgate::config::MemgateConfig;

#[derive(Parser)]
#[command(name = "memgate", version, about = "Local memory server with an LLM usefulness gate")]
struct Cli {
    /// Config file (default: ~/.memgate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the classification gate once and print the decision
    Classify {
        text: String,
    },
    /// Search stored memories
    Search {
        query: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print memory statistics as JSON
    Stats {
        #[arg(long)]
        user: Option<String>,
    },
    /// Import memories from a JSON file
    Import {
        file: PathBuf,
        /// Owner for records that carry no user_id
        #[arg(long)]
        user: Option<String>,
    },
    /// Check database health and backend reachability
    Doctor,
    /// Manage the local embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.memgate/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = cli::logging::init();

    let mut config = match &cli.config {
        Some(path) => MemgateConfig::load_from(path)?,
        None => MemgateConfig::load()?,
    };
    cli::logging::apply_level(&log_filter, &config.server.log_level);

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cli::serve(&config).await?;
        }
        Command::Classify { text } => cli::classify::classify(&config, &text).await?,
        Command::Search { query, user, limit } => {
            cli::search::search(&config, &query, user.as_deref(), limit).await?;
        }
        Command::Stats { user } => cli::stats::stats(&config, user.as_deref())?,
        Command::Import { file, user } => {
            cli::import::import(&config, &file, user.as_deref()).await?;
        }
        Command::Doctor => cli::doctor::doctor(&config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}

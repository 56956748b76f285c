//! DataClaw CLI: the main entry point.
//!
//! Commands:
//! - `serve`   : Start the HTTP API
//! - `ask`     : Send one message and stream the answer
//! - `ingest`  : Index markdown runbooks into the knowledge base
//! - `schema`  : Print the live warehouse schema summary
//! - `lineage` : Print the dbt lineage summary
//! - `chats`   : Inspect or delete stored conversations
//! - `doctor`  : Diagnose configuration and collaborators

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "dataclaw",
    about = "DataClaw — data-engineering chat assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (defaults to ~/.dataclaw/config.toml)
    #[arg(short, long, global = true, env = "DATACLAW_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question and stream the answer to stdout
    Ask {
        /// The message to send
        message: String,

        /// Continue an existing conversation
        #[arg(long)]
        chat_id: Option<String>,
    },

    /// Index *.md runbooks into the knowledge base
    Ingest {
        /// Directory to read (defaults to knowledge.docs_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Print the live warehouse schema summary
    Schema,

    /// Print the dbt lineage summary
    Lineage,

    /// Manage stored conversations
    Chats {
        #[command(subcommand)]
        action: ChatsAction,
    },

    /// Diagnose configuration and collaborators
    Doctor,
}

#[derive(Subcommand)]
enum ChatsAction {
    /// List conversations, most recent first
    List,
    /// Print the messages of one conversation
    Show { chat_id: String },
    /// Delete one conversation
    Delete { chat_id: String },
    /// Delete every conversation
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = commands::config_path(cli.config.as_deref());
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Ask { message, chat_id } => {
            commands::ask::run(config, &message, chat_id.as_deref()).await?
        }
        Commands::Ingest { dir } => commands::ingest::run(config, dir).await?,
        Commands::Schema => commands::warehouse::schema(config).await?,
        Commands::Lineage => commands::warehouse::lineage(config).await?,
        Commands::Chats { action } => match action {
            ChatsAction::List => commands::chats::list(config).await?,
            ChatsAction::Show { chat_id } => commands::chats::show(config, &chat_id).await?,
            ChatsAction::Delete { chat_id } => commands::chats::delete(config, &chat_id).await?,
            ChatsAction::Clear => commands::chats::clear(config).await?,
        },
        Commands::Doctor => commands::doctor::run(config, &config_path).await?,
    }

    Ok(())
}

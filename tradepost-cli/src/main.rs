//! Main entry point for the Tradepost messaging CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use url::Url;

mod commands;
mod logging;

/// Tradepost CLI
#[derive(Parser)]
#[command(name = "tradepost")]
#[command(about = "Marketplace messaging from the terminal", long_about = None)]
pub struct Cli {
    /// Path to a configuration file (yaml, json or toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overriding the configuration (e.g., <http://localhost:8080>)
    #[arg(long, global = true)]
    server: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Tradepost CLI
#[derive(Subcommand)]
enum Commands {
    /// List your conversations
    Conversations(commands::inbox::UserArgs),

    /// Show the messages of one conversation
    Thread(commands::inbox::ThreadArgs),

    /// Send a message about a listing
    Send(commands::inbox::SendArgs),

    /// Print your unread message count
    Unread(commands::inbox::UserArgs),

    /// Mark one message as read
    MarkRead(commands::inbox::MarkReadArgs),

    /// Open a live view that polls for new conversations and messages
    Watch(commands::watch::WatchArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: clap_complete::Shell,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml, json or toml). Defaults to yaml.
        #[arg(
            long,
            short,
            default_value = "yaml",
            help = "Format of the configuration file to generate (yaml, json or toml). Defaults to yaml."
        )]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Completion { shell } => {
            commands::completion::generate_completion(*shell);
            return Ok(());
        }
        Commands::Config { format } => return commands::config::generate_config(format),
        _ => {}
    }

    let config = commands::resolve_config(cli.config, cli.server)?;
    logging::initialize_tracing(&config);

    match cli.command {
        Commands::Conversations(args) => commands::inbox::list_conversations(&config, args).await,
        Commands::Thread(args) => commands::inbox::show_thread(&config, args).await,
        Commands::Send(args) => commands::inbox::send(&config, args).await,
        Commands::Unread(args) => commands::inbox::unread(&config, args).await,
        Commands::MarkRead(args) => commands::inbox::mark_read(&config, args).await,
        Commands::Watch(args) => commands::watch::watch(&config, args).await,
        Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
    }
}

//! kestrel CLI: the operator entry point.
//!
//! Commands:
//! - `config`   Print the effective configuration, or write the default file
//! - `session`  List, show or clear persisted conversations

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "kestrel", about = "kestrel: ReAct agent engine", version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "KESTREL_LOG_JSON")]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config {
        /// Write the default config file instead
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,

        /// Print the config file path only
        #[arg(long, conflicts_with = "init")]
        path: bool,
    },

    /// Manage persisted sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List stored session ids
    List,

    /// Print a session's messages
    Show {
        /// Session id
        id: String,
    },

    /// Delete a session
    Clear {
        /// Session id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
    }

    match cli.command {
        Commands::Config { path: true, .. } => commands::config_cmd::path().await?,
        Commands::Config { init: true, force, .. } => commands::config_cmd::init(force).await?,
        Commands::Config { .. } => commands::config_cmd::show().await?,
        Commands::Session { action } => match action {
            SessionAction::List => commands::session::list().await?,
            SessionAction::Show { id } => commands::session::show(&id).await?,
            SessionAction::Clear { id } => commands::session::clear(&id).await?,
        },
    }

    Ok(())
}

//! chatstream - replay AI response streams into local conversation sessions.

use anyhow::{Context, Result};
use chatstream_cli::{config::Config, follow, logging, render};
use chatstream_core::{
    KeyValueStore, ReplayTransport, SessionManager, SqliteKeyValueStore, TurnInput, TurnRunner,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use logging::{LogConfig, LogFormat};

/// chatstream - reconstruct chat messages from captured event streams.
#[derive(Parser, Debug)]
#[command(name = "chatstream")]
#[command(about = "Replay AI response streams into local conversation sessions")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override the session database path
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace logging (includes per-frame decoding)
    #[arg(long, global = true)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "decoder=trace").
    /// Targets are prefixed with "chatstream::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL", global = true)]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a message and consume a captured event stream as the reply
    Replay {
        /// File holding the raw `data: ...` stream
        file: PathBuf,

        /// User message the stream answers
        #[arg(short, long)]
        message: String,

        /// Extra context forwarded with the request
        #[arg(long)]
        context: Option<String>,

        /// Action hint forwarded with the request
        #[arg(long)]
        action: Option<String>,

        /// Print live progress while the stream is consumed
        #[arg(long)]
        follow: bool,
    },
    /// Manage stored sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// List sessions, most recently updated first
    List,
    /// Print a session (defaults to the current one)
    Show { id: Option<String> },
    /// Start a new session and make it current
    New,
    /// Make a session current
    Switch { id: String },
    /// Delete a session
    Delete { id: String },
    /// Delete every session
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides.clone(),
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load()?,
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::info!(target: "chatstream::startup", "Using session database {}", config.db_path.display());

    let store: Arc<dyn KeyValueStore> = Arc::new(
        SqliteKeyValueStore::open(&config.db_path)
            .with_context(|| format!("failed to open {}", config.db_path.display()))?,
    );
    let mut sessions = SessionManager::load(store, config.session_config());

    match cli.command {
        Command::Replay {
            file,
            message,
            context,
            action,
            follow,
        } => {
            let transport = ReplayTransport::from_file(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let runner = TurnRunner::new(transport);

            let progress = follow.then(|| follow::spawn(runner.subscribe()));

            let input = TurnInput {
                message,
                selected_context: context,
                action,
            };
            let reply = runner.run(&mut sessions, input).await?;
            drop(runner);
            if let Some(handle) = progress {
                follow::finish(handle).await;
            }
            print!("{}", render::message(&reply));
        }
        Command::Sessions { command } => match command {
            SessionCommand::List => {
                print!("{}", render::session_list(&sessions.list(), sessions.current_id()));
            }
            SessionCommand::Show { id } => {
                let session = match id {
                    Some(id) => sessions
                        .get(&id)
                        .with_context(|| format!("no session {}", id))?,
                    None => sessions.current(),
                };
                print!("{}", render::session(session));
            }
            SessionCommand::New => {
                println!("{}", sessions.create_session().id);
            }
            SessionCommand::Switch { id } => {
                let session = sessions.load_session(&id)?;
                println!("Switched to {}", session.title);
            }
            SessionCommand::Delete { id } => {
                sessions.delete_session(&id)?;
                println!("Deleted {}; current session is {}", id, sessions.current_id());
            }
            SessionCommand::Clear => {
                sessions.clear_all();
                println!("Cleared all sessions");
            }
        },
    }

    Ok(())
}

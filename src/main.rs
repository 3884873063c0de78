//! Binary entry point for educhat.
//!
//! This binary provides the CLI interface for the support chat pipeline.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print macros in the main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use educhat::config::EduchatConfig;
use educhat::models::ChatRequest;
use educhat::observability::{self, LogFormat, LoggingConfig};
use educhat::services::ChatService;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

/// Educhat - support chat pipeline for the BrightKids online school.
#[derive(Parser)]
#[command(name = "educhat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Send a single message through the pipeline.
    Chat {
        /// The message text.
        message: String,

        /// User identifier.
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// Interactive conversation loop.
    Repl {
        /// User identifier.
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// Wipe all stored state for a user.
    ClearHistory {
        /// User identifier.
        user: String,
    },

    /// List users with a persisted snapshot.
    Snapshots,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    if cli.json_logs {
        logging.format = LogFormat::Json;
    }
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration from an explicit path or the default locations.
fn load_config(path: Option<&str>) -> educhat::Result<EduchatConfig> {
    match path {
        Some(path) => {
            Ok(EduchatConfig::load_from_file(Path::new(path))?.with_env_overrides())
        },
        None => Ok(EduchatConfig::load_default()),
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &EduchatConfig) -> anyhow::Result<()> {
    match command {
        Commands::Chat { message, user } => cmd_chat(config, &user, &message),
        Commands::Repl { user } => cmd_repl(config, &user),
        Commands::ClearHistory { user } => cmd_clear_history(config, &user),
        Commands::Snapshots => cmd_snapshots(config),
    }
}

fn cmd_chat(config: &EduchatConfig, user: &str, message: &str) -> anyhow::Result<()> {
    let service = ChatService::from_config(config)?;
    let response = service.handle(&ChatRequest {
        user_id: user.to_string(),
        message: message.to_string(),
    })?;
    println!("{}", response.response);
    service.persist_all();
    Ok(())
}

fn cmd_repl(config: &EduchatConfig, user: &str) -> anyhow::Result<()> {
    let service = ChatService::from_config(config)?;
    println!("educhat repl - empty line or Ctrl-D to exit");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            break;
        }
        match service.handle(&ChatRequest {
            user_id: user.to_string(),
            message: message.to_string(),
        }) {
            Ok(response) => println!("{}", response.response),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    service.persist_all();
    Ok(())
}

fn cmd_clear_history(config: &EduchatConfig, user: &str) -> anyhow::Result<()> {
    let service = ChatService::from_config(config)?;
    service.clear_history(user);
    println!("Cleared state for '{user}'");
    Ok(())
}

fn cmd_snapshots(config: &EduchatConfig) -> anyhow::Result<()> {
    let store = educhat::storage::SnapshotStore::new(
        config.data_dir.join("snapshots"),
        config.snapshot_max_age_secs,
        config.snapshot_max_bytes,
    )?;
    let snapshots = store.load_all();
    if snapshots.is_empty() {
        println!("No snapshots.");
        return Ok(());
    }
    for (user_id, snapshot) in snapshots {
        println!(
            "{user_id}: {} turns, {} messages, greeting_exchanged={}",
            snapshot.history.len(),
            snapshot.message_count,
            snapshot.greeting_exchanged
        );
    }
    Ok(())
}

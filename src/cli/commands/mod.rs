//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod config_cmd;
mod job;
mod run;
mod supervise;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_config, LoadOptions};
use crate::pipeline::RunMode;

#[derive(Parser)]
#[command(name = "revisor")]
#[command(about = "Concurrent document review: corrections, rule validation and consistency analysis")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Env var holding a log filter that overrides `RUST_LOG`.
pub const LOG_ENV: &str = "REVISOR_LOG";

/// Filter used when neither `REVISOR_LOG` nor `RUST_LOG` is set.
///
/// Verbose runs log per-phase progress; otherwise only warnings such as
/// failed inference attempts and skipped images.
pub fn default_log_directive(verbose: bool) -> &'static str {
    if verbose {
        "revisor=info"
    } else {
        "revisor=warn"
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on a document in this process
    Run {
        /// Parsed document (JSON)
        document: PathBuf,
        /// Run mode: full, textual or consistency
        #[arg(short, long, default_value = "full")]
        mode: RunMode,
        /// Output directory (default: <data dir>/output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Job id used for status and cancel files (default: random)
        #[arg(long)]
        job_id: Option<String>,
        /// Do not watch for cancel requests (the supervisor handles them)
        #[arg(long)]
        ignore_cancel: bool,
    },

    /// Run the pipeline in a supervised child process
    Supervise {
        /// Parsed document (JSON)
        document: PathBuf,
        /// Run mode: full, textual or consistency
        #[arg(short, long, default_value = "full")]
        mode: RunMode,
        /// Output directory (default: <data dir>/output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Job id used for status and cancel files (default: random)
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Request cancellation of a running job
    Cancel {
        /// Job id
        job_id: String,
    },

    /// Show the last reported status of a job
    Status {
        /// Job id
        job_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Show which config file is in use and the resolved directories
    Path,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let config = load_config(&options).await.map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Run {
            document,
            mode,
            output,
            job_id,
            ignore_cancel,
        } => run::cmd_run(&config, &document, mode, output, job_id, ignore_cancel).await,
        Commands::Supervise {
            document,
            mode,
            output,
            job_id,
        } => supervise::cmd_supervise(&config, &document, mode, output, job_id).await,
        Commands::Cancel { job_id } => job::cmd_cancel(&config, &job_id).await,
        Commands::Status { job_id, json } => job::cmd_status(&config, &job_id, json).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&config),
            ConfigCommands::Path => config_cmd::cmd_config_path(&config),
        },
    }
}

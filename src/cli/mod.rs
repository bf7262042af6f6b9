//! Ratewarden CLI - Operator commands for the rate limiter
//!
//! This module provides the `ratewarden` command line:
//! - `serve`: run the periodic maintenance task until Ctrl-C/SIGTERM
//! - `stats`, `cleanup`: sample or clean the limiter keyspace once
//! - `status`, `reset`: inspect or unblock a single identity
//! - `health`, `profiles`: store diagnostics and the profiles in effect

mod commands;
mod context;
mod output;

pub use context::CliContext;
pub use output::{OutputFormat, OutputWriter};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ratewarden - Sliding window rate limiter operations
#[derive(Parser, Debug)]
#[command(
    name = "ratewarden",
    version,
    about = "Operate the sliding window rate limiter",
    long_about = "Ratewarden runs maintenance for the sliding window rate limiter and \
                  exposes operator commands for inspecting and unblocking identities.\n\n\
                  Keys are written as 'ip:<address>' or 'user:<id>'."
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, env = "RATEWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the maintenance task until shutdown
    Serve(commands::serve::ServeArgs),

    /// Sample the limiter keyspace
    Stats,

    /// Delete expired block markers and empty windows once
    Cleanup,

    /// Show remaining quota for a key without consuming it
    Status(commands::status::StatusArgs),

    /// Clear window and block state for a key
    Reset(commands::reset::ResetArgs),

    /// Probe the backing store
    Health,

    /// List the profiles in effect
    Profiles,
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    /// Create a new CLI application instance from process arguments
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    /// Run the CLI application
    pub async fn run(self) -> anyhow::Result<i32> {
        let context = match CliContext::new(&self.cli) {
            Ok(context) => context,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        };

        let result = match self.cli.command {
            Commands::Serve(ref args) => commands::serve::run(&context, args).await,
            Commands::Stats => commands::maintenance::stats(&context).await,
            Commands::Cleanup => commands::maintenance::cleanup(&context).await,
            Commands::Status(ref args) => commands::status::run(&context, args).await,
            Commands::Reset(ref args) => commands::reset::run(&context, args).await,
            Commands::Health => commands::health::run(&context).await,
            Commands::Profiles => commands::profiles::run(&context),
        };

        Ok(Self::exit_code(result, &context.output))
    }

    /// Map a command outcome to the process exit code
    fn exit_code(result: anyhow::Result<i32>, output: &OutputWriter) -> i32 {
        match result {
            Ok(code) => code,
            Err(e) => {
                output.error(&format!("{:#}", e));
                exit_codes::INTERNAL_ERROR
            }
        }
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit codes for scripting
pub mod exit_codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// The inspected identity is currently blocked
    pub const BLOCKED: i32 = 1;
    /// Configuration or input error
    pub const CONFIG_ERROR: i32 = 2;
    /// Backing store unreachable or failing
    pub const STORE_UNAVAILABLE: i32 = 3;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = 99;
}

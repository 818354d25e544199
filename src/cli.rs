//! # Command Line Interface
//!
//! Flags layered over the environment configuration, plus a `check-config` command
//! that validates and prints the effective settings without starting anything.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "secretdrop")]
#[command(about = "Self-destructing one-time secrets backed by limited-use Vault tokens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Read environment variables from this file instead of `.env`
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Start the web service (default)
    Serve,

    /// Load and validate the configuration, then print a summary
    CheckConfig,
}

impl Cli {
    pub fn subcommand(&self) -> Commands {
        self.command.unwrap_or(Commands::Serve)
    }

    /// Load the env file before any configuration is read.
    ///
    /// An explicit `--env-file` must exist; the implicit `.env` is optional.
    pub fn load_env_file(&self) -> anyhow::Result<()> {
        match &self.env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    anyhow::anyhow!("failed to load env file {}: {}", path.display(), e)
                })?;
            }
            None => {
                if let Err(e) = dotenvy::dotenv() {
                    if !e.not_found() {
                        eprintln!("Warning: Error loading .env file: {}", e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Flags win over the environment.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if self.verbose {
            config.observability.log_level = "debug".to_string();
        }
        if self.json_logs {
            config.observability.json_logging = true;
        }
    }
}

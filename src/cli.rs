// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::ConfigOverrides;

/// Command-line arguments for `familiar`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "familiar",
    version,
    about = "Drop a markdown task into Jobs/, get the answer appended to it.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `~/.config/familiar/config.toml`.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FAMILIAR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Watch the inbox and process tasks until interrupted.
    Run(RunArgs),
    /// Write a config file and create the task directories.
    Init(InitArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Display name used in prompts, run records and logs.
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Directory holding Jobs/, Processing/, Done/ and Failed/.
    #[arg(long, value_name = "PATH")]
    pub vault_path: Option<PathBuf>,

    /// Generator timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Poll the inbox instead of using filesystem events.
    #[arg(long)]
    pub poll: bool,

    /// Process what is already in the inbox, then exit.
    #[arg(long)]
    pub once: bool,

    /// Resolve and print the configuration, but don't process anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            name: self.name.clone(),
            vault_path: self.vault_path.clone(),
            vault_root: None,
            timeout: self.timeout,
            force_poll: self.poll,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct InitArgs {
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    #[arg(long, value_name = "PATH")]
    pub vault_path: Option<PathBuf>,

    /// Working directory for the generator (default: parent of the vault path).
    #[arg(long, value_name = "PATH")]
    pub vault_root: Option<PathBuf>,

    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra directory the generator may access. Repeatable.
    #[arg(long = "allowed-path", value_name = "PATH")]
    pub allowed_paths: Vec<PathBuf>,

    /// Overwrite an existing config file (its values are kept unless given).
    #[arg(long)]
    pub force: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

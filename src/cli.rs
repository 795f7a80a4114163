// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Incremental front-end asset builds with watch mode and live reload.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run (`default`, `clean`, `html`, `images`, `imguri`, `sass`,
    /// `js`, `fonts`, or one of the aliases `styles`, `scripts`,
    /// `inline_images`).
    #[arg(value_name = "TASK", default_value = "default")]
    pub task: String,

    /// Path to the config file (TOML).
    ///
    /// If omitted, `Assetdag.toml` in the current directory is used when it
    /// exists, and the built-in layout otherwise.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Build once and exit instead of entering watch mode.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve config, mode and task order, print them, but build nothing.
    #[arg(long)]
    pub dry_run: bool,
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

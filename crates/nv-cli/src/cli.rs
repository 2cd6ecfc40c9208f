//! CLI argument definitions for the `nv` harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "nv",
    version,
    about = "Replay neuroview project sessions against in-memory adapters",
    long_about = "Replay scripted neuroview UI sessions.\n\n\
                  Each script step mutates the project file registry the way the viewer's\n\
                  file lists do. Sync steps diff the project against the last synced\n\
                  snapshot and apply the change batch to an in-memory rendering engine\n\
                  and backend."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Settings file (default: settings.toml in the user config directory).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a session script.
    Replay(ReplayArgs),

    /// Show the category each file name is classified as.
    Classify(ClassifyArgs),

    /// Print the effective settings as TOML.
    Settings(SettingsArgs),
}

#[derive(Parser)]
pub struct ReplayArgs {
    /// Path to the JSON session script.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Report format.
    #[arg(long = "output", value_enum, default_value = "table")]
    pub output: OutputArg,
}

#[derive(Parser)]
pub struct ClassifyArgs {
    /// File names to classify.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<String>,
}

#[derive(Parser)]
pub struct SettingsArgs {
    /// Also write the settings to this path.
    #[arg(long = "write", value_name = "PATH")]
    pub write: Option<PathBuf>,
}

/// Replay report formats.
#[derive(Clone, Copy, ValueEnum)]
pub enum OutputArg {
    Table,
    Plain,
    Json,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

//! # Cli
//!
//! This module contains everything needed for parsing the CLI arguments for
//! emberc.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Struct containing the CLI configuration for emberc.
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}

/// Enum for specifying the log level of emberc.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    /// The default log level. Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// A log level, where also warnings (like unused locals) are logged.
    #[value(alias("1"))]
    Warn,

    /// Also log information about the general state of the compiler, e.g.
    /// which files are compiled, cache hits, etc.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the compiler.
    #[value(alias("3"))]
    Debug,

    /// Log extra information, including per-visitor analyzer traces.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

impl LogLevel {
    /// One step more verbose, for `--verbose`.
    pub fn bumped(&self) -> LogLevel {
        match self {
            LogLevel::Error => LogLevel::Warn,
            LogLevel::Warn => LogLevel::Info,
            LogLevel::Info => LogLevel::Debug,
            LogLevel::Debug => LogLevel::Trace,
            LogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile an Ember source file to a native binary via a C toolchain.
    Compile(CompileArgs),

    /// Type-check a source file without emitting or compiling anything.
    Check(CheckArgs),

    /// Set up any bundled runtime assets (placeholder for now — there is
    /// nothing to install yet).
    Setup,
}

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// The path to the Ember source file.
    #[arg(index = 1)]
    pub file: std::path::PathBuf,

    /// The path to the output binary.
    #[arg(short, long)]
    pub output: Option<std::path::PathBuf>,

    /// Override the C compiler to invoke (defaults to `ember.toml`, then
    /// `$CC`, then `cc`).
    #[arg(long)]
    pub cc: Option<String>,

    /// Extra flags passed verbatim to the C compiler.
    #[arg(long)]
    pub cflags: Option<String>,

    /// Write the generated C to this path instead of a temporary file, and
    /// keep it around after the build.
    #[arg(long)]
    pub cfile: Option<std::path::PathBuf>,

    /// Build a shared library instead of an executable.
    #[arg(long, conflicts_with = "static_")]
    pub shared: bool,

    /// Build a static library instead of an executable.
    #[arg(long = "static")]
    pub static_: bool,

    /// Optimize the produced binary for distribution.
    #[arg(long, conflicts_with = "maximum_performance")]
    pub release: bool,

    /// Optimize the produced binary as aggressively as the compiler allows.
    #[arg(long)]
    pub maximum_performance: bool,

    /// Always re-run the C toolchain, even if a cached artifact matches.
    #[arg(long)]
    pub no_cache: bool,

    /// Raise the log level by one step.
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// The path to the Ember source file.
    #[arg(index = 1)]
    pub file: std::path::PathBuf,
}

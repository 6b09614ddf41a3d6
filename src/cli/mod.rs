//! # CLI Module
//!
//! @title Command Line Interface
//! @author Ramprasad
//!
//! This module defines the command-line interface for imdbug using the
//! `clap` derive macros for declarative argument parsing.
//!
//! ## Commands
//!
//! - `analyze` - Annotate C/C++ sources with line-level vulnerability findings
//! - `models` - Display available detection models
//! - `example` - Print a fixed annotation list for testing editor integrations
//! - `version` - Show version information

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// imdbug command-line interface.
///
/// Splits C and C++ files into functions, scores them with a pluggable
/// detection model and reports which lines are most likely vulnerable.
#[derive(Parser, Debug)]
#[command(name = "imdbug")]
#[command(version)]
#[command(about = "Line-level vulnerability annotation for C and C++ sources")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to $IMDBUG_CONFIG, then ./imdbug.json).
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands for the imdbug CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annotate a source file or a directory of sources.
    Analyze(AnalyzeArgs),

    /// List all registered detection models.
    Models {
        /// Print the list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a fixed annotation list with one finding per severity.
    Example,

    /// Print version information.
    Version,
}

/// Arguments of the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the file or directory to analyze.
    ///
    /// Directories are searched for files with a C or C++ extension.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Label of the detection model to use.
    ///
    /// Defaults to `default_model` from the configuration.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Language hint overriding the file extension (c, cpp, h, hpp, cc, ...).
    #[arg(short, long)]
    pub language: Option<String>,

    /// Output format for the report.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Write the report into this directory instead of printing it.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Levels below the syntax tree root searched for functions.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_depth: Option<u64>,

    /// Glob patterns (relative to PATH) of files to skip.
    ///
    /// Example: --exclude 'third_party/**,*_test.c'
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Only analyze files directly inside PATH.
    #[arg(long)]
    pub no_recursive: bool,
}

/// Report formats supported by `analyze`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colorized console output.
    Terminal,
    /// Machine-readable JSON.
    Json,
    /// Human-readable Markdown report.
    Markdown,
    /// GitHub Actions workflow annotations.
    Github,
}

impl OutputFormat {
    /// File name used when the report is written with `--output`.
    pub fn report_file_name(&self) -> &'static str {
        match self {
            OutputFormat::Terminal | OutputFormat::Json => "imdbug_report.json",
            OutputFormat::Markdown => "imdbug_report.md",
            OutputFormat::Github => "imdbug_annotations.txt",
        }
    }
}

//! Command-line interface for eventdoc.
//!
//! This module provides the CLI structure for the `eventdoc` binary. Command
//! handlers live in the binary; everything they call lives in the library.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, EditCommand, ListCommand, OutputFormat, ShowCommand, SummaryCommand,
    TagsCommand,
};

/// eventdoc - Browse and document the analytics event catalog
///
/// Lists, searches and filters the events the product emits, shows their
/// documentation, and edits descriptions, payload formats and tags.
#[derive(Debug, Parser)]
#[command(name = "eventdoc")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base URL of the catalog API
    #[arg(long, global = true, env = "EVENTDOC_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// API key sent with every request
    #[arg(long, global = true, env = "EVENTDOC_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List events, optionally filtered by name and tag
    List(ListCommand),

    /// Show the documentation of one event
    Show(ShowCommand),

    /// List every tag in use
    Tags(TagsCommand),

    /// Show documentation coverage counts
    Summary(SummaryCommand),

    /// Edit and save one event
    Edit(EditCommand),

    /// Browse and edit interactively
    Browse,

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

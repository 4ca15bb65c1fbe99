//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::browse::{EditPatch, EventFilter};

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show events whose name contains this text (case-insensitive)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Only show events carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

impl ListCommand {
    /// The filter described by the arguments.
    #[must_use]
    pub fn filter(&self) -> EventFilter {
        let mut filter = EventFilter::new();
        if let Some(search) = &self.search {
            filter = filter.with_query(search.as_str());
        }
        if let Some(tag) = &self.tag {
            filter = filter.with_tag(tag.as_str());
        }
        filter
    }
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Exact event name
    pub name: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Tags command arguments.
#[derive(Debug, Args)]
pub struct TagsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Edit command arguments.
///
/// Fields that are not given keep their current values.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Exact event name
    pub name: String,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New type label (e.g. Clientside, Serverside)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub event_type: Option<String>,

    /// New payload format, as JSON text
    #[arg(long, value_name = "JSON")]
    pub format_json: Option<String>,

    /// Replace the tags (comma-separated; trimmed and lowercased)
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,

    /// Mark or unmark the event as deprecated
    #[arg(long, value_name = "BOOL")]
    pub deprecated: Option<bool>,
}

impl EditCommand {
    /// The field changes described by the arguments.
    #[must_use]
    pub fn patch(&self) -> EditPatch {
        EditPatch {
            description: self.description.clone(),
            format: self.format_json.clone(),
            event_type: self.event_type.clone(),
            deprecated: self.deprecated,
        }
    }

    /// Check if the arguments change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patch().is_empty() && self.tags.is_none()
    }
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

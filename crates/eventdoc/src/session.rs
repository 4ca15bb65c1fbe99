//! Interactive browsing session.
//!
//! A [`Browser`] holds the view state of one user: the filter, and an
//! [`ItemEditor`] for every event that has been opened. It reads through the
//! shared [`QueryCache`], so repeated commands reuse fetched data.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::browse::{distinct_tags, EditPatch, EditorMode, EventFilter, ItemEditor, Summary};
use crate::cache::{QueryCache, QueryState};
use crate::cli::OutputFormat;
use crate::error::{Error, Result};
use crate::record::EventRecord;
use crate::render;

const PROMPT: &str = "eventdoc> ";

const HELP: &str = "\
Commands:
  list                          Show events matching the current filter
  search [TEXT]                 Filter by name (no text clears the search)
  tag TAG                       Select a tag, or clear it if already selected
  tags                          Show every tag in use
  show NAME                     Show one event
  summary                       Show documentation coverage
  edit NAME                     Start editing an event
  set NAME FIELD VALUE          Change description, type, format or deprecated
  retag NAME TAG[,TAG...]       Replace the tags of an event being edited
  save NAME                     Save an event being edited
  cancel NAME                   Discard changes to an event
  refresh                       Reload events from the server
  help                          Show this help
  quit                          Leave the browser";

/// One line of input to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    /// List the visible events.
    List,
    /// Replace the name query.
    Search(String),
    /// Toggle the selected tag.
    Tag(String),
    /// List distinct tags.
    Tags,
    /// Show one event.
    Show(String),
    /// Show coverage counts.
    Summary,
    /// Start editing.
    Edit(String),
    /// Merge a change into an edit buffer.
    Set {
        /// Event being edited.
        name: String,
        /// The change.
        patch: EditPatch,
    },
    /// Replace the buffered tags.
    Retag {
        /// Event being edited.
        name: String,
        /// New tags, before normalization.
        tags: Vec<String>,
    },
    /// Save an edit buffer.
    Save(String),
    /// Discard an edit buffer.
    Cancel(String),
    /// Reload from the server.
    Refresh,
    /// Show the command list.
    Help,
    /// Leave the session.
    Quit,
}

impl BrowseCommand {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] for unknown commands and missing or
    /// malformed arguments.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let command = match word.to_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "search" => Self::Search(rest.to_string()),
            "tag" => Self::Tag(required(rest, "tag TAG")?.to_string()),
            "tags" => Self::Tags,
            "show" => Self::Show(required(rest, "show NAME")?.to_string()),
            "summary" => Self::Summary,
            "edit" => Self::Edit(required(rest, "edit NAME")?.to_string()),
            "set" => parse_set(rest)?,
            "retag" => {
                let (name, tags) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| usage("retag NAME TAG[,TAG...]"))?;
                Self::Retag {
                    name: name.to_string(),
                    tags: tags.split(',').map(str::to_string).collect(),
                }
            }
            "save" => Self::Save(required(rest, "save NAME")?.to_string()),
            "cancel" => Self::Cancel(required(rest, "cancel NAME")?.to_string()),
            "refresh" => Self::Refresh,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            "" => return Err(Error::InvalidCommand("empty command".to_string())),
            other => {
                return Err(Error::InvalidCommand(format!(
                    "unknown command '{other}', try 'help'"
                )))
            }
        };
        Ok(command)
    }
}

fn usage(form: &str) -> Error {
    Error::InvalidCommand(format!("usage: {form}"))
}

fn required<'a>(value: &'a str, form: &str) -> Result<&'a str> {
    if value.is_empty() {
        Err(usage(form))
    } else {
        Ok(value)
    }
}

fn parse_set(rest: &str) -> Result<BrowseCommand> {
    let mut parts = rest.splitn(3, char::is_whitespace);
    let (Some(name), Some(field), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(usage("set NAME FIELD VALUE"));
    };
    let value = value.trim();

    let patch = match field.to_lowercase().as_str() {
        "description" => EditPatch::default().description(value),
        "type" => EditPatch::default().event_type(value),
        "format" => EditPatch::default().format(value),
        "deprecated" => EditPatch::default().deprecated(parse_flag(value)?),
        other => {
            return Err(Error::InvalidCommand(format!(
                "unknown field '{other}', expected description, type, format or deprecated"
            )))
        }
    };
    Ok(BrowseCommand::Set {
        name: name.to_string(),
        patch,
    })
}

/// Parse a yes/no flag as typed by a user.
///
/// # Errors
///
/// Returns [`Error::InvalidCommand`] for anything but true/false/yes/no/on/off.
pub fn parse_flag(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "no" | "n" | "off" | "0" => Ok(false),
        other => Err(Error::InvalidCommand(format!(
            "expected true or false, got '{other}'"
        ))),
    }
}

/// Whether the session should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Stop.
    Quit,
}

/// View state for one browsing user.
#[derive(Debug)]
pub struct Browser {
    cache: QueryCache,
    filter: EventFilter,
    editors: BTreeMap<String, ItemEditor>,
}

impl Browser {
    /// Create a session with an empty filter.
    #[must_use]
    pub fn new(cache: QueryCache) -> Self {
        Self::with_filter(cache, EventFilter::new())
    }

    /// Create a session starting from `filter`.
    #[must_use]
    pub fn with_filter(cache: QueryCache, filter: EventFilter) -> Self {
        Self {
            cache,
            filter,
            editors: BTreeMap::new(),
        }
    }

    /// The current filter.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// The editor for `name`, if the event has been opened.
    #[must_use]
    pub fn editor(&self, name: &str) -> Option<&ItemEditor> {
        self.editors.get(name)
    }

    /// The cache this session reads through.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Fetch the events and push fresh copies into open editors.
    ///
    /// # Errors
    ///
    /// Returns the fetch error if there is no data to fall back on.
    pub async fn records(&mut self) -> Result<Arc<Vec<EventRecord>>> {
        let records = self.cache.fetch().await?;
        self.sync(&records);
        Ok(records)
    }

    fn sync(&mut self, records: &[EventRecord]) {
        for record in records {
            if let Some(editor) = self.editors.get_mut(&record.event_name) {
                if editor.record() != record {
                    editor.refresh(record.clone());
                }
            }
        }
    }

    /// Look up one event by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] if no event has that name.
    pub async fn find(&mut self, name: &str) -> Result<EventRecord> {
        let records = self.records().await?;
        find_record(&records, name).cloned()
    }

    async fn open(&mut self, name: &str) -> Result<&mut ItemEditor> {
        let records = self.records().await?;
        open_editor(&mut self.editors, &records, name)
    }

    fn opened(&mut self, name: &str) -> Result<&mut ItemEditor> {
        self.editors.get_mut(name).ok_or_else(|| Error::EventNotFound {
            name: name.to_string(),
        })
    }

    /// Apply `patch` and optional `tags` to an event and save it.
    ///
    /// Returns the record as stored after the save.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] for unknown names, and any
    /// transition, validation, or gateway error from the editor.
    pub async fn edit_and_save(
        &mut self,
        name: &str,
        patch: EditPatch,
        tags: Option<Vec<String>>,
    ) -> Result<EventRecord> {
        let cache = self.cache.clone();
        let editor = self.open(name).await?;
        editor.begin_edit()?;
        editor.update(patch)?;
        if let Some(tags) = tags {
            editor.set_tags(tags)?;
        }
        editor.save(&cache).await?;
        Ok(editor.record().clone())
    }

    /// Run one command, writing its output to `out`.
    ///
    /// # Errors
    ///
    /// Returns the first error the command hits. None of them end the session
    /// on their own; the caller decides.
    pub async fn execute<W: Write>(&mut self, command: BrowseCommand, out: &mut W) -> Result<Flow> {
        debug!(?command, "Executing browse command");
        match command {
            BrowseCommand::List => self.list(out).await?,
            BrowseCommand::Search(query) => {
                self.filter.set_query(query);
                self.list(out).await?;
            }
            BrowseCommand::Tag(tag) => {
                match self.filter.toggle_tag(&tag) {
                    Some(selected) => writeln!(out, "Tag filter: {selected}")?,
                    None => writeln!(out, "Tag filter cleared")?,
                }
                self.list(out).await?;
            }
            BrowseCommand::Tags => {
                let records = self.records().await?;
                render::tag_list(out, &distinct_tags(&records), self.filter.selected_tag(), false)?;
            }
            BrowseCommand::Show(name) => {
                let record = self.find(&name).await?;
                render::event_detail(out, &record, false)?;
                if let Some(editor) = self.editors.get(&name) {
                    if let Some(buffer) = editor.buffer() {
                        writeln!(out)?;
                        render::edit_buffer(out, buffer, editor.mode())?;
                    }
                }
            }
            BrowseCommand::Summary => {
                let records = self.records().await?;
                render::summary(out, &Summary::from_records(records.iter()), false)?;
            }
            BrowseCommand::Edit(name) => {
                let editor = self.open(&name).await?;
                let buffer = editor.begin_edit()?;
                render::edit_buffer(out, buffer, EditorMode::Editing)?;
            }
            BrowseCommand::Set { name, patch } => {
                let editor = self.opened(&name)?;
                editor.update(patch)?;
                show_buffer(out, editor)?;
            }
            BrowseCommand::Retag { name, tags } => {
                let editor = self.opened(&name)?;
                editor.set_tags(tags)?;
                show_buffer(out, editor)?;
            }
            BrowseCommand::Save(name) => {
                let cache = self.cache.clone();
                let editor = self.opened(&name)?;
                editor.save(&cache).await?;
                info!(event = %name, "Saved from browser");
                writeln!(out, "Saved {name}")?;
            }
            BrowseCommand::Cancel(name) => {
                self.opened(&name)?.cancel()?;
                writeln!(out, "Discarded changes to {name}")?;
            }
            BrowseCommand::Refresh => {
                let records = self.cache.refetch().await?;
                self.sync(&records);
                writeln!(out, "Loaded {} events", records.len())?;
            }
            BrowseCommand::Help => writeln!(out, "{HELP}")?,
            BrowseCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn list<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let records = self.records().await?;
        if let QueryState::Ready {
            last_error: Some(message),
            ..
        } = self.cache.state().await
        {
            writeln!(out, "warning: showing cached events, last refresh failed: {message}")?;
            self.cache.dismiss_error().await;
        }
        let visible = self.filter.apply(&records);
        render::event_list(out, &visible, records.len(), OutputFormat::Plain)
    }

    /// Read commands from `input` until it ends or `quit` is entered.
    ///
    /// Command failures are reported to `out` and the session carries on.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        prompt(out)?;
        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() {
                let outcome = match BrowseCommand::parse(&line) {
                    Ok(command) => self.execute(command, out).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(Flow::Quit) => return Ok(()),
                    Ok(Flow::Continue) => {}
                    Err(e @ Error::Io(_)) => return Err(e),
                    Err(e) => writeln!(out, "error: {e}")?,
                }
            }
            prompt(out)?;
        }
        Ok(())
    }
}

fn prompt<W: Write>(out: &mut W) -> Result<()> {
    write!(out, "{PROMPT}")?;
    out.flush()?;
    Ok(())
}

fn show_buffer<W: Write>(out: &mut W, editor: &ItemEditor) -> Result<()> {
    if let Some(buffer) = editor.buffer() {
        render::edit_buffer(out, buffer, editor.mode())?;
    }
    Ok(())
}

fn find_record<'a>(records: &'a [EventRecord], name: &str) -> Result<&'a EventRecord> {
    records
        .iter()
        .find(|r| r.event_name == name)
        .ok_or_else(|| Error::EventNotFound {
            name: name.to_string(),
        })
}

fn open_editor<'a>(
    editors: &'a mut BTreeMap<String, ItemEditor>,
    records: &[EventRecord],
    name: &str,
) -> Result<&'a mut ItemEditor> {
    if !editors.contains_key(name) {
        let record = find_record(records, name)?;
        editors.insert(name.to_string(), ItemEditor::new(record.clone()));
    }
    editors.get_mut(name).ok_or_else(|| Error::EventNotFound {
        name: name.to_string(),
    })
}

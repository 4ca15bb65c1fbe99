//! Per-record edit buffer with explicit commit and discard.
//!
//! An [`ItemEditor`] owns one record and moves between three modes:
//!
//! ```text
//!            begin_edit             begin_save
//! Viewing ──────────────► Editing ─────────────► Saving
//!    ▲                      │  ▲                   │
//!    │        cancel        │  │   save failed     │
//!    ├──────────────────────┘  └───────────────────┤
//!    │                  save succeeded             │
//!    └─────────────────────────────────────────────┘
//! ```
//!
//! The buffer is a snapshot taken when editing starts. Background refreshes of
//! the underlying record never reach it, and a failed or abandoned save hands it
//! back untouched.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::QueryCache;
use crate::error::{Error, Result};
use crate::record::{EventRecord, JsonText};

/// The editor's current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    /// Read-only display of the current record.
    Viewing,
    /// The buffer is live and accepts changes.
    Editing,
    /// The buffer has been sent to the gateway and is locked.
    Saving,
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Viewing => write!(f, "viewing"),
            Self::Editing => write!(f, "editing"),
            Self::Saving => write!(f, "saving"),
        }
    }
}

/// The editable fields of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditBuffer {
    event_name: String,
    /// Free-text documentation.
    pub description: String,
    /// Payload format as JSON text.
    pub format: String,
    /// Category label.
    pub event_type: String,
    /// Tags as JSON array text.
    pub tags: String,
    /// Deprecation flag.
    pub deprecated: bool,
}

impl EditBuffer {
    /// Seed a buffer from a record, filling in defaults for missing fields.
    #[must_use]
    pub fn from_record(record: &EventRecord) -> Self {
        fn text_or(value: Option<&JsonText>, default: &str) -> String {
            value
                .map(JsonText::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
                .to_string()
        }

        Self {
            event_name: record.event_name.clone(),
            description: record.description.clone().unwrap_or_default(),
            format: text_or(record.format.as_ref(), "{}"),
            event_type: record.event_type.clone().unwrap_or_default(),
            tags: text_or(record.tags.as_ref(), "[]"),
            deprecated: record.is_deprecated(),
        }
    }

    /// The name of the record being edited. Names are never edited.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// The buffered tags, or an empty list if the text is malformed.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.to_record().tags()
    }

    /// Merge the set fields of `patch` into the buffer.
    pub fn merge(&mut self, patch: EditPatch) {
        let EditPatch {
            description,
            format,
            event_type,
            deprecated,
        } = patch;
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(format) = format {
            self.format = format;
        }
        if let Some(event_type) = event_type {
            self.event_type = event_type;
        }
        if let Some(deprecated) = deprecated {
            self.deprecated = deprecated;
        }
    }

    /// Replace the tags with normalized copies of `tags`.
    ///
    /// Each tag is trimmed and lowercased; tags left empty are dropped.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: Vec<String> = tags
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        self.tags = JsonText::from_strings(&normalized).as_str().to_string();
    }

    /// Check the buffer before it is sent anywhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.event_name.is_empty() {
            return Err(Error::validation("eventName", "event name is required"));
        }

        if !self.format.is_empty() {
            JsonText::new(self.format.as_str())
                .parse("format")
                .map_err(|e| Error::validation("format", e.to_string()))?;
        }

        JsonText::new(self.tags.as_str())
            .string_list("tags")
            .map_err(|e| Error::validation("tags", e.to_string()))?;

        Ok(())
    }

    /// The record the buffer would be saved as.
    #[must_use]
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            event_name: self.event_name.clone(),
            description: Some(self.description.clone()),
            format: Some(JsonText::new(self.format.as_str())),
            event_type: Some(self.event_type.clone()),
            tags: Some(JsonText::new(self.tags.as_str())),
            deprecated: Some(self.deprecated),
        }
    }
}

/// A partial update to an [`EditBuffer`]. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPatch {
    /// New description.
    pub description: Option<String>,
    /// New format text.
    pub format: Option<String>,
    /// New type label.
    pub event_type: Option<String>,
    /// New deprecation flag.
    pub deprecated: Option<bool>,
}

impl EditPatch {
    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the format text.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the type label.
    #[must_use]
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Set the deprecation flag.
    #[must_use]
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    /// Check if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Viewing,
    Editing(EditBuffer),
    Saving(EditBuffer),
}

/// Edit-state machine for a single record.
#[derive(Debug, Clone)]
pub struct ItemEditor {
    record: EventRecord,
    state: State,
}

impl ItemEditor {
    /// Create an editor in viewing mode.
    #[must_use]
    pub fn new(record: EventRecord) -> Self {
        Self {
            record,
            state: State::Viewing,
        }
    }

    /// The underlying record as last fetched or saved.
    #[must_use]
    pub fn record(&self) -> &EventRecord {
        &self.record
    }

    /// The record's name.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.record.event_name
    }

    /// The current mode.
    #[must_use]
    pub fn mode(&self) -> EditorMode {
        match self.state {
            State::Viewing => EditorMode::Viewing,
            State::Editing(_) => EditorMode::Editing,
            State::Saving(_) => EditorMode::Saving,
        }
    }

    /// The edit buffer, while editing or saving.
    #[must_use]
    pub fn buffer(&self) -> Option<&EditBuffer> {
        match &self.state {
            State::Viewing => None,
            State::Editing(buffer) | State::Saving(buffer) => Some(buffer),
        }
    }

    /// Replace the underlying record with a freshly fetched copy.
    ///
    /// The edit buffer is not touched. Returns `false` and ignores the record
    /// if it has a different name.
    pub fn refresh(&mut self, record: EventRecord) -> bool {
        if record.event_name != self.record.event_name {
            warn!(
                expected = %self.record.event_name,
                got = %record.event_name,
                "Ignoring refresh for a different event"
            );
            return false;
        }
        self.record = record;
        true
    }

    /// Start editing, seeding the buffer from the current record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless the editor is viewing.
    pub fn begin_edit(&mut self) -> Result<&EditBuffer> {
        if self.state != State::Viewing {
            return Err(Error::InvalidTransition {
                from: self.mode(),
                action: "edit",
            });
        }
        debug!(event = %self.record.event_name, "Editing");
        self.state = State::Editing(EditBuffer::from_record(&self.record));
        self.buffer()
            .ok_or_else(|| Error::internal("edit buffer missing after begin_edit"))
    }

    fn buffer_mut(&mut self, action: &'static str) -> Result<&mut EditBuffer> {
        match &mut self.state {
            State::Editing(buffer) => Ok(buffer),
            State::Saving(_) => Err(Error::SaveInProgress),
            State::Viewing => Err(Error::InvalidTransition {
                from: EditorMode::Viewing,
                action,
            }),
        }
    }

    /// Merge a partial update into the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SaveInProgress`] while saving and
    /// [`Error::InvalidTransition`] while viewing.
    pub fn update(&mut self, patch: EditPatch) -> Result<()> {
        self.buffer_mut("update")?.merge(patch);
        Ok(())
    }

    /// Replace the buffered tags, normalizing each one.
    ///
    /// # Errors
    ///
    /// Fails in the same states as [`ItemEditor::update`].
    pub fn set_tags<I, S>(&mut self, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.buffer_mut("set tags")?.set_tags(tags);
        Ok(())
    }

    /// Discard the buffer and return to viewing. Nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SaveInProgress`] while saving and
    /// [`Error::InvalidTransition`] while viewing.
    pub fn cancel(&mut self) -> Result<()> {
        self.buffer_mut("cancel")?;
        debug!(event = %self.record.event_name, "Edit cancelled");
        self.state = State::Viewing;
        Ok(())
    }

    /// Validate the buffer and lock it for saving.
    ///
    /// Returns the record to send. A validation failure leaves the editor in
    /// editing mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid buffer,
    /// [`Error::SaveInProgress`] if a save is already running, and
    /// [`Error::InvalidTransition`] while viewing.
    pub fn begin_save(&mut self) -> Result<EventRecord> {
        let record = {
            let buffer = self.buffer_mut("save")?;
            buffer.validate()?;
            buffer.to_record()
        };
        if let State::Editing(buffer) = std::mem::replace(&mut self.state, State::Viewing) {
            self.state = State::Saving(buffer);
        }
        Ok(record)
    }

    /// Apply the outcome of a save started with [`ItemEditor::begin_save`].
    ///
    /// On success the editor returns to viewing and the underlying record takes
    /// the saved values. On failure it returns to editing with the buffer as it
    /// was, and the error is passed back.
    ///
    /// # Errors
    ///
    /// Returns the save error, or [`Error::InvalidTransition`] if no save was
    /// in progress.
    pub fn finish_save(&mut self, outcome: Result<()>) -> Result<()> {
        if self.mode() != EditorMode::Saving {
            return Err(Error::InvalidTransition {
                from: self.mode(),
                action: "finish saving",
            });
        }
        let State::Saving(buffer) = std::mem::replace(&mut self.state, State::Viewing) else {
            return Err(Error::internal("editor left saving mode unexpectedly"));
        };

        match outcome {
            Ok(()) => {
                info!(event = %self.record.event_name, "Saved event documentation");
                self.record = buffer.to_record();
                Ok(())
            }
            Err(e) => {
                warn!(event = %self.record.event_name, error = %e, "Save failed; keeping edits");
                self.state = State::Editing(buffer);
                Err(e)
            }
        }
    }

    /// Save the buffer through the cache's gateway, then refresh the catalog.
    ///
    /// The refresh is only issued after the save has succeeded. A failed
    /// refresh is logged; the save itself still counts as done. If the returned
    /// future is dropped before the gateway answers, the editor goes back to
    /// editing with the buffer intact.
    ///
    /// # Errors
    ///
    /// Returns the validation or gateway error that stopped the save. The
    /// editor is then back in editing mode with the buffer unchanged.
    pub async fn save(&mut self, cache: &QueryCache) -> Result<()> {
        let record = self.begin_save()?;
        let mut pending = PendingSave {
            editor: self,
            armed: true,
        };
        let outcome = cache.gateway().save_event(&record).await;
        pending.armed = false;
        let editor = &mut *pending.editor;
        editor.finish_save(outcome)?;

        match cache.refetch().await {
            Ok(records) => {
                if let Some(fresh) = records
                    .iter()
                    .find(|r| r.event_name == editor.record.event_name)
                {
                    editor.refresh(fresh.clone());
                }
            }
            Err(e) => {
                warn!(event = %editor.record.event_name, error = %e, "Saved, but refreshing events failed");
            }
        }
        Ok(())
    }

    fn abandon_save(&mut self) {
        if let State::Saving(buffer) = std::mem::replace(&mut self.state, State::Viewing) {
            warn!(event = %self.record.event_name, "Save abandoned before it finished; keeping edits");
            self.state = State::Editing(buffer);
        }
    }
}

/// Unlocks the buffer if a save is dropped while the request is in flight.
struct PendingSave<'a> {
    editor: &'a mut ItemEditor,
    armed: bool,
}

impl Drop for PendingSave<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.editor.abandon_save();
        }
    }
}

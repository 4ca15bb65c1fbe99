//! Core record types for eventdoc.
//!
//! An [`EventRecord`] is one row of the catalog: the documentation for a single
//! named analytics event. Two of its fields, `format` and `tags`, hold JSON that
//! is stored as text and is not guaranteed to be well-formed, so they are
//! wrapped in [`JsonText`] and every read goes through a parse-with-fallback.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// JSON carried as text.
///
/// The wrapped string is kept verbatim; parsing happens on demand and may fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JsonText(String);

impl JsonText {
    /// Wrap the given text without validating it.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The raw text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the text as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] naming `field` if the text is not valid JSON.
    pub fn parse(&self, field: &'static str) -> Result<Value> {
        serde_json::from_str(&self.0).map_err(|e| Error::Parse {
            field,
            message: e.to_string(),
        })
    }

    /// Pretty-print the text with two-space indentation.
    ///
    /// Falls back to the raw text when it is not valid JSON, and to an empty
    /// string when there is nothing to print.
    #[must_use]
    pub fn pretty(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        match self
            .parse("format")
            .and_then(|value| serde_json::to_string_pretty(&value).map_err(Error::from))
        {
            Ok(pretty) => pretty,
            Err(e) => {
                debug!(error = %e, "Showing JSON text verbatim");
                self.0.clone()
            }
        }
    }

    /// Parse the text as a flat list of strings.
    ///
    /// Non-string array items are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the text is not valid JSON or not an array.
    pub fn string_list(&self, field: &'static str) -> Result<Vec<String>> {
        match self.parse(field)? {
            Value::Array(items) => {
                let total = items.len();
                let strings: Vec<String> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect();
                if strings.len() != total {
                    debug!(
                        field,
                        dropped = total - strings.len(),
                        "Dropped non-string items from JSON array"
                    );
                }
                Ok(strings)
            }
            other => Err(Error::Parse {
                field,
                message: format!("expected an array, found {}", json_kind(&other)),
            }),
        }
    }

    /// Encode a list of strings as JSON array text.
    #[must_use]
    pub fn from_strings(items: &[String]) -> Self {
        // Serializing a slice of strings cannot fail.
        Self(serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string()))
    }
}

impl fmt::Display for JsonText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JsonText {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for JsonText {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

// Accept both the documented text form and a structured JSON value, since a
// backend reading a JSON column may hand either back.
impl<'de> Deserialize<'de> for JsonText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Self(s),
            other => Self(other.to_string()),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One catalog entry describing an analytics event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Unique, immutable event name.
    pub event_name: String,

    /// Free-text documentation. Empty or absent means undocumented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Payload schema or example, as JSON text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<JsonText>,

    /// Category label, usually `Clientside` or `Serverside`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Lowercase tags, as JSON array text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<JsonText>,

    /// Marks the event as legacy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

impl EventRecord {
    /// Create a record with only a name set.
    #[must_use]
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            description: None,
            format: None,
            event_type: None,
            tags: None,
            deprecated: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the format text.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<JsonText>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the type label.
    #[must_use]
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Set the raw tags text.
    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<JsonText>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Set the deprecation flag.
    #[must_use]
    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    /// Check that the record can be addressed by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `event_name` is empty.
    pub fn ensure_named(&self) -> Result<()> {
        if self.event_name.is_empty() {
            return Err(Error::validation("eventName", "event name is required"));
        }
        Ok(())
    }

    /// Check if the record has a non-empty description.
    #[must_use]
    pub fn is_documented(&self) -> bool {
        self.description.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Check if the record is marked deprecated.
    #[must_use]
    pub fn is_deprecated(&self) -> bool {
        self.deprecated.unwrap_or(false)
    }

    /// Check if the record should be flagged as missing documentation.
    ///
    /// Deprecated records are never flagged.
    #[must_use]
    pub fn needs_documentation(&self) -> bool {
        !self.is_documented() && !self.is_deprecated()
    }

    /// The parsed tags, or an empty list when absent or malformed.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let Some(text) = self.tags.as_ref().filter(|t| !t.is_empty()) else {
            return Vec::new();
        };
        match text.string_list("tags") {
            Ok(tags) => tags,
            Err(e) => {
                warn!(event = %self.event_name, error = %e, "Ignoring malformed tags");
                Vec::new()
            }
        }
    }

    /// Check if the parsed tags contain `tag` exactly.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    /// The format pretty-printed, or verbatim if it is not valid JSON.
    #[must_use]
    pub fn pretty_format(&self) -> String {
        self.format.as_ref().map(JsonText::pretty).unwrap_or_default()
    }
}

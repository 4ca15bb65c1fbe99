//! Name search and tag filtering over the catalog.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::trace;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::record::EventRecord;

/// Filter deriving the visible records from a name query and a selected tag.
///
/// The name query matches case-insensitively anywhere in the event name. The
/// tag is a single-select facet matched exactly against the parsed tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    query: String,
    selected_tag: Option<String>,
}

impl EventFilter {
    /// Create a filter that matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name query.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.set_query(query);
        self
    }

    /// Select a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.selected_tag = (!tag.is_empty()).then_some(tag);
        self
    }

    /// The current name query.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The selected tag, if any.
    #[must_use]
    pub fn selected_tag(&self) -> Option<&str> {
        self.selected_tag.as_deref()
    }

    /// Replace the name query.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Select `tag`, or clear the selection if `tag` is already selected.
    ///
    /// Returns the selection after the toggle.
    pub fn toggle_tag(&mut self, tag: &str) -> Option<&str> {
        if tag.is_empty() || self.selected_tag.as_deref() == Some(tag) {
            self.selected_tag = None;
        } else {
            self.selected_tag = Some(tag.to_string());
        }
        self.selected_tag.as_deref()
    }

    /// Reset both the query and the tag selection.
    pub fn clear(&mut self) {
        self.query.clear();
        self.selected_tag = None;
    }

    /// Check if the filter restricts anything.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.query.is_empty() || self.selected_tag.is_some()
    }

    /// Check if a single record passes both predicates.
    #[must_use]
    pub fn matches(&self, record: &EventRecord) -> bool {
        name_matches(&record.event_name, &self.query.to_lowercase()) && self.tag_matches(record)
    }

    fn tag_matches(&self, record: &EventRecord) -> bool {
        match &self.selected_tag {
            None => true,
            // Malformed tags parse to nothing, so such records drop out here
            Some(tag) => record.has_tag(tag),
        }
    }

    /// The records passing the filter, ordered by event name.
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [EventRecord]) -> Vec<&'a EventRecord> {
        let query = self.query.to_lowercase();
        let mut visible: Vec<&EventRecord> = records
            .iter()
            .filter(|r| name_matches(&r.event_name, &query) && self.tag_matches(r))
            .collect();
        visible.sort_by(|a, b| compare_names(&a.event_name, &b.event_name));

        trace!(
            query = %self.query,
            tag = ?self.selected_tag,
            visible = visible.len(),
            total = records.len(),
            "Applied filter"
        );
        visible
    }
}

fn name_matches(name: &str, lowercase_query: &str) -> bool {
    lowercase_query.is_empty() || name.to_lowercase().contains(lowercase_query)
}

/// Every tag used by any record, deduplicated and sorted.
///
/// Records with missing or malformed tags contribute nothing.
#[must_use]
pub fn distinct_tags(records: &[EventRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(EventRecord::tags)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Compare event names the way a human-facing listing orders them.
///
/// Punctuation sorts before digits and digits before letters. Letters compare
/// by base letter first, ignoring case and accents, so "éclair" sorts next to
/// "eclair" rather than after "zoom". Ties break on accents, then lowercase
/// before uppercase, then by code point, so the order is total.
#[must_use]
pub fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| a.chars().map(primary_key).cmp(b.chars().map(primary_key)))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

fn base_letters(name: &str) -> impl Iterator<Item = (u8, char)> + '_ {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(primary_key)
}

fn primary_key(c: char) -> (u8, char) {
    let class = if c.is_alphabetic() {
        2
    } else if c.is_numeric() {
        1
    } else {
        0
    };
    (class, c.to_lowercase().next().unwrap_or(c))
}

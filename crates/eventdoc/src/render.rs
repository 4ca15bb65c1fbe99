//! Text views of the catalog.
//!
//! Every view writes to a caller-supplied writer, so the one-shot commands and
//! the interactive browser share them.

use std::io::Write;

use crate::browse::{EditBuffer, EditorMode, Summary};
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::record::{EventRecord, JsonText};

/// Shown when the catalog itself is empty.
pub const NO_EVENTS: &str = "No events found";

/// Shown when the catalog has events but the filter hides all of them.
pub const NO_MATCHES: &str = "No events match your search criteria";

/// Placeholder for a missing type, description or format.
pub const UNDOCUMENTED: &str = "Undocumented";

/// Placeholder for an empty tag list.
pub const NO_TAGS: &str = "No tags";

const DEPRECATED_NOTICE: &str = "This event is deprecated and should not be used in new code.";

const MARKER_WIDTH: usize = 1;
const NAME_WIDTH: usize = 40;
const TYPE_WIDTH: usize = 12;
const TAGS_WIDTH: usize = 30;

/// Write the visible records as a list.
///
/// `total` is the size of the unfiltered catalog and picks the empty-state
/// message.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn event_list<W: Write>(
    out: &mut W,
    visible: &[&EventRecord],
    total: usize,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, visible)?;
        writeln!(out)?;
        return Ok(());
    }

    if visible.is_empty() {
        let message = if total == 0 { NO_EVENTS } else { NO_MATCHES };
        writeln!(out, "{message}")?;
        return Ok(());
    }

    if format == OutputFormat::Table {
        table_row(
            out,
            &[
                ("", MARKER_WIDTH),
                ("NAME", NAME_WIDTH),
                ("TYPE", TYPE_WIDTH),
                ("TAGS", TAGS_WIDTH),
            ],
        )?;
        for record in visible {
            let tags = record.tags().join(", ");
            table_row(
                out,
                &[
                    (marker(record), MARKER_WIDTH),
                    (&record.event_name, NAME_WIDTH),
                    (record.event_type.as_deref().unwrap_or(""), TYPE_WIDTH),
                    (&tags, TAGS_WIDTH),
                ],
            )?;
        }
    } else {
        for record in visible {
            writeln!(out, "{}", list_row(record))?;
        }
    }

    if visible.len() != total {
        writeln!(out, "({} of {} events)", visible.len(), total)?;
    }
    Ok(())
}

/// One line of the plain list: missing-docs marker, name, type badge.
#[must_use]
pub fn list_row(record: &EventRecord) -> String {
    let mut row = format!("{} {}", marker(record), record.event_name);
    if let Some(event_type) = record.event_type.as_deref().filter(|t| !t.is_empty()) {
        row.push_str(&format!(" [{event_type}]"));
    }
    if record.is_deprecated() {
        row.push_str(" (deprecated)");
    }
    row
}

fn marker(record: &EventRecord) -> &'static str {
    if record.needs_documentation() {
        "!"
    } else {
        " "
    }
}

/// Write the full documentation of one record.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn event_detail<W: Write>(out: &mut W, record: &EventRecord, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, record)?;
        writeln!(out)?;
        return Ok(());
    }

    if record.is_deprecated() {
        writeln!(out, "{DEPRECATED_NOTICE}")?;
        writeln!(out)?;
    }

    field(out, "Event", &record.event_name)?;
    field(out, "Type", or_undocumented(record.event_type.as_deref()))?;
    field(out, "Description", or_undocumented(record.description.as_deref()))?;

    let mut tags = record.tags();
    tags.sort();
    if tags.is_empty() {
        field(out, "Tags", NO_TAGS)?;
    } else {
        field(out, "Tags", &tags.join(", "))?;
    }

    let format = record.pretty_format();
    if format.is_empty() {
        field(out, "Format", UNDOCUMENTED)
    } else {
        block(out, "Format", &format)
    }
}

fn or_undocumented(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(UNDOCUMENTED)
}

/// Write the edit buffer of a record being edited.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn edit_buffer<W: Write>(out: &mut W, buffer: &EditBuffer, mode: EditorMode) -> Result<()> {
    writeln!(out, "{} ({mode})", buffer.event_name())?;
    field(out, "Description", &buffer.description)?;
    field(out, "Type", &buffer.event_type)?;
    field(out, "Deprecated", if buffer.deprecated { "yes" } else { "no" })?;
    field(out, "Tags", &buffer.tags)?;
    block(out, "Format", &JsonText::new(buffer.format.as_str()).pretty())
}

/// Write the distinct tags, marking the selected one.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn tag_list<W: Write>(
    out: &mut W,
    tags: &[String],
    selected: Option<&str>,
    json: bool,
) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, tags)?;
        writeln!(out)?;
        return Ok(());
    }

    if tags.is_empty() {
        writeln!(out, "{NO_TAGS}")?;
        return Ok(());
    }
    for tag in tags {
        let mark = if selected == Some(tag.as_str()) { '*' } else { ' ' };
        writeln!(out, "{mark} {tag}")?;
    }
    Ok(())
}

/// Write the documentation coverage counts.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn summary<W: Write>(out: &mut W, summary: &Summary, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, summary)?;
        writeln!(out)?;
        return Ok(());
    }

    for (label, value) in summary.headline() {
        field(out, label, &value.to_string())?;
    }
    field(out, "Deprecated", &summary.deprecated.to_string())?;
    field(out, "Missing docs", &summary.missing_docs.to_string())
}

fn field<W: Write>(out: &mut W, label: &str, value: &str) -> Result<()> {
    writeln!(out, "{:<14} {}", format!("{label}:"), value)?;
    Ok(())
}

fn block<W: Write>(out: &mut W, label: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        return field(out, label, "");
    }
    writeln!(out, "{label}:")?;
    for line in text.lines() {
        writeln!(out, "  {line}")?;
    }
    Ok(())
}

fn table_row<W: Write>(out: &mut W, cells: &[(&str, usize)]) -> Result<()> {
    let row = cells
        .iter()
        .map(|(value, width)| format!("{:<width$}", truncate(value, *width), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", row.trim_end())?;
    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn cart() -> EventRecord {
        EventRecord::new("add_to_cart")
            .with_description("Product added")
            .with_type("Clientside")
            .with_format(r#"{"sku":"string"}"#)
            .with_tags(r#"["product","cart"]"#)
    }

    #[test]
    fn test_list_row_markers() {
        assert_eq!(list_row(&cart()), "  add_to_cart [Clientside]");
        assert_eq!(list_row(&EventRecord::new("todo")), "! todo");
        assert_eq!(
            list_row(&EventRecord::new("old").with_deprecated(true)),
            "  old (deprecated)"
        );
    }

    #[test]
    fn test_empty_catalog_message() {
        let text = render(|out| event_list(out, &[], 0, OutputFormat::Plain));
        assert_eq!(text.trim(), NO_EVENTS);
    }

    #[test]
    fn test_no_matches_message() {
        let text = render(|out| event_list(out, &[], 3, OutputFormat::Table));
        assert_eq!(text.trim(), NO_MATCHES);
    }

    #[test]
    fn test_filtered_list_shows_count() {
        let record = cart();
        let text = render(|out| event_list(out, &[&record], 4, OutputFormat::Plain));
        assert!(text.contains("add_to_cart"));
        assert!(text.contains("(1 of 4 events)"));
    }

    #[test]
    fn test_table_list() {
        let long = EventRecord::new("x".repeat(60));
        let record = cart();
        let text = render(|out| event_list(out, &[&record, &long], 2, OutputFormat::Table));
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("NAME"));
        assert!(lines[1].contains("product, cart"));
        assert!(lines[2].starts_with('!'));
        assert!(lines[2].contains("..."));
    }

    #[test]
    fn test_json_list() {
        let record = cart();
        let text = render(|out| event_list(out, &[&record], 1, OutputFormat::Json));
        let parsed: Vec<EventRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec![cart()]);
    }

    #[test]
    fn test_detail_placeholders() {
        let text = render(|out| event_detail(out, &EventRecord::new("bare"), false));
        assert!(text.contains("Type:          Undocumented\n"));
        assert!(text.contains("Description:   Undocumented\n"));
        assert!(text.contains("Format:        Undocumented\n"));
        assert_eq!(text.matches(UNDOCUMENTED).count(), 3);
        assert!(text.contains(NO_TAGS));
        assert!(!text.contains("deprecated"));
    }

    #[test]
    fn test_detail_empty_type_and_format_are_undocumented() {
        let record = EventRecord::new("blank")
            .with_type("")
            .with_format("")
            .with_description("Has a description");
        let text = render(|out| event_detail(out, &record, false));
        assert!(text.contains("Type:          Undocumented\n"));
        assert!(text.contains("Format:        Undocumented\n"));
        assert_eq!(text.matches(UNDOCUMENTED).count(), 2);
    }

    #[test]
    fn test_detail_sorts_tags_and_pretty_prints_format() {
        let text = render(|out| event_detail(out, &cart(), false));
        assert!(text.contains("cart, product"));
        assert!(text.contains("  {\n    \"sku\": \"string\"\n  }"));
    }

    #[test]
    fn test_detail_deprecated_notice() {
        let record = cart().with_deprecated(true);
        let text = render(|out| event_detail(out, &record, false));
        assert!(text.starts_with(DEPRECATED_NOTICE));
    }

    #[test]
    fn test_detail_raw_format_fallback() {
        let record = EventRecord::new("broken").with_format("{oops");
        let text = render(|out| event_detail(out, &record, false));
        assert!(text.contains("  {oops"));
    }

    #[test]
    fn test_tag_list_marks_selection() {
        let tags = vec!["cart".to_string(), "auth".to_string()];
        let text = render(|out| tag_list(out, &tags, Some("auth"), false));
        assert_eq!(text, "  cart\n* auth\n");
    }

    #[test]
    fn test_tag_list_empty() {
        let text = render(|out| tag_list(out, &[], None, false));
        assert_eq!(text.trim(), NO_TAGS);
    }

    #[test]
    fn test_summary_text() {
        let records = vec![cart(), EventRecord::new("todo")];
        let counts = Summary::from_records(&records);
        let text = render(|out| summary(out, &counts, false));

        assert!(text.contains("Undocumented:  1"));
        assert!(text.contains("Documented:    1"));
        assert!(text.contains("Total events:  2"));
    }

    #[test]
    fn test_summary_json() {
        let counts = Summary::from_records(&[cart()]);
        let text = render(|out| summary(out, &counts, true));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["documented"], 1);
        assert_eq!(value["total"], 1);
    }

    #[test]
    fn test_edit_buffer_view() {
        let buffer = EditBuffer::from_record(&cart());
        let text = render(|out| edit_buffer(out, &buffer, EditorMode::Editing));
        assert!(text.starts_with("add_to_cart (editing)"));
        assert!(text.contains("Deprecated:    no"));
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}

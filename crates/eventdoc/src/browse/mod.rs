//! Browsing logic for the event catalog.
//!
//! This module holds the parts of the browsing UI that carry real logic:
//!
//! - **Filtering**: name search plus a single-select tag facet, and the list of
//!   distinct tags to choose from.
//!
//! - **Editing**: a per-record state machine with a snapshot edit buffer,
//!   explicit save and cancel.
//!
//! - **Summary**: documented/undocumented/total counts.
//!
//! # Example
//!
//! ```
//! use eventdoc::browse::{distinct_tags, EventFilter, Summary};
//! use eventdoc::EventRecord;
//!
//! let records = vec![
//!     EventRecord::new("b_event").with_tags(r#"["x"]"#),
//!     EventRecord::new("a_event").with_description("d").with_tags(r#"["y","x"]"#),
//! ];
//!
//! assert_eq!(distinct_tags(&records), vec!["x", "y"]);
//!
//! let mut filter = EventFilter::new();
//! filter.toggle_tag("x");
//! let visible: Vec<_> = filter.apply(&records).iter().map(|r| r.event_name.as_str()).collect();
//! assert_eq!(visible, vec!["a_event", "b_event"]);
//!
//! let summary = Summary::from_records(&records);
//! assert_eq!((summary.documented, summary.undocumented, summary.total), (1, 1, 2));
//! ```

mod editor;
mod filter;
mod summary;

pub use editor::{EditBuffer, EditPatch, EditorMode, ItemEditor};
pub use filter::{compare_names, distinct_tags, EventFilter};
pub use summary::Summary;

//! Documentation coverage counts.

use serde::Serialize;

use crate::record::EventRecord;

/// Counts derived from a set of records.
///
/// `documented + undocumented == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Records with an empty or absent description.
    pub undocumented: usize,
    /// Records with a non-empty description.
    pub documented: usize,
    /// All records.
    pub total: usize,
    /// Records marked deprecated.
    pub deprecated: usize,
    /// Undocumented records that are not deprecated.
    pub missing_docs: usize,
}

impl Summary {
    /// Count the given records.
    #[must_use]
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut summary, record| {
            summary.total += 1;
            if record.is_documented() {
                summary.documented += 1;
            } else {
                summary.undocumented += 1;
            }
            if record.is_deprecated() {
                summary.deprecated += 1;
            }
            if record.needs_documentation() {
                summary.missing_docs += 1;
            }
            summary
        })
    }

    /// The headline figures as labelled pairs, in display order.
    #[must_use]
    pub fn headline(&self) -> [(&'static str, usize); 3] {
        [
            ("Undocumented", self.undocumented),
            ("Documented", self.documented),
            ("Total events", self.total),
        ]
    }
}

//! Revision and comment records.
//!
//! Both are produced by the engine, one per applied edit, and carry
//! everything the markup writers need: ids, attribution and text.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Format a timestamp the way Word writes `w:date`: UTC, whole seconds,
/// `Z` suffix (`2024-05-01T08:30:00Z`).
#[must_use]
pub fn word_date(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// A tracked substitution: one delete block and, unless the replacement is
/// empty, one insert block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// `w:id` of the delete block.
    pub id: u32,
    /// `w:id` of the insert block (`id + insert_id_stride`).
    pub insert_id: u32,
    /// Text removed from the paragraph.
    pub original: String,
    /// Text inserted in its place. Empty for a pure deletion.
    pub replacement: String,
    /// `w:author` on both blocks.
    pub author: String,
    /// `w:date` on both blocks.
    pub timestamp: DateTime<FixedOffset>,
}

impl Revision {
    /// `true` when the revision has an insert block.
    #[must_use]
    pub fn has_insert(&self) -> bool {
        !self.replacement.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A review comment record (`w:comment`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// `w:id`, shared with the anchor markers in the document.
    pub id: u32,
    /// `w:author`.
    pub author: String,
    /// `w:initials`.
    pub initials: String,
    /// `w:date`.
    pub timestamp: DateTime<FixedOffset>,
    /// Body text. Newlines become line breaks.
    pub body: String,
}

//! The edit list.
//!
//! An [`Edit`] names a paragraph, the exact text to act on, and what to do
//! with it. Two flags are independent:
//!
//! - a `replacement_text` (possibly empty) asks for a tracked substitution;
//! - a non-empty `comment_body` asks for a review comment on the same span.
//!
//! The JSON form accepted by [`EditList::from_json`]:
//!
//! ```json
//! [
//!   {
//!     "paragraph_index": 2,
//!     "original_text": "计算器科学",
//!     "replacement_text": "计算机科学",
//!     "comment_body": "错别字：应为计算机科学",
//!     "author": "Reviewer",
//!     "timestamp": "2024-05-01T08:30:00Z",
//!     "occurrence": 0
//!   }
//! ]
//! ```

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One requested annotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edit {
    /// Zero-based paragraph number, counted the way the configured
    /// paragraph scope counts.
    pub paragraph_index: u32,
    /// Text to locate in the paragraph.
    pub original_text: String,
    /// Replacement for a tracked substitution. `Some("")` deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_text: Option<String>,
    /// Comment body. Empty or absent means no comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_body: Option<String>,
    /// Author override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Timestamp override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Which editable occurrence of `original_text` to use (0 = first).
    #[serde(default)]
    pub occurrence: usize,
}

impl Edit {
    /// A tracked substitution with no comment.
    pub fn revision(
        paragraph_index: u32,
        original_text: impl Into<String>,
        replacement_text: impl Into<String>,
    ) -> Self {
        Self {
            paragraph_index,
            original_text: original_text.into(),
            replacement_text: Some(replacement_text.into()),
            comment_body: None,
            author: None,
            timestamp: None,
            occurrence: 0,
        }
    }

    /// A comment with no substitution.
    pub fn comment(
        paragraph_index: u32,
        original_text: impl Into<String>,
        comment_body: impl Into<String>,
    ) -> Self {
        Self {
            paragraph_index,
            original_text: original_text.into(),
            replacement_text: None,
            comment_body: Some(comment_body.into()),
            author: None,
            timestamp: None,
            occurrence: 0,
        }
    }

    /// Attach a comment body.
    #[must_use]
    pub fn with_comment(mut self, body: impl Into<String>) -> Self {
        self.comment_body = Some(body.into());
        self
    }

    /// Override the author.
    #[must_use]
    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Target the `n`-th editable occurrence instead of the first.
    #[must_use]
    pub const fn nth(mut self, occurrence: usize) -> Self {
        self.occurrence = occurrence;
        self
    }

    /// A replacement was supplied.
    #[must_use]
    pub const fn wants_revision(&self) -> bool {
        self.replacement_text.is_some()
    }

    /// A non-empty comment body was supplied.
    #[must_use]
    pub fn wants_comment(&self) -> bool {
        self.comment_body.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// An ordered list of edits, applied in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditList(pub Vec<Edit>);

impl EditList {
    /// Decode a JSON array of edits.
    ///
    /// # Errors
    /// [`EngineError::InvalidEditList`] if the JSON is malformed, a field has
    /// the wrong type, or an unknown field is present.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The edits as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Edit] {
        &self.0
    }

    /// Number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` if there are no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Edit>> for EditList {
    fn from(edits: Vec<Edit>) -> Self {
        Self(edits)
    }
}

//! What a build hands back besides the package: per-edit diagnostics and a
//! summary.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Why an edit was skipped or only partly applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The original text does not occur in the paragraph.
    SpanNotFound,
    /// The text occurs but cannot be edited (inside an existing revision,
    /// hyperlink or field), or the target is empty.
    InvalidSpan {
        /// What made every occurrence unusable.
        reason: String,
    },
    /// `paragraph_index` is past the last addressable paragraph.
    ParagraphNotFound {
        /// Number of addressable paragraphs.
        available: usize,
    },
    /// Text the edit would write contains a character XML 1.0 cannot carry.
    EncodingError {
        /// Which text was rejected.
        field: String,
        /// The first rejected character.
        character: char,
    },
    /// The edit has neither a replacement nor a comment.
    NothingToApply,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpanNotFound => write!(f, "text not found in paragraph"),
            Self::InvalidSpan { reason } => write!(f, "span cannot be edited: {reason}"),
            Self::ParagraphNotFound { available } => {
                write!(f, "paragraph out of range ({available} addressable)")
            }
            Self::EncodingError { field, character } => {
                write!(f, "{field} contains U+{:04X}", u32::from(*character))
            }
            Self::NothingToApply => write!(f, "edit has no replacement and no comment"),
        }
    }
}

/// One per-edit problem. The build carries on after recording it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Position of the edit in the input list.
    pub edit_index: usize,
    /// The edit's paragraph index.
    pub paragraph_index: u32,
    /// The edit's original text.
    pub original_text: String,
    /// What went wrong.
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "edit #{} (paragraph {}, {:?}): {}",
            self.edit_index, self.paragraph_index, self.original_text, self.kind
        )
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Summary of a build.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Edits in the input list.
    pub edits_total: usize,
    /// Edits that changed the document (a revision, a comment or both).
    pub edits_applied: usize,
    /// Revisions written.
    pub revisions: usize,
    /// Comments written.
    pub comments: usize,
    /// The main document part.
    pub document_part: String,
    /// The comments part, if one was written or already present.
    pub comments_part: Option<String>,
    /// `true` if `w:trackRevisions` was ensured in the settings part.
    pub track_revisions: bool,
}

/// Result of [`Engine::apply`](super::Engine::apply).
#[derive(Clone, Debug)]
pub struct BuildOutput {
    /// The rebuilt package.
    pub package: Vec<u8>,
    /// Per-edit diagnostics, in edit order.
    pub diagnostics: Vec<Diagnostic>,
    /// Build summary.
    pub report: BuildReport,
}

impl BuildOutput {
    /// `true` if every edit applied cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            edit_index: 2,
            paragraph_index: 7,
            original_text: "数据".to_owned(),
            kind: DiagnosticKind::ParagraphNotFound { available: 3 },
        };
        assert_eq!(d.to_string(), "edit #2 (paragraph 7, \"数据\"): paragraph out of range (3 addressable)");
    }

    #[test]
    fn diagnostic_serializes_flat() {
        let d = Diagnostic {
            edit_index: 0,
            paragraph_index: 1,
            original_text: "x".to_owned(),
            kind: DiagnosticKind::EncodingError {
                field: "comment body".to_owned(),
                character: '\u{1}',
            },
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "encoding_error");
        assert_eq!(json["field"], "comment body");
        assert_eq!(json["edit_index"], 0);
    }
}

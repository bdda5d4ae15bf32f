//! Structured comment bodies.
//!
//! With `review.compose_notes` enabled, the engine replaces a bare comment
//! body with a short note describing the edit:
//!
//! ```text
//! Revision: 计算器科学 → 计算机科学
//! Reason: 错别字
//! Type: typo fix
//! ```

use std::fmt;

/// How a substitution changes the text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EditKind {
    /// Same length, at most half of the characters differ.
    TypoFix,
    /// The replacement is shorter.
    Simplification,
    /// The replacement is longer.
    Expansion,
    /// Same length, mostly different characters.
    Rewording,
    /// The replacement is empty.
    Deletion,
}

impl EditKind {
    /// Classify replacing `original` with `replacement`. Lengths are counted
    /// in characters.
    #[must_use]
    pub fn classify(original: &str, replacement: &str) -> Self {
        let before = original.chars().count();
        let after = replacement.chars().count();
        if after == 0 {
            return Self::Deletion;
        }
        match after.cmp(&before) {
            std::cmp::Ordering::Less => Self::Simplification,
            std::cmp::Ordering::Greater => Self::Expansion,
            std::cmp::Ordering::Equal => {
                let differing = original
                    .chars()
                    .zip(replacement.chars())
                    .filter(|(a, b)| a != b)
                    .count();
                if differing * 2 <= before {
                    Self::TypoFix
                } else {
                    Self::Rewording
                }
            }
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypoFix => write!(f, "typo fix"),
            Self::Simplification => write!(f, "simplification"),
            Self::Expansion => write!(f, "expansion"),
            Self::Rewording => write!(f, "rewording"),
            Self::Deletion => write!(f, "deletion"),
        }
    }
}

/// Compose a note for an edit. Without a replacement the note only quotes
/// the text and the reason.
#[must_use]
pub fn compose_note(original: &str, replacement: Option<&str>, reason: &str) -> String {
    let mut note = String::new();
    match replacement {
        Some(replacement) => {
            note.push_str(&format!("Revision: {original} → {replacement}\n"));
            if !reason.is_empty() {
                note.push_str(&format!("Reason: {reason}\n"));
            }
            note.push_str(&format!("Type: {}", EditKind::classify(original, replacement)));
        }
        None => {
            note.push_str(&format!("Text: {original}"));
            if !reason.is_empty() {
                note.push_str(&format!("\nNote: {reason}"));
            }
        }
    }
    note
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(EditKind::classify("计算器科学", "计算机科学"), EditKind::TypoFix);
        assert_eq!(EditKind::classify("in order to", "to"), EditKind::Simplification);
        assert_eq!(EditKind::classify("AI", "artificial intelligence"), EditKind::Expansion);
        assert_eq!(EditKind::classify("abcd", "wxyz"), EditKind::Rewording);
        assert_eq!(EditKind::classify("very", ""), EditKind::Deletion);
    }

    #[test]
    fn note_with_replacement() {
        assert_eq!(
            compose_note("计算器科学", Some("计算机科学"), "错别字"),
            "Revision: 计算器科学 → 计算机科学\nReason: 错别字\nType: typo fix"
        );
        assert_eq!(
            compose_note("a", Some("ab"), ""),
            "Revision: a → ab\nType: expansion"
        );
    }

    #[test]
    fn note_without_replacement() {
        assert_eq!(
            compose_note("数据", None, "术语不一致"),
            "Text: 数据\nNote: 术语不一致"
        );
    }
}

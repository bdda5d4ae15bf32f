//! Error types for package operations.
//!
//! [`OpcError`] is the single error type returned by the package store, the
//! XML part model and the registry updater. Every variant names the part it
//! concerns so callers can report failures without parsing messages.

use thiserror::Error;

/// Errors returned by `redline-opc` operations.
#[derive(Debug, Error)]
pub enum OpcError {
    /// The input is not a readable ZIP archive, or a required manifest part is
    /// missing.
    #[error("corrupt archive: {message}")]
    CorruptArchive {
        /// What was wrong with the archive.
        message: String,
    },

    /// A part was requested that the package does not contain.
    #[error("part not found: `{name}`")]
    PartNotFound {
        /// The normalized part name (no leading `/`).
        name: String,
    },

    /// A part's bytes could not be parsed as XML.
    #[error("malformed XML in `{part}`: {message}")]
    MalformedXml {
        /// The part being parsed, or `"<inline>"` for free-standing input.
        part: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The archive could not be re-serialized.
    #[error("packaging failed for `{part}`: {message}")]
    PackagingError {
        /// The entry being written when the failure happened.
        part: String,
        /// Details from the ZIP writer.
        message: String,
    },

    /// An I/O error occurred while reading or writing archive bytes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OpcError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptArchive {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(part: &str, message: impl Into<String>) -> Self {
        Self::MalformedXml {
            part: part.to_owned(),
            message: message.into(),
        }
    }

    /// Attach a part name to an XML error produced without one.
    #[must_use]
    pub fn in_part(self, part: &str) -> Self {
        match self {
            Self::MalformedXml { message, .. } => Self::MalformedXml {
                part: part.to_owned(),
                message,
            },
            other => other,
        }
    }
}

//! Error types for the redline engine.
//!
//! [`EngineError`] covers failures that abort a whole build: an unreadable
//! package, a main document that cannot be edited, an id allocator
//! collision, a state-machine misuse. Failures that only affect one edit are
//! not errors; they are reported as [`Diagnostic`](crate::engine::Diagnostic)s
//! and the build continues.

use std::path::PathBuf;

use redline_opc::OpcError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::BuildPhase;

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The package store, XML model or registry updater failed.
    #[error(transparent)]
    Package(#[from] OpcError),

    /// A part parsed as XML but does not have the shape the engine needs
    /// (no WordprocessingML namespace, no `w:body`, wrong root element).
    #[error("malformed XML in `{part}`: {message}")]
    MalformedXml {
        /// The offending part.
        part: String,
        /// What was missing or unexpected.
        message: String,
    },

    /// Text contains a character that XML 1.0 cannot represent.
    #[error("{field} contains U+{:04X}, which is not allowed in XML 1.0", u32::from(*character))]
    EncodingError {
        /// Which piece of text was rejected (`"comment body"`, `"replacement text"`).
        field: &'static str,
        /// The first rejected character.
        character: char,
    },

    /// The id allocator would have issued an id twice.
    #[error("{kind} id {id} would be issued twice")]
    IdCollision {
        /// `"revision"` or `"comment"`.
        kind: &'static str,
        /// The colliding id.
        id: u32,
    },

    /// A build step ran out of order.
    #[error("invalid build phase transition: {from} → {to}")]
    PhaseViolation {
        /// Phase the build was in.
        from: BuildPhase,
        /// Phase that was requested.
        to: BuildPhase,
    },

    /// The edit list could not be decoded.
    #[error("invalid edit list: {0}")]
    InvalidEditList(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading the input or writing the output file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn malformed(part: &str, message: impl Into<String>) -> Self {
        Self::MalformedXml {
            part: part.to_owned(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

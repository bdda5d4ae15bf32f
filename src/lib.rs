//! Tracked changes and review comments for existing `.docx` packages.
//!
//! Given a package and a list of [`Edit`]s, the [`Engine`] rewrites the main
//! document so each edit shows up in Word as a tracked substitution
//! (`w:del` / `w:ins`), an anchored review comment, or both. Everything the
//! edits do not touch is carried over unchanged.
//!
//! ```no_run
//! use redline::{Edit, Engine};
//!
//! # fn main() -> Result<(), redline::EngineError> {
//! let input = std::fs::read("report.docx").map_err(|e| redline::EngineError::Io {
//!     path: "report.docx".into(),
//!     source: e,
//! })?;
//! let edits = [Edit::revision(3, "计算器科学", "计算机科学").with_comment("错别字")];
//! let output = Engine::default().apply(&input, &edits)?;
//! for diagnostic in &output.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The OPC layer (ZIP part store, XML tree, relationship and content-type
//! registries) lives in the `redline-opc` crate.

pub mod comments;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod inspect;
pub mod markup;
pub mod model;
pub mod note;
pub mod settings;
pub mod telemetry;

pub use config::{MatchStrategy, ParagraphScope, RedlineConfig};
pub use engine::{BuildOutput, BuildPhase, BuildReport, Diagnostic, DiagnosticKind, Engine};
pub use error::EngineError;
pub use inspect::{PackageSummary, inspect};
pub use model::{Comment, Edit, EditList, Revision};

//! The redline engine.
//!
//! [`Engine::apply`] runs one build over an office package:
//!
//! ```text
//! Loaded ──scan──▶ Scanned ──edit──▶ Editing ──finalize──▶ Finalizing ──▶ Packaged
//!   │                 │                  │                      │
//!   open package      index ids and      locate, mark,          write document,
//!   parse document    paragraphs         anchor per edit        comments, registries
//! ```
//!
//! The engine holds configuration only. Every build starts from the bytes it
//! is given and shares nothing with other builds, so one engine can serve
//! any number of threads.

mod build;
pub mod phase;
pub mod report;

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};
use redline_opc::Package;
use tempfile::NamedTempFile;
use tracing::instrument;

use self::build::Build;
pub(crate) use self::build::{main_document_part, parse_document};
pub use self::phase::BuildPhase;
pub use self::report::{BuildOutput, BuildReport, Diagnostic, DiagnosticKind};
use crate::config::RedlineConfig;
use crate::error::EngineError;
use crate::markup::paragraph::texts_at;
use crate::model::Edit;

/// Applies edit lists to office packages.
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: RedlineConfig,
}

impl Engine {
    /// An engine using `config`.
    #[must_use]
    pub const fn new(config: RedlineConfig) -> Self {
        Self { config }
    }

    /// An engine configured from a `redline.toml` file. A missing file
    /// yields the default configuration.
    ///
    /// # Errors
    /// [`EngineError::Config`] if the file cannot be read or parsed.
    pub fn from_config_file(path: &Path) -> Result<Self, EngineError> {
        Ok(Self::new(RedlineConfig::load(path)?))
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &RedlineConfig {
        &self.config
    }

    /// Apply `edits` to the package in `package`, stamping edits that carry
    /// no timestamp with the current time.
    ///
    /// # Errors
    /// Any [`EngineError`]; per-edit problems are returned as diagnostics
    /// instead.
    pub fn apply(&self, package: &[u8], edits: &[Edit]) -> Result<BuildOutput, EngineError> {
        self.apply_at(package, edits, Utc::now().fixed_offset())
    }

    /// Like [`Engine::apply`], with an explicit build clock.
    ///
    /// # Errors
    /// Any [`EngineError`].
    #[instrument(skip_all, fields(edits = edits.len()))]
    pub fn apply_at(
        &self,
        package: &[u8],
        edits: &[Edit],
        now: DateTime<FixedOffset>,
    ) -> Result<BuildOutput, EngineError> {
        let mut build = Build::load(&self.config, package, now)?;
        build.scan()?;
        build.edit(edits)?;
        build.finalize()?;
        build.package()
    }

    /// Read `input`, apply `edits` and write the result to `output`.
    ///
    /// The output is written to a temporary file next to `output` and
    /// renamed into place, so `output` is either left untouched or fully
    /// written. `input` and `output` may be the same path.
    ///
    /// # Errors
    /// [`EngineError::Io`] if a file cannot be read or written, or any error
    /// of [`Engine::apply`].
    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    pub fn apply_file(
        &self,
        input: &Path,
        output: &Path,
        edits: &[Edit],
    ) -> Result<BuildOutput, EngineError> {
        let bytes = std::fs::read(input).map_err(|e| EngineError::io(input, e))?;
        let result = self.apply(&bytes, edits)?;

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| EngineError::io(dir, e))?;
        tmp.write_all(&result.package)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| EngineError::io(tmp.path(), e))?;
        tmp.persist(output)
            .map_err(|e| EngineError::io(output, e.error))?;
        Ok(result)
    }

    /// Visible text of every addressable paragraph of the package's main
    /// document, in the order edits address them.
    ///
    /// # Errors
    /// [`EngineError::Package`] if the package cannot be read;
    /// [`EngineError::MalformedXml`] if the main document has no body.
    pub fn paragraph_texts(&self, package: &[u8]) -> Result<Vec<String>, EngineError> {
        let package = Package::open(package)?;
        let part = main_document_part(&package)?;
        let (document, vocab) = parse_document(&package.read_part(&part)?, &part)?;
        texts_at(&document, &vocab, &part, self.config.paragraphs)
    }
}

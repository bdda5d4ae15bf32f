//! Engine configuration (`redline.toml`).
//!
//! Every field has a default, so an empty file, or no file at all, yields a
//! working configuration. Unknown keys are rejected so that a typo does not
//! silently fall back to a default.
//!
//! ```toml
//! [review]
//! author = "AI Proofreader"
//! initials = "AI"
//! compose_notes = false
//!
//! [revisions]
//! insert_id_stride = 10000
//! track_revisions = false
//!
//! [matching]
//! strategy = "exact"          # or "ignore-punctuation"
//!
//! [paragraphs]
//! scope = "body"              # or "all"
//! skip_blank = false
//!
//! [package]
//! comments_part = "word/comments.xml"
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level engine configuration.
///
/// Missing fields use defaults. Missing file → all defaults (no error).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedlineConfig {
    /// Who the annotations are attributed to.
    #[serde(default)]
    pub review: ReviewConfig,

    /// Revision id and settings behaviour.
    #[serde(default)]
    pub revisions: RevisionsConfig,

    /// How `original_text` is matched against paragraph text.
    #[serde(default)]
    pub matching: MatchingConfig,

    /// How `paragraph_index` is resolved.
    #[serde(default)]
    pub paragraphs: ParagraphsConfig,

    /// Package layout for newly created parts.
    #[serde(default)]
    pub package: PackageConfig,
}

// ---------------------------------------------------------------------------
// ReviewConfig
// ---------------------------------------------------------------------------

/// Attribution for revisions and comments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    /// Author used when an edit does not name one.
    #[serde(default = "default_author")]
    pub author: String,

    /// Initials written on every comment record.
    #[serde(default = "default_initials")]
    pub initials: String,

    /// Wrap each comment body in a structured note (revision line, reason,
    /// classification). See [`crate::note::compose_note`].
    #[serde(default)]
    pub compose_notes: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            author: default_author(),
            initials: default_initials(),
            compose_notes: false,
        }
    }
}

fn default_author() -> String {
    "AI Proofreader".to_owned()
}

fn default_initials() -> String {
    "AI".to_owned()
}

// ---------------------------------------------------------------------------
// RevisionsConfig
// ---------------------------------------------------------------------------

/// Revision id layout and document settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevisionsConfig {
    /// Offset between a delete block's id and its paired insert block's id.
    /// Must be positive.
    #[serde(default = "default_insert_id_stride")]
    pub insert_id_stride: u32,

    /// Also switch on change tracking in `word/settings.xml`, so that the
    /// reader's own edits are tracked too.
    #[serde(default)]
    pub track_revisions: bool,
}

impl Default for RevisionsConfig {
    fn default() -> Self {
        Self {
            insert_id_stride: default_insert_id_stride(),
            track_revisions: false,
        }
    }
}

const fn default_insert_id_stride() -> u32 {
    10_000
}

// ---------------------------------------------------------------------------
// MatchingConfig
// ---------------------------------------------------------------------------

/// Text matching settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Matching strategy.
    #[serde(default)]
    pub strategy: MatchStrategy,
}

/// How `original_text` is compared with paragraph text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchStrategy {
    /// Exact, case-sensitive substring.
    #[default]
    Exact,
    /// Punctuation is removed from both sides before matching; the match is
    /// mapped back onto the original text.
    IgnorePunctuation,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::IgnorePunctuation => write!(f, "ignore-punctuation"),
        }
    }
}

// ---------------------------------------------------------------------------
// ParagraphsConfig
// ---------------------------------------------------------------------------

/// Paragraph addressing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParagraphsConfig {
    /// Which paragraphs are numbered.
    #[serde(default)]
    pub scope: ParagraphScope,

    /// Do not number paragraphs whose visible text is blank.
    #[serde(default)]
    pub skip_blank: bool,
}

/// Which `w:p` elements `paragraph_index` counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParagraphScope {
    /// Direct children of `w:body`.
    #[default]
    Body,
    /// Every paragraph under `w:body` that is not nested in another
    /// paragraph, table cells included.
    All,
}

impl fmt::Display for ParagraphScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body => write!(f, "body"),
            Self::All => write!(f, "all"),
        }
    }
}

// ---------------------------------------------------------------------------
// PackageConfig
// ---------------------------------------------------------------------------

/// Where new parts are created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Part name for a new comments part. Ignored when the document already
    /// has one.
    #[serde(default = "default_comments_part")]
    pub comments_part: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            comments_part: default_comments_part(),
        }
    }
}

fn default_comments_part() -> String {
    "word/comments.xml".to_owned()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl RedlineConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields or an
    ///   out-of-range value, returns a [`ConfigError`].
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields or a zero
    /// `insert_id_stride`.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.revisions.insert_id_stride == 0 {
            return Err(ConfigError {
                path: None,
                message: "revisions.insert_id_stride must be greater than zero".to_owned(),
            });
        }
        if self.package.comments_part.trim_start_matches('/').is_empty() {
            return Err(ConfigError {
                path: None,
                message: "package.comments_part must name a part".to_owned(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

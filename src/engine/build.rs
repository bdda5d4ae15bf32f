//! One build: load → scan → edit → finalize → package.

use chrono::{DateTime, FixedOffset};
use redline_opc::names::{
    CONTENT_TYPES_PART, CT_COMMENTS, CT_RELATIONSHIPS, CT_SETTINGS, DEFAULT_DOCUMENT_PART,
    REL_TYPE_COMMENTS, REL_TYPE_OFFICE_DOCUMENT, REL_TYPE_SETTINGS, ROOT_RELS_PART, W_NS,
    rels_part_for,
};
use redline_opc::registry::{
    content_type_of, empty_relationships, ensure_content_type, ensure_relationship,
    find_relationship_target, relative_target, resolve_target,
};
use redline_opc::{Element, NodePath, Package, XmlDocument};
use tracing::{debug, info, instrument, warn};

use super::phase::BuildPhase;
use super::report::{BuildOutput, BuildReport, Diagnostic, DiagnosticKind};
use crate::comments::CommentsPart;
use crate::config::RedlineConfig;
use crate::error::EngineError;
use crate::ids::IdAllocator;
use crate::markup::paragraph::paragraph_paths;
use crate::markup::span::{SpanError, isolate, locate};
use crate::markup::{Vocab, anchor, invalid_xml_char, revision};
use crate::model::{Comment, Edit, Revision};
use crate::note::compose_note;
use crate::settings::ensure_track_revisions;

/// Result of applying one edit.
enum Outcome {
    Applied,
    /// Applied, but part of the edit was dropped.
    Partial(DiagnosticKind),
    Skipped(DiagnosticKind),
}

/// The main document part: the package relationship `officeDocument`, or
/// `word/document.xml` when the package has none.
///
/// # Errors
/// [`EngineError::Package`] if the root relationships part is unreadable.
pub(crate) fn main_document_part(package: &Package) -> Result<String, EngineError> {
    if package.has_part(ROOT_RELS_PART) {
        let rels = package.read_part(ROOT_RELS_PART)?;
        let target = find_relationship_target(&rels, REL_TYPE_OFFICE_DOCUMENT)
            .map_err(|e| e.in_part(ROOT_RELS_PART))?;
        if let Some(target) = target {
            return Ok(resolve_target("", &target));
        }
    }
    Ok(DEFAULT_DOCUMENT_PART.to_owned())
}

/// Parse a main document part and its vocabulary.
pub(crate) fn parse_document(bytes: &[u8], part: &str) -> Result<(XmlDocument, Vocab), EngineError> {
    let document = XmlDocument::parse(bytes).map_err(|e| e.in_part(part))?;
    let vocab = Vocab::for_document(&document, part)?;
    Ok((document, vocab))
}

fn encoding_problem(field: &str, text: &str) -> Option<DiagnosticKind> {
    invalid_xml_char(text).map(|character| DiagnosticKind::EncodingError {
        field: field.to_owned(),
        character,
    })
}

/// `part` with a counter before its extension, the first one not in
/// `package`: `word/comments1.xml`, `word/comments2.xml`, ...
fn unused_part_name(package: &Package, part: &str) -> String {
    let (stem, extension) = part.rsplit_once('.').unwrap_or((part, ""));
    (1u32..)
        .map(|n| {
            if extension.is_empty() {
                format!("{stem}{n}")
            } else {
                format!("{stem}{n}.{extension}")
            }
        })
        .find(|candidate| !package.has_part(candidate))
        .unwrap_or_else(|| part.to_owned())
}

fn sibling_part(part: &str, file: &str) -> String {
    part.rsplit_once('/')
        .map_or_else(|| file.to_owned(), |(dir, _)| format!("{dir}/{file}"))
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

pub(super) struct Build<'c> {
    config: &'c RedlineConfig,
    now: DateTime<FixedOffset>,
    phase: BuildPhase,
    package: Package,
    document_part: String,
    document: XmlDocument,
    vocab: Vocab,
    document_rels: Option<Vec<u8>>,
    comments_part: String,
    comments_linked: bool,
    existing_comments: Option<CommentsPart>,
    ids: Option<IdAllocator>,
    paragraphs: Vec<NodePath>,
    pending: Vec<Comment>,
    diagnostics: Vec<Diagnostic>,
    report: BuildReport,
}

impl<'c> Build<'c> {
    /// Open the package and parse its main document.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub(super) fn load(
        config: &'c RedlineConfig,
        bytes: &[u8],
        now: DateTime<FixedOffset>,
    ) -> Result<Self, EngineError> {
        let package = Package::open(bytes)?;
        let document_part = main_document_part(&package)?;
        let (mut document, vocab) = parse_document(&package.read_part(&document_part)?, &document_part)?;
        vocab.declare(&mut document);
        debug!(document = %document_part, prefix = vocab.prefix(), "main document loaded");

        Ok(Self {
            config,
            now,
            phase: BuildPhase::Loaded,
            package,
            comments_part: config.package.comments_part.clone(),
            report: BuildReport {
                document_part: document_part.clone(),
                ..BuildReport::default()
            },
            document_part,
            document,
            vocab,
            document_rels: None,
            comments_linked: false,
            existing_comments: None,
            ids: None,
            paragraphs: Vec::new(),
            pending: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    #[cfg(test)]
    const fn phase(&self) -> BuildPhase {
        self.phase
    }

    fn advance(&mut self, next: BuildPhase) -> Result<(), EngineError> {
        if !self.phase.can_transition_to(next) {
            return Err(EngineError::PhaseViolation {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = %self.phase, to = %next, "build phase");
        self.phase = next;
        Ok(())
    }

    /// Find the comments part, collect existing ids and index paragraphs.
    #[instrument(skip_all, fields(document = %self.document_part))]
    pub(super) fn scan(&mut self) -> Result<(), EngineError> {
        self.advance(BuildPhase::Scanned)?;

        let rels_part = rels_part_for(&self.document_part);
        if self.package.has_part(&rels_part) {
            let rels = self.package.read_part(&rels_part)?;
            let target =
                find_relationship_target(&rels, REL_TYPE_COMMENTS).map_err(|e| e.in_part(&rels_part))?;
            if let Some(target) = target {
                self.comments_part = resolve_target(&self.document_part, &target);
                self.comments_linked = true;
            }
            self.document_rels = Some(rels);
        }
        if self.package.has_part(&self.comments_part) {
            let bytes = self.package.read_part(&self.comments_part)?;
            if self.comments_linked {
                let part = CommentsPart::parse(&bytes, &self.comments_part)?;
                self.report.comments_part = Some(self.comments_part.clone());
                self.existing_comments = Some(part);
            } else {
                // Unlinked part at the target name: adopt it, or go elsewhere.
                match CommentsPart::parse(&bytes, &self.comments_part) {
                    Ok(part) => {
                        debug!(part = %self.comments_part, records = part.len(), "adopting unlinked comments part");
                        self.existing_comments = Some(part);
                    }
                    Err(err) => {
                        let free = unused_part_name(&self.package, &self.comments_part);
                        warn!(part = %self.comments_part, error = %err, free = %free, "comments part name taken");
                        self.comments_part = free;
                    }
                }
            }
        }

        let ids = IdAllocator::scan(
            &self.document,
            self.existing_comments.as_ref().map(CommentsPart::document),
            self.config.revisions.insert_id_stride,
        );
        self.paragraphs = paragraph_paths(
            &self.document,
            &self.vocab,
            &self.document_part,
            self.config.paragraphs,
        )?;
        info!(
            paragraphs = self.paragraphs.len(),
            comments_part = %self.comments_part,
            existing_comments = self.existing_comments.as_ref().map_or(0, CommentsPart::len),
            next_revision = ids.max_revision_id().map_or(0, |m| m.saturating_add(1)),
            "document scanned"
        );
        self.ids = Some(ids);
        Ok(())
    }

    /// Apply `edits` in order. Per-edit failures become diagnostics.
    #[instrument(skip_all, fields(edits = edits.len()))]
    pub(super) fn edit(&mut self, edits: &[Edit]) -> Result<(), EngineError> {
        self.advance(BuildPhase::Editing)?;
        self.report.edits_total = edits.len();

        for (index, edit) in edits.iter().enumerate() {
            let outcome = self.apply_one(edit)?;
            let kind = match outcome {
                Outcome::Applied => {
                    self.report.edits_applied += 1;
                    debug!(edit = index, paragraph = edit.paragraph_index, "edit applied");
                    continue;
                }
                Outcome::Partial(kind) => {
                    self.report.edits_applied += 1;
                    kind
                }
                Outcome::Skipped(kind) => kind,
            };
            warn!(
                edit = index,
                paragraph = edit.paragraph_index,
                original = %edit.original_text,
                problem = %kind,
                "edit not fully applied"
            );
            self.diagnostics.push(Diagnostic {
                edit_index: index,
                paragraph_index: edit.paragraph_index,
                original_text: edit.original_text.clone(),
                kind,
            });
        }
        info!(
            applied = self.report.edits_applied,
            revisions = self.report.revisions,
            comments = self.report.comments,
            diagnostics = self.diagnostics.len(),
            "edits applied"
        );
        Ok(())
    }

    fn apply_one(&mut self, edit: &Edit) -> Result<Outcome, EngineError> {
        if !edit.wants_revision() && !edit.wants_comment() {
            return Ok(Outcome::Skipped(DiagnosticKind::NothingToApply));
        }
        let path = usize::try_from(edit.paragraph_index)
            .ok()
            .and_then(|index| self.paragraphs.get(index))
            .cloned();
        let Some(path) = path else {
            return Ok(Outcome::Skipped(DiagnosticKind::ParagraphNotFound {
                available: self.paragraphs.len(),
            }));
        };

        let author = edit
            .author
            .clone()
            .unwrap_or_else(|| self.config.review.author.clone());
        let timestamp = edit.timestamp.unwrap_or(self.now);
        let replacement = edit.replacement_text.as_deref();
        if let Some(kind) = encoding_problem("author", &author)
            .or_else(|| encoding_problem("replacement text", replacement.unwrap_or_default()))
        {
            return Ok(Outcome::Skipped(kind));
        }

        let mut dropped_comment = None;
        let body = if edit.wants_comment() {
            let reason = edit.comment_body.as_deref().unwrap_or_default();
            let body = if self.config.review.compose_notes {
                compose_note(&edit.original_text, replacement, reason)
            } else {
                reason.to_owned()
            };
            dropped_comment = encoding_problem("comment body", &body)
                .or_else(|| encoding_problem("comment initials", &self.config.review.initials));
            dropped_comment.is_none().then_some(body)
        } else {
            None
        };
        if body.is_none() && !edit.wants_revision() {
            return Ok(Outcome::Skipped(
                dropped_comment.unwrap_or(DiagnosticKind::NothingToApply),
            ));
        }

        let paragraph = self.document.get(&path).ok_or_else(|| {
            EngineError::malformed(&self.document_part, "paragraph path no longer resolves")
        })?;
        let span = match locate(
            &self.vocab,
            paragraph,
            &edit.original_text,
            self.config.matching.strategy,
            edit.occurrence,
        ) {
            Ok(span) => span,
            Err(SpanError::NotFound) => return Ok(Outcome::Skipped(DiagnosticKind::SpanNotFound)),
            Err(SpanError::Invalid(reason)) => {
                return Ok(Outcome::Skipped(DiagnosticKind::InvalidSpan { reason }));
            }
        };

        let phase = self.phase;
        let ids = self.ids.as_mut().ok_or(EngineError::PhaseViolation {
            from: phase,
            to: BuildPhase::Editing,
        })?;
        let revision = match replacement {
            Some(replacement) => {
                let pair = ids.next_revision_ids()?;
                Some(Revision {
                    id: pair.delete,
                    insert_id: pair.insert,
                    original: edit.original_text.clone(),
                    replacement: replacement.to_owned(),
                    author: author.clone(),
                    timestamp,
                })
            }
            None => None,
        };
        let comment = match body {
            Some(body) => Some(Comment {
                id: ids.next_comment_id()?,
                author,
                initials: self.config.review.initials.clone(),
                timestamp,
                body,
            }),
            None => None,
        };

        let paragraph = self
            .document
            .get_mut(&path)
            .ok_or_else(|| EngineError::malformed(&self.document_part, "paragraph path no longer resolves"))?;
        let mut range = isolate(&self.vocab, paragraph, &span);
        if let Some(revision) = &revision {
            range = revision::mark(&self.vocab, paragraph, range, revision);
            self.report.revisions += 1;
        }
        if let Some(comment) = comment {
            anchor::wrap(&self.vocab, paragraph, range, comment.id);
            self.pending.push(comment);
            self.report.comments += 1;
        }

        Ok(dropped_comment.map_or(Outcome::Applied, Outcome::Partial))
    }

    /// Write the document, the comments part and the registries back into
    /// the package.
    #[instrument(skip_all, fields(document = %self.document_part))]
    pub(super) fn finalize(&mut self) -> Result<(), EngineError> {
        self.advance(BuildPhase::Finalizing)?;
        if self.report.edits_applied == 0 {
            info!("no edits applied; package left as loaded");
            return Ok(());
        }

        self.package
            .write_part(&self.document_part, self.document.to_bytes());
        if !self.pending.is_empty() {
            self.write_comments()?;
        }
        if self.config.revisions.track_revisions && self.report.revisions > 0 {
            self.write_track_revisions()?;
            self.report.track_revisions = true;
        }
        Ok(())
    }

    fn write_comments(&mut self) -> Result<(), EngineError> {
        let mut part = self.existing_comments.take().unwrap_or_default();
        for comment in &self.pending {
            part.push(comment)?;
        }
        let name = self.comments_part.clone();
        self.package.write_part(&name, part.to_bytes());
        if !self.comments_linked {
            self.link_part(&name, REL_TYPE_COMMENTS)?;
            self.comments_linked = true;
        }
        self.declare_content_type(&name, CT_COMMENTS)?;
        debug!(part = %name, records = part.len(), "comments part written");
        self.report.comments_part = Some(name);
        Ok(())
    }

    fn write_track_revisions(&mut self) -> Result<(), EngineError> {
        let linked = match &self.document_rels {
            Some(rels) => find_relationship_target(rels, REL_TYPE_SETTINGS)
                .map_err(|e| e.in_part(&rels_part_for(&self.document_part)))?
                .map(|target| resolve_target(&self.document_part, &target)),
            None => None,
        };

        if let Some(part) = linked.as_deref().filter(|p| self.package.has_part(p)) {
            let bytes = self.package.read_part(part)?;
            let updated = ensure_track_revisions(&bytes, part)?;
            if updated != bytes {
                self.package.write_part(part, updated);
            }
            return Ok(());
        }

        let part = linked
            .clone()
            .unwrap_or_else(|| sibling_part(&self.document_part, "settings.xml"));
        let root = Element::new("w:settings")
            .with_attr("xmlns:w", W_NS)
            .with_child(Element::new("w:trackRevisions"));
        self.package
            .write_part(&part, XmlDocument::new(root).to_bytes());
        if linked.is_none() {
            self.link_part(&part, REL_TYPE_SETTINGS)?;
        }
        self.declare_content_type(&part, CT_SETTINGS)?;
        debug!(part = %part, "settings part created");
        Ok(())
    }

    /// Add a relationship from the main document to `part`, creating the
    /// document's relationships part if needed.
    fn link_part(&mut self, part: &str, rel_type: &str) -> Result<(), EngineError> {
        let rels_part = rels_part_for(&self.document_part);
        let rels = match self.document_rels.take() {
            Some(rels) => rels,
            None => {
                let manifest = self.package.read_part(CONTENT_TYPES_PART)?;
                let declared =
                    content_type_of(&manifest, &rels_part).map_err(|e| e.in_part(CONTENT_TYPES_PART))?;
                if declared.is_none() {
                    self.declare_content_type(&rels_part, CT_RELATIONSHIPS)?;
                }
                empty_relationships()
            }
        };
        let updated = ensure_relationship(&rels, &relative_target(&self.document_part, part), rel_type)
            .map_err(|e| e.in_part(&rels_part))?;
        if updated != rels || !self.package.has_part(&rels_part) {
            self.package.write_part(&rels_part, updated.clone());
        }
        self.document_rels = Some(updated);
        Ok(())
    }

    fn declare_content_type(&mut self, part: &str, content_type: &str) -> Result<(), EngineError> {
        let manifest = self.package.read_part(CONTENT_TYPES_PART)?;
        let updated = ensure_content_type(&manifest, part, content_type)
            .map_err(|e| e.in_part(CONTENT_TYPES_PART))?;
        if updated != manifest {
            self.package.write_part(CONTENT_TYPES_PART, updated);
        }
        Ok(())
    }

    /// Serialize the package.
    #[instrument(skip_all)]
    pub(super) fn package(mut self) -> Result<BuildOutput, EngineError> {
        self.advance(BuildPhase::Packaged)?;
        let package = self.package.build()?;
        info!(
            len = package.len(),
            revisions = self.report.revisions,
            comments = self.report.comments,
            "package built"
        );
        Ok(BuildOutput {
            package,
            diagnostics: self.diagnostics,
            report: self.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn package(document: &str) -> Vec<u8> {
        package_with(document, &[])
    }

    fn package_with(document: &str, extra: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut parts = vec![
            (
                CONTENT_TYPES_PART.to_owned(),
                "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
                 <Default Extension=\"xml\" ContentType=\"application/xml\"/></Types>"
                    .to_owned(),
            ),
            (
                DEFAULT_DOCUMENT_PART.to_owned(),
                format!("<w:document xmlns:w=\"{W_NS}\"><w:body>{document}</w:body></w:document>"),
            ),
        ];
        parts.extend(extra.iter().map(|(name, body)| ((*name).to_owned(), (*body).to_owned())));
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z").unwrap()
    }

    #[test]
    fn steps_out_of_order_are_rejected() {
        let config = RedlineConfig::default();
        let bytes = package("<w:p><w:r><w:t>x</w:t></w:r></w:p>");
        let mut build = Build::load(&config, &bytes, now()).unwrap();
        assert_eq!(build.phase(), BuildPhase::Loaded);
        assert!(matches!(
            build.edit(&[]),
            Err(EngineError::PhaseViolation {
                from: BuildPhase::Loaded,
                to: BuildPhase::Editing
            })
        ));
        build.scan().unwrap();
        assert!(matches!(
            build.scan(),
            Err(EngineError::PhaseViolation { from: BuildPhase::Scanned, .. })
        ));
        assert!(matches!(build.finalize(), Err(EngineError::PhaseViolation { .. })));
        build.edit(&[]).unwrap();
        build.finalize().unwrap();
        let output = build.package().unwrap();
        assert_eq!(output.report.edits_total, 0);
    }

    #[test]
    fn main_document_falls_back_without_root_relationships() {
        let bytes = package("<w:p/>");
        let package = Package::open(&bytes).unwrap();
        assert_eq!(main_document_part(&package).unwrap(), DEFAULT_DOCUMENT_PART);
    }

    #[test]
    fn foreign_part_at_comments_name_is_left_alone() {
        let config = RedlineConfig::default();
        let bytes = package_with(
            "<w:p><w:r><w:t>Teh cat.</w:t></w:r></w:p>",
            &[("word/comments.xml", "<notes/>")],
        );
        let mut build = Build::load(&config, &bytes, now()).unwrap();
        build.scan().unwrap();
        build.edit(&[Edit::comment(0, "Teh", "typo")]).unwrap();
        build.finalize().unwrap();
        let output = build.package().unwrap();
        assert_eq!(output.report.comments_part.as_deref(), Some("word/comments1.xml"));

        let out = Package::open(&output.package).unwrap();
        assert_eq!(out.read_part("word/comments.xml").unwrap(), b"<notes/>");
        assert!(out.has_part("word/comments1.xml"));
    }

    #[test]
    fn unused_part_names_count_up() {
        let bytes = package_with("<w:p/>", &[("word/comments.xml", "<x/>"), ("word/comments1.xml", "<x/>")]);
        let package = Package::open(&bytes).unwrap();
        assert_eq!(unused_part_name(&package, "word/comments.xml"), "word/comments2.xml");
        assert_eq!(unused_part_name(&package, "word/other.xml"), "word/other1.xml");
    }

    #[test]
    fn sibling_parts() {
        assert_eq!(sibling_part("word/document.xml", "settings.xml"), "word/settings.xml");
        assert_eq!(sibling_part("document.xml", "settings.xml"), "settings.xml");
    }
}

//! Read-only inspection of a built package.
//!
//! [`inspect`] counts the annotations in a package and cross-checks comment
//! references against comment records. A package produced by the engine
//! always passes [`PackageSummary::is_consistent`].

use std::collections::BTreeSet;

use redline_opc::names::{REL_TYPE_COMMENTS, REL_TYPE_SETTINGS, rels_part_for};
use redline_opc::registry::{find_relationship_target, resolve_target};
use redline_opc::{Element, Package, XmlDocument};
use serde::Serialize;

use crate::engine::{main_document_part, parse_document};
use crate::error::EngineError;
use crate::markup::Vocab;
use crate::settings::track_revisions_enabled;

/// Annotation counts for one package.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    /// The main document part.
    pub document_part: String,
    /// Run-level `w:del` blocks.
    pub deletions: usize,
    /// Run-level `w:ins` blocks.
    pub insertions: usize,
    /// Ids of `w:commentReference` marks in the document.
    pub comment_references: BTreeSet<u32>,
    /// Ids of `w:comment` records in the comments part.
    pub comment_records: BTreeSet<u32>,
    /// The comments part, if the document links one.
    pub comments_part: Option<String>,
    /// `true` if the settings part switches change tracking on.
    pub track_revisions: bool,
}

impl PackageSummary {
    /// Referenced ids with no record.
    #[must_use]
    pub fn unmatched_references(&self) -> Vec<u32> {
        self.comment_references
            .difference(&self.comment_records)
            .copied()
            .collect()
    }

    /// Record ids nothing in the document references.
    #[must_use]
    pub fn orphan_records(&self) -> Vec<u32> {
        self.comment_records
            .difference(&self.comment_references)
            .copied()
            .collect()
    }

    /// `true` when references and records pair up one to one.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.comment_references == self.comment_records
    }
}

/// Summarize the annotations in `package`.
///
/// # Errors
/// [`EngineError::Package`] if the package or one of its parts cannot be
/// read; [`EngineError::MalformedXml`] if a part has the wrong shape.
pub fn inspect(package: &[u8]) -> Result<PackageSummary, EngineError> {
    let package = Package::open(package)?;
    let document_part = main_document_part(&package)?;
    let (document, vocab) = parse_document(&package.read_part(&document_part)?, &document_part)?;

    let mut summary = PackageSummary {
        document_part: document_part.clone(),
        ..PackageSummary::default()
    };
    count_blocks(&vocab, document.root(), false, &mut summary);
    document.root().walk(&mut |e: &Element| {
        if vocab.is(e, "commentReference") {
            summary.comment_references.extend(vocab.id_of(e));
        }
    });

    let rels_part = rels_part_for(&document_part);
    if !package.has_part(&rels_part) {
        return Ok(summary);
    }
    let rels = package.read_part(&rels_part)?;
    let linked = |rel_type: &str| -> Result<Option<String>, EngineError> {
        Ok(find_relationship_target(&rels, rel_type)
            .map_err(|e| e.in_part(&rels_part))?
            .map(|target| resolve_target(&document_part, &target))
            .filter(|part| package.has_part(part)))
    };

    if let Some(part) = linked(REL_TYPE_COMMENTS)? {
        let comments = XmlDocument::parse(&package.read_part(&part)?).map_err(|e| e.in_part(&part))?;
        let vocab = Vocab::for_document(&comments, &part)?;
        for record in comments.root().child_elements().filter(|e| vocab.is(e, "comment")) {
            summary.comment_records.extend(vocab.id_of(record));
        }
        summary.comments_part = Some(part);
    }
    if let Some(part) = linked(REL_TYPE_SETTINGS)? {
        summary.track_revisions = track_revisions_enabled(&package.read_part(&part)?, &part)?;
    }
    Ok(summary)
}

/// Count `w:del` / `w:ins` blocks, skipping the paragraph-mark and run
/// property forms that live inside `w:rPr`.
fn count_blocks(vocab: &Vocab, element: &Element, in_properties: bool, summary: &mut PackageSummary) {
    let in_properties = in_properties || vocab.is(element, "rPr");
    if !in_properties {
        if vocab.is(element, "del") {
            summary.deletions += 1;
        } else if vocab.is(element, "ins") {
            summary.insertions += 1;
        }
    }
    for child in element.child_elements() {
        count_blocks(vocab, child, in_properties, summary);
    }
}

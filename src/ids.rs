//! Revision and comment id allocation.
//!
//! [`IdAllocator::scan`] reads every id already present in the document
//! (and in the comments part, if there is one) and then hands out ids above
//! the highest one found. Each build scans afresh; nothing is cached across
//! builds.
//!
//! Revision ids come in pairs: a delete block gets `n` and its insert block
//! gets `n + stride`. A candidate `n` is skipped while either half of the
//! pair is already taken.

use std::collections::HashSet;

use redline_opc::{Element, XmlDocument};
use tracing::debug;

use crate::error::EngineError;
use crate::markup::Vocab;

/// Track-change elements whose `w:id` lives in the revision id space.
const REVISION_ELEMENTS: &[&str] = &[
    "ins",
    "del",
    "moveFrom",
    "moveTo",
    "moveFromRangeStart",
    "moveFromRangeEnd",
    "moveToRangeStart",
    "moveToRangeEnd",
    "rPrChange",
    "pPrChange",
    "sectPrChange",
    "tblPrChange",
    "tblPrExChange",
    "tblGridChange",
    "trPrChange",
    "tcPrChange",
    "numberingChange",
    "cellIns",
    "cellDel",
    "cellMerge",
    "customXmlInsRangeStart",
    "customXmlDelRangeStart",
    "customXmlMoveFromRangeStart",
    "customXmlMoveToRangeStart",
];

/// Anchor elements whose `w:id` lives in the comment id space.
const COMMENT_ANCHORS: &[&str] = &["commentRangeStart", "commentRangeEnd", "commentReference"];

/// A delete / insert id pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevisionIds {
    /// Id of the delete block.
    pub delete: u32,
    /// Id of the insert block.
    pub insert: u32,
}

/// Per-build id allocator.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    stride: u32,
    revision_taken: HashSet<u32>,
    comment_taken: HashSet<u32>,
    next_revision: u32,
    next_comment: u32,
}

impl IdAllocator {
    /// Scan `document` (and `comments`, the comments part, if present).
    #[must_use]
    pub fn scan(document: &XmlDocument, comments: Option<&XmlDocument>, stride: u32) -> Self {
        let mut revision_taken = HashSet::new();
        let mut comment_taken = HashSet::new();

        let vocab = Vocab::for_document(document, "").ok();
        if let Some(vocab) = &vocab {
            document.root().walk(&mut |e: &Element| {
                if REVISION_ELEMENTS.iter().any(|l| vocab.is(e, l)) {
                    revision_taken.extend(vocab.id_of(e));
                } else if COMMENT_ANCHORS.iter().any(|l| vocab.is(e, l)) {
                    comment_taken.extend(vocab.id_of(e));
                }
            });
        }
        if let Some(comments) = comments
            && let Ok(vocab) = Vocab::for_document(comments, "")
        {
            comments.root().walk(&mut |e: &Element| {
                if vocab.is(e, "comment") {
                    comment_taken.extend(vocab.id_of(e));
                }
            });
        }

        let next_revision = revision_taken.iter().max().map_or(0, |m| m.saturating_add(1));
        let next_comment = comment_taken.iter().max().map_or(0, |m| m.saturating_add(1));
        debug!(
            revisions = revision_taken.len(),
            comments = comment_taken.len(),
            next_revision,
            next_comment,
            "ids scanned"
        );
        Self {
            stride: stride.max(1),
            revision_taken,
            comment_taken,
            next_revision,
            next_comment,
        }
    }

    /// Offset between the two ids of a pair.
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.stride
    }

    /// Issue the next delete / insert pair.
    ///
    /// # Errors
    /// [`EngineError::IdCollision`] if the id space is exhausted or an id
    /// would be issued twice.
    pub fn next_revision_ids(&mut self) -> Result<RevisionIds, EngineError> {
        let mut delete = self.next_revision;
        loop {
            let insert = delete
                .checked_add(self.stride)
                .ok_or(EngineError::IdCollision { kind: "revision", id: delete })?;
            if !self.revision_taken.contains(&delete) && !self.revision_taken.contains(&insert) {
                if !self.revision_taken.insert(delete) {
                    return Err(EngineError::IdCollision { kind: "revision", id: delete });
                }
                if !self.revision_taken.insert(insert) {
                    return Err(EngineError::IdCollision { kind: "revision", id: insert });
                }
                self.next_revision = delete + 1;
                return Ok(RevisionIds { delete, insert });
            }
            delete = delete
                .checked_add(1)
                .ok_or(EngineError::IdCollision { kind: "revision", id: delete })?;
        }
    }

    /// Issue the next comment id.
    ///
    /// # Errors
    /// [`EngineError::IdCollision`] if the id space is exhausted or the id
    /// was already issued.
    pub fn next_comment_id(&mut self) -> Result<u32, EngineError> {
        let id = self.next_comment;
        if !self.comment_taken.insert(id) {
            return Err(EngineError::IdCollision { kind: "comment", id });
        }
        self.next_comment = id
            .checked_add(1)
            .ok_or(EngineError::IdCollision { kind: "comment", id })?;
        Ok(id)
    }

    /// Highest revision id taken so far, if any.
    #[must_use]
    pub fn max_revision_id(&self) -> Option<u32> {
        self.revision_taken.iter().max().copied()
    }

    /// Highest comment id taken so far, if any.
    #[must_use]
    pub fn max_comment_id(&self) -> Option<u32> {
        self.comment_taken.iter().max().copied()
    }
}

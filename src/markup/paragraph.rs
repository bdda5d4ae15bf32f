//! Paragraph addressing and visible text.
//!
//! A paragraph's visible text is what a reader sees with insertions shown
//! and deletions hidden: run text directly in the paragraph, plus run text
//! inside insertions, move destinations, hyperlinks, smart tags, simple
//! fields, custom XML and content controls. Deleted and moved-away runs
//! contribute nothing.
//!
//! Only runs that are direct children of the paragraph are *editable*; the
//! others are visible but belong to markup the engine does not split.

use redline_opc::names::{DEFAULT_DOCUMENT_PART, W_NS};
use redline_opc::{Element, NodePath, XmlDocument};

use super::{Vocab, run_text};
use crate::config::{ParagraphScope, ParagraphsConfig};
use crate::error::EngineError;

/// Elements whose runs are visible but not editable.
const CONTAINERS: &[&str] = &[
    "ins",
    "moveTo",
    "hyperlink",
    "smartTag",
    "fldSimple",
    "customXml",
    "sdt",
    "sdtContent",
    "dir",
    "bdo",
];

/// Elements whose runs are not visible.
const HIDDEN: &[&str] = &["del", "moveFrom"];

/// Paragraph children the engine never splits or absorbs into a new
/// revision: existing revisions and run containers.
pub(crate) const STRUCTURAL: &[&str] = &[
    "del",
    "moveFrom",
    "ins",
    "moveTo",
    "hyperlink",
    "smartTag",
    "fldSimple",
    "customXml",
    "sdt",
    "dir",
    "bdo",
];

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// One text-bearing run in the concatenated visible text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Index of the paragraph child holding the run (the run itself when
    /// editable, otherwise its outermost container).
    pub child: usize,
    /// Byte offset of the run's first character in the visible text.
    pub start: usize,
    /// Byte offset one past the run's last character.
    pub end: usize,
    /// The run is a direct child of the paragraph.
    pub editable: bool,
}

impl Segment {
    /// `true` if the segment shares at least one byte with `[start, end)`.
    #[must_use]
    pub const fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// The visible text of a paragraph and the runs it came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParagraphText {
    /// Concatenated visible text.
    pub text: String,
    /// Runs in document order.
    pub segments: Vec<Segment>,
}

/// Build the visible text and segments of `paragraph`.
#[must_use]
pub fn segments(vocab: &Vocab, paragraph: &Element) -> ParagraphText {
    let mut out = ParagraphText::default();
    for (child, node) in paragraph.children().iter().enumerate() {
        let Some(element) = node.as_element() else {
            continue;
        };
        if vocab.is(element, "r") {
            push_run(vocab, element, child, true, &mut out);
        } else if is_any(vocab, element, CONTAINERS) {
            collect_nested(vocab, element, child, &mut out);
        }
    }
    out
}

fn collect_nested(vocab: &Vocab, container: &Element, child: usize, out: &mut ParagraphText) {
    for element in container.child_elements() {
        if vocab.is(element, "r") {
            push_run(vocab, element, child, false, out);
        } else if is_any(vocab, element, CONTAINERS) {
            collect_nested(vocab, element, child, out);
        }
    }
}

fn push_run(vocab: &Vocab, run: &Element, child: usize, editable: bool, out: &mut ParagraphText) {
    let text = run_text(vocab, run);
    let start = out.text.len();
    out.text.push_str(&text);
    out.segments.push(Segment {
        child,
        start,
        end: out.text.len(),
        editable,
    });
}

pub(crate) fn is_any(vocab: &Vocab, element: &Element, names: &[&str]) -> bool {
    names.iter().any(|local| vocab.is(element, local))
}

/// Visible text of `paragraph`.
#[must_use]
pub fn visible_text(vocab: &Vocab, paragraph: &Element) -> String {
    segments(vocab, paragraph).text
}

/// `true` if `element` hides its runs.
#[must_use]
pub fn is_hidden(vocab: &Vocab, element: &Element) -> bool {
    is_any(vocab, element, HIDDEN)
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Paths of the paragraphs `paragraph_index` counts, in order.
///
/// # Errors
/// [`EngineError::MalformedXml`] if the document has no `w:body`.
pub fn paragraph_paths(
    document: &XmlDocument,
    vocab: &Vocab,
    part: &str,
    config: ParagraphsConfig,
) -> Result<Vec<NodePath>, EngineError> {
    let body_path = document
        .find_paths(W_NS, "body")
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::malformed(part, "document has no w:body"))?;
    let Some(body) = document.get(&body_path) else {
        return Err(EngineError::malformed(part, "document has no w:body"));
    };

    let candidates: Vec<NodePath> = match config.scope {
        ParagraphScope::Body => body
            .children()
            .iter()
            .enumerate()
            .filter(|(_, node)| vocab.is_node(node, "p"))
            .map(|(index, _)| {
                let mut path = body_path.clone();
                path.push(index);
                path
            })
            .collect(),
        ParagraphScope::All => document
            .find_paths(W_NS, "p")
            .into_iter()
            .filter(|path| path.starts_with(&body_path))
            .collect(),
    };

    if !config.skip_blank {
        return Ok(candidates);
    }
    Ok(candidates
        .into_iter()
        .filter(|path| {
            document
                .get(path)
                .is_some_and(|p| !visible_text(vocab, p).trim().is_empty())
        })
        .collect())
}

/// Visible text of every addressable paragraph of a main document part, in
/// `paragraph_index` order.
///
/// # Errors
/// [`EngineError::Package`] if the bytes are not XML;
/// [`EngineError::MalformedXml`] if the part is not a WordprocessingML
/// document.
pub fn paragraph_texts(document: &[u8], config: ParagraphsConfig) -> Result<Vec<String>, EngineError> {
    let document = XmlDocument::parse(document).map_err(|e| e.in_part(DEFAULT_DOCUMENT_PART))?;
    let vocab = Vocab::for_document(&document, DEFAULT_DOCUMENT_PART)?;
    texts_at(&document, &vocab, DEFAULT_DOCUMENT_PART, config)
}

pub(crate) fn texts_at(
    document: &XmlDocument,
    vocab: &Vocab,
    part: &str,
    config: ParagraphsConfig,
) -> Result<Vec<String>, EngineError> {
    Ok(paragraph_paths(document, vocab, part, config)?
        .iter()
        .filter_map(|path| document.get(path))
        .map(|p| visible_text(vocab, p))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn document(body: &str) -> Vec<u8> {
        format!("<w:document xmlns:w=\"{W}\"><w:body>{body}</w:body></w:document>").into_bytes()
    }

    fn paragraph(xml: &str) -> Element {
        let doc = XmlDocument::parse(&document(xml)).unwrap();
        doc.find_all(W_NS, "p")[0].clone()
    }

    #[test]
    fn visible_text_hides_deletions_and_shows_insertions() {
        let p = paragraph(concat!(
            "<w:p><w:pPr/><w:r><w:t>ab</w:t></w:r>",
            "<w:del w:id=\"1\"><w:r><w:delText>XX</w:delText></w:r></w:del>",
            "<w:ins w:id=\"2\"><w:r><w:t>cd</w:t></w:r></w:ins>",
            "<w:hyperlink><w:r><w:t>ef</w:t></w:r></w:hyperlink>",
            "<w:r><w:t>g</w:t></w:r></w:p>"
        ));
        let w = Vocab::new("w");
        let text = segments(&w, &p);
        assert_eq!(text.text, "abcdefg");
        assert_eq!(
            text.segments,
            vec![
                Segment { child: 1, start: 0, end: 2, editable: true },
                Segment { child: 3, start: 2, end: 4, editable: false },
                Segment { child: 4, start: 4, end: 6, editable: false },
                Segment { child: 5, start: 6, end: 7, editable: true },
            ]
        );
    }

    #[test]
    fn content_controls_are_visible_but_not_editable() {
        let p = paragraph(
            "<w:p><w:sdt><w:sdtPr/><w:sdtContent><w:r><w:t>x</w:t></w:r></w:sdtContent></w:sdt></w:p>",
        );
        let text = segments(&Vocab::new("w"), &p);
        assert_eq!(text.text, "x");
        assert!(!text.segments[0].editable);
    }

    #[test]
    fn body_scope_skips_table_paragraphs() {
        let bytes = document(concat!(
            "<w:p><w:r><w:t>one</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p/>",
            "<w:p><w:r><w:t>two</w:t></w:r></w:p>",
            "<w:sectPr/>"
        ));
        let body = paragraph_texts(&bytes, ParagraphsConfig::default()).unwrap();
        assert_eq!(body, ["one", "", "two"]);

        let all = paragraph_texts(
            &bytes,
            ParagraphsConfig {
                scope: ParagraphScope::All,
                skip_blank: false,
            },
        )
        .unwrap();
        assert_eq!(all, ["one", "cell", "", "two"]);

        let non_blank = paragraph_texts(
            &bytes,
            ParagraphsConfig {
                scope: ParagraphScope::Body,
                skip_blank: true,
            },
        )
        .unwrap();
        assert_eq!(non_blank, ["one", "two"]);
    }

    #[test]
    fn missing_body_is_malformed() {
        let bytes = format!("<w:document xmlns:w=\"{W}\"/>");
        let err = paragraph_texts(bytes.as_bytes(), ParagraphsConfig::default()).unwrap_err();
        assert!(matches!(err, EngineError::MalformedXml { .. }));
    }

    #[test]
    fn overlap_is_half_open() {
        let s = Segment { child: 0, start: 2, end: 4, editable: true };
        assert!(s.overlaps(3, 5));
        assert!(!s.overlaps(4, 6));
        assert!(!s.overlaps(0, 2));
    }
}

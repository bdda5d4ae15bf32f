//! Comment anchors.
//!
//! A comment is tied to the document by three pieces of markup sharing the
//! comment's id:
//!
//! ```text
//! <w:commentRangeStart w:id=N/> …anchored content… <w:commentRangeEnd w:id=N/>
//! <w:r><w:rPr><w:rStyle w:val="CommentReference"/></w:rPr><w:commentReference w:id=N/></w:r>
//! ```

use std::ops::Range;

use redline_opc::{Element, Node};

use super::Vocab;

/// Character style Word applies to the comment reference mark.
pub const REFERENCE_STYLE: &str = "CommentReference";

/// Wrap `range` of `paragraph`'s children in a comment anchor for `id`.
/// Returns the range now covered, markers and reference run included.
pub fn wrap(vocab: &Vocab, paragraph: &mut Element, range: Range<usize>, id: u32) -> Range<usize> {
    let id_attr = vocab.attr_name("id");
    let start = vocab.element("commentRangeStart").with_attr(id_attr.as_str(), id.to_string());
    let end = vocab.element("commentRangeEnd").with_attr(id_attr.as_str(), id.to_string());

    let children = paragraph.children_mut();
    children.insert(range.end, Node::Element(end));
    children.insert(range.end + 1, Node::Element(reference_run(vocab, id)));
    children.insert(range.start, Node::Element(start));
    range.start..range.end + 3
}

/// The run carrying `w:commentReference`.
#[must_use]
pub fn reference_run(vocab: &Vocab, id: u32) -> Element {
    vocab
        .element("r")
        .with_child(
            vocab.element("rPr").with_child(
                vocab
                    .element("rStyle")
                    .with_attr(vocab.attr_name("val"), REFERENCE_STYLE),
            ),
        )
        .with_child(
            vocab
                .element("commentReference")
                .with_attr(vocab.attr_name("id"), id.to_string()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_opc::XmlDocument;

    #[test]
    fn wrap_places_markers_around_range() {
        let w = Vocab::new("w");
        let mut p = Element::new("w:p")
            .with_child(Element::new("w:r").with_child(Element::new("w:t").with_text("a")))
            .with_child(Element::new("w:r").with_child(Element::new("w:t").with_text("b")))
            .with_child(Element::new("w:r").with_child(Element::new("w:t").with_text("c")));
        let covered = wrap(&w, &mut p, 1..2, 4);
        assert_eq!(covered, 1..5);
        let out = String::from_utf8(XmlDocument::new(p).to_bytes()).unwrap();
        assert!(out.ends_with(concat!(
            "<w:p><w:r><w:t>a</w:t></w:r>",
            "<w:commentRangeStart w:id=\"4\"/>",
            "<w:r><w:t>b</w:t></w:r>",
            "<w:commentRangeEnd w:id=\"4\"/>",
            "<w:r><w:rPr><w:rStyle w:val=\"CommentReference\"/></w:rPr><w:commentReference w:id=\"4\"/></w:r>",
            "<w:r><w:t>c</w:t></w:r></w:p>"
        )), "{out}");
    }

    #[test]
    fn reference_run_uses_document_prefix() {
        let run = reference_run(&Vocab::new("ns0"), 2);
        assert_eq!(run.name(), "ns0:r");
        assert_eq!(run.child("ns0:commentReference").and_then(|c| c.attr("ns0:id")), Some("2"));
    }
}

//! The comments part (`word/comments.xml`).
//!
//! [`CommentsPart`] either starts a fresh `w:comments` tree or wraps an
//! existing one, and appends one `w:comment` record per [`Comment`]. Records
//! already in the part are never touched.

use redline_opc::names::W_NS;
use redline_opc::{Element, XmlDocument};

use crate::error::EngineError;
use crate::markup::{Vocab, check_xml_text, text_run_children};
use crate::model::{Comment, word_date};

/// A comments part being built.
#[derive(Clone, Debug)]
pub struct CommentsPart {
    document: XmlDocument,
    vocab: Vocab,
}

impl Default for CommentsPart {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentsPart {
    /// An empty `w:comments` part.
    #[must_use]
    pub fn new() -> Self {
        let root = Element::new("w:comments").with_attr("xmlns:w", W_NS);
        Self {
            document: XmlDocument::new(root),
            vocab: Vocab::new("w"),
        }
    }

    /// Wrap an existing comments part.
    ///
    /// # Errors
    /// [`EngineError::Package`] if the bytes are not XML;
    /// [`EngineError::MalformedXml`] if the root is not `w:comments`.
    pub fn parse(bytes: &[u8], part: &str) -> Result<Self, EngineError> {
        let mut document = XmlDocument::parse(bytes).map_err(|e| e.in_part(part))?;
        let vocab = Vocab::for_document(&document, part)?;
        if !vocab.is(document.root(), "comments") {
            return Err(EngineError::malformed(
                part,
                format!("expected w:comments root, found `{}`", document.root().name()),
            ));
        }
        vocab.declare(&mut document);
        Ok(Self { document, vocab })
    }

    /// Ids of the records in the part, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        self.document
            .root()
            .child_elements()
            .filter(|e| self.vocab.is(e, "comment"))
            .filter_map(|e| self.vocab.id_of(e))
            .collect()
    }

    pub(crate) const fn document(&self) -> &XmlDocument {
        &self.document
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// `true` if the part holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record.
    ///
    /// # Errors
    /// [`EngineError::EncodingError`] if the author, initials or body hold a
    /// character XML 1.0 cannot carry; nothing is appended in that case.
    pub fn push(&mut self, comment: &Comment) -> Result<(), EngineError> {
        check_xml_text("comment author", &comment.author)?;
        check_xml_text("comment initials", &comment.initials)?;
        check_xml_text("comment body", &comment.body)?;

        let v = &self.vocab;
        let mut run = v.element("r");
        for node in text_run_children(v, &comment.body) {
            run.push(node);
        }
        let record = v
            .element("comment")
            .with_attr(v.attr_name("id"), comment.id.to_string())
            .with_attr(v.attr_name("author"), comment.author.as_str())
            .with_attr(v.attr_name("date"), word_date(&comment.timestamp))
            .with_attr(v.attr_name("initials"), comment.initials.as_str())
            .with_child(v.element("p").with_child(run));
        self.document.root_mut().push_element_in_layout(record);
        Ok(())
    }

    /// Serialize the part.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.document.to_bytes()
    }
}

/// Build a fresh comments part holding `comments`, in order.
///
/// # Errors
/// [`EngineError::EncodingError`] if any comment text cannot be written.
pub fn build(comments: &[Comment]) -> Result<Vec<u8>, EngineError> {
    let mut part = CommentsPart::new();
    for comment in comments {
        part.push(comment)?;
    }
    Ok(part.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn comment(id: u32, body: &str) -> Comment {
        Comment {
            id,
            author: "AI Proofreader".to_owned(),
            initials: "AI".to_owned(),
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z").unwrap(),
            body: body.to_owned(),
        }
    }

    #[test]
    fn build_writes_records_in_order() {
        let bytes = build(&[comment(0, "错别字：应为计算机科学"), comment(1, "line one\nline two")]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n<w:comments xmlns:w="
        ));
        assert!(text.contains(concat!(
            "<w:comment w:id=\"0\" w:author=\"AI Proofreader\" w:date=\"2024-05-01T08:30:00Z\" w:initials=\"AI\">",
            "<w:p><w:r><w:t>错别字：应为计算机科学</w:t></w:r></w:p></w:comment>"
        )), "{text}");
        assert!(text.contains("<w:t>line one</w:t><w:br/><w:t>line two</w:t>"));
        let first = text.find("w:id=\"0\"").unwrap();
        let second = text.find("w:id=\"1\"").unwrap();
        assert!(first < second);
    }

    #[test]
    fn build_rejects_control_characters() {
        let err = build(&[comment(0, "bad\u{7}")]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::EncodingError { field: "comment body", character: '\u{7}' }
        ));
    }

    #[test]
    fn rejected_push_leaves_part_unchanged() {
        let mut part = CommentsPart::new();
        part.push(&comment(0, "ok")).unwrap();
        let before = part.to_bytes();
        assert!(part.push(&comment(1, "\u{0}")).is_err());
        assert_eq!(part.to_bytes(), before);
        assert_eq!(part.ids(), [0]);
    }

    #[test]
    fn existing_part_keeps_its_records_and_prefix() {
        let existing = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
             <ns0:comments xmlns:ns0=\"{W_NS}\"><ns0:comment ns0:id=\"3\" ns0:author=\"Ann\">\
             <ns0:p><ns0:r><ns0:t>old</ns0:t></ns0:r></ns0:p></ns0:comment></ns0:comments>"
        );
        let mut part = CommentsPart::parse(existing.as_bytes(), "word/comments.xml").unwrap();
        part.push(&comment(4, "new")).unwrap();
        assert_eq!(part.ids(), [3, 4]);
        let text = String::from_utf8(part.to_bytes()).unwrap();
        assert!(text.contains("<ns0:comment ns0:id=\"3\" ns0:author=\"Ann\"><ns0:p><ns0:r><ns0:t>old</ns0:t>"));
        assert!(text.contains("<ns0:comment ns0:id=\"4\""));
    }

    #[test]
    fn parse_rejects_other_roots() {
        let other = format!("<w:document xmlns:w=\"{W_NS}\"/>");
        let err = CommentsPart::parse(other.as_bytes(), "word/comments.xml").unwrap_err();
        assert!(matches!(err, EngineError::MalformedXml { .. }));
    }
}

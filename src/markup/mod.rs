//! WordprocessingML markup inside a paragraph.
//!
//! - [`paragraph`]: paragraph addressing and visible-text segments.
//! - [`span`]: locating `original_text` and isolating it into whole runs.
//! - [`revision`]: turning isolated runs into a `w:del` / `w:ins` pair.
//! - [`anchor`]: comment range markers and the reference run.
//!
//! Everything here works on a paragraph [`Element`] in place and names
//! elements through a [`Vocab`], so inserted markup uses whatever prefix the
//! document binds to the WordprocessingML namespace.

pub mod anchor;
pub mod paragraph;
pub mod revision;
pub mod span;

use redline_opc::names::W_NS;
use redline_opc::{Element, Node, XmlDocument};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Vocab
// ---------------------------------------------------------------------------

/// Qualified WordprocessingML names for one document.
///
/// Elements are written with the prefix the document itself uses, which may
/// be empty under a default namespace binding. Attributes are always
/// prefixed: an unprefixed attribute is in no namespace, so a document bound
/// only by default gets a prefix declared for them by [`Vocab::declare`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vocab {
    prefix: String,
    attr_prefix: String,
    aliases: Vec<String>,
}

impl Vocab {
    /// Vocabulary using `prefix` (`""` for a default namespace binding, with
    /// `w` for attributes).
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let attr_prefix = if prefix.is_empty() { "w".to_owned() } else { prefix.clone() };
        Self {
            aliases: vec![prefix.clone()],
            prefix,
            attr_prefix,
        }
    }

    /// Vocabulary for the prefixes `document`'s root binds to
    /// WordprocessingML.
    ///
    /// # Errors
    /// [`EngineError::MalformedXml`] if the root does not declare the
    /// namespace.
    pub fn for_document(document: &XmlDocument, part: &str) -> Result<Self, EngineError> {
        let aliases = document.prefixes_for(W_NS);
        if aliases.is_empty() {
            return Err(EngineError::malformed(
                part,
                "root element does not declare the WordprocessingML namespace",
            ));
        }
        let root = document.root();
        let prefix = if aliases.contains(&root.prefix()) {
            root.prefix()
        } else {
            aliases.iter().copied().find(|p| !p.is_empty()).unwrap_or_default()
        };
        let attr_prefix = match aliases.iter().find(|p| !p.is_empty()) {
            Some(bound) => (*bound).to_owned(),
            None => free_prefix(root),
        };
        Ok(Self {
            prefix: prefix.to_owned(),
            attr_prefix,
            aliases: aliases.into_iter().map(str::to_owned).collect(),
        })
    }

    /// Declare the attribute prefix on `document`'s root if it is not bound
    /// yet.
    pub fn declare(&self, document: &mut XmlDocument) {
        let binding = format!("xmlns:{}", self.attr_prefix);
        if document.root().attr(&binding).is_none() {
            document.root_mut().set_attr(binding, W_NS);
        }
    }

    /// The element prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Qualified element name for `local`.
    #[must_use]
    pub fn name(&self, local: &str) -> String {
        if self.prefix.is_empty() {
            local.to_owned()
        } else {
            format!("{}:{local}", self.prefix)
        }
    }

    /// Qualified attribute name for `local`.
    #[must_use]
    pub fn attr_name(&self, local: &str) -> String {
        format!("{}:{local}", self.attr_prefix)
    }

    /// A new empty element named `local`.
    #[must_use]
    pub fn element(&self, local: &str) -> Element {
        Element::new(self.name(local))
    }

    /// `true` if `element` is `local` under any prefix bound to
    /// WordprocessingML.
    #[must_use]
    pub fn is(&self, element: &Element, local: &str) -> bool {
        element.local_name() == local && self.aliases.iter().any(|a| a == element.prefix())
    }

    /// `true` if `node` is an element named `local`.
    #[must_use]
    pub fn is_node(&self, node: &Node, local: &str) -> bool {
        node.as_element().is_some_and(|e| self.is(e, local))
    }

    /// Value of the attribute `local`. Under a default binding a bare
    /// `local` attribute is accepted too.
    #[must_use]
    pub fn attr<'e>(&self, element: &'e Element, local: &str) -> Option<&'e str> {
        element.attr(&self.attr_name(local)).or_else(|| {
            self.aliases.iter().find_map(|alias| {
                if alias.is_empty() {
                    element.attr(local)
                } else if *alias == self.attr_prefix {
                    None
                } else {
                    element.attr(&format!("{alias}:{local}"))
                }
            })
        })
    }

    /// Numeric `w:id` of `element`, if it has one.
    #[must_use]
    pub fn id_of(&self, element: &Element) -> Option<u32> {
        self.attr(element, "id").and_then(|v| v.trim().parse().ok())
    }
}

/// A prefix not yet declared on `root`: `w`, then `w0`, `w1`, ...
fn free_prefix(root: &Element) -> String {
    std::iter::once("w".to_owned())
        .chain((0u32..).map(|n| format!("w{n}")))
        .find(|candidate| root.attr(&format!("xmlns:{candidate}")).is_none())
        .unwrap_or_else(|| "w".to_owned())
}

// ---------------------------------------------------------------------------
// Run text
// ---------------------------------------------------------------------------

/// Text contributed by one run child: `w:t` text, `\t` for `w:tab`, `\n` for
/// `w:br` and `w:cr`. Everything else contributes nothing.
pub(crate) fn child_text(vocab: &Vocab, node: &Node) -> Option<String> {
    let element = node.as_element()?;
    if vocab.is(element, "t") {
        Some(element.text())
    } else if vocab.is(element, "tab") {
        Some("\t".to_owned())
    } else if vocab.is(element, "br") || vocab.is(element, "cr") {
        Some("\n".to_owned())
    } else {
        None
    }
}

/// Visible text of a run.
#[must_use]
pub fn run_text(vocab: &Vocab, run: &Element) -> String {
    run.children()
        .iter()
        .filter_map(|n| child_text(vocab, n))
        .collect()
}

/// `true` when Word would need `xml:space="preserve"` to keep `text` intact.
pub(crate) fn needs_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// A text-holding element (`w:t`, `w:delText`) for `text`.
pub(crate) fn text_element(vocab: &Vocab, local: &str, text: &str) -> Element {
    let mut element = vocab.element(local).with_text(text);
    if needs_preserve(text) {
        element.set_attr("xml:space", "preserve");
    }
    element
}

/// Run children for `text`: `w:t` pieces, with `\t` as `w:tab` and `\n` as
/// `w:br`.
pub(crate) fn text_run_children(vocab: &Vocab, text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut piece = String::new();
    let flush = |piece: &mut String, nodes: &mut Vec<Node>| {
        if !piece.is_empty() {
            nodes.push(Node::Element(text_element(vocab, "t", piece)));
            piece.clear();
        }
    };
    for c in text.chars() {
        match c {
            '\t' => {
                flush(&mut piece, &mut nodes);
                nodes.push(Node::Element(vocab.element("tab")));
            }
            '\n' => {
                flush(&mut piece, &mut nodes);
                nodes.push(Node::Element(vocab.element("br")));
            }
            '\r' => {}
            other => piece.push(other),
        }
    }
    flush(&mut piece, &mut nodes);
    nodes
}

/// The first character of `text` that XML 1.0 cannot carry.
#[must_use]
pub fn invalid_xml_char(text: &str) -> Option<char> {
    text.chars().find(|&c| {
        !matches!(c,
            '\t' | '\n' | '\r'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}')
    })
}

/// Reject text XML 1.0 cannot carry.
///
/// # Errors
/// [`EngineError::EncodingError`] naming `field` and the first bad character.
pub fn check_xml_text(field: &'static str, text: &str) -> Result<(), EngineError> {
    invalid_xml_char(text).map_or(Ok(()), |character| {
        Err(EngineError::EncodingError { field, character })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w() -> Vocab {
        Vocab::new("w")
    }

    #[test]
    fn names_follow_prefix() {
        assert_eq!(w().name("del"), "w:del");
        assert_eq!(Vocab::new("").name("del"), "del");
        assert!(Vocab::new("ns0").is(&Element::new("ns0:r"), "r"));
        assert!(!w().is(&Element::new("ns0:r"), "r"));
    }

    #[test]
    fn default_binding_gets_prefixed_attributes() {
        let src = format!("<document xmlns=\"{W_NS}\"><body><p><ins id=\"4\"/></p></body></document>");
        let mut doc = XmlDocument::parse(src.as_bytes()).unwrap();
        let vocab = Vocab::for_document(&doc, "word/document.xml").unwrap();
        assert_eq!(vocab.name("del"), "del");
        assert_eq!(vocab.attr_name("id"), "w:id");
        assert_eq!(vocab.id_of(&Element::new("ins").with_attr("id", "4")), Some(4));

        vocab.declare(&mut doc);
        vocab.declare(&mut doc);
        let out = String::from_utf8(doc.to_bytes()).unwrap();
        assert!(out.starts_with(&format!("<document xmlns=\"{W_NS}\" xmlns:w=\"{W_NS}\">")), "{out}");
    }

    #[test]
    fn taken_attribute_prefix_is_avoided() {
        let src = format!("<document xmlns=\"{W_NS}\" xmlns:w=\"urn:other\"/>");
        let doc = XmlDocument::parse(src.as_bytes()).unwrap();
        let vocab = Vocab::for_document(&doc, "word/document.xml").unwrap();
        assert_eq!(vocab.attr_name("id"), "w0:id");
        assert!(!vocab.is(&Element::new("w:p"), "p"));
        assert!(vocab.is(&Element::new("p"), "p"));
    }

    #[test]
    fn every_bound_prefix_is_recognised() {
        let src = format!("<document xmlns=\"{W_NS}\" xmlns:w=\"{W_NS}\"/>");
        let doc = XmlDocument::parse(src.as_bytes()).unwrap();
        let vocab = Vocab::for_document(&doc, "word/document.xml").unwrap();
        assert_eq!(vocab.prefix(), "");
        assert!(vocab.is(&Element::new("w:r"), "r"));
        assert!(vocab.is(&Element::new("r"), "r"));
        assert_eq!(vocab.id_of(&Element::new("del").with_attr("w:id", "9")), Some(9));
    }

    #[test]
    fn run_text_maps_tabs_and_breaks() {
        let run = Element::new("w:r")
            .with_child(Element::new("w:rPr").with_child(Element::new("w:b")))
            .with_child(Element::new("w:t").with_text("a"))
            .with_child(Element::new("w:tab"))
            .with_child(Element::new("w:t").with_text("b"))
            .with_child(Element::new("w:br"))
            .with_child(Element::new("w:instrText").with_text("PAGE"));
        assert_eq!(run_text(&w(), &run), "a\tb\n");
    }

    #[test]
    fn text_run_children_splits_controls() {
        let nodes = text_run_children(&w(), " a\tb\nc");
        let names: Vec<_> = nodes
            .iter()
            .map(|n| n.as_element().unwrap().name().to_owned())
            .collect();
        assert_eq!(names, ["w:t", "w:tab", "w:t", "w:br", "w:t"]);
        let first = nodes[0].as_element().unwrap();
        assert_eq!(first.attr("xml:space"), Some("preserve"));
        assert_eq!(first.text(), " a");
        assert_eq!(nodes[2].as_element().unwrap().attr("xml:space"), None);
    }

    #[test]
    fn xml_char_check() {
        assert_eq!(invalid_xml_char("ok\t\n\r 计算机"), None);
        assert_eq!(invalid_xml_char("bad\u{1}"), Some('\u{1}'));
        assert_eq!(invalid_xml_char("\u{FFFF}"), Some('\u{FFFF}'));
        assert!(check_xml_text("comment body", "\u{0B}").is_err());
    }
}

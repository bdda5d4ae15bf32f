//! Mutable XML tree for package parts.
//!
//! [`XmlDocument::parse`] reads a part into an owned tree of [`Node`]s and
//! [`XmlDocument::to_bytes`] writes it back. The writer is deterministic and
//! keeps everything the parser saw: the declaration, a UTF-8 byte-order mark,
//! prolog comments and whitespace, attribute order, the `<a/>` vs `<a></a>`
//! form of empty elements, CDATA sections, comments and processing
//! instructions. Re-parsing the writer's output and writing it again yields
//! the same bytes, which is what lets callers detect an already-patched part
//! by comparing bytes.
//!
//! Names are stored qualified (`w:p`). Queries take an expanded name
//! (namespace URI + local name) and resolve prefixes through the `xmlns`
//! declarations in scope, so a document that binds WordprocessingML to a
//! prefix other than `w` is still searchable.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::escape::{escape, partial_escape};

use crate::error::OpcError;
use crate::names::XML_NS;

const INLINE: &str = "<inline>";
const BOM: char = '\u{feff}';

/// Child-index path from the root element to a descendant element.
pub type NodePath = Vec<usize>;

// ---------------------------------------------------------------------------
// Node / Element
// ---------------------------------------------------------------------------

/// A node in the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// An element and its subtree.
    Element(Element),
    /// Character data, stored unescaped.
    Text(String),
    /// A CDATA section, stored verbatim.
    CData(String),
    /// A comment, stored verbatim (without `<!--`/`-->`).
    Comment(String),
    /// A processing instruction, stored verbatim (without `<?`/`?>`).
    ProcessingInstruction(String),
    /// A document type declaration, stored verbatim.
    DocType(String),
}

impl Node {
    /// The element inside this node, if it is one.
    #[must_use]
    pub const fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable access to the element inside this node, if it is one.
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// `true` for text nodes that hold only whitespace.
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Self::Text(t) if t.chars().all(char::is_whitespace))
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}

/// A single attribute, value stored unescaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name (`w:id`, `xml:space`, `xmlns:w`).
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// An element with ordered attributes and mixed children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    /// Create an empty element. It is written as `<name/>` until it gains
    /// children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Builder form of [`Element::set_attr`].
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of [`Element::push`].
    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.push(child);
        self
    }

    /// Builder that appends a text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push(Node::Text(text.into()));
        self
    }

    /// Same name and attributes, no children.
    #[must_use]
    pub fn empty_clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
            self_closing: true,
        }
    }

    /// Qualified name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the element, keeping attributes and children.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Prefix of the qualified name (`""` when unprefixed).
    #[must_use]
    pub fn prefix(&self) -> &str {
        split_qname(&self.name).0
    }

    /// Local part of the qualified name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Attribute value by qualified name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing the value in place if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == name) {
            existing.value = value;
        } else {
            self.attributes.push(Attribute { name, value });
        }
    }

    /// Attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Children in document order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Mutable children. Callers splice freely; the empty-element form is
    /// re-derived on write.
    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Append a child node.
    pub fn push(&mut self, child: impl Into<Node>) {
        self.children.push(child.into());
    }

    /// Child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Visit this element and every descendant element in document order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in self.child_elements() {
            child.walk(visit);
        }
    }

    /// First child element with this qualified name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.child_elements().find(|e| e.name == name)
    }

    /// Concatenated direct text children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Append `child` after the last element child, copying the whitespace
    /// that separates existing element children so pretty-printed parts stay
    /// pretty-printed.
    pub fn push_element_in_layout(&mut self, child: Self) {
        let last_element = self
            .children
            .iter()
            .rposition(|n| matches!(n, Node::Element(_)));
        let Some(last) = last_element else {
            self.children.push(Node::Element(child));
            return;
        };
        let indent = last
            .checked_sub(1)
            .and_then(|i| self.children.get(i))
            .filter(|n| n.is_blank_text())
            .cloned();
        let mut insert_at = last + 1;
        if let Some(indent) = indent {
            self.children.insert(insert_at, indent);
            insert_at += 1;
        }
        self.children.insert(insert_at, Node::Element(child));
    }

    fn namespace_bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().filter_map(|a| {
            if a.name == "xmlns" {
                Some(("", a.value.as_str()))
            } else {
                a.name
                    .strip_prefix("xmlns:")
                    .map(|prefix| (prefix, a.value.as_str()))
            }
        })
    }
}

fn split_qname(name: &str) -> (&str, &str) {
    name.split_once(':').unwrap_or(("", name))
}

// ---------------------------------------------------------------------------
// Namespace scope
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct Scope<'a> {
    bindings: Vec<(&'a str, &'a str)>,
}

impl<'a> Scope<'a> {
    fn enter(&self, element: &'a Element) -> Self {
        let mut next = self.clone();
        next.bindings.extend(element.namespace_bindings());
        next
    }

    fn resolve(&self, prefix: &str) -> Option<&'a str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| *p == prefix)
            .map(|(_, uri)| *uri)
    }

    fn matches(&self, element: &Element, namespace: &str, local: &str) -> bool {
        let (prefix, name) = split_qname(&element.name);
        name == local && self.resolve(prefix) == Some(namespace)
    }
}

// ---------------------------------------------------------------------------
// Declaration
// ---------------------------------------------------------------------------

/// The `<?xml … ?>` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// `version` pseudo-attribute.
    pub version: String,
    /// `encoding` pseudo-attribute, if present.
    pub encoding: Option<String>,
    /// `standalone` pseudo-attribute, if present.
    pub standalone: Option<String>,
}

impl Declaration {
    /// `<?xml version="1.0" encoding="UTF-8" standalone="yes"?>`, the form Word
    /// writes for every part.
    #[must_use]
    pub fn office_default() -> Self {
        Self {
            version: "1.0".to_owned(),
            encoding: Some("UTF-8".to_owned()),
            standalone: Some("yes".to_owned()),
        }
    }

    fn from_event(decl: &BytesDecl<'_>) -> Result<Self, OpcError> {
        let utf8 = |bytes: Cow<'_, [u8]>| -> Result<String, OpcError> {
            String::from_utf8(bytes.into_owned())
                .map_err(|e| OpcError::malformed(INLINE, format!("declaration: {e}")))
        };
        let version = decl
            .version()
            .map_err(|e| OpcError::malformed(INLINE, format!("declaration: {e}")))?;
        let encoding = decl
            .encoding()
            .transpose()
            .map_err(|e| OpcError::malformed(INLINE, format!("declaration: {e}")))?;
        let standalone = decl
            .standalone()
            .transpose()
            .map_err(|e| OpcError::malformed(INLINE, format!("declaration: {e}")))?;
        Ok(Self {
            version: utf8(version)?,
            encoding: encoding.map(utf8).transpose()?,
            standalone: standalone.map(utf8).transpose()?,
        })
    }

    fn write(&self, out: &mut String) {
        out.push_str("<?xml version=\"");
        out.push_str(&self.version);
        out.push('"');
        if let Some(encoding) = &self.encoding {
            out.push_str(" encoding=\"");
            out.push_str(encoding);
            out.push('"');
        }
        if let Some(standalone) = &self.standalone {
            out.push_str(" standalone=\"");
            out.push_str(standalone);
            out.push('"');
        }
        out.push_str("?>");
    }
}

// ---------------------------------------------------------------------------
// XmlDocument
// ---------------------------------------------------------------------------

/// A parsed XML part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlDocument {
    bom: bool,
    declaration: Option<Declaration>,
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl XmlDocument {
    /// A new document around `root`, with the office default declaration
    /// followed by a line break (the layout Word uses).
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self {
            bom: false,
            declaration: Some(Declaration::office_default()),
            prolog: vec![Node::Text("\r\n".to_owned())],
            root,
            epilog: Vec::new(),
        }
    }

    /// Parse a part.
    ///
    /// # Errors
    /// [`OpcError::MalformedXml`] (with part `"<inline>"`; use
    /// [`OpcError::in_part`] to attach a name) on invalid UTF-8, syntax errors,
    /// mismatched or unclosed tags, text outside the root, or a missing or
    /// repeated root element.
    pub fn parse(bytes: &[u8]) -> Result<Self, OpcError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| OpcError::malformed(INLINE, format!("not UTF-8: {e}")))?;
        let (bom, text) = text
            .strip_prefix(BOM)
            .map_or((false, text), |rest| (true, rest));

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut builder = TreeBuilder::default();
        loop {
            let event = reader.read_event().map_err(|e| {
                OpcError::malformed(
                    INLINE,
                    format!("{e} (at byte {})", reader.error_position()),
                )
            })?;
            match event {
                Event::Decl(decl) => {
                    if builder.seen_content() {
                        return Err(OpcError::malformed(
                            INLINE,
                            "XML declaration after content",
                        ));
                    }
                    builder.declaration = Some(Declaration::from_event(&decl)?);
                }
                Event::Start(start) => builder.stack.push(element_from_start(&start, false)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start, true)?;
                    builder.attach(Node::Element(element))?;
                }
                Event::End(_) => {
                    let element = builder
                        .stack
                        .pop()
                        .ok_or_else(|| OpcError::malformed(INLINE, "unmatched end tag"))?;
                    builder.attach(Node::Element(element))?;
                }
                Event::Text(t) => {
                    let value = t.unescape().map_err(|e| {
                        OpcError::malformed(
                            INLINE,
                            format!("{e} (near byte {})", reader.buffer_position()),
                        )
                    })?;
                    builder.attach(Node::Text(value.into_owned()))?;
                }
                Event::CData(c) => builder.attach(Node::CData(raw_string(&c)?))?,
                Event::Comment(c) => builder.attach(Node::Comment(raw_string(&c)?))?,
                Event::PI(pi) => builder.attach(Node::ProcessingInstruction(raw_string(&pi)?))?,
                Event::DocType(d) => builder.attach(Node::DocType(raw_string(&d)?))?,
                Event::Eof => break,
            }
        }
        builder.finish(bom)
    }

    /// Serialize the document.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        if self.bom {
            out.push(BOM);
        }
        if let Some(declaration) = &self.declaration {
            declaration.write(&mut out);
        }
        for node in &self.prolog {
            write_node(&mut out, node);
        }
        write_element(&mut out, &self.root);
        for node in &self.epilog {
            write_node(&mut out, node);
        }
        out.into_bytes()
    }

    /// The root element.
    #[must_use]
    pub const fn root(&self) -> &Element {
        &self.root
    }

    /// Mutable root element.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// The prefix the root element binds to `namespace` (`""` for a default
    /// namespace declaration), if any.
    #[must_use]
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        let bindings: Vec<_> = self.root.namespace_bindings().collect();
        bindings
            .iter()
            .find(|(prefix, uri)| *uri == namespace && !prefix.is_empty())
            .or_else(|| bindings.iter().find(|(_, uri)| *uri == namespace))
            .map(|(prefix, _)| *prefix)
    }

    /// Every prefix the root element binds to `namespace`, in declaration
    /// order (`""` for a default namespace declaration).
    #[must_use]
    pub fn prefixes_for(&self, namespace: &str) -> Vec<&str> {
        self.root
            .namespace_bindings()
            .filter(|(_, uri)| *uri == namespace)
            .map(|(prefix, _)| prefix)
            .collect()
    }

    /// Paths of every element named `{namespace}local`, in document order.
    ///
    /// A matched element is not searched further, so nested matches (a
    /// paragraph inside a text box inside a paragraph) are not returned.
    #[must_use]
    pub fn find_paths(&self, namespace: &str, local: &str) -> Vec<NodePath> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_paths(
            &self.root,
            &Scope::default(),
            namespace,
            local,
            &mut path,
            &mut out,
        );
        out
    }

    /// Every element named `{namespace}local`, in document order (same
    /// matching rules as [`XmlDocument::find_paths`]).
    #[must_use]
    pub fn find_all(&self, namespace: &str, local: &str) -> Vec<&Element> {
        self.find_paths(namespace, local)
            .iter()
            .filter_map(|path| self.get(path))
            .collect()
    }

    /// Every element named `{namespace}local` at any depth, including
    /// elements nested inside other matches.
    #[must_use]
    pub fn descendants_named(&self, namespace: &str, local: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        collect_all(&self.root, &Scope::default(), namespace, local, &mut out);
        out
    }

    /// Element at `path` (the empty path is the root).
    #[must_use]
    pub fn get(&self, path: &[usize]) -> Option<&Element> {
        path.iter().try_fold(&self.root, |element, &index| {
            element.children.get(index).and_then(Node::as_element)
        })
    }

    /// Mutable element at `path`.
    pub fn get_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut element = &mut self.root;
        for &index in path {
            element = element.children.get_mut(index)?.as_element_mut()?;
        }
        Some(element)
    }
}

fn collect_paths<'a>(
    element: &'a Element,
    scope: &Scope<'a>,
    namespace: &str,
    local: &str,
    path: &mut NodePath,
    out: &mut Vec<NodePath>,
) {
    let scope = scope.enter(element);
    if scope.matches(element, namespace, local) {
        out.push(path.clone());
        return;
    }
    for (index, child) in element.children.iter().enumerate() {
        if let Node::Element(child) = child {
            path.push(index);
            collect_paths(child, &scope, namespace, local, path, out);
            path.pop();
        }
    }
}

fn collect_all<'a>(
    element: &'a Element,
    scope: &Scope<'a>,
    namespace: &str,
    local: &str,
    out: &mut Vec<&'a Element>,
) {
    let scope = scope.enter(element);
    if scope.matches(element, namespace, local) {
        out.push(element);
    }
    for child in element.child_elements() {
        collect_all(child, &scope, namespace, local, out);
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TreeBuilder {
    declaration: Option<Declaration>,
    prolog: Vec<Node>,
    root: Option<Element>,
    epilog: Vec<Node>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn seen_content(&self) -> bool {
        !self.prolog.is_empty() || self.root.is_some() || !self.stack.is_empty()
    }

    fn attach(&mut self, node: Node) -> Result<(), OpcError> {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            return Ok(());
        }
        match node {
            Node::Element(element) => {
                if self.root.is_some() {
                    return Err(OpcError::malformed(INLINE, "more than one root element"));
                }
                self.root = Some(element);
            }
            Node::Text(ref t) if !t.chars().all(char::is_whitespace) => {
                return Err(OpcError::malformed(
                    INLINE,
                    format!("text outside the root element: {t:?}"),
                ));
            }
            other if self.root.is_some() => self.epilog.push(other),
            other => self.prolog.push(other),
        }
        Ok(())
    }

    fn finish(self, bom: bool) -> Result<XmlDocument, OpcError> {
        if let Some(open) = self.stack.last() {
            return Err(OpcError::malformed(
                INLINE,
                format!("unclosed element `{}`", open.name),
            ));
        }
        let root = self
            .root
            .ok_or_else(|| OpcError::malformed(INLINE, "no root element"))?;
        Ok(XmlDocument {
            bom,
            declaration: self.declaration,
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

fn element_from_start(start: &BytesStart<'_>, self_closing: bool) -> Result<Element, OpcError> {
    let name = utf8_owned(start.name().as_ref())?;
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| OpcError::malformed(INLINE, format!("in `{name}`: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| OpcError::malformed(INLINE, format!("in `{name}`: {e}")))?;
        attributes.push(Attribute {
            name: utf8_owned(attr.key.as_ref())?,
            value: value.into_owned(),
        });
    }
    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
        self_closing,
    })
}

fn raw_string(bytes: &[u8]) -> Result<String, OpcError> {
    utf8_owned(bytes)
}

fn utf8_owned(bytes: &[u8]) -> Result<String, OpcError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| OpcError::malformed(INLINE, format!("not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// Writing helpers
// ---------------------------------------------------------------------------

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Element(element) => write_element(out, element),
        Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
        Node::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Node::ProcessingInstruction(text) => {
            out.push_str("<?");
            out.push_str(text);
            out.push_str("?>");
        }
        Node::DocType(text) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(text.trim_start());
            out.push('>');
        }
    }
}

fn write_element(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.name);
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        out.push_str(&escape(attr.value.as_str()));
        out.push('"');
    }
    if element.children.is_empty() && element.self_closing {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        write_node(out, child);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_text() -> impl Strategy<Value = String> {
        "[a-z &<>\"'\u{4e00}-\u{4e0f}\u{3002}]{0,12}"
    }

    fn arb_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("w:p".to_owned()),
            Just("w:r".to_owned()),
            Just("w:t".to_owned()),
            Just("x:ext".to_owned()),
            Just("plain".to_owned()),
        ]
    }

    fn arb_element() -> impl Strategy<Value = Element> {
        let leaf = (arb_name(), prop::collection::vec(arb_text(), 0..3), any::<bool>()).prop_map(
            |(name, attrs, self_closing)| {
                let mut element = Element::new(name);
                element.self_closing = self_closing;
                for (i, value) in attrs.into_iter().enumerate() {
                    element.set_attr(format!("a{i}"), value);
                }
                element
            },
        );
        leaf.prop_recursive(4, 32, 4, |inner| {
            (
                arb_name(),
                prop::collection::vec(
                    prop_oneof![
                        inner.prop_map(Node::Element),
                        arb_text().prop_map(Node::Text),
                    ],
                    0..4,
                ),
            )
                .prop_map(|(name, children)| {
                    let mut element = Element::new(name);
                    *element.children_mut() = children;
                    element
                })
        })
    }

    proptest! {
        #[test]
        fn prop_write_parse_write_is_stable(root in arb_element()) {
            let doc = XmlDocument::new(root);
            let once = doc.to_bytes();
            let reparsed = XmlDocument::parse(&once).unwrap();
            let twice = reparsed.to_bytes();
            prop_assert_eq!(&once, &twice);
            let thrice = XmlDocument::parse(&twice).unwrap().to_bytes();
            prop_assert_eq!(twice, thrice);
        }
    }
}

//! `word/settings.xml` patching.

use redline_opc::{Node, XmlDocument};

use crate::error::EngineError;
use crate::markup::Vocab;
use crate::markup::paragraph::is_any;

/// Settings children that precede `w:trackRevisions` in schema order.
const BEFORE_TRACK_REVISIONS: &[&str] = &[
    "writeProtection",
    "view",
    "zoom",
    "removePersonalInformation",
    "removeDateAndTime",
    "doNotDisplayPageBoundaries",
    "displayBackgroundShape",
    "printPostScriptOverText",
    "printFractionalCharacterWidth",
    "printFormsData",
    "embedTrueTypeFonts",
    "embedSystemFonts",
    "saveSubsetFonts",
    "saveFormsData",
    "mirrorMargins",
    "alignBordersAndEdges",
    "bordersDoNotSurroundHeader",
    "bordersDoNotSurroundFooter",
    "gutterAtTop",
    "hideSpellingErrors",
    "hideGrammaticalErrors",
    "activeWritingStyle",
    "proofState",
    "formsDesign",
    "attachedTemplate",
    "linkStyles",
    "stylePaneFormatFilter",
    "stylePaneSortMethod",
    "documentType",
    "mailMerge",
    "revisionView",
];

/// Ensure `w:trackRevisions` is present and on, inserted at its schema
/// position. Returns the input bytes unchanged when it already is.
///
/// # Errors
/// [`EngineError::Package`] if the part is not XML;
/// [`EngineError::MalformedXml`] if the root is not `w:settings`.
pub fn ensure_track_revisions(settings: &[u8], part: &str) -> Result<Vec<u8>, EngineError> {
    let mut document = XmlDocument::parse(settings).map_err(|e| e.in_part(part))?;
    let vocab = Vocab::for_document(&document, part)?;
    let root = document.root();
    if !vocab.is(root, "settings") {
        return Err(EngineError::malformed(
            part,
            format!("expected w:settings root, found `{}`", root.name()),
        ));
    }
    let existing = root
        .child_elements()
        .find(|e| vocab.is(e, "trackRevisions"))
        .map(|flag| vocab.attr(flag, "val").is_none_or(|v| !is_off(v)));
    if let Some(already_on) = existing {
        if already_on {
            return Ok(settings.to_vec());
        }
        vocab.declare(&mut document);
        if let Some(flag) = document
            .root_mut()
            .children_mut()
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|e| vocab.is(e, "trackRevisions"))
        {
            flag.set_attr(vocab.attr_name("val"), "true");
        }
        return Ok(document.to_bytes());
    }

    let position = document
        .root()
        .children()
        .iter()
        .rposition(|n| n.as_element().is_some_and(|e| is_any(&vocab, e, BEFORE_TRACK_REVISIONS)))
        .map_or(0, |i| i + 1);
    document
        .root_mut()
        .children_mut()
        .insert(position, Node::Element(vocab.element("trackRevisions")));
    Ok(document.to_bytes())
}

/// `true` if the settings part switches change tracking on.
///
/// # Errors
/// [`EngineError::Package`] if the part is not XML.
pub fn track_revisions_enabled(settings: &[u8], part: &str) -> Result<bool, EngineError> {
    let document = XmlDocument::parse(settings).map_err(|e| e.in_part(part))?;
    let vocab = Vocab::for_document(&document, part)?;
    Ok(document.root().child_elements().any(|e| {
        vocab.is(e, "trackRevisions") && vocab.attr(e, "val").is_none_or(|v| !is_off(v))
    }))
}

fn is_off(value: &str) -> bool {
    matches!(value, "0" | "false" | "off")
}

//! Namespace URIs, relationship types, content types and well-known part
//! names used by WordprocessingML packages.

/// WordprocessingML main namespace (`w:` in documents written by Word).
pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Namespace of the reserved `xml:` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of package relationship parts (`*.rels`).
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Namespace of `[Content_Types].xml`.
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Relationship type from the main document to its comments part.
pub const REL_TYPE_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";

/// Relationship type from the package root to the main document part.
pub const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// Relationship type from the main document to its settings part.
pub const REL_TYPE_SETTINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings";

/// Content type of a WordprocessingML comments part.
pub const CT_COMMENTS: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";

/// Content type of a WordprocessingML settings part.
pub const CT_SETTINGS: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml";

/// Content type of a relationships part.
pub const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// The content-type manifest. Every package must contain it.
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Package-level relationships part.
pub const ROOT_RELS_PART: &str = "_rels/.rels";

/// Conventional location of the main document part.
pub const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";

/// Relationships part that belongs to `part_name`.
///
/// `word/document.xml` → `word/_rels/document.xml.rels`.
#[must_use]
pub fn rels_part_for(part_name: &str) -> String {
    let name = part_name.trim_start_matches('/');
    match name.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{name}.rels"),
    }
}

/// Normalize a part name to the form stored in the archive (no leading `/`).
#[must_use]
pub fn normalize_part_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_part_for_nested_part() {
        assert_eq!(
            rels_part_for("word/document.xml"),
            "word/_rels/document.xml.rels"
        );
        assert_eq!(
            rels_part_for("/word/document.xml"),
            "word/_rels/document.xml.rels"
        );
    }

    #[test]
    fn rels_part_for_root_part() {
        assert_eq!(rels_part_for("doc.xml"), "_rels/doc.xml.rels");
    }
}

//! Relationship and content-type registries.
//!
//! Both updaters are idempotent: when the requested entry already exists the
//! input bytes come back unchanged, so running them against an
//! already-patched package never produces a duplicate entry.
//!
//! ```text
//! ensure_relationship(rels, "comments.xml", REL_TYPE_COMMENTS)
//!   ├── existing (Type, Target) match → input bytes, unchanged
//!   └── otherwise → append <Relationship Id="rId{max+1}" …/>
//! ensure_content_type(types, "/word/comments.xml", CT_COMMENTS)
//!   ├── Override with same PartName and ContentType → unchanged
//!   ├── Override with same PartName, other type → ContentType rewritten
//!   └── otherwise → append <Override …/>
//! ```

use tracing::debug;

use crate::error::OpcError;
use crate::names::{CONTENT_TYPES_NS, RELATIONSHIPS_NS};
use crate::xml::{Element, XmlDocument};

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// One `<Relationship>` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    /// `Id` attribute (`rId3`).
    pub id: String,
    /// `Type` URI.
    pub rel_type: String,
    /// `Target`, relative to the source part's directory unless absolute.
    pub target: String,
    /// `TargetMode` (`External` for hyperlinks), if present.
    pub target_mode: Option<String>,
}

/// An empty relationships part.
#[must_use]
pub fn empty_relationships() -> Vec<u8> {
    XmlDocument::new(Element::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS)).to_bytes()
}

/// Parse every relationship in a `.rels` part.
///
/// # Errors
/// [`OpcError::MalformedXml`] if the part cannot be parsed.
pub fn parse_relationships(registry: &[u8]) -> Result<Vec<Relationship>, OpcError> {
    let doc = XmlDocument::parse(registry)?;
    Ok(doc
        .find_all(RELATIONSHIPS_NS, "Relationship")
        .into_iter()
        .map(|e| Relationship {
            id: e.attr("Id").unwrap_or_default().to_owned(),
            rel_type: e.attr("Type").unwrap_or_default().to_owned(),
            target: e.attr("Target").unwrap_or_default().to_owned(),
            target_mode: e.attr("TargetMode").map(str::to_owned),
        })
        .collect())
}

/// Target of the first internal relationship of `rel_type`, if any.
///
/// # Errors
/// [`OpcError::MalformedXml`] if the part cannot be parsed.
pub fn find_relationship_target(
    registry: &[u8],
    rel_type: &str,
) -> Result<Option<String>, OpcError> {
    Ok(parse_relationships(registry)?
        .into_iter()
        .find(|r| r.rel_type == rel_type && r.target_mode.as_deref() != Some("External"))
        .map(|r| r.target))
}

/// Ensure a relationship `(rel_type, target)` exists.
///
/// # Errors
/// [`OpcError::MalformedXml`] if the registry cannot be parsed.
pub fn ensure_relationship(
    registry: &[u8],
    target: &str,
    rel_type: &str,
) -> Result<Vec<u8>, OpcError> {
    let mut doc = XmlDocument::parse(registry)?;
    let existing = doc.find_all(RELATIONSHIPS_NS, "Relationship");

    let wanted = trim_dot_slash(target);
    if existing
        .iter()
        .any(|e| e.attr("Type") == Some(rel_type) && e.attr("Target").map(trim_dot_slash) == Some(wanted))
    {
        debug!(target, rel_type, "relationship already present");
        return Ok(registry.to_vec());
    }

    let id = next_relationship_id(existing.iter().filter_map(|e| e.attr("Id")));
    let prefix = doc.prefix_for(RELATIONSHIPS_NS).unwrap_or_default().to_owned();
    let entry = Element::new(qualify(&prefix, "Relationship"))
        .with_attr("Id", id.as_str())
        .with_attr("Type", rel_type)
        .with_attr("Target", target);
    doc.root_mut().push_element_in_layout(entry);
    debug!(id = %id, target, rel_type, "relationship added");
    Ok(doc.to_bytes())
}

/// `rId{n+1}` where `n` is the highest numeric `rId<n>` among `ids`.
fn next_relationship_id<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let max = ids
        .filter_map(|id| id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

fn trim_dot_slash(target: &str) -> &str {
    target.strip_prefix("./").unwrap_or(target)
}

/// Resolve a relationship target against the part that owns the registry.
///
/// `("word/document.xml", "comments.xml")` → `"word/comments.xml"`;
/// absolute targets (`/word/x.xml`) are taken from the package root.
#[must_use]
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let source_part = source_part.trim_start_matches('/');
    let (base, target) = target.strip_prefix('/').map_or_else(
        || {
            let dir = source_part.rsplit_once('/').map_or("", |(dir, _)| dir);
            (dir, target)
        },
        |absolute| ("", absolute),
    );

    let mut segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// The `Target` to record in `source_part`'s registry for `part`: relative
/// when `part` sits in the source's directory or below it, absolute otherwise.
#[must_use]
pub fn relative_target(source_part: &str, part: &str) -> String {
    let source_part = source_part.trim_start_matches('/');
    let part = part.trim_start_matches('/');
    let dir = source_part.rsplit_once('/').map_or("", |(dir, _)| dir);
    if dir.is_empty() {
        return part.to_owned();
    }
    part.strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .map_or_else(|| format!("/{part}"), str::to_owned)
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

/// Ensure `[Content_Types].xml` declares `content_type` for `part_path`.
///
/// `part_path` may be given with or without its leading `/`; part names are
/// compared ASCII case-insensitively.
///
/// # Errors
/// [`OpcError::MalformedXml`] if the manifest cannot be parsed.
pub fn ensure_content_type(
    content_types: &[u8],
    part_path: &str,
    content_type: &str,
) -> Result<Vec<u8>, OpcError> {
    let part_name = absolute_part_name(part_path);
    let mut doc = XmlDocument::parse(content_types)?;

    let paths = doc.find_paths(CONTENT_TYPES_NS, "Override");
    let matching = paths.iter().find(|path| {
        doc.get(path)
            .and_then(|e| e.attr("PartName"))
            .is_some_and(|p| p.eq_ignore_ascii_case(&part_name))
    });

    if let Some(path) = matching {
        let Some(element) = doc.get_mut(path) else {
            return Ok(content_types.to_vec());
        };
        if element
            .attr("ContentType")
            .is_some_and(|ct| ct.eq_ignore_ascii_case(content_type))
        {
            debug!(part = %part_name, "content type already declared");
            return Ok(content_types.to_vec());
        }
        element.set_attr("ContentType", content_type);
        debug!(part = %part_name, content_type, "content type override rewritten");
        return Ok(doc.to_bytes());
    }

    let prefix = doc.prefix_for(CONTENT_TYPES_NS).unwrap_or_default().to_owned();
    let entry = Element::new(qualify(&prefix, "Override"))
        .with_attr("PartName", part_name.as_str())
        .with_attr("ContentType", content_type);
    doc.root_mut().push_element_in_layout(entry);
    debug!(part = %part_name, content_type, "content type override added");
    Ok(doc.to_bytes())
}

/// The content type declared for `part_path`: an `Override` if one exists,
/// otherwise the `Default` for its extension.
///
/// # Errors
/// [`OpcError::MalformedXml`] if the manifest cannot be parsed.
pub fn content_type_of(content_types: &[u8], part_path: &str) -> Result<Option<String>, OpcError> {
    let part_name = absolute_part_name(part_path);
    let doc = XmlDocument::parse(content_types)?;

    let by_override = doc
        .find_all(CONTENT_TYPES_NS, "Override")
        .into_iter()
        .find(|e| {
            e.attr("PartName")
                .is_some_and(|p| p.eq_ignore_ascii_case(&part_name))
        })
        .and_then(|e| e.attr("ContentType"));
    if let Some(ct) = by_override {
        return Ok(Some(ct.to_owned()));
    }

    let Some((_, extension)) = part_name.rsplit_once('.') else {
        return Ok(None);
    };
    Ok(doc
        .find_all(CONTENT_TYPES_NS, "Default")
        .into_iter()
        .find(|e| {
            e.attr("Extension")
                .is_some_and(|x| x.eq_ignore_ascii_case(extension))
        })
        .and_then(|e| e.attr("ContentType"))
        .map(str::to_owned))
}

fn absolute_part_name(part_path: &str) -> String {
    format!("/{}", part_path.trim_start_matches('/'))
}

fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_owned()
    } else {
        format!("{prefix}:{local}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::{CT_COMMENTS, REL_TYPE_COMMENTS};

    const RELS: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n",
        "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        "<Relationship Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/webSettings\" Target=\"webSettings.xml\"/>",
        "<Relationship Id=\"rId7\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink\" Target=\"https://example.com\" TargetMode=\"External\"/>",
        "<Relationship Id=\"rIdCustom\" Type=\"urn:x\" Target=\"x.xml\"/>",
        "</Relationships>"
    );

    const TYPES: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n",
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
        "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
        "<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>",
        "</Types>"
    );

    #[test]
    fn relationship_added_with_next_id() {
        let out = ensure_relationship(RELS.as_bytes(), "comments.xml", REL_TYPE_COMMENTS).unwrap();
        let rels = parse_relationships(&out).unwrap();
        assert_eq!(rels.len(), 4);
        let added = rels.last().unwrap();
        assert_eq!(added.id, "rId8");
        assert_eq!(added.target, "comments.xml");
        assert_eq!(added.rel_type, REL_TYPE_COMMENTS);
    }

    #[test]
    fn relationship_is_idempotent() {
        let once = ensure_relationship(RELS.as_bytes(), "comments.xml", REL_TYPE_COMMENTS).unwrap();
        let twice = ensure_relationship(&once, "comments.xml", REL_TYPE_COMMENTS).unwrap();
        assert_eq!(once, twice);
        let dotted = ensure_relationship(&once, "./comments.xml", REL_TYPE_COMMENTS).unwrap();
        assert_eq!(once, dotted);
    }

    #[test]
    fn relationship_added_to_empty_registry() {
        let out =
            ensure_relationship(&empty_relationships(), "comments.xml", REL_TYPE_COMMENTS).unwrap();
        let rels = parse_relationships(&out).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].id, "rId1");
    }

    #[test]
    fn find_target_skips_external() {
        let found = find_relationship_target(
            RELS.as_bytes(),
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink",
        )
        .unwrap();
        assert_eq!(found, None);
        let found = find_relationship_target(RELS.as_bytes(), "urn:x").unwrap();
        assert_eq!(found.as_deref(), Some("x.xml"));
    }

    #[test]
    fn resolve_relative_and_absolute_targets() {
        assert_eq!(resolve_target("word/document.xml", "comments.xml"), "word/comments.xml");
        assert_eq!(resolve_target("word/document.xml", "./media/a.png"), "word/media/a.png");
        assert_eq!(resolve_target("word/document.xml", "../customXml/item1.xml"), "customXml/item1.xml");
        assert_eq!(resolve_target("word/document.xml", "/word/comments.xml"), "word/comments.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
    }

    #[test]
    fn relative_target_round_trips_through_resolve() {
        for (source, part, expected) in [
            ("word/document.xml", "word/comments.xml", "comments.xml"),
            ("word/document.xml", "word/extra/notes.xml", "extra/notes.xml"),
            ("word/document.xml", "custom/comments.xml", "/custom/comments.xml"),
            ("document.xml", "comments.xml", "comments.xml"),
        ] {
            let target = relative_target(source, part);
            assert_eq!(target, expected);
            assert_eq!(resolve_target(source, &target), part);
        }
    }

    #[test]
    fn content_type_added_once() {
        let once = ensure_content_type(TYPES.as_bytes(), "word/comments.xml", CT_COMMENTS).unwrap();
        let twice = ensure_content_type(&once, "/word/comments.xml", CT_COMMENTS).unwrap();
        assert_eq!(once, twice);
        let text = String::from_utf8(once).unwrap();
        assert_eq!(text.matches("/word/comments.xml").count(), 1);
        assert!(text.ends_with(
            "<Override PartName=\"/word/comments.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml\"/></Types>"
        ));
    }

    #[test]
    fn content_type_rewritten_in_place() {
        let wrong = ensure_content_type(TYPES.as_bytes(), "/word/comments.xml", "application/xml").unwrap();
        let fixed = ensure_content_type(&wrong, "/WORD/comments.xml", CT_COMMENTS).unwrap();
        let text = String::from_utf8(fixed.clone()).unwrap();
        assert_eq!(text.matches("comments.xml").count(), 1);
        assert_eq!(
            content_type_of(&fixed, "word/comments.xml").unwrap().as_deref(),
            Some(CT_COMMENTS)
        );
    }

    #[test]
    fn content_type_falls_back_to_default() {
        assert_eq!(
            content_type_of(TYPES.as_bytes(), "word/styles.xml").unwrap().as_deref(),
            Some("application/xml")
        );
        assert_eq!(content_type_of(TYPES.as_bytes(), "word/media/a.png").unwrap(), None);
    }
}

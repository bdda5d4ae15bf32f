//! Shared fixtures for redline integration tests.
//!
//! Packages are assembled in memory with `zip`; nothing touches the disk
//! unless a test asks for a temp dir.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use chrono::{DateTime, FixedOffset};
use redline_opc::names::{
    CT_COMMENTS, CT_SETTINGS, REL_TYPE_COMMENTS, REL_TYPE_OFFICE_DOCUMENT, REL_TYPE_SETTINGS,
    W_NS, rels_part_for,
};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CT_MAIN: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
pub const CT_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
pub const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

/// Fixed build clock.
pub fn fixed_now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z").expect("valid timestamp")
}

/// A single-run `w:p`.
pub fn p(text: &str) -> String {
    runs(&[text])
}

/// One `w:p` with a run per piece.
pub fn runs(pieces: &[&str]) -> String {
    let body: String = pieces
        .iter()
        .map(|text| {
            let space = if text.starts_with(' ') || text.ends_with(' ') {
                " xml:space=\"preserve\""
            } else {
                ""
            };
            format!("<w:r><w:t{space}>{text}</w:t></w:r>")
        })
        .collect();
    format!("<w:p>{body}</w:p>")
}

// ---------------------------------------------------------------------------
// Docx builder
// ---------------------------------------------------------------------------

/// In-memory `.docx` builder.
#[derive(Clone, Debug)]
pub struct Docx {
    document_part: String,
    prefix: String,
    body: String,
    document_compression: CompressionMethod,
    settings: Option<String>,
    comments: Option<String>,
    comments_linked: bool,
}

impl Docx {
    /// A package whose body holds `body` (written with the `w:` prefix
    /// unless [`Docx::prefix`] says otherwise).
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            document_part: "word/document.xml".to_owned(),
            prefix: "w".to_owned(),
            body: body.into(),
            document_compression: CompressionMethod::Deflated,
            settings: None,
            comments: None,
            comments_linked: true,
        }
    }

    /// One single-run paragraph per text.
    pub fn paragraphs(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| p(t)).collect::<String>())
    }

    /// Store the main document under another name.
    pub fn document_part(mut self, part: &str) -> Self {
        self.document_part = part.to_owned();
        self
    }

    /// Bind the WordprocessingML namespace to `prefix` in the main document
    /// (`""` binds it as the default namespace).
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Store the main document uncompressed.
    pub fn stored(mut self) -> Self {
        self.document_compression = CompressionMethod::Stored;
        self
    }

    /// Add `word/settings.xml` holding `inner`.
    pub fn with_settings(mut self, inner: &str) -> Self {
        self.settings = Some(format!(
            "{DECLARATION}<w:settings xmlns:w=\"{W_NS}\">{inner}</w:settings>"
        ));
        self
    }

    /// Add a linked `word/comments.xml` holding `inner`.
    pub fn with_comments(mut self, inner: &str) -> Self {
        self.comments = Some(format!(
            "{DECLARATION}<w:comments xmlns:w=\"{W_NS}\">{inner}</w:comments>"
        ));
        self
    }

    /// Keep `word/comments.xml` but drop the relationship pointing at it.
    pub fn unlinked_comments(mut self) -> Self {
        self.comments_linked = false;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let (p, binding) = if self.prefix.is_empty() {
            (String::new(), "xmlns".to_owned())
        } else {
            (format!("{}:", self.prefix), format!("xmlns:{}", self.prefix))
        };
        let document = format!(
            "{DECLARATION}<{p}document {binding}=\"{W_NS}\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <{p}body>{}<{p}sectPr/></{p}body></{p}document>",
            self.body
        );
        let styles = format!(
            "{DECLARATION}<w:styles xmlns:w=\"{W_NS}\">\
             <w:style w:type=\"character\" w:styleId=\"CommentReference\"/></w:styles>"
        );

        let mut overrides = format!(
            "<Override PartName=\"/{}\" ContentType=\"{CT_MAIN}\"/>\
             <Override PartName=\"/word/styles.xml\" ContentType=\"{CT_STYLES}\"/>",
            self.document_part
        );
        let mut relationships =
            format!("<Relationship Id=\"rId1\" Type=\"{REL_TYPE_STYLES}\" Target=\"styles.xml\"/>");
        if self.settings.is_some() {
            overrides.push_str(&format!(
                "<Override PartName=\"/word/settings.xml\" ContentType=\"{CT_SETTINGS}\"/>"
            ));
            relationships.push_str(&format!(
                "<Relationship Id=\"rId2\" Type=\"{REL_TYPE_SETTINGS}\" Target=\"settings.xml\"/>"
            ));
        }
        if self.comments.is_some() {
            overrides.push_str(&format!(
                "<Override PartName=\"/word/comments.xml\" ContentType=\"{CT_COMMENTS}\"/>"
            ));
        }
        if self.comments.is_some() && self.comments_linked {
            relationships.push_str(&format!(
                "<Relationship Id=\"rId3\" Type=\"{REL_TYPE_COMMENTS}\" Target=\"comments.xml\"/>"
            ));
        }

        let content_types = format!(
            "{DECLARATION}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
             <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>{overrides}</Types>"
        );
        let root_rels = format!(
            "{DECLARATION}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             <Relationship Id=\"rId1\" Type=\"{REL_TYPE_OFFICE_DOCUMENT}\" Target=\"{}\"/></Relationships>",
            self.document_part
        );
        let document_rels = format!(
            "{DECLARATION}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
             {relationships}</Relationships>"
        );

        let mut parts = vec![
            ("[Content_Types].xml".to_owned(), content_types, CompressionMethod::Deflated),
            ("_rels/.rels".to_owned(), root_rels, CompressionMethod::Deflated),
            (self.document_part.clone(), document, self.document_compression),
            (rels_part_for(&self.document_part), document_rels, CompressionMethod::Deflated),
            ("word/styles.xml".to_owned(), styles, CompressionMethod::Stored),
        ];
        if let Some(settings) = &self.settings {
            parts.push(("word/settings.xml".to_owned(), settings.clone(), CompressionMethod::Deflated));
        }
        if let Some(comments) = &self.comments {
            parts.push(("word/comments.xml".to_owned(), comments.clone(), CompressionMethod::Deflated));
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body, method) in parts {
            zip.start_file(name, SimpleFileOptions::default().compression_method(method))
                .expect("start entry");
            zip.write_all(body.as_bytes()).expect("write entry");
        }
        zip.finish().expect("finish archive").into_inner()
    }
}

// ---------------------------------------------------------------------------
// Reading packages back
// ---------------------------------------------------------------------------

pub fn has_part(package: &[u8], name: &str) -> bool {
    ZipArchive::new(Cursor::new(package))
        .expect("valid archive")
        .index_for_name(name)
        .is_some()
}

/// A part's text.
pub fn part_text(package: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(package)).expect("valid archive");
    let mut file = archive.by_name(name).unwrap_or_else(|e| panic!("{name}: {e}"));
    let mut text = String::new();
    file.read_to_string(&mut text).expect("UTF-8 part");
    text
}

/// A part's compression method and still-compressed bytes.
pub fn raw_entry(package: &[u8], name: &str) -> (CompressionMethod, Vec<u8>) {
    let mut archive = ZipArchive::new(Cursor::new(package)).expect("valid archive");
    let index = archive
        .index_for_name(name)
        .unwrap_or_else(|| panic!("{name} missing"));
    let mut file = archive.by_index_raw(index).expect("raw entry");
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).expect("read raw entry");
    (file.compression(), bytes)
}

/// Entry names in archive order.
pub fn entry_names(package: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(package)).expect("valid archive");
    archive.file_names().map(str::to_owned).collect::<Vec<_>>()
}

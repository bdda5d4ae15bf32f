//! In-memory package store.
//!
//! A [`Package`] holds the original archive bytes plus an ordered entry list.
//! Parts are decompressed lazily on [`Package::read_part`]; parts that were
//! never written are copied into the output archive in their original
//! compressed form, so their bytes, compression method and metadata survive a
//! rebuild unchanged.
//!
//! # Lifecycle
//!
//! ```text
//! open(bytes) → read_part / write_part … → build(self) → bytes
//! ```
//!
//! [`Package::build`] consumes the package: a store is never reused for a
//! second build.

use std::collections::HashSet;
use std::io::{Cursor, Read, Write};

use tracing::{debug, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::OpcError;
use crate::names::{CONTENT_TYPES_PART, normalize_part_name};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Body {
    /// Still the entry at `index` in the source archive.
    Original { index: usize },
    /// Replaced or added through [`Package::write_part`].
    Written(Vec<u8>),
}

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    compression: CompressionMethod,
    is_dir: bool,
    body: Body,
}

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// An office package loaded from ZIP bytes.
#[derive(Clone, Debug)]
pub struct Package {
    source: Vec<u8>,
    entries: Vec<Entry>,
}

impl Package {
    /// Open a package from archive bytes.
    ///
    /// # Errors
    /// [`OpcError::CorruptArchive`] if the bytes are not a ZIP archive, if two
    /// entries share a name, or if `[Content_Types].xml` is missing.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub fn open(bytes: &[u8]) -> Result<Self, OpcError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| OpcError::corrupt(format!("not a ZIP archive: {e}")))?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut seen = HashSet::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| OpcError::corrupt(format!("unreadable entry #{index}: {e}")))?;
            let name = file.name().to_owned();
            if !seen.insert(name.clone()) {
                return Err(OpcError::corrupt(format!("duplicate entry `{name}`")));
            }
            entries.push(Entry {
                compression: file.compression(),
                is_dir: file.is_dir(),
                name,
                body: Body::Original { index },
            });
        }

        let package = Self {
            source: bytes.to_vec(),
            entries,
        };
        if !package.has_part(CONTENT_TYPES_PART) {
            return Err(OpcError::corrupt(format!(
                "required part `{CONTENT_TYPES_PART}` is missing"
            )));
        }
        debug!(parts = package.entries.len(), "package opened");
        Ok(package)
    }

    /// Returns `true` if a part with this name exists. A leading `/` is ignored.
    #[must_use]
    pub fn has_part(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Part names in archive order (directory entries excluded).
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    /// Read a part's uncompressed bytes.
    ///
    /// # Errors
    /// [`OpcError::PartNotFound`] if no such part exists;
    /// [`OpcError::CorruptArchive`] if the stored entry cannot be inflated.
    pub fn read_part(&self, name: &str) -> Result<Vec<u8>, OpcError> {
        let position = self.position(name).ok_or_else(|| OpcError::PartNotFound {
            name: normalize_part_name(name).to_owned(),
        })?;
        match &self.entries[position].body {
            Body::Written(bytes) => Ok(bytes.clone()),
            Body::Original { index } => self.inflate(*index),
        }
    }

    /// Insert or replace a part.
    ///
    /// A replaced part keeps its original compression method; a new part is
    /// appended after all existing entries and stored deflated.
    pub fn write_part(&mut self, name: &str, bytes: Vec<u8>) {
        let name = normalize_part_name(name);
        if let Some(position) = self.position(name) {
            debug!(part = name, len = bytes.len(), "replacing part");
            self.entries[position].body = Body::Written(bytes);
        } else {
            debug!(part = name, len = bytes.len(), "adding part");
            self.entries.push(Entry {
                name: name.to_owned(),
                compression: CompressionMethod::Deflated,
                is_dir: false,
                body: Body::Written(bytes),
            });
        }
    }

    /// Serialize the package into a new archive.
    ///
    /// Untouched entries are raw-copied from the source archive; written
    /// entries are compressed with their recorded method.
    ///
    /// # Errors
    /// [`OpcError::PackagingError`] if an entry cannot be copied or written.
    #[instrument(skip_all, fields(parts = self.entries.len()))]
    pub fn build(self) -> Result<Vec<u8>, OpcError> {
        let mut source = ZipArchive::new(Cursor::new(self.source.as_slice())).map_err(|e| {
            OpcError::PackagingError {
                part: String::new(),
                message: format!("source archive no longer readable: {e}"),
            }
        })?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source.len())));

        for entry in &self.entries {
            let failed = |e: &dyn std::fmt::Display| OpcError::PackagingError {
                part: entry.name.clone(),
                message: e.to_string(),
            };
            match &entry.body {
                Body::Original { index } => {
                    let file = source.by_index_raw(*index).map_err(|e| failed(&e))?;
                    writer.raw_copy_file(file).map_err(|e| failed(&e))?;
                }
                Body::Written(bytes) => {
                    let options = SimpleFileOptions::default()
                        .compression_method(entry.compression)
                        .large_file(bytes.len() as u64 >= u64::from(u32::MAX));
                    writer
                        .start_file(entry.name.as_str(), options)
                        .map_err(|e| failed(&e))?;
                    writer.write_all(bytes).map_err(|e| failed(&e))?;
                }
            }
        }

        let cursor = writer.finish().map_err(|e| OpcError::PackagingError {
            part: String::new(),
            message: format!("finishing archive: {e}"),
        })?;
        let out = cursor.into_inner();
        debug!(len = out.len(), "package rebuilt");
        Ok(out)
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = normalize_part_name(name);
        self.entries
            .iter()
            .position(|e| !e.is_dir && e.name == name)
    }

    fn inflate(&self, index: usize) -> Result<Vec<u8>, OpcError> {
        let mut archive = ZipArchive::new(Cursor::new(self.source.as_slice()))
            .map_err(|e| OpcError::corrupt(e.to_string()))?;
        let mut file = archive
            .by_index(index)
            .map_err(|e| OpcError::corrupt(format!("entry #{index}: {e}")))?;
        let mut buf = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut buf)
            .map_err(|e| OpcError::corrupt(format!("inflating `{}`: {e}", file.name())))?;
        Ok(buf)
    }
}

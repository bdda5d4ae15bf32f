//! Open Packaging Conventions layer for docx-redline.
//!
//! This crate owns everything below the edit engine: the ZIP-backed part
//! store, the mutable XML tree used for every part, and the relationship and
//! content-type registries. It knows nothing about revisions or comments.
//!
//! # Crate layout
//!
//! - [`package`]: [`Package`], the in-memory part store.
//! - [`xml`]: [`XmlDocument`] / [`Element`], parse and deterministic write.
//! - [`registry`]: idempotent `.rels` and `[Content_Types].xml` updaters.
//! - [`names`]: namespace URIs, relationship and content types, part names.
//! - [`error`]: the [`OpcError`] enum returned by all of the above.

pub mod error;
pub mod names;
pub mod package;
pub mod registry;
pub mod xml;

pub use error::OpcError;
pub use package::Package;
pub use registry::Relationship;
pub use xml::{Attribute, Declaration, Element, Node, NodePath, XmlDocument};

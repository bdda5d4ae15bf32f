//! Data model: the edit list supplied by the caller and the revision and
//! comment records the engine produces from it.

pub mod edit;
pub mod types;

pub use edit::{Edit, EditList};
pub use types::{Comment, Revision, word_date};

//! docsearch-text
//!
//! Tantivy-based full-text index (the preferred lexical capability) and the
//! baseline keyword scorer used when that index is not provisioned.

pub mod baseline;
pub mod index;
pub mod tantivy_utils;

pub use index::{TantivyIndex, TextEntry, TextHit, TextIndexError};

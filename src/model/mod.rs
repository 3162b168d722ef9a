//! In-memory representation of an SBOM document.
//!
//! This module defines the document model shared by all transforms: an
//! identity-keyed component mapping, a typed relationship edge list, and the
//! identity resolution rule that makes components comparable across documents
//! produced by different tools.

mod document;
mod identity;
mod image;

pub use document::*;
pub use identity::*;
pub use image::*;

//! **SBOM merge and augmentation engine for container builds.**
//!
//! `sbom-compose` combines Software Bills of Materials produced at different
//! stages of a container build - dependency resolution, filesystem scan,
//! base-image inspection, multi-architecture index assembly - into a single,
//! internally consistent SBOM describing the final artifact.
//!
//! ## Key Features
//!
//! - **Stable component identity**: a canonical identity key per component
//!   (normalized package URL, falling back to kind/name/version) deduplicates
//!   components across documents produced by different tools.
//! - **Deterministic, lossless merge**: component sets union under the
//!   identity rule, property sets union with namespaced conflicts, evidence
//!   is append-only, and relationship graphs union with edge rewriting and
//!   de-duplication. Dangling edges are a hard error, never silently dropped.
//! - **Base-image lineage**: synthesizes `container-image` components for a
//!   built image's ancestry and chains them with `derivedFrom` edges.
//! - **Image-index assembly**: reconciles per-architecture child SBOMs into
//!   one top-level SBOM, tagging components as architecture-independent or
//!   with the architecture subset that carries them.
//! - **Final image annotation**: records the output image's resolved
//!   repository digest and primary-component pointer as the last step before
//!   serialization.
//!
//! ## Core Concepts & Modules
//!
//! - **[`model`]**: the document model - [`SbomDocument`], [`Component`],
//!   [`Relationship`] - plus identity resolution and image references.
//! - **[`merge`]**: the [`MergeEngine`] every multi-document transform goes
//!   through.
//! - **[`augment`]**: base-image, index, and final-image transforms layered
//!   on the merge engine.
//! - **[`parsers`]**: CycloneDX-compatible JSON in and out, with unknown
//!   fields passed through unchanged.
//!
//! ## Getting Started: Merging Two Scans
//!
//! ```no_run
//! use std::path::Path;
//! use sbom_compose::{MergeEngine, parse_document};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolved = parse_document(Path::new("cachi2.bom.json"))?;
//!     let scanned = parse_document(Path::new("syft.bom.json"))?;
//!
//!     let merged = MergeEngine::new().merge(&[resolved, scanned])?;
//!     println!("{} components after merge", merged.component_count());
//!     Ok(())
//! }
//! ```
//!
//! All transforms are synchronous and operate on documents held entirely in
//! memory; each either completes and returns a valid document or fails fast
//! with a typed [`ComposeError`]. Partial output is never emitted.

// Lint to discourage unwrap() in production code - prefer explicit error handling
#![warn(clippy::unwrap_used)]
#![allow(
    // Doc completeness: # Errors / # Panics sections are aspirational
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    // Variable names like `old`/`new` are clear in context
    clippy::similar_names
)]

pub mod augment;
pub mod cli;
pub mod config;
pub mod error;
pub mod merge;
pub mod model;
pub mod parsers;
pub mod pipeline;

// Re-export main types for convenience
pub use augment::{LineageEntry, annotate_final_image, augment, augment_index};
pub use config::{
    AnnotateConfig, BaseAugmentConfig, IndexAugmentConfig, MergeConfig, OutputConfig,
};
pub use error::{ComposeError, Result};
pub use merge::MergeEngine;
pub use model::{
    Component, ComponentKind, DocumentMetadata, IdentityKey, ImageReference, RelationType,
    Relationship, SbomDocument,
};
pub use parsers::{parse_document, parse_document_str, to_json_string};

//! Per-command configuration structures.
//!
//! `main.rs` assembles these from CLI arguments; the handlers in [`crate::cli`]
//! consume them. Keeping the split means handlers stay testable without a
//! parsed command line.

use std::path::PathBuf;

/// Output settings shared by every command.
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Output file; stdout when unset
    pub file: Option<PathBuf>,
    /// Suppress non-essential logging
    pub quiet: bool,
}

/// Configuration for the `merge` command.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Input SBOM paths, in merge order (callers fix this by convention:
    /// dependency-resolution document first, filesystem-scan second)
    pub inputs: Vec<PathBuf>,
    pub output: OutputConfig,
}

/// Configuration for the `augment-base` command.
#[derive(Debug, Clone)]
pub struct BaseAugmentConfig {
    /// SBOM to augment
    pub sbom: PathBuf,
    /// Digest-pinned ancestor references, nearest first, one per line
    pub lineage: Option<PathBuf>,
    /// dockerfile-json output (paired with `base_images_digests`)
    pub parsed_dockerfile: Option<PathBuf>,
    /// `<reference> <pinned-reference>` lines from the build
    pub base_images_digests: Option<PathBuf>,
    pub output: OutputConfig,
}

/// Configuration for the `augment-index` command.
#[derive(Debug, Clone)]
pub struct IndexAugmentConfig {
    /// Digest-pinned reference of the index manifest
    pub index_reference: String,
    /// `arch=path` pairs, one SBOM per child architecture
    pub children: Vec<(String, PathBuf)>,
    pub output: OutputConfig,
}

/// Configuration for the `annotate` command.
#[derive(Debug, Clone)]
pub struct AnnotateConfig {
    /// SBOM to annotate
    pub sbom: PathBuf,
    /// Repository of the final output image
    pub repository: String,
    /// Resolved digest of the final output image
    pub digest: String,
    pub output: OutputConfig,
}

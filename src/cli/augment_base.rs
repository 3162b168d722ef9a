//! Base-image augmentation command handler.

use crate::augment::{self, LineageEntry, ParsedDockerfile};
use crate::config::BaseAugmentConfig;
use crate::error::{ComposeError, Result};
use crate::model::ImageReference;
use crate::parsers;
use crate::pipeline::{OutputTarget, read_json_file, write_document};
use std::collections::HashMap;
use std::path::Path;

/// Run the augment-base command.
///
/// Lineage comes either from a plain lineage file (digest-pinned references,
/// nearest ancestor first, one per line) or from a parsed Dockerfile plus the
/// digest map recorded during the build.
pub fn run_augment_base(config: &BaseAugmentConfig) -> Result<()> {
    let lineage = match (&config.lineage, &config.parsed_dockerfile) {
        (Some(lineage_path), None) => read_lineage_file(lineage_path)?,
        (None, Some(dockerfile_path)) => {
            let digests_path = config.base_images_digests.as_ref().ok_or_else(|| {
                ComposeError::malformed(
                    "--parsed-dockerfile requires --base-images-digests",
                )
            })?;
            let dockerfile: ParsedDockerfile = read_json_file(dockerfile_path)?;
            let digests = read_digests_file(digests_path)?;
            augment::lineage_from_dockerfile(&dockerfile, &digests)?
        }
        _ => {
            return Err(ComposeError::malformed(
                "exactly one of --lineage or --parsed-dockerfile must be given",
            ));
        }
    };

    let mut doc = parsers::parse_document(&config.sbom)?;
    if lineage.is_empty() {
        // A single-stage build FROM scratch has no base images; the document
        // passes through unchanged.
        tracing::warn!("no base images in lineage, emitting document unchanged");
    } else {
        augment::augment(&mut doc, &lineage)?;
    }

    let target = OutputTarget::from_option(config.output.file.clone());
    write_document(&doc, &target, config.output.quiet)
}

/// One digest-pinned reference per line, nearest ancestor first. Blank lines
/// and `#` comments are skipped.
fn read_lineage_file(path: &Path) -> Result<Vec<LineageEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| ComposeError::io(path, e))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Ok(LineageEntry::new(ImageReference::parse(line)?)))
        .collect()
}

/// `<dockerfile-reference> <pinned-reference>` pairs, one per line, as
/// recorded from `buildah images` output during the build.
fn read_digests_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ComposeError::io(path, e))?;
    let mut digests = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(reference), Some(pinned)) => {
                digests.insert(reference.to_string(), pinned.to_string());
            }
            _ => {
                return Err(ComposeError::malformed_at(
                    format!("digest line '{line}' is not '<reference> <pinned-reference>'"),
                    path.display().to_string(),
                ));
            }
        }
    }
    Ok(digests)
}

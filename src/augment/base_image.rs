//! Base-image lineage augmentation.
//!
//! Synthesizes one `container-image` component per ancestor image and links
//! the document's primary component to its ancestry with a `derivedFrom`
//! chain, nearest ancestor first, root base image last.
//!
//! Lineage can be supplied directly or built from dockerfile-json `Stages`
//! output plus the digest-pinned references buildah actually used.

use crate::error::{ComposeError, Result};
use crate::model::{
    Component, ComponentKind, IdentityKey, ImageReference, RelationType, Relationship,
    SbomDocument,
};
use serde::Deserialize;
use std::collections::HashMap;

/// Property marking the final base image of the build.
pub const PROP_IS_BASE_IMAGE: &str = "sbom-compose:image:is_base_image";

/// Property marking an image used only during a builder stage; the value is
/// the stage number.
pub const PROP_BUILDER_IMAGE_FOR_STAGE: &str = "sbom-compose:image:is_builder_image_for_stage";

/// One ancestor image in a lineage, with provenance properties to attach to
/// its synthesized component.
#[derive(Debug, Clone)]
pub struct LineageEntry {
    pub reference: ImageReference,
    pub properties: Vec<(String, String)>,
}

impl LineageEntry {
    /// Create a lineage entry without properties.
    #[must_use]
    pub fn new(reference: ImageReference) -> Self {
        Self {
            reference,
            properties: Vec::new(),
        }
    }

    /// Attach a provenance property (builder style).
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }
}

/// Insert the lineage into `doc` as `container-image` components chained with
/// `derivedFrom` edges from the primary component.
///
/// Idempotent: identity keys collapse repeated components and exact-triple
/// de-duplication collapses repeated edges, so re-running with the same
/// lineage changes nothing.
pub fn augment(doc: &mut SbomDocument, lineage: &[LineageEntry]) -> Result<()> {
    let primary = doc.require_primary("base-image augmentation")?;

    let mut previous = primary;
    for entry in lineage {
        let key = IdentityKey::for_image(&entry.reference.repository, &entry.reference.digest);
        if doc.get_component(&key).is_none() {
            doc.insert_component(
                Component::with_key(
                    key.clone(),
                    ComponentKind::ContainerImage,
                    entry.reference.repository.clone(),
                )
                .with_purl(entry.reference.oci_purl()),
            );
        }
        if let Some(component) = doc.get_component_mut(&key) {
            for (name, value) in &entry.properties {
                component.set_property(name, value);
            }
        }

        doc.add_relationship(Relationship::new(
            previous,
            RelationType::DerivedFrom,
            key.clone(),
        ));
        previous = key;
    }

    tracing::info!(ancestors = lineage.len(), "augmented SBOM with base-image lineage");
    Ok(())
}

/// dockerfile-json output: the slice of it this engine reads.
#[derive(Debug, Deserialize)]
pub struct ParsedDockerfile {
    #[serde(rename = "Stages")]
    pub stages: Vec<DockerfileStage>,
}

#[derive(Debug, Deserialize)]
pub struct DockerfileStage {
    #[serde(rename = "From")]
    pub from: StageFrom,
}

#[derive(Debug, Deserialize)]
pub struct StageFrom {
    #[serde(rename = "Image")]
    pub image: Option<String>,
    #[serde(rename = "Scratch", default)]
    pub scratch: Option<serde_json::Value>,
    #[serde(rename = "Stage")]
    pub stage: Option<StageRef>,
}

#[derive(Debug, Deserialize)]
pub struct StageRef {
    #[serde(rename = "Index")]
    pub index: Option<usize>,
}

/// Per-stage base, after named-stage references are chased to the image they
/// alias.
enum StageBase {
    Image(String),
    Scratch,
}

/// Build the lineage from a parsed Dockerfile and the digest-pinned
/// references recorded at build time.
///
/// `digests` maps the reference as written in the Dockerfile to the full
/// `repository:tag@digest` reference buildah resolved it to. Stages buildah
/// skipped have no entry and are dropped. `scratch` and `oci-archive:`
/// pseudo-images are skipped without disturbing stage numbering. An image
/// reused by several stages gets one lineage entry carrying a property per
/// stage.
///
/// Entries come out nearest-ancestor-first: the final stage's base image (the
/// image the artifact is actually derived from) leads, builder-stage images
/// follow in reverse stage order.
pub fn lineage_from_dockerfile(
    dockerfile: &ParsedDockerfile,
    digests: &HashMap<String, String>,
) -> Result<Vec<LineageEntry>> {
    let bases = resolve_stage_bases(dockerfile)?;

    let mut entries: Vec<LineageEntry> = Vec::new();
    let mut seen: HashMap<IdentityKey, usize> = HashMap::new();

    for (index, base) in bases.iter().enumerate() {
        let image = match base {
            StageBase::Scratch => continue,
            StageBase::Image(image) if image.starts_with("oci-archive") => continue,
            StageBase::Image(image) => image,
        };

        // Not reached when the last stage is scratch or an oci-archive;
        // those are not base images and never land in the SBOM.
        let (property_name, property_value) = if index == bases.len() - 1 {
            (PROP_IS_BASE_IMAGE, "true".to_string())
        } else {
            (PROP_BUILDER_IMAGE_FOR_STAGE, index.to_string())
        };

        // A stage can be skipped by buildah (unreachable or redundant); it
        // was not used in the actual build, so it is fine to drop it.
        let Some(pinned) = digests.get(image) else {
            tracing::warn!(image = %image, stage = index, "no digest recorded for stage base, skipping");
            continue;
        };
        let reference = ImageReference::parse(pinned)?;
        let key = IdentityKey::for_image(&reference.repository, &reference.digest);

        if let Some(position) = seen.get(&key) {
            entries[*position]
                .properties
                .push((property_name.to_string(), property_value));
        } else {
            seen.insert(key, entries.len());
            entries.push(
                LineageEntry::new(reference).with_property(property_name, property_value),
            );
        }
    }

    // Nearest ancestor first: the final stage's base leads the chain.
    entries.reverse();
    Ok(entries)
}

/// Resolve each stage's base, chasing named-stage references until an image
/// (or scratch) is found.
fn resolve_stage_bases(dockerfile: &ParsedDockerfile) -> Result<Vec<StageBase>> {
    let stages = &dockerfile.stages;
    let mut bases = Vec::with_capacity(stages.len());

    for stage in stages {
        if let Some(image) = &stage.from.image {
            bases.push(StageBase::Image(image.clone()));
        } else if stage.from.scratch.is_some() {
            bases.push(StageBase::Scratch);
        } else if let Some(stage_ref) = &stage.from.stage {
            bases.push(chase_stage_reference(stages, stage_ref.index)?);
        } else {
            return Err(ComposeError::malformed(
                "dockerfile stage has neither an image, scratch, nor a stage reference",
            ));
        }
    }
    Ok(bases)
}

fn chase_stage_reference(stages: &[DockerfileStage], start: Option<usize>) -> Result<StageBase> {
    let mut next = start;
    while let Some(index) = next {
        let referred = stages.get(index).ok_or_else(|| {
            ComposeError::malformed(format!("stage reference points at unknown stage {index}"))
        })?;
        next = referred.from.stage.as_ref().and_then(|s| s.index);
        if next.is_none() {
            if let Some(image) = &referred.from.image {
                return Ok(StageBase::Image(image.clone()));
            }
            if referred.from.scratch.is_some() {
                return Ok(StageBase::Scratch);
            }
            return Err(ComposeError::malformed(format!(
                "stage {index} resolves to neither an image nor scratch"
            )));
        }
    }
    Err(ComposeError::malformed(
        "stage reference carries no stage index",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Component;

    fn doc_with_primary(name: &str) -> SbomDocument {
        let primary = Component::build(
            ComponentKind::Application,
            name,
            Some("1.0".to_string()),
            None,
        )
        .unwrap();
        let key = primary.identity_key().clone();
        let mut doc = SbomDocument::default();
        doc.insert_component(primary);
        doc.metadata.primary_component = Some(key);
        doc
    }

    fn lineage(references: &[&str]) -> Vec<LineageEntry> {
        references
            .iter()
            .map(|r| LineageEntry::new(ImageReference::parse(r).unwrap()))
            .collect()
    }

    #[test]
    fn test_augment_builds_derived_from_chain() {
        let mut doc = doc_with_primary("myapp");
        augment(
            &mut doc,
            &lineage(&[
                "registry.io/ubi9-minimal:latest@sha256:aaa",
                "registry.io/ubi9:latest@sha256:bbb",
            ]),
        )
        .unwrap();

        assert_eq!(doc.component_count(), 3);
        assert_eq!(doc.relationships.len(), 2);

        let minimal = IdentityKey::for_image("registry.io/ubi9-minimal", "sha256:aaa");
        let full = IdentityKey::for_image("registry.io/ubi9", "sha256:bbb");

        assert_eq!(doc.relationships[0].from.value(), "application:myapp:1.0");
        assert_eq!(doc.relationships[0].to, minimal);
        assert_eq!(doc.relationships[0].rel_type, RelationType::DerivedFrom);
        assert_eq!(doc.relationships[1].from, minimal);
        assert_eq!(doc.relationships[1].to, full);

        assert!(doc.validate_relationships().is_ok());
    }

    #[test]
    fn test_augment_is_idempotent() {
        let mut doc = doc_with_primary("myapp");
        let entries = lineage(&["registry.io/ubi9:latest@sha256:bbb"]);
        augment(&mut doc, &entries).unwrap();
        let once_components = doc.component_count();
        let once_edges = doc.relationships.len();

        augment(&mut doc, &entries).unwrap();
        assert_eq!(doc.component_count(), once_components);
        assert_eq!(doc.relationships.len(), once_edges);
    }

    #[test]
    fn test_augment_requires_primary() {
        let mut doc = SbomDocument::default();
        let err = augment(&mut doc, &lineage(&["r.io/a@sha256:aaa"])).unwrap_err();
        assert!(matches!(err, ComposeError::MissingPrimaryComponent { .. }));
    }

    fn dockerfile(json: &str) -> ParsedDockerfile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_lineage_from_dockerfile_marks_stages() {
        let parsed = dockerfile(
            r#"{"Stages": [
                {"From": {"Image": "registry.io/golang:1.22"}},
                {"From": {"Image": "registry.io/ubi9:latest"}}
            ]}"#,
        );
        let digests: HashMap<String, String> = [
            (
                "registry.io/golang:1.22".to_string(),
                "registry.io/golang:1.22@sha256:aaa".to_string(),
            ),
            (
                "registry.io/ubi9:latest".to_string(),
                "registry.io/ubi9:latest@sha256:bbb".to_string(),
            ),
        ]
        .into();

        let entries = lineage_from_dockerfile(&parsed, &digests).unwrap();
        assert_eq!(entries.len(), 2);
        // Nearest ancestor (the final base) first.
        assert_eq!(entries[0].reference.repository, "registry.io/ubi9");
        assert_eq!(
            entries[0].properties,
            vec![(PROP_IS_BASE_IMAGE.to_string(), "true".to_string())]
        );
        assert_eq!(entries[1].reference.repository, "registry.io/golang");
        assert_eq!(
            entries[1].properties,
            vec![(PROP_BUILDER_IMAGE_FOR_STAGE.to_string(), "0".to_string())]
        );
    }

    #[test]
    fn test_lineage_skips_scratch_and_oci_archive() {
        let parsed = dockerfile(
            r#"{"Stages": [
                {"From": {"Image": "oci-archive:./flatpak.tar"}},
                {"From": {"Scratch": true}},
                {"From": {"Image": "registry.io/ubi9:latest"}}
            ]}"#,
        );
        let digests: HashMap<String, String> = [(
            "registry.io/ubi9:latest".to_string(),
            "registry.io/ubi9:latest@sha256:bbb".to_string(),
        )]
        .into();

        let entries = lineage_from_dockerfile(&parsed, &digests).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reference.repository, "registry.io/ubi9");
    }

    #[test]
    fn test_lineage_chases_named_stages() {
        let parsed = dockerfile(
            r#"{"Stages": [
                {"From": {"Image": "registry.io/builder:1"}},
                {"From": {"Stage": {"Named": "builder", "Index": 0}}}
            ]}"#,
        );
        let digests: HashMap<String, String> = [(
            "registry.io/builder:1".to_string(),
            "registry.io/builder:1@sha256:ccc".to_string(),
        )]
        .into();

        let entries = lineage_from_dockerfile(&parsed, &digests).unwrap();
        // Both stages resolve to the same image: one entry, two properties.
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].properties.len(), 2);
        assert_eq!(entries[0].properties[1].0, PROP_IS_BASE_IMAGE);
    }

    #[test]
    fn test_lineage_skips_stage_without_digest() {
        let parsed = dockerfile(
            r#"{"Stages": [
                {"From": {"Image": "registry.io/unused:1"}},
                {"From": {"Image": "registry.io/ubi9:latest"}}
            ]}"#,
        );
        let digests: HashMap<String, String> = [(
            "registry.io/ubi9:latest".to_string(),
            "registry.io/ubi9:latest@sha256:bbb".to_string(),
        )]
        .into();

        let entries = lineage_from_dockerfile(&parsed, &digests).unwrap();
        assert_eq!(entries.len(), 1);
    }
}

//! Image-index (manifest list) augmentation.
//!
//! Reconciles per-architecture child SBOMs into one top-level SBOM for the
//! index: the union of all child component sets, a `container-image`
//! component for the index itself, and a `variantOf` edge from each child's
//! image component to the index. Components are tagged with the architectures
//! that carry them.

use crate::error::{ComposeError, Result};
use crate::merge::MergeEngine;
use crate::model::{
    Component, ComponentKind, IdentityKey, ImageReference, RelationType, Relationship,
    SbomDocument,
};
use indexmap::IndexMap;

/// Property marking a component present in every architecture.
pub const PROP_ARCH_INDEPENDENT: &str = "sbom-compose:image:arch_independent";

/// Property listing the architectures that carry a component present in only
/// a strict subset of children. The value is a sorted, comma-separated list.
pub const PROP_ARCHITECTURES: &str = "sbom-compose:image:architectures";

/// Build the top-level SBOM for a multi-architecture image index.
///
/// `children` maps architecture name to that architecture's SBOM document;
/// `index_ref` is the digest-pinned reference of the index manifest itself.
pub fn augment_index(
    children: &IndexMap<String, SbomDocument>,
    index_ref: &ImageReference,
) -> Result<SbomDocument> {
    if children.is_empty() {
        return Err(ComposeError::EmptyIndex);
    }

    // Every child must name its image component before its edges can point
    // at the index.
    let mut child_primaries: Vec<IdentityKey> = Vec::with_capacity(children.len());
    for (arch, child) in children {
        child_primaries
            .push(child.require_primary(&format!("index child document for '{arch}'"))?);
    }

    let documents: Vec<SbomDocument> = children.values().cloned().collect();
    let mut output = MergeEngine::new().merge(&documents)?;

    tag_architectures(&mut output, children);

    let index_key = IdentityKey::for_image(&index_ref.repository, &index_ref.digest);
    if output.get_component(&index_key).is_none() {
        output.insert_component(
            Component::with_key(
                index_key.clone(),
                ComponentKind::ContainerImage,
                index_ref.repository.clone(),
            )
            .with_purl(index_ref.oci_purl()),
        );
    }

    for child_primary in child_primaries {
        output.add_relationship(Relationship::new(
            child_primary,
            RelationType::VariantOf,
            index_key.clone(),
        ));
    }

    // The describes link of a document to its subject is the metadata
    // primary pointer; the annotator never runs on index documents, so this
    // assignment is what downstream consumers read.
    output.metadata.primary_component = Some(index_key);
    output.validate_relationships()?;

    tracing::info!(
        architectures = children.len(),
        components = output.component_count(),
        "assembled index SBOM"
    );
    Ok(output)
}

/// Tag each merged component with the set of architectures that contain it.
fn tag_architectures(output: &mut SbomDocument, children: &IndexMap<String, SbomDocument>) {
    let keys: Vec<IdentityKey> = output.components.keys().cloned().collect();
    for key in keys {
        let mut arches: Vec<&str> = children
            .iter()
            .filter(|(_, child)| child.components.contains_key(&key))
            .map(|(arch, _)| arch.as_str())
            .collect();
        arches.sort_unstable();

        let Some(component) = output.get_component_mut(&key) else {
            continue;
        };
        if arches.len() == children.len() {
            component.set_property(PROP_ARCH_INDEPENDENT, "true");
        } else if !arches.is_empty() {
            component.set_property(PROP_ARCHITECTURES, &arches.join(","));
        }
    }
}

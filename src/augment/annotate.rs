//! Final image-reference annotation.
//!
//! The last transform before serialization: records the output image's
//! resolved repository digest on the component that represents "this image"
//! and points the document metadata at it. Unlike the merge engine's
//! first-wins metadata policy, this step is authoritative and overwrites any
//! prior primary-component pointer.

use crate::error::{ComposeError, Result};
use crate::model::{
    Component, ComponentKind, IdentityKey, ImageReference, SbomDocument,
};

/// Look up or create the component for the final image and make it the
/// document's primary component.
///
/// Must run after all merging and augmentation so the primary pointer
/// reflects the fully merged graph.
pub fn annotate_final_image(
    doc: &mut SbomDocument,
    repository: &str,
    digest: &str,
) -> Result<()> {
    if repository.is_empty() {
        return Err(ComposeError::malformed(
            "final image annotation requires a repository",
        ));
    }
    if digest.is_empty() {
        return Err(ComposeError::malformed(
            "final image annotation requires a digest",
        ));
    }

    let reference = ImageReference::new(repository, digest);
    let key = IdentityKey::for_image(repository, digest);
    let purl = reference.oci_purl();

    if doc.get_component(&key).is_none() {
        doc.insert_component(Component::with_key(
            key.clone(),
            ComponentKind::ContainerImage,
            repository,
        ));
    }
    if let Some(component) = doc.get_component_mut(&key) {
        component.purl = Some(purl);
    }

    doc.metadata.primary_component = Some(key);
    tracing::info!(repository, digest, "annotated final image reference");
    Ok(())
}

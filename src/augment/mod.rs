//! Targeted SBOM augmentations.
//!
//! These transforms insert synthetic components and edges into merged
//! documents: base-image lineage, multi-architecture index assembly, and the
//! final image-reference annotation. They share the merge engine's identity
//! rule and edge de-duplication, which is what makes each of them idempotent.

mod annotate;
mod base_image;
mod index;

pub use annotate::annotate_final_image;
pub use base_image::{
    DockerfileStage, LineageEntry, ParsedDockerfile, PROP_BUILDER_IMAGE_FOR_STAGE,
    PROP_IS_BASE_IMAGE, StageFrom, StageRef, augment, lineage_from_dockerfile,
};
pub use index::{PROP_ARCHITECTURES, PROP_ARCH_INDEPENDENT, augment_index};

//! Index augmentation command handler.

use crate::augment::augment_index;
use crate::config::IndexAugmentConfig;
use crate::error::Result;
use crate::model::{ImageReference, SbomDocument};
use crate::parsers;
use crate::pipeline::{OutputTarget, write_document};
use indexmap::IndexMap;

/// Run the augment-index command.
pub fn run_augment_index(config: &IndexAugmentConfig) -> Result<()> {
    let index_ref = ImageReference::parse(&config.index_reference)?;

    let mut children: IndexMap<String, SbomDocument> = IndexMap::new();
    for (arch, path) in &config.children {
        children.insert(arch.clone(), parsers::parse_document(path)?);
    }

    let output = augment_index(&children, &index_ref)?;

    let target = OutputTarget::from_option(config.output.file.clone());
    write_document(&output, &target, config.output.quiet)
}

//! Final image annotation command handler.

use crate::augment::annotate_final_image;
use crate::config::AnnotateConfig;
use crate::error::Result;
use crate::parsers;
use crate::pipeline::{OutputTarget, write_document};

/// Run the annotate command. This is the last pipeline step before the SBOM
/// is published, so it runs after all merging and augmentation.
pub fn run_annotate(config: &AnnotateConfig) -> Result<()> {
    let mut doc = parsers::parse_document(&config.sbom)?;
    annotate_final_image(&mut doc, &config.repository, &config.digest)?;

    let target = OutputTarget::from_option(config.output.file.clone());
    write_document(&doc, &target, config.output.quiet)
}

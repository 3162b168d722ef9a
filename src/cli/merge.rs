//! Merge command handler.

use crate::config::MergeConfig;
use crate::error::Result;
use crate::merge::MergeEngine;
use crate::pipeline::{OutputTarget, load_documents, write_document};

/// Run the merge command.
pub fn run_merge(config: &MergeConfig) -> Result<()> {
    let documents = load_documents(&config.inputs)?;
    if !config.output.quiet {
        tracing::info!(inputs = documents.len(), "merging SBOM documents");
    }

    let merged = MergeEngine::new().merge(&documents)?;

    let target = OutputTarget::from_option(config.output.file.clone());
    write_document(&merged, &target, config.output.quiet)
}

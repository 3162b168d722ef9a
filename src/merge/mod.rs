//! Deterministic, lossless SBOM merge.
//!
//! The merge unions component sets under the identity rule and unions
//! relationship graphs with edge de-duplication, preserving provenance
//! without duplicating components. Output ordering is driven by input order,
//! so callers fix document order by convention (dependency-resolution
//! document first, filesystem-scan document second); the resulting component
//! and relationship *sets* are invariant under any permutation.

use crate::error::{ComposeError, Result};
use crate::model::{Component, Relationship, SbomDocument, Tool};
use indexmap::map::Entry;
use std::collections::HashSet;

/// The shared merge engine. All multi-document transforms go through here,
/// so de-duplication and validation logic exists exactly once.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeEngine;

impl MergeEngine {
    /// Create a new merge engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Merge `documents` into a single document.
    ///
    /// `documents` must be non-empty. Metadata comes from the first document
    /// whose primary component is set; later documents never overwrite it.
    /// Dangling relationship edges after the union are a hard error.
    pub fn merge(&self, documents: &[SbomDocument]) -> Result<SbomDocument> {
        if documents.is_empty() {
            return Err(ComposeError::malformed(
                "merge requires at least one input document",
            ));
        }

        let metadata = documents
            .iter()
            .find(|doc| doc.metadata.primary_component.is_some())
            .map_or_else(|| documents[0].metadata.clone(), |doc| doc.metadata.clone());

        let mut output = SbomDocument::new(metadata);
        output.metadata.add_tool(Tool::this_tool());
        // Top-level passthrough fields follow the same document as metadata.
        output.extra = documents
            .iter()
            .find(|doc| doc.metadata.primary_component.is_some())
            .map_or_else(|| documents[0].extra.clone(), |doc| doc.extra.clone());

        for (index, doc) in documents.iter().enumerate() {
            let label = doc.source_label();
            for component in doc.components.values() {
                merge_component(&mut output, component, &label, index)?;
            }
        }

        let mut seen: HashSet<Relationship> = HashSet::new();
        for doc in documents {
            for relationship in &doc.relationships {
                if seen.insert(relationship.clone()) {
                    output.relationships.push(relationship.clone());
                }
            }
        }

        output.validate_relationships()?;

        tracing::info!(
            inputs = documents.len(),
            components = output.component_count(),
            relationships = output.relationships.len(),
            "merged SBOM documents"
        );
        Ok(output)
    }
}

/// Union a single component into the accumulated output.
///
/// New keys are inserted preserving arrival order; existing keys union their
/// property sets and evidence. A kind disagreement under an equal key means
/// the identity rule produced a false collision and aborts the merge.
fn merge_component(
    output: &mut SbomDocument,
    incoming: &Component,
    source_label: &str,
    document_index: usize,
) -> Result<()> {
    let key = incoming.identity_key().clone();

    let existing = match output.components.entry(key.clone()) {
        Entry::Vacant(slot) => {
            let mut component = incoming.clone();
            // Seed evidence only for components that arrive without any, so
            // re-merging an already-merged document keeps its original labels.
            if component.evidence.is_empty() {
                component.add_evidence(source_label);
            }
            slot.insert(component);
            return Ok(());
        }
        Entry::Occupied(slot) => slot.into_mut(),
    };

    if existing.kind != incoming.kind {
        return Err(ComposeError::identity_conflict(
            key.value(),
            existing.kind.to_string(),
            incoming.kind.to_string(),
            Some(format!("{source_label} (input #{document_index})")),
        ));
    }

    for (name, value) in &incoming.properties {
        existing.set_property(name, value);
    }

    if incoming.evidence.is_empty() {
        existing.add_evidence(source_label);
    } else {
        for source in &incoming.evidence {
            existing.add_evidence(source.clone());
        }
    }

    if existing.purl.is_none() {
        existing.purl.clone_from(&incoming.purl);
    }
    if existing.version.is_none() {
        existing.version.clone_from(&incoming.version);
    }
    for (field, value) in &incoming.extra {
        existing
            .extra
            .entry(field.clone())
            .or_insert_with(|| value.clone());
    }

    Ok(())
}

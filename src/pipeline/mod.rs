//! Shared plumbing for CLI command handlers.
//!
//! Reading happens strictly before and writing strictly after the pure
//! transforms: documents are serialized fully in memory and only then
//! written, so a failing transform never leaves partial output behind.

use crate::error::{ComposeError, Result};
use crate::model::SbomDocument;
use crate::parsers;
use std::path::{Path, PathBuf};

/// Target for output - either stdout or a file.
#[derive(Debug, Clone)]
pub enum OutputTarget {
    /// Write to stdout
    Stdout,
    /// Write to a file
    File(PathBuf),
}

impl OutputTarget {
    /// Create output target from optional path.
    #[must_use]
    pub fn from_option(path: Option<PathBuf>) -> Self {
        match path {
            Some(p) => OutputTarget::File(p),
            None => OutputTarget::Stdout,
        }
    }
}

/// Load one document per input path, in argument order.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<SbomDocument>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        documents.push(parsers::parse_document(path)?);
    }
    Ok(documents)
}

/// Serialize `doc` and write it to the target, all-or-nothing.
pub fn write_document(doc: &SbomDocument, target: &OutputTarget, quiet: bool) -> Result<()> {
    let rendered = parsers::to_json_string(doc)?;
    match target {
        OutputTarget::Stdout => {
            print!("{rendered}");
            Ok(())
        }
        OutputTarget::File(path) => {
            std::fs::write(path, rendered).map_err(|e| ComposeError::io(path, e))?;
            if !quiet {
                tracing::info!("SBOM written to {}", path.display());
            }
            Ok(())
        }
    }
}

/// Read a small auxiliary JSON input (parsed Dockerfile, digest map).
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| ComposeError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| ComposeError::Malformed {
        reason: e.to_string(),
        origin: Some(path.display().to_string()),
    })
}

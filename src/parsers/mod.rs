//! SBOM document reading and writing.
//!
//! The wire shape is CycloneDX-compatible JSON (see [`cyclonedx`]). These
//! entry points add file handling and origin context to error messages.

pub mod cyclonedx;

pub use cyclonedx::EVIDENCE_PROPERTY;

use crate::error::{ComposeError, Result};
use crate::model::SbomDocument;
use std::path::Path;

/// Maximum SBOM file size (512 MB). A document larger than this is almost
/// certainly not something a single merge step should be fed.
const MAX_SBOM_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// Read and parse an SBOM document from a file.
pub fn parse_document(path: &Path) -> Result<SbomDocument> {
    let metadata = std::fs::metadata(path).map_err(|e| ComposeError::io(path, e))?;
    if metadata.len() > MAX_SBOM_FILE_SIZE {
        return Err(ComposeError::malformed_at(
            format!(
                "SBOM file is {} MB, exceeding the {} MB limit",
                metadata.len() / (1024 * 1024),
                MAX_SBOM_FILE_SIZE / (1024 * 1024),
            ),
            path.display().to_string(),
        ));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ComposeError::io(path, e))?;
    cyclonedx::parse_str(&content, Some(&path.display().to_string()))
}

/// Parse an SBOM document from string content.
pub fn parse_document_str(content: &str) -> Result<SbomDocument> {
    cyclonedx::parse_str(content, None)
}

/// Serialize a document to pretty-printed JSON.
pub fn to_json_string(doc: &SbomDocument) -> Result<String> {
    cyclonedx::to_json_string(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_missing_file() {
        let err = parse_document(Path::new("/nonexistent/sbom.json")).unwrap_err();
        assert!(matches!(err, ComposeError::Io { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_parse_document_str_rejects_non_json() {
        let err = parse_document_str("not json at all").unwrap_err();
        assert!(matches!(err, ComposeError::Malformed { .. }));
    }
}

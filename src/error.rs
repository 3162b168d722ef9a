//! Unified error types for sbom-compose.
//!
//! Every transform failure is terminal for the invoking step: errors indicate
//! malformed upstream input or a logic defect, never a transient condition,
//! so nothing here is retried. Each variant carries the offending key or
//! document context so a failure is actionable without a re-run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sbom-compose operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ComposeError {
    /// A component cannot be assigned an identity key.
    #[error("component cannot be assigned an identity key: {reason}")]
    Identity { reason: String },

    /// Two components resolved to the same identity key but disagree on kind.
    /// This indicates the identity rule produced a false collision.
    #[error(
        "identity conflict for key '{key}': kind '{existing}' vs '{incoming}'{}",
        .document.as_deref().map(|d| format!(" (while merging {d})")).unwrap_or_default()
    )]
    IdentityConflict {
        key: String,
        existing: String,
        incoming: String,
        document: Option<String>,
    },

    /// A relationship endpoint does not exist in the component mapping.
    #[error("relationship {relation} references unknown component key '{key}'")]
    DanglingRelationship { key: String, relation: String },

    /// An augmentation needs a primary component that is not set.
    #[error("document has no primary component: {context}")]
    MissingPrimaryComponent { context: String },

    /// An image index must have at least one child document.
    #[error("image index has no child documents")]
    EmptyIndex,

    /// Input fails minimal structural parsing.
    #[error("malformed document{}: {reason}", .origin.as_deref().map(|o| format!(" '{o}'")).unwrap_or_default())]
    Malformed {
        reason: String,
        origin: Option<String>,
    },

    /// IO errors with path context.
    #[error("IO error at {path:?}: {message}")]
    Io {
        path: Option<PathBuf>,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenient Result type for sbom-compose operations.
pub type Result<T> = std::result::Result<T, ComposeError>;

impl ComposeError {
    /// Create an identity error.
    pub fn identity(reason: impl Into<String>) -> Self {
        Self::Identity {
            reason: reason.into(),
        }
    }

    /// Create an identity-conflict error for a key with incompatible kinds.
    pub fn identity_conflict(
        key: impl Into<String>,
        existing: impl Into<String>,
        incoming: impl Into<String>,
        document: Option<String>,
    ) -> Self {
        Self::IdentityConflict {
            key: key.into(),
            existing: existing.into(),
            incoming: incoming.into(),
            document,
        }
    }

    /// Create a dangling-relationship error naming the offending key.
    pub fn dangling(key: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::DanglingRelationship {
            key: key.into(),
            relation: relation.into(),
        }
    }

    /// Create a missing-primary-component error.
    pub fn missing_primary(context: impl Into<String>) -> Self {
        Self::MissingPrimaryComponent {
            context: context.into(),
        }
    }

    /// Create a malformed-document error without an origin.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
            origin: None,
        }
    }

    /// Create a malformed-document error naming the offending input.
    pub fn malformed_at(reason: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
            origin: Some(origin.into()),
        }
    }

    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let message = format!("{source}");
        Self::Io {
            path: Some(path),
            message,
            source,
        }
    }

    /// Process exit code for this error kind.
    ///
    /// Success is 0; each error kind maps to a distinct non-zero code so CI
    /// steps can branch on the failure class.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } => 1,
            Self::Malformed { .. } | Self::Json(_) => 2,
            Self::Identity { .. } => 3,
            Self::IdentityConflict { .. } => 4,
            Self::DanglingRelationship { .. } => 5,
            Self::MissingPrimaryComponent { .. } => 6,
            Self::EmptyIndex => 7,
        }
    }
}

impl From<std::io::Error> for ComposeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: None,
            message: format!("{err}"),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_offending_key() {
        let err = ComposeError::dangling("pkg:npm/lodash@4.17.21", "dependsOn");
        let display = err.to_string();
        assert!(display.contains("pkg:npm/lodash@4.17.21"));
        assert!(display.contains("dependsOn"));
    }

    #[test]
    fn test_identity_conflict_display_includes_document() {
        let err = ComposeError::identity_conflict(
            "library:zlib:1.2",
            "library",
            "operating-system",
            Some("document-1".to_string()),
        );
        let display = err.to_string();
        assert!(display.contains("library:zlib:1.2"));
        assert!(display.contains("document-1"));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ComposeError::io("/path/to/sbom.json", io_err);
        assert!(err.to_string().contains("/path/to/sbom.json"));
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = vec![
            ComposeError::io(
                "x",
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            ),
            ComposeError::malformed("not json"),
            ComposeError::identity("empty name"),
            ComposeError::identity_conflict("k", "library", "file", None),
            ComposeError::dangling("k", "dependsOn"),
            ComposeError::missing_primary("augment"),
            ComposeError::EmptyIndex,
        ];
        let mut codes: Vec<i32> = errors.iter().map(ComposeError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 7, "every error kind has a distinct exit code");
        assert!(codes.iter().all(|c| *c != 0));
    }
}

//! Container image references.
//!
//! Digest-pinned references follow the shape buildah prints with
//! `--format '{{ .Name }}:{{ .Tag }}@{{ .Digest }}'`, for example:
//!
//! ```text
//! registry.access.redhat.com/ubi9/ubi:latest@sha256:627867e53ad6...
//! ```
//!
//! The repository part may embed a registry `host:port`, so the tag is split
//! from the right and a candidate containing `/` is not a tag.

use crate::error::{ComposeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed, digest-pinned image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Repository without tag or digest, e.g. `registry.example.com/ns/app`
    pub repository: String,
    /// Tag if the reference carried one (informational; never part of identity)
    pub tag: Option<String>,
    /// Digest, e.g. `sha256:627867e5...`
    pub digest: String,
}

impl ImageReference {
    /// Parse a `repository[:tag]@digest` reference.
    pub fn parse(reference: &str) -> Result<Self> {
        let (repo_with_tag, digest) = reference.rsplit_once('@').ok_or_else(|| {
            ComposeError::malformed(format!(
                "image reference '{reference}' has no '@digest' suffix"
            ))
        })?;
        if digest.is_empty() {
            return Err(ComposeError::malformed(format!(
                "image reference '{reference}' has an empty digest"
            )));
        }

        let (repository, tag) = match repo_with_tag.rsplit_once(':') {
            // host:port/path and digest-only references have no tag
            Some((_, candidate)) if candidate.contains('/') => (repo_with_tag, None),
            Some((repository, tag)) => (repository, Some(tag.to_string())),
            None => (repo_with_tag, None),
        };
        if repository.is_empty() {
            return Err(ComposeError::malformed(format!(
                "image reference '{reference}' has an empty repository"
            )));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag,
            digest: digest.to_string(),
        })
    }

    /// Build a reference from already-split parts.
    pub fn new(repository: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: None,
            digest: digest.into(),
        }
    }

    /// Short name: the last path fragment of the repository.
    pub fn name(&self) -> &str {
        self.repository
            .rsplit('/')
            .next()
            .unwrap_or(&self.repository)
    }

    /// Canonical OCI purl for this reference:
    /// `pkg:oci/<name>@<digest>?repository_url=<repository>`.
    pub fn oci_purl(&self) -> String {
        format!(
            "pkg:oci/{}@{}?repository_url={}",
            self.name(),
            self.digest,
            self.repository
        )
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{}@{}", self.repository, tag, self.digest),
            None => write!(f, "{}@{}", self.repository, self.digest),
        }
    }
}

/// Recover `(repository, digest)` from an OCI purl emitted by this engine.
///
/// Accepts both unencoded `sha256:` digests and the percent-encoded
/// `sha256%3A` form some generators produce.
pub fn parse_oci_purl(purl: &str) -> Option<(String, String)> {
    if purl.len() < 8 || !purl[..8].eq_ignore_ascii_case("pkg:oci/") {
        return None;
    }
    let rest = &purl[8..];

    let (name_and_version, qualifiers) = rest.split_once('?')?;
    let (_, version) = name_and_version.split_once('@')?;
    let digest = version.replace("%3A", ":").replace("%3a", ":");

    let repository = qualifiers
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("repository_url"))
        .map(|(_, value)| value.to_string())?;

    Some((repository, digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reference() {
        let image = ImageReference::parse(
            "registry.access.redhat.com/ubi9/ubi:latest@sha256:627867e53ad6",
        )
        .unwrap();
        assert_eq!(image.repository, "registry.access.redhat.com/ubi9/ubi");
        assert_eq!(image.tag.as_deref(), Some("latest"));
        assert_eq!(image.digest, "sha256:627867e53ad6");
        assert_eq!(image.name(), "ubi");
    }

    #[test]
    fn test_parse_registry_with_port_and_no_tag() {
        let image =
            ImageReference::parse("registry.local:5000/team/app@sha256:abc").unwrap();
        assert_eq!(image.repository, "registry.local:5000/team/app");
        assert_eq!(image.tag, None);
        assert_eq!(image.name(), "app");
    }

    #[test]
    fn test_parse_registry_with_port_and_tag() {
        let image =
            ImageReference::parse("registry.local:5000/team/app:v2@sha256:abc").unwrap();
        assert_eq!(image.repository, "registry.local:5000/team/app");
        assert_eq!(image.tag.as_deref(), Some("v2"));
    }

    #[test]
    fn test_parse_rejects_digestless_reference() {
        let err = ImageReference::parse("registry.local/team/app:v2").unwrap_err();
        assert!(matches!(err, ComposeError::Malformed { .. }));
    }

    #[test]
    fn test_oci_purl_shape() {
        let image = ImageReference::parse(
            "registry.access.redhat.com/ubi9/ubi:latest@sha256:aaa",
        )
        .unwrap();
        assert_eq!(
            image.oci_purl(),
            "pkg:oci/ubi@sha256:aaa?repository_url=registry.access.redhat.com/ubi9/ubi"
        );
    }

    #[test]
    fn test_oci_purl_roundtrip() {
        let image = ImageReference::new("registry.local:5000/team/app", "sha256:abc");
        let (repository, digest) = parse_oci_purl(&image.oci_purl()).unwrap();
        assert_eq!(repository, "registry.local:5000/team/app");
        assert_eq!(digest, "sha256:abc");
    }

    #[test]
    fn test_parse_oci_purl_percent_encoded_digest() {
        let (repository, digest) =
            parse_oci_purl("pkg:oci/ubi@sha256%3Aaaa?repository_url=registry.io/ubi9/ubi")
                .unwrap();
        assert_eq!(repository, "registry.io/ubi9/ubi");
        assert_eq!(digest, "sha256:aaa");
    }

    #[test]
    fn test_parse_oci_purl_rejects_other_types() {
        assert!(parse_oci_purl("pkg:npm/lodash@4.17.21").is_none());
    }
}

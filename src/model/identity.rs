//! Canonical identity keys for SBOM components.
//!
//! Deduplication across documents produced by different tools needs a stable,
//! comparable key. The resolution strategy is a tiered fallback:
//!
//! 1. **PURL** (Package URL) - normalized, globally unique
//! 2. **Image digest** - `container-image:<repository>:<digest>` for
//!    synthesized container-image components
//! 3. **Kind/name/version** - `kind:name:version` composite, exact match only
//!
//! Keys are deterministic: identical input always produces an identical key,
//! across repeated calls and across process restarts.

use crate::error::{ComposeError, Result};
use crate::model::ComponentKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Qualifier keys stripped during purl normalization because their values
/// vary run-to-run without changing package identity.
const NOISE_QUALIFIERS: &[&str] = &["checksum"];

/// Canonical identity key for a component.
///
/// Equality and hashing consider only the key value, so keys resolved from
/// different sources still collide when their values agree.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct IdentityKey {
    /// The normalized key string
    value: String,
    /// Source of the key
    source: KeySource,
}

/// Source of the identity key, ordered by reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySource {
    /// Derived from a normalized Package URL (most reliable)
    Purl,
    /// Derived from an image repository and digest
    ImageDigest,
    /// Composed from kind, name, and version
    KindNameVersion,
    /// Carried verbatim from an input document reference that could not be
    /// resolved to a component; surfaces as a dangling edge after merge
    Verbatim,
}

impl IdentityKey {
    /// Create a key from a purl, normalizing it first.
    pub fn from_purl(purl: &str) -> Self {
        Self {
            value: normalize_purl(purl),
            source: KeySource::Purl,
        }
    }

    /// Create a key from kind, name, and optional version.
    ///
    /// Version falls back to `-` so that `library:zlib:-` and
    /// `library:zlib:1.3` stay distinct.
    pub fn from_kind_name_version(kind: ComponentKind, name: &str, version: Option<&str>) -> Self {
        Self {
            value: format!("{}:{}:{}", kind, name, version.unwrap_or("-")),
            source: KeySource::KindNameVersion,
        }
    }

    /// Create a key for a container image from its repository and digest.
    ///
    /// Digest takes precedence over any tag for identity, since tags are
    /// mutable.
    pub fn for_image(repository: &str, digest: &str) -> Self {
        Self {
            value: format!("{}:{}:{}", ComponentKind::ContainerImage, repository, digest),
            source: KeySource::ImageDigest,
        }
    }

    /// Carry a reference string through as-is.
    ///
    /// Used for dependency refs that resolve to no component in their own
    /// document; the post-merge dangling-edge scan reports them instead of
    /// silently truncating the relationship list.
    pub fn verbatim(reference: &str) -> Self {
        Self {
            value: reference.to_string(),
            source: KeySource::Verbatim,
        }
    }

    /// Get the key value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the source of this key.
    pub fn source(&self) -> KeySource {
        self.source
    }
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Hash for IdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Resolve the identity key for a component's raw coordinates.
///
/// Purl-bearing components key on the normalized purl; everything else keys
/// on the `kind:name:version` composite. Two components are the same iff
/// their resolved keys are equal - casing or spelling differences are never
/// bridged, since guessing would conflate distinct packages.
pub fn resolve(
    kind: ComponentKind,
    name: &str,
    version: Option<&str>,
    purl: Option<&str>,
) -> Result<IdentityKey> {
    if let Some(purl) = purl {
        if !purl.trim().is_empty() {
            return Ok(IdentityKey::from_purl(purl));
        }
    }
    if name.is_empty() {
        return Err(ComposeError::identity(
            "component has neither a purl nor a name",
        ));
    }
    Ok(IdentityKey::from_kind_name_version(kind, name, version))
}

/// Normalize a purl string for comparison.
///
/// Lowercases the `pkg:` scheme and the type segment, drops qualifiers whose
/// values are build-time noise, and sorts the remaining qualifiers by key.
/// Namespace, name, and version casing is preserved (Maven and Go are
/// case-sensitive).
pub fn normalize_purl(purl: &str) -> String {
    let purl = purl.trim();

    // Split off the qualifier string; the subpath (after '#') stays attached
    // to whichever side it occurred on.
    let (base, qualifiers) = match purl.split_once('?') {
        Some((base, rest)) => (base, Some(rest)),
        None => (purl, None),
    };

    let base = normalize_base(base);

    let Some(qualifiers) = qualifiers else {
        return base;
    };

    // Qualifiers may themselves carry a '#subpath' suffix on the last pair.
    let (qualifiers, subpath) = match qualifiers.split_once('#') {
        Some((q, s)) => (q, Some(s)),
        None => (qualifiers, None),
    };

    let mut pairs: Vec<(String, &str)> = qualifiers
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.to_lowercase();
            if NOISE_QUALIFIERS.contains(&key.as_str()) {
                None
            } else {
                Some((key, value))
            }
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut normalized = base;
    if !pairs.is_empty() {
        let joined: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        normalized.push('?');
        normalized.push_str(&joined.join("&"));
    }
    if let Some(subpath) = subpath {
        normalized.push('#');
        normalized.push_str(subpath);
    }
    normalized
}

/// Lowercase the scheme and type segment of `pkg:type/rest`.
fn normalize_base(base: &str) -> String {
    let Some(rest) = strip_scheme(base) else {
        // Not a pkg: purl; compare verbatim apart from surrounding whitespace.
        return base.to_string();
    };
    match rest.split_once('/') {
        Some((ty, tail)) => format!("pkg:{}/{}", ty.to_lowercase(), tail),
        None => format!("pkg:{}", rest.to_lowercase()),
    }
}

fn strip_scheme(base: &str) -> Option<&str> {
    if base.len() >= 4 && base[..4].eq_ignore_ascii_case("pkg:") {
        Some(&base[4..])
    } else {
        None
    }
}

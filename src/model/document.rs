//! Core SBOM document and component data structures.
//!
//! A document is an identity-keyed component mapping plus a flat edge list.
//! Graph shape lives entirely in [`Relationship`] values referencing keys, so
//! cyclic dependency data needs no ownership cycles and the "no dangling
//! edge" invariant is a single post-merge scan.

use crate::error::{ComposeError, Result};
use crate::model::{IdentityKey, resolve};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// Closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Application,
    Library,
    ContainerImage,
    OperatingSystem,
    File,
}

impl ComponentKind {
    /// Parse a CycloneDX component type string.
    ///
    /// Types outside the modeled set (framework, firmware, ...) coerce to
    /// `Library`, the CycloneDX default type.
    pub fn from_cdx(value: &str) -> Self {
        match value {
            "application" => Self::Application,
            "container" => Self::ContainerImage,
            "operating-system" => Self::OperatingSystem,
            "file" => Self::File,
            "library" => Self::Library,
            other => {
                tracing::debug!("coercing component type '{other}' to library");
                Self::Library
            }
        }
    }

    /// The CycloneDX component type string.
    #[must_use]
    pub const fn as_cdx_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Library => "library",
            Self::ContainerImage => "container",
            Self::OperatingSystem => "operating-system",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => write!(f, "application"),
            Self::Library => write!(f, "library"),
            Self::ContainerImage => write!(f, "container-image"),
            Self::OperatingSystem => write!(f, "operating-system"),
            Self::File => write!(f, "file"),
        }
    }
}

/// Closed set of relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    Describes,
    DependsOn,
    DerivedFrom,
    VariantOf,
    ContainedBy,
}

impl RelationType {
    /// All relation types, in wire order.
    pub const ALL: [Self; 5] = [
        Self::Describes,
        Self::DependsOn,
        Self::DerivedFrom,
        Self::VariantOf,
        Self::ContainedBy,
    ];

    /// Wire name used in the dependencies array.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Describes => "describes",
            Self::DependsOn => "dependsOn",
            Self::DerivedFrom => "derivedFrom",
            Self::VariantOf => "variantOf",
            Self::ContainedBy => "containedBy",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directed, typed edge between two components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub from: IdentityKey,
    pub rel_type: RelationType,
    pub to: IdentityKey,
}

impl Relationship {
    /// Create a new relationship edge.
    #[must_use]
    pub const fn new(from: IdentityKey, rel_type: RelationType, to: IdentityKey) -> Self {
        Self { from, rel_type, to }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.rel_type, self.to)
    }
}

/// Tool entry in document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub version: Option<String>,
}

impl Tool {
    /// The tool entry this engine stamps onto documents it produces.
    #[must_use]
    pub fn this_tool() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Producing tools
    pub tools: Vec<Tool>,
    /// Serial number / document namespace if the producer assigned one
    pub serial_number: Option<String>,
    /// Weak reference to the component this document describes; resolved by
    /// lookup into the component mapping, never an owning pointer
    pub primary_component: Option<IdentityKey>,
    /// Unmodeled metadata fields, passed through unchanged
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            tools: Vec::new(),
            serial_number: None,
            primary_component: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl DocumentMetadata {
    /// Append a tool entry unless an equal one is already present.
    pub fn add_tool(&mut self, tool: Tool) {
        if !self.tools.contains(&tool) {
            self.tools.push(tool);
        }
    }
}

/// Component in an SBOM document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Canonical identity key; immutable once assigned
    identity_key: IdentityKey,
    /// Component kind
    pub kind: ComponentKind,
    /// Component name
    pub name: String,
    /// Version string; OS-level components frequently lack one
    pub version: Option<String>,
    /// Package URL when available
    pub purl: Option<String>,
    /// Tool-specific provenance, open string-to-string mapping
    pub properties: IndexMap<String, String>,
    /// Source-document identifiers that contributed this component;
    /// append-only across merges
    pub evidence: Vec<String>,
    /// Unmodeled component fields, passed through unchanged
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Component {
    /// Build a component, resolving its identity key from its coordinates.
    pub fn build(
        kind: ComponentKind,
        name: impl Into<String>,
        version: Option<String>,
        purl: Option<String>,
    ) -> Result<Self> {
        let name = name.into();
        let identity_key = resolve(kind, &name, version.as_deref(), purl.as_deref())?;
        Ok(Self {
            identity_key,
            kind,
            name,
            version,
            purl,
            properties: IndexMap::new(),
            evidence: Vec::new(),
            extra: serde_json::Map::new(),
        })
    }

    /// Build a component under an explicitly assigned key.
    ///
    /// Used for container-image components, which key on
    /// `container-image:<repository>:<digest>` even when they carry a purl.
    #[must_use]
    pub fn with_key(key: IdentityKey, kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            identity_key: key,
            kind,
            name: name.into(),
            version: None,
            purl: None,
            properties: IndexMap::new(),
            evidence: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Set the purl (builder style).
    #[must_use]
    pub fn with_purl(mut self, purl: impl Into<String>) -> Self {
        self.purl = Some(purl.into());
        self
    }

    /// Add a property (builder style).
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// The canonical identity key.
    #[must_use]
    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    /// Record a contributing source document; append-only, first-occurrence
    /// order, no duplicates.
    pub fn add_evidence(&mut self, source: impl Into<String>) {
        let source = source.into();
        if !self.evidence.contains(&source) {
            self.evidence.push(source);
        }
    }

    /// Insert a property under the documented conflict policy: first value
    /// wins the bare key; a different value for an occupied key lands on
    /// `key:2`, `key:3`, ... in arrival order. Equal values are a no-op, so
    /// repeated application is idempotent.
    pub fn set_property(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.properties.get(name) {
            if existing == value {
                return;
            }
        } else {
            self.properties.insert(name.to_string(), value.to_string());
            return;
        }

        let mut suffix = 2;
        loop {
            let candidate = format!("{name}:{suffix}");
            match self.properties.get(&candidate) {
                Some(existing) if existing == value => return,
                Some(_) => suffix += 1,
                None => {
                    self.properties.insert(candidate, value.to_string());
                    return;
                }
            }
        }
    }

    /// Display name with version.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.version
            .as_ref()
            .map_or_else(|| self.name.clone(), |v| format!("{}@{}", self.name, v))
    }
}

/// An SBOM document: metadata, components, and the relationship graph.
#[derive(Debug, Clone, Default)]
pub struct SbomDocument {
    /// Document-level metadata
    pub metadata: DocumentMetadata,
    /// Components indexed by identity key; insertion order preserved for
    /// stable, diff-friendly output
    pub components: IndexMap<IdentityKey, Component>,
    /// Ordered relationship edges
    pub relationships: Vec<Relationship>,
    /// Unmodeled top-level fields, passed through unchanged
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SbomDocument {
    /// Create a new empty document.
    #[must_use]
    pub fn new(metadata: DocumentMetadata) -> Self {
        Self {
            metadata,
            components: IndexMap::new(),
            relationships: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Insert a component, keyed by its identity.
    ///
    /// An existing component under the same key is replaced; union semantics
    /// live in the merge engine, which is the only mutation site that must
    /// not lose data.
    pub fn insert_component(&mut self, component: Component) {
        self.components
            .insert(component.identity_key().clone(), component);
    }

    /// Get a component by identity key.
    #[must_use]
    pub fn get_component(&self, key: &IdentityKey) -> Option<&Component> {
        self.components.get(key)
    }

    /// Get a mutable component by identity key.
    pub fn get_component_mut(&mut self, key: &IdentityKey) -> Option<&mut Component> {
        self.components.get_mut(key)
    }

    /// Append a relationship unless the exact triple is already present.
    ///
    /// Augmentors and the merge engine both rely on this for idempotence.
    pub fn add_relationship(&mut self, relationship: Relationship) -> bool {
        if self.relationships.contains(&relationship) {
            return false;
        }
        self.relationships.push(relationship);
        true
    }

    /// The primary component, if the metadata pointer is set and resolves.
    #[must_use]
    pub fn primary_component(&self) -> Option<&Component> {
        self.metadata
            .primary_component
            .as_ref()
            .and_then(|key| self.components.get(key))
    }

    /// The primary component's key, requiring that it is set and resolves.
    pub fn require_primary(&self, context: &str) -> Result<IdentityKey> {
        let key = self
            .metadata
            .primary_component
            .as_ref()
            .ok_or_else(|| ComposeError::missing_primary(context.to_string()))?;
        if !self.components.contains_key(key) {
            return Err(ComposeError::missing_primary(format!(
                "{context}: primary component '{key}' is not in the component mapping"
            )));
        }
        Ok(key.clone())
    }

    /// Validate that every relationship endpoint exists in the component
    /// mapping. Dangling edges are a hard error naming the offending key.
    pub fn validate_relationships(&self) -> Result<()> {
        for relationship in &self.relationships {
            for key in [&relationship.from, &relationship.to] {
                if !self.components.contains_key(key) {
                    return Err(ComposeError::dangling(
                        key.value(),
                        relationship.to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Total component count.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Content hash over components and relationships, independent of
    /// insertion order. Cheap equality check and a stable document label.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher_input = Vec::new();

        let mut keys: Vec<&IdentityKey> = self.components.keys().collect();
        keys.sort_by(|a, b| a.value().cmp(b.value()));
        for key in keys {
            hasher_input.extend(key.value().as_bytes());
            if let Some(component) = self.components.get(key) {
                hasher_input.extend(component.name.as_bytes());
                if let Some(version) = &component.version {
                    hasher_input.extend(version.as_bytes());
                }
            }
        }

        let mut edges: Vec<String> = self
            .relationships
            .iter()
            .map(ToString::to_string)
            .collect();
        edges.sort();
        for edge in edges {
            hasher_input.extend(edge.as_bytes());
        }

        xxh3_64(&hasher_input)
    }

    /// Order-independent label identifying this document in evidence sets:
    /// serial number, else the primary component key, else a content hash.
    #[must_use]
    pub fn source_label(&self) -> String {
        if let Some(serial) = &self.metadata.serial_number {
            if !serial.is_empty() {
                return serial.clone();
            }
        }
        if let Some(primary) = &self.metadata.primary_component {
            return primary.value().to_string();
        }
        format!("sbom:xxh3:{:016x}", self.content_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(name: &str, version: &str) -> Component {
        Component::build(
            ComponentKind::Library,
            name,
            Some(version.to_string()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut doc = SbomDocument::default();
        doc.insert_component(library("zlib", "1.3"));
        doc.insert_component(library("openssl", "3.0"));
        doc.insert_component(library("bash", "5.2"));

        let names: Vec<&str> = doc.components.values().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["zlib", "openssl", "bash"]);
    }

    #[test]
    fn test_add_relationship_dedupes_exact_triples() {
        let mut doc = SbomDocument::default();
        let a = library("a", "1");
        let b = library("b", "1");
        let edge = Relationship::new(
            a.identity_key().clone(),
            RelationType::DependsOn,
            b.identity_key().clone(),
        );
        doc.insert_component(a);
        doc.insert_component(b);

        assert!(doc.add_relationship(edge.clone()));
        assert!(!doc.add_relationship(edge));
        assert_eq!(doc.relationships.len(), 1);
    }

    #[test]
    fn test_validate_relationships_reports_offender() {
        let mut doc = SbomDocument::default();
        let a = library("a", "1");
        let missing = IdentityKey::verbatim("library:ghost:1");
        doc.relationships.push(Relationship::new(
            a.identity_key().clone(),
            RelationType::DependsOn,
            missing,
        ));
        doc.insert_component(a);

        let err = doc.validate_relationships().unwrap_err();
        assert!(err.to_string().contains("library:ghost:1"));
    }

    #[test]
    fn test_property_conflict_policy() {
        let mut component = library("zlib", "1.3");
        component.set_property("scanner", "syft");
        component.set_property("scanner", "syft"); // no-op
        component.set_property("scanner", "cachi2"); // conflict -> scanner:2
        component.set_property("scanner", "cachi2"); // idempotent

        assert_eq!(component.properties.get("scanner").unwrap(), "syft");
        assert_eq!(component.properties.get("scanner:2").unwrap(), "cachi2");
        assert_eq!(component.properties.len(), 2);
    }

    #[test]
    fn test_evidence_append_only_dedup() {
        let mut component = library("zlib", "1.3");
        component.add_evidence("doc-a");
        component.add_evidence("doc-b");
        component.add_evidence("doc-a");
        assert_eq!(component.evidence, vec!["doc-a", "doc-b"]);
    }

    #[test]
    fn test_content_hash_order_independent() {
        let mut one = SbomDocument::default();
        one.insert_component(library("a", "1"));
        one.insert_component(library("b", "1"));

        let mut two = SbomDocument::default();
        two.insert_component(library("b", "1"));
        two.insert_component(library("a", "1"));

        assert_eq!(one.content_hash(), two.content_hash());
    }

    #[test]
    fn test_source_label_prefers_serial_number() {
        let mut doc = SbomDocument::default();
        doc.metadata.serial_number = Some("urn:uuid:1234".to_string());
        assert_eq!(doc.source_label(), "urn:uuid:1234");

        doc.metadata.serial_number = None;
        assert!(doc.source_label().starts_with("sbom:xxh3:"));
    }

    #[test]
    fn test_require_primary_errors_when_unset() {
        let doc = SbomDocument::default();
        let err = doc.require_primary("base-image augmentation").unwrap_err();
        assert!(matches!(err, ComposeError::MissingPrimaryComponent { .. }));
    }
}

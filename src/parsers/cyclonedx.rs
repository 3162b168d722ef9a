//! CycloneDX-compatible JSON codec.
//!
//! Reads and writes the document model in a CycloneDX JSON shape:
//! `metadata.component` carries the primary component, `components` the
//! component array, `dependencies` the relationship graph. Unknown fields at
//! the top level, inside `metadata`, and on each component are captured in
//! flattened passthrough maps and re-emitted unchanged.
//!
//! Dependency entries carry one array per relationship type. `dependsOn` is
//! the CycloneDX-standard key; `describes`, `derivedFrom`, `variantOf`, and
//! `containedBy` are same-shaped sibling keys this engine reads back, so the
//! typed graph survives round-trips while plain CycloneDX consumers still see
//! a valid dependency graph.

use crate::error::{ComposeError, Result};
use crate::model::{
    Component, ComponentKind, DocumentMetadata, IdentityKey, RelationType, Relationship,
    SbomDocument, Tool, parse_oci_purl,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Property name under which component evidence is carried on the wire.
pub const EVIDENCE_PROPERTY: &str = "sbom-compose:evidence";

/// Spec version stamped on documents that did not carry one.
const DEFAULT_SPEC_VERSION: &str = "1.5";

/// Parse a CycloneDX JSON document.
///
/// `origin` names the input (a path, usually) in error messages.
pub fn parse_str(content: &str, origin: Option<&str>) -> Result<SbomDocument> {
    let bom: CdxBom = serde_json::from_str(content).map_err(|e| ComposeError::Malformed {
        reason: e.to_string(),
        origin: origin.map(String::from),
    })?;

    match bom.bom_format.as_deref() {
        Some("CycloneDX") => {}
        Some(other) => {
            return Err(malformed(
                format!("unsupported bomFormat '{other}'"),
                origin,
            ));
        }
        None if bom.extra.contains_key("spdxVersion") => {
            return Err(malformed("SPDX documents are not supported", origin));
        }
        None => {
            return Err(malformed("missing required field 'bomFormat'", origin));
        }
    }

    let mut metadata = DocumentMetadata {
        serial_number: bom.serial_number,
        ..DocumentMetadata::default()
    };

    let mut doc = SbomDocument::new(DocumentMetadata::default());
    doc.extra = bom.extra;

    // bom-ref (or name) -> identity key, for rewriting dependency refs.
    let mut id_map: HashMap<String, IdentityKey> = HashMap::new();

    if let Some(cdx_meta) = bom.metadata {
        if let Some(timestamp) = &cdx_meta.timestamp {
            metadata.timestamp = DateTime::parse_from_rfc3339(timestamp)
                .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));
        }
        if let Some(tools) = cdx_meta.tools {
            metadata.tools = tools.into_tools();
        }
        metadata.extra = cdx_meta.extra;

        if let Some(primary) = cdx_meta.component {
            let (component, reference) = convert_component(primary)?;
            let key = component.identity_key().clone();
            id_map.insert(reference, key.clone());
            id_map.insert(key.value().to_string(), key.clone());
            doc.insert_component(component);
            metadata.primary_component = Some(key);
        }
    }

    if let Some(components) = bom.components {
        for cdx_component in components {
            let (component, reference) = convert_component(cdx_component)?;
            let key = component.identity_key().clone();
            id_map.insert(reference, key.clone());
            id_map.insert(key.value().to_string(), key.clone());
            doc.insert_component(component);
        }
    }

    if let Some(dependencies) = bom.dependencies {
        for dependency in dependencies {
            let from = lookup(&id_map, &dependency.ref_field);
            for (rel_type, targets) in dependency.typed_targets() {
                for target in targets {
                    // Unresolvable refs are carried verbatim so the post-merge
                    // dangling-edge scan reports them instead of dropping them.
                    let to = lookup(&id_map, target);
                    doc.add_relationship(Relationship::new(from.clone(), rel_type, to));
                }
            }
        }
    }

    doc.metadata = metadata;
    Ok(doc)
}

/// Serialize a document to pretty-printed CycloneDX JSON.
pub fn to_json_string(doc: &SbomDocument) -> Result<String> {
    let bom = to_bom(doc);
    let mut rendered = serde_json::to_string_pretty(&bom)?;
    rendered.push('\n');
    Ok(rendered)
}

fn malformed(reason: impl Into<String>, origin: Option<&str>) -> ComposeError {
    ComposeError::Malformed {
        reason: reason.into(),
        origin: origin.map(String::from),
    }
}

fn lookup(id_map: &HashMap<String, IdentityKey>, reference: &str) -> IdentityKey {
    id_map
        .get(reference)
        .cloned()
        .unwrap_or_else(|| IdentityKey::verbatim(reference))
}

/// Convert a wire component; returns the component and the reference string
/// (`bom-ref`, falling back to the name) that dependencies use to point at it.
fn convert_component(cdx: CdxComponent) -> Result<(Component, String)> {
    let kind = ComponentKind::from_cdx(&cdx.component_type);
    let reference = cdx.bom_ref.clone().unwrap_or_else(|| cdx.name.clone());

    // Container-image components key on repository+digest, not on their purl,
    // so augmentors can look them up by image coordinates after a round-trip.
    let image_key = if kind == ComponentKind::ContainerImage {
        cdx.purl
            .as_deref()
            .and_then(parse_oci_purl)
            .map(|(repository, digest)| IdentityKey::for_image(&repository, &digest))
    } else {
        None
    };

    let mut component = match image_key {
        Some(key) => {
            let mut c = Component::with_key(key, kind, cdx.name);
            c.version = cdx.version;
            c.purl = cdx.purl;
            c
        }
        None => Component::build(kind, cdx.name, cdx.version, cdx.purl)?,
    };

    if let Some(properties) = cdx.properties {
        for property in properties {
            if property.name == EVIDENCE_PROPERTY {
                component.add_evidence(property.value);
            } else {
                component.set_property(&property.name, &property.value);
            }
        }
    }
    component.extra = cdx.extra;

    Ok((component, reference))
}

fn to_bom(doc: &SbomDocument) -> CdxBom {
    let primary_key = doc.metadata.primary_component.as_ref();

    let metadata_component = primary_key
        .and_then(|key| doc.components.get(key))
        .map(emit_component);

    // The primary component lives under metadata.component only, per
    // CycloneDX convention; everything else goes to the components array.
    let components: Vec<CdxComponent> = doc
        .components
        .values()
        .filter(|component| Some(component.identity_key()) != primary_key)
        .map(emit_component)
        .collect();

    let mut dependencies: IndexMap<String, CdxDependency> = IndexMap::new();
    for relationship in &doc.relationships {
        let entry = dependencies
            .entry(relationship.from.value().to_string())
            .or_insert_with(|| CdxDependency::new(relationship.from.value()));
        entry.push(relationship.rel_type, relationship.to.value());
    }

    let mut extra = doc.extra.clone();
    extra
        .entry("specVersion".to_string())
        .or_insert_with(|| Value::String(DEFAULT_SPEC_VERSION.to_string()));

    CdxBom {
        bom_format: Some("CycloneDX".to_string()),
        serial_number: doc.metadata.serial_number.clone(),
        metadata: Some(CdxMetadata {
            timestamp: Some(doc.metadata.timestamp.to_rfc3339()),
            tools: if doc.metadata.tools.is_empty() {
                None
            } else {
                Some(CdxTools::List(
                    doc.metadata.tools.iter().map(emit_tool).collect(),
                ))
            },
            component: metadata_component,
            extra: doc.metadata.extra.clone(),
        }),
        components: Some(components),
        dependencies: if dependencies.is_empty() {
            None
        } else {
            Some(dependencies.into_values().collect())
        },
        extra,
    }
}

fn emit_component(component: &Component) -> CdxComponent {
    let mut properties: Vec<CdxProperty> = component
        .properties
        .iter()
        .map(|(name, value)| CdxProperty {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();
    for source in &component.evidence {
        properties.push(CdxProperty {
            name: EVIDENCE_PROPERTY.to_string(),
            value: source.clone(),
        });
    }

    CdxComponent {
        component_type: component.kind.as_cdx_str().to_string(),
        bom_ref: Some(component.identity_key().value().to_string()),
        name: component.name.clone(),
        version: component.version.clone(),
        purl: component.purl.clone(),
        properties: if properties.is_empty() {
            None
        } else {
            Some(properties)
        },
        extra: component.extra.clone(),
    }
}

fn emit_tool(tool: &Tool) -> CdxTool {
    CdxTool {
        name: Some(tool.name.clone()),
        version: tool.version.clone(),
        extra: Map::new(),
    }
}

// ============================================================================
// Wire structures
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdxBom {
    bom_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<CdxMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    components: Option<Vec<CdxComponent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<Vec<CdxDependency>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdxMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<CdxTools>,
    #[serde(skip_serializing_if = "Option::is_none")]
    component: Option<CdxComponent>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Tools field: an array in CycloneDX 1.4/1.5, an object with a `components`
/// array in 1.6.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum CdxTools {
    List(Vec<CdxTool>),
    Object(CdxToolsObject),
}

impl CdxTools {
    fn into_tools(self) -> Vec<Tool> {
        let entries = match self {
            Self::List(entries) => entries,
            Self::Object(object) => object.components,
        };
        entries
            .into_iter()
            .filter_map(|tool| {
                tool.name.map(|name| Tool {
                    name,
                    version: tool.version,
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxToolsObject {
    #[serde(default)]
    components: Vec<CdxTool>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdxComponent {
    #[serde(rename = "type")]
    component_type: String,
    #[serde(rename = "bom-ref", skip_serializing_if = "Option::is_none")]
    bom_ref: Option<String>,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<Vec<CdxProperty>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CdxProperty {
    name: String,
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CdxDependency {
    #[serde(rename = "ref")]
    ref_field: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    describes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    derived_from: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    variant_of: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    contained_by: Vec<String>,
}

impl CdxDependency {
    fn new(ref_field: &str) -> Self {
        Self {
            ref_field: ref_field.to_string(),
            depends_on: Vec::new(),
            describes: Vec::new(),
            derived_from: Vec::new(),
            variant_of: Vec::new(),
            contained_by: Vec::new(),
        }
    }

    fn push(&mut self, rel_type: RelationType, target: &str) {
        self.array_mut(rel_type).push(target.to_string());
    }

    fn array_mut(&mut self, rel_type: RelationType) -> &mut Vec<String> {
        match rel_type {
            RelationType::DependsOn => &mut self.depends_on,
            RelationType::Describes => &mut self.describes,
            RelationType::DerivedFrom => &mut self.derived_from,
            RelationType::VariantOf => &mut self.variant_of,
            RelationType::ContainedBy => &mut self.contained_by,
        }
    }

    fn typed_targets(&self) -> [(RelationType, &[String]); 5] {
        [
            (RelationType::DependsOn, self.depends_on.as_slice()),
            (RelationType::Describes, self.describes.as_slice()),
            (RelationType::DerivedFrom, self.derived_from.as_slice()),
            (RelationType::VariantOf, self.variant_of.as_slice()),
            (RelationType::ContainedBy, self.contained_by.as_slice()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "bomFormat": "CycloneDX",
        "specVersion": "1.5",
        "metadata": {
            "timestamp": "2026-01-01T00:00:00Z",
            "component": {
                "type": "application",
                "bom-ref": "app-1",
                "name": "myapp",
                "version": "1.0.0",
                "purl": "pkg:generic/myapp@1.0.0"
            }
        },
        "components": [
            {
                "type": "library",
                "bom-ref": "lib-1",
                "name": "libfoo",
                "version": "1.0",
                "purl": "pkg:rpm/libfoo@1.0"
            }
        ],
        "dependencies": [
            {"ref": "app-1", "dependsOn": ["lib-1"]}
        ]
    }"#;

    #[test]
    fn test_parse_minimal() {
        let doc = parse_str(MINIMAL, None).unwrap();
        assert_eq!(doc.component_count(), 2);
        assert!(doc.metadata.primary_component.is_some());

        let primary = doc.primary_component().unwrap();
        assert_eq!(primary.name, "myapp");

        assert_eq!(doc.relationships.len(), 1);
        let edge = &doc.relationships[0];
        assert_eq!(edge.rel_type, RelationType::DependsOn);
        assert_eq!(edge.from.value(), "pkg:generic/myapp@1.0.0");
        assert_eq!(edge.to.value(), "pkg:rpm/libfoo@1.0");
    }

    #[test]
    fn test_parse_rejects_missing_bom_format() {
        let err = parse_str(r#"{"components": []}"#, Some("scan.json")).unwrap_err();
        assert!(err.to_string().contains("bomFormat"));
        assert!(err.to_string().contains("scan.json"));
    }

    #[test]
    fn test_parse_rejects_spdx() {
        let err = parse_str(r#"{"spdxVersion": "SPDX-2.3"}"#, None).unwrap_err();
        assert!(err.to_string().contains("SPDX"));
    }

    #[test]
    fn test_parse_keeps_unresolvable_refs_verbatim() {
        let content = r#"{
            "bomFormat": "CycloneDX",
            "components": [
                {"type": "library", "bom-ref": "lib-1", "name": "libfoo", "version": "1.0"}
            ],
            "dependencies": [
                {"ref": "lib-1", "dependsOn": ["ghost-ref"]}
            ]
        }"#;
        let doc = parse_str(content, None).unwrap();
        assert_eq!(doc.relationships.len(), 1);
        assert_eq!(doc.relationships[0].to.value(), "ghost-ref");
        // The dangling edge surfaces at validation, not at parse.
        assert!(doc.validate_relationships().is_err());
    }

    #[test]
    fn test_unknown_fields_roundtrip() {
        let content = r#"{
            "bomFormat": "CycloneDX",
            "specVersion": "1.6",
            "serialNumber": "urn:uuid:abc",
            "vulnerabilities": [{"id": "CVE-2024-0001"}],
            "components": [
                {
                    "type": "library",
                    "name": "libfoo",
                    "version": "1.0",
                    "licenses": [{"license": {"id": "MIT"}}]
                }
            ]
        }"#;
        let doc = parse_str(content, None).unwrap();
        assert!(doc.extra.contains_key("vulnerabilities"));
        assert_eq!(
            doc.extra.get("specVersion"),
            Some(&Value::String("1.6".to_string()))
        );

        let emitted = to_json_string(&doc).unwrap();
        let reparsed: Value = serde_json::from_str(&emitted).unwrap();
        assert_eq!(reparsed["specVersion"], "1.6");
        assert_eq!(reparsed["vulnerabilities"][0]["id"], "CVE-2024-0001");
        assert_eq!(
            reparsed["components"][0]["licenses"][0]["license"]["id"],
            "MIT"
        );
    }

    #[test]
    fn test_evidence_roundtrips_as_properties() {
        let mut doc = parse_str(MINIMAL, None).unwrap();
        let key = IdentityKey::from_purl("pkg:rpm/libfoo@1.0");
        doc.get_component_mut(&key).unwrap().add_evidence("doc-a");

        let emitted = to_json_string(&doc).unwrap();
        let reparsed = parse_str(&emitted, None).unwrap();
        assert_eq!(reparsed.get_component(&key).unwrap().evidence, vec!["doc-a"]);
    }

    #[test]
    fn test_tools_object_form() {
        let content = r#"{
            "bomFormat": "CycloneDX",
            "metadata": {
                "tools": {"components": [{"name": "syft", "version": "1.0.0"}]}
            },
            "components": []
        }"#;
        let doc = parse_str(content, None).unwrap();
        assert_eq!(doc.metadata.tools.len(), 1);
        assert_eq!(doc.metadata.tools[0].name, "syft");
    }

    #[test]
    fn test_container_component_keys_on_image_digest() {
        let content = r#"{
            "bomFormat": "CycloneDX",
            "components": [
                {
                    "type": "container",
                    "name": "registry.io/ns/app",
                    "purl": "pkg:oci/app@sha256:abc?repository_url=registry.io/ns/app"
                }
            ]
        }"#;
        let doc = parse_str(content, None).unwrap();
        let key = IdentityKey::for_image("registry.io/ns/app", "sha256:abc");
        assert!(doc.get_component(&key).is_some());
    }

    #[test]
    fn test_primary_emitted_only_under_metadata() {
        let doc = parse_str(MINIMAL, None).unwrap();
        let emitted = to_json_string(&doc).unwrap();
        let value: Value = serde_json::from_str(&emitted).unwrap();

        assert_eq!(value["metadata"]["component"]["name"], "myapp");
        let components = value["components"].as_array().unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0]["name"], "libfoo");
    }

    #[test]
    fn test_typed_relationships_roundtrip() {
        let mut doc = parse_str(MINIMAL, None).unwrap();
        let app = IdentityKey::from_purl("pkg:generic/myapp@1.0.0");
        let base = IdentityKey::for_image("registry.io/ubi9", "sha256:aaa");
        doc.insert_component(
            Component::with_key(base.clone(), ComponentKind::ContainerImage, "registry.io/ubi9")
                .with_purl("pkg:oci/ubi9@sha256:aaa?repository_url=registry.io/ubi9"),
        );
        doc.add_relationship(Relationship::new(app, RelationType::DerivedFrom, base.clone()));

        let emitted = to_json_string(&doc).unwrap();
        let reparsed = parse_str(&emitted, None).unwrap();
        assert!(
            reparsed
                .relationships
                .iter()
                .any(|r| r.rel_type == RelationType::DerivedFrom && r.to == base)
        );
    }
}

//! Tool catalog loading and the registry snapshot.
//!
//! A catalog is a JSON document with a `tools` array. Loading runs in two
//! phases: the document is validated against an embedded JSON Schema
//! (failures are collected and reported together), then converted into
//! `ToolSpec` entries. Unknown capability names are dropped during
//! conversion; malformed required fields never reach conversion because
//! the schema rejects them first.
//!
//! The catalog hash commits to every converted entry. Entries are hashed
//! as sorted tokens, so a document listing the same tools in a different
//! order produces the same snapshot hash.

use std::collections::BTreeMap;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use waygate_contracts::authority::{AuthorityScope, Capability, CapabilitySet, ProviderKind};
use waygate_contracts::error::{ErrorCode, WaygateError, WaygateResult};
use waygate_contracts::tool::{ToolInputSpec, ToolOutputSpec, ToolSpec};

/// JSON Schema every catalog document must satisfy before conversion.
const CATALOG_SCHEMA: &str = r#"{
  "type": "object",
  "required": ["tools"],
  "properties": {
    "tools": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["toolId", "description", "authority", "inputs", "outputs"],
        "properties": {
          "toolId": { "type": "string", "minLength": 1 },
          "description": { "type": "string" },
          "authority": {
            "type": "object",
            "required": ["providerKind", "capabilities"],
            "properties": {
              "providerKind": { "enum": ["Local", "Remote", "Delegated"] },
              "capabilities": { "type": "array", "items": { "type": "string" } }
            }
          },
          "inputs": {
            "type": "array",
            "items": {
              "type": "object",
              "required": ["name", "type", "required", "description"],
              "properties": {
                "name": { "type": "string", "minLength": 1 },
                "type": { "type": "string" },
                "required": { "type": "boolean" },
                "description": { "type": "string" }
              }
            }
          },
          "outputs": {
            "type": "array",
            "items": {
              "type": "object",
              "required": ["name", "type", "description"],
              "properties": {
                "name": { "type": "string", "minLength": 1 },
                "type": { "type": "string" },
                "description": { "type": "string" }
              }
            }
          }
        }
      }
    }
  }
}"#;

// ── Raw document types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CatalogDoc {
    tools: Vec<ToolDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolDoc {
    tool_id: String,
    description: String,
    authority: AuthorityDoc,
    inputs: Vec<InputDoc>,
    outputs: Vec<OutputDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorityDoc {
    provider_kind: ProviderKind,
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InputDoc {
    name: String,
    #[serde(rename = "type")]
    value_type: String,
    required: bool,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OutputDoc {
    name: String,
    #[serde(rename = "type")]
    value_type: String,
    description: String,
}

// ── Snapshot ─────────────────────────────────────────────────────────────────

/// An immutable view of the tool catalog at one point in time.
///
/// The gate validates decisions against a snapshot, and the trace records
/// the snapshot's hash so a resumed run can detect catalog drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRegistrySnapshot {
    entries: BTreeMap<String, ToolSpec>,
    catalog_hash: String,
}

impl ToolRegistrySnapshot {
    /// The entry for `tool_id`, if the catalog declares it.
    pub fn get(&self, tool_id: &str) -> Option<&ToolSpec> {
        self.entries.get(tool_id)
    }

    /// All entries, sorted by tool id.
    pub fn entries(&self) -> impl Iterator<Item = &ToolSpec> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical hash of the loaded catalog, independent of document order.
    pub fn catalog_hash(&self) -> &str {
        &self.catalog_hash
    }
}

/// Load a catalog document into a registry snapshot.
///
/// Fails with `catalog_invalid` on malformed JSON, schema violations, or a
/// duplicate tool id. Unknown capability names are skipped, not fatal.
pub fn load_catalog(json: &str) -> WaygateResult<ToolRegistrySnapshot> {
    let doc_value: serde_json::Value = serde_json::from_str(json).map_err(|e| {
        WaygateError::new(
            ErrorCode::CatalogInvalid,
            format!("catalog document is not valid JSON: {}", e),
        )
    })?;

    // Phase 1: structural validation, collecting every violation so the
    // operator sees the full failure set in one pass.
    let schema: serde_json::Value =
        serde_json::from_str(CATALOG_SCHEMA).expect("embedded catalog schema is valid JSON");
    let validator = jsonschema::validator_for(&schema).map_err(|e| {
        WaygateError::new(
            ErrorCode::CatalogInvalid,
            format!("embedded catalog schema failed to compile: {}", e),
        )
    })?;

    let violations: Vec<String> = validator
        .iter_errors(&doc_value)
        .map(|error| format!("{} at {}", error, error.instance_path))
        .collect();
    if !violations.is_empty() {
        return Err(WaygateError::new(
            ErrorCode::CatalogInvalid,
            format!("catalog schema violations: {}", violations.join("; ")),
        ));
    }

    // Phase 2: conversion.
    let doc: CatalogDoc = serde_json::from_value(doc_value).map_err(|e| {
        WaygateError::new(
            ErrorCode::CatalogInvalid,
            format!("catalog document did not deserialize: {}", e),
        )
    })?;

    let mut entries: BTreeMap<String, ToolSpec> = BTreeMap::new();
    for tool in doc.tools {
        let spec = convert_tool(tool);
        if entries.insert(spec.tool_id.clone(), spec.clone()).is_some() {
            return Err(WaygateError::new(
                ErrorCode::CatalogInvalid,
                format!("tool '{}' is declared more than once", spec.tool_id),
            ));
        }
    }

    let catalog_hash = hash_entries(&entries);

    debug!(
        tools = entries.len(),
        catalog_hash = %catalog_hash,
        "catalog loaded"
    );

    Ok(ToolRegistrySnapshot {
        entries,
        catalog_hash,
    })
}

fn convert_tool(tool: ToolDoc) -> ToolSpec {
    let mut capabilities = CapabilitySet::default();
    for name in &tool.authority.capabilities {
        match Capability::parse(name) {
            Some(capability) => capabilities.grant(capability),
            None => {
                warn!(tool = %tool.tool_id, capability = %name, "unknown capability name ignored");
            }
        }
    }

    ToolSpec {
        tool_id: tool.tool_id,
        description: tool.description,
        authority: AuthorityScope {
            min_kind: tool.authority.provider_kind,
            capabilities,
        },
        inputs: tool
            .inputs
            .into_iter()
            .map(|input| ToolInputSpec {
                name: input.name,
                value_type: input.value_type,
                required: input.required,
                description: input.description,
            })
            .collect(),
        outputs: tool
            .outputs
            .into_iter()
            .map(|output| ToolOutputSpec {
                name: output.name,
                value_type: output.value_type,
                description: output.description,
            })
            .collect(),
    }
}

/// Hash the converted entry set.
///
/// One token per entry, every field listed explicitly; tokens are sorted
/// before hashing so input order cannot leak into the hash. The BTreeMap
/// already iterates sorted, but sorting the tokens keeps the function
/// correct even if the container changes.
fn hash_entries(entries: &BTreeMap<String, ToolSpec>) -> String {
    let mut tokens: Vec<String> = entries
        .values()
        .map(|spec| {
            let capabilities: Vec<&str> =
                spec.authority.capabilities.iter().map(|c| c.as_str()).collect();
            let inputs: Vec<String> = spec
                .inputs
                .iter()
                .map(|i| format!("{}:{}:{}", i.name, i.value_type, i.required))
                .collect();
            let outputs: Vec<String> = spec
                .outputs
                .iter()
                .map(|o| format!("{}:{}", o.name, o.value_type))
                .collect();
            format!(
                "{}|{}|{}|{}|{}|{}",
                spec.tool_id,
                spec.description,
                spec.authority.min_kind.as_str(),
                capabilities.join(","),
                inputs.join(","),
                outputs.join(",")
            )
        })
        .collect();
    tokens.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(tokens.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
      "tools": [
        {
          "toolId": "fmt",
          "description": "Format workspace sources",
          "authority": { "providerKind": "Local", "capabilities": ["workspace:read", "workspace:write"] },
          "inputs": [
            { "name": "target", "type": "string", "required": true, "description": "What to format" }
          ],
          "outputs": [
            { "name": "report", "type": "string", "description": "Formatting report" }
          ]
        },
        {
          "toolId": "fetch",
          "description": "Fetch a remote artifact",
          "authority": { "providerKind": "Remote", "capabilities": ["net:egress"] },
          "inputs": [
            { "name": "url", "type": "string", "required": true, "description": "Source URL" },
            { "name": "checksum", "type": "string", "required": false, "description": "Expected digest" }
          ],
          "outputs": [
            { "name": "artifact", "type": "string", "description": "Fetched artifact name" }
          ]
        }
      ]
    }"#;

    #[test]
    fn loads_a_well_formed_catalog() {
        let snapshot = load_catalog(CATALOG).unwrap();
        assert_eq!(snapshot.len(), 2);

        let fmt = snapshot.get("fmt").unwrap();
        assert_eq!(fmt.authority.min_kind, ProviderKind::Local);
        assert!(fmt.authority.capabilities.has(&Capability::WorkspaceWrite));
        assert_eq!(fmt.inputs.len(), 1);
        assert!(fmt.inputs[0].required);
    }

    /// Same entries, different document order, same hash and entry set.
    #[test]
    fn catalog_hash_ignores_document_order() {
        let reordered = {
            let mut doc: serde_json::Value = serde_json::from_str(CATALOG).unwrap();
            let tools = doc["tools"].as_array_mut().unwrap();
            tools.reverse();
            doc.to_string()
        };

        let forward = load_catalog(CATALOG).unwrap();
        let backward = load_catalog(&reordered).unwrap();

        assert_eq!(forward.catalog_hash(), backward.catalog_hash());
        assert_eq!(forward, backward);
    }

    #[test]
    fn unknown_capability_names_are_ignored() {
        let catalog = r#"{
          "tools": [{
            "toolId": "odd",
            "description": "Tool with a stray capability",
            "authority": { "providerKind": "Local", "capabilities": ["workspace:read", "phi:read"] },
            "inputs": [],
            "outputs": []
          }]
        }"#;

        let snapshot = load_catalog(catalog).unwrap();
        let odd = snapshot.get("odd").unwrap();
        assert!(odd.authority.capabilities.has(&Capability::WorkspaceRead));
        assert_eq!(odd.authority.capabilities.iter().count(), 1);
    }

    #[test]
    fn missing_required_field_fails_the_load() {
        // No toolId.
        let catalog = r#"{
          "tools": [{
            "description": "nameless",
            "authority": { "providerKind": "Local", "capabilities": [] },
            "inputs": [],
            "outputs": []
          }]
        }"#;

        let err = load_catalog(catalog).unwrap_err();
        assert_eq!(err.code, ErrorCode::CatalogInvalid);
    }

    #[test]
    fn malformed_required_flag_fails_the_load() {
        let catalog = r#"{
          "tools": [{
            "toolId": "bad-input",
            "description": "input.required is a string",
            "authority": { "providerKind": "Local", "capabilities": [] },
            "inputs": [{ "name": "x", "type": "string", "required": "yes", "description": "" }],
            "outputs": []
          }]
        }"#;

        let err = load_catalog(catalog).unwrap_err();
        assert_eq!(err.code, ErrorCode::CatalogInvalid);
    }

    #[test]
    fn duplicate_tool_id_fails_the_load() {
        let catalog = r#"{
          "tools": [
            { "toolId": "twin", "description": "", "authority": { "providerKind": "Local", "capabilities": [] }, "inputs": [], "outputs": [] },
            { "toolId": "twin", "description": "", "authority": { "providerKind": "Local", "capabilities": [] }, "inputs": [], "outputs": [] }
          ]
        }"#;

        let err = load_catalog(catalog).unwrap_err();
        assert_eq!(err.code, ErrorCode::CatalogInvalid);
    }

    #[test]
    fn invalid_provider_kind_fails_the_load() {
        let catalog = r#"{
          "tools": [{
            "toolId": "weird",
            "description": "",
            "authority": { "providerKind": "Galactic", "capabilities": [] },
            "inputs": [],
            "outputs": []
          }]
        }"#;

        let err = load_catalog(catalog).unwrap_err();
        assert_eq!(err.code, ErrorCode::CatalogInvalid);
    }
}

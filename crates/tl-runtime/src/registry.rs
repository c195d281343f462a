//! The tool registry: loads a JSON manifest (`{tools:[{name, description,
//! schema, command, timeoutSec, envPassthrough?}, …]}`) into the two
//! shapes the rest of the runtime needs — [`ToolDefinition`]s to offer the
//! model, and [`ToolSpec`]s to hand to the process runner — enforcing name
//! uniqueness at load time.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use tl_domain::{Error, Result, ToolDefinition, ToolSpec};

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    schema: Value,
    command: Vec<String>,
    #[serde(default, rename = "timeoutSec")]
    timeout_sec: u64,
    #[serde(default, rename = "envPassthrough")]
    env_passthrough: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    tools: Vec<ManifestEntry>,
}

/// A read-only, name-keyed tool registry built once at process start.
pub struct ToolRegistry {
    specs: HashMap<String, ToolSpec>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
            definitions: Vec::new(),
        }
    }

    pub fn from_manifest_json(bytes: &[u8]) -> Result<Self> {
        let manifest: Manifest = serde_json::from_slice(bytes)?;
        Self::build(manifest.tools)
    }

    fn build(entries: Vec<ManifestEntry>) -> Result<Self> {
        let mut specs = HashMap::with_capacity(entries.len());
        let mut definitions = Vec::with_capacity(entries.len());

        for entry in entries {
            if specs.contains_key(&entry.name) {
                return Err(Error::Config(format!(
                    "duplicate tool name in manifest: {}",
                    entry.name
                )));
            }
            definitions.push(ToolDefinition {
                name: entry.name.clone(),
                description: entry.description.clone(),
                parameters: entry.schema.clone(),
            });
            specs.insert(
                entry.name.clone(),
                ToolSpec {
                    name: entry.name,
                    command: entry.command,
                    timeout_seconds: entry.timeout_sec,
                    env_passthrough: entry.env_passthrough,
                },
            );
        }

        Ok(Self { specs, definitions })
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.get(name)
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
impl ToolRegistry {
    /// Builds a registry straight from `ToolSpec`s, bypassing manifest
    /// parsing — for tests that only care about dispatch, not loading.
    pub fn build_for_test(specs: Vec<ToolSpec>) -> Self {
        let mut registry = Self::empty();
        for spec in specs {
            registry.definitions.push(ToolDefinition {
                name: spec.name.clone(),
                description: String::new(),
                parameters: Value::Null,
            });
            registry.specs.insert(spec.name.clone(), spec);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_tools_from_manifest_json() {
        let manifest = serde_json::json!({
            "tools": [
                {
                    "name": "fs_write_file",
                    "description": "Write a file",
                    "schema": { "type": "object" },
                    "command": ["fs-write-file"],
                    "timeoutSec": 5,
                    "envPassthrough": ["HOME"]
                },
                {
                    "name": "fs_read_file",
                    "description": "Read a file",
                    "schema": { "type": "object" },
                    "command": ["fs-read-file"]
                }
            ]
        });
        let registry = ToolRegistry::from_manifest_json(manifest.to_string().as_bytes()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("fs_write_file").unwrap().timeout_seconds, 5);
        assert_eq!(registry.get("fs_read_file").unwrap().timeout_seconds, 0);
        assert!(registry.get("does_not_exist").is_none());
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn duplicate_tool_name_is_rejected() {
        let manifest = serde_json::json!({
            "tools": [
                { "name": "dup", "command": ["a"] },
                { "name": "dup", "command": ["b"] }
            ]
        });
        let err = ToolRegistry::from_manifest_json(manifest.to_string().as_bytes()).unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[test]
    fn empty_registry_has_no_tools() {
        let registry = ToolRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.definitions().is_empty());
    }
}

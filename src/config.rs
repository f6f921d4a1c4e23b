//! Mapper configuration, loaded from TOML.
//!
//! ```toml
//! namespace = "https://example.org/model"
//! ontology_iri = "https://example.org/model/ontology"
//! max_depth = 2
//! disjointness = true
//! blacklist = ["fisheries.data.Vessel.commissioned", "internalNotes"]
//! allow_many_to_one = ["fisheries.data.Vessel.flagCountry"]
//! key_resolution = "numeric-then-natural"
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FieldDescriptor, TypeDescriptor};
use crate::error::ConfigError;

fn default_namespace() -> String {
    "https://owlmap.dev/model".into()
}

fn default_ontology_iri() -> String {
    "https://owlmap.dev/model/ontology".into()
}

fn default_max_depth() -> i32 {
    2
}

fn default_disjointness() -> bool {
    true
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

/// How a reference's identifier fragment is turned into a gateway key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyResolution {
    /// Parse as an integer identifier, fall back to a natural key.
    #[default]
    NumericThenNatural,
    /// Integer identifiers only; anything else is unresolvable.
    NumericOnly,
    /// Treat every fragment as a natural key.
    NaturalOnly,
}

impl std::fmt::Display for KeyResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyResolution::NumericThenNatural => "numeric-then-natural",
            KeyResolution::NumericOnly => "numeric-only",
            KeyResolution::NaturalOnly => "natural-only",
        };
        f.write_str(name)
    }
}

/// Which fields the schema builder and encoder may map.
///
/// Entries are either a bare field name (applies to every type) or
/// `QualifiedTypeName.field`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingPolicy {
    #[serde(default)]
    pub blacklist: BTreeSet<String>,
    #[serde(default)]
    pub allow_many_to_one: BTreeSet<String>,
}

impl MappingPolicy {
    fn matches(set: &BTreeSet<String>, ty: &TypeDescriptor, field: &FieldDescriptor) -> bool {
        set.contains(field.name())
            || set.contains(&format!("{}.{}", ty.qualified_name(), field.name()))
    }

    pub fn is_blacklisted(&self, ty: &TypeDescriptor, field: &FieldDescriptor) -> bool {
        Self::matches(&self.blacklist, ty, field)
    }

    /// Whether a field is mapped at all.
    ///
    /// Skips blacklisted fields, accessors without a backing field and
    /// many-to-one references that are not allow-listed.
    pub fn admits(&self, ty: &TypeDescriptor, field: &FieldDescriptor) -> bool {
        if !field.is_backed() || self.is_blacklisted(ty, field) {
            return false;
        }
        !field.is_many_to_one() || Self::matches(&self.allow_many_to_one, ty, field)
    }
}

/// Top-level mapper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Namespace all class IRIs are minted under.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// IRI of the `owl:Ontology` node and `rdfs:isDefinedBy` target.
    #[serde(default = "default_ontology_iri")]
    pub ontology_iri: String,
    /// Reference depth followed by the encoder.
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
    /// Emit pairwise `owl:disjointWith` between sibling classes.
    #[serde(default = "default_disjointness")]
    pub disjointness: bool,
    #[serde(flatten)]
    pub policy: MappingPolicy,
    #[serde(default)]
    pub key_resolution: KeyResolution,
    /// Timeout for remote ontology fetches.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            ontology_iri: default_ontology_iri(),
            max_depth: default_max_depth(),
            disjointness: default_disjointness(),
            policy: MappingPolicy::default(),
            key_resolution: KeyResolution::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl MapperConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

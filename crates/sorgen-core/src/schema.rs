use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Declarative input consumed by graph construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDefinition {
    /// Entities in declaration order.
    pub entities: Vec<EntityDefinition>,
    /// Relationships between entity attributes.
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

/// Declared entity with its attributes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntityDefinition {
    /// Stable schema id used as the graph key.
    pub id: String,
    /// External identifier used in CSV output and dotted references.
    pub external_id: String,
    /// Human-facing name.
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: Vec<AttributeDefinition>,
}

/// Declared attribute of an entity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttributeDefinition {
    pub name: String,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Free-form type tag (e.g. `string`, `integer`, `email`).
    #[serde(default = "default_data_type")]
    pub data_type: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declared relationship between two attributes.
///
/// Attribute references are either an alias or an
/// `entityExternalId.attributeExternalId` token.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipDefinition {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_attribute: Option<String>,
    /// Multi-hop path; relationships declared this way are not modeled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl RelationshipDefinition {
    /// Returns the direct `(from, to)` attribute pair, if declared.
    pub fn attribute_pair(&self) -> Option<(&str, &str)> {
        match (self.from_attribute.as_deref(), self.to_attribute.as_deref()) {
            (Some(from), Some(to)) if !from.is_empty() && !to.is_empty() => Some((from, to)),
            _ => None,
        }
    }

    /// True when the relationship is declared via a multi-hop path only.
    pub fn is_path(&self) -> bool {
        self.attribute_pair().is_none() && !self.path.is_empty()
    }
}

impl SchemaDefinition {
    /// Parse a schema definition from JSON text.
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input)
            .map_err(|err| Error::schema(format!("failed to parse schema definition: {err}")))
    }

    /// Read and parse a schema definition from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            Error::schema(format!("failed to read schema '{}': {err}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }
}

fn default_data_type() -> String {
    "string".to_string()
}

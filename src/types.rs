//! Core types shared by the resolution and artifact passes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResolveError;

/// Prefix of a reference into `components.schemas`.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Prefix shared by every ORM extension facet.
pub const EXTENSION_PREFIX: &str = "x-";

/// OpenAPI types that map onto a scalar column.
pub const PRIMITIVE_TYPES: &[&str] = &["string", "integer", "number", "boolean"];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract the schema name from a `$ref` value.
///
/// `#/components/schemas/Employee` and any other local pointer resolve to
/// their last segment. Remote references are rejected.
pub fn ref_name(reference: &str) -> Result<&str, ResolveError> {
    if let Some(name) = reference.strip_prefix(SCHEMA_REF_PREFIX) {
        return Ok(name);
    }
    if reference.starts_with('#') {
        if let Some(name) = reference.rsplit('/').next().filter(|n| !n.is_empty()) {
            return Ok(name);
        }
    }
    Err(ResolveError::UnsupportedRef {
        reference: reference.to_string(),
    })
}

/// Whether a key names an ORM extension facet (`x-*`).
pub fn is_extension_key(key: &str) -> bool {
    key.starts_with(EXTENSION_PREFIX)
}

/// Named collection of raw component schemas.
///
/// Declaration order is preserved; it drives model and property ordering
/// in the generated artifacts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schemas {
    entries: Map<String, Value>,
}

impl Schemas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the collection from a JSON object of `name -> schema`.
    pub fn from_value(value: Value) -> Result<Self, ResolveError> {
        match value {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(ResolveError::InvalidSchema {
                message: format!(
                    "schemas must be an object, got {}",
                    json_type_name(&other)
                ),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: Value) {
        self.entries.insert(name.into(), schema);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Map<String, Value>> for Schemas {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, Value)> for Schemas {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// How a property is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyKind {
    /// Scalar column.
    Simple,
    /// Opaque JSON column.
    Json,
    /// Foreign-key backed association.
    Relationship,
    /// Read-only reverse side of a relationship; not a column.
    Backref,
}

/// Multiplicity of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    ManyToOne,
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl RelationshipType {
    /// Whether the property holds a single object rather than a list.
    pub fn is_to_one(&self) -> bool {
        matches!(self, RelationshipType::ManyToOne | RelationshipType::OneToOne)
    }
}

/// Options for a generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// When true, a default value that cannot be mapped fails the model.
    /// When false it is dropped with a warning.
    pub strict_defaults: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            strict_defaults: true,
        }
    }
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether unmappable defaults are fatal.
    pub fn strict_defaults(mut self, strict: bool) -> Self {
        self.strict_defaults = strict;
        self
    }
}

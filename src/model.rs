//! Model-level artifact assembly.

use std::collections::HashSet;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::defaults::MappedDefault;
use crate::error::{ArtifactError, ResolveError};
use crate::facets;
use crate::property::{build, BackrefArtifacts, BuiltProperty, PropertyArtifacts};
use crate::registry::{Backref, Registry};
use crate::resolver::resolve_named;
use crate::types::{GenerateOptions, PropertyKind, Schemas};

/// Property artifacts in declaration order.
///
/// Serializes as a JSON object keyed by property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<(String, PropertyArtifacts)>,
}

impl Properties {
    pub fn get(&self, name: &str) -> Option<&PropertyArtifacts> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, artifacts)| artifacts)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyArtifacts)> {
        self.entries.iter().map(|(name, artifacts)| (name.as_str(), artifacts))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, artifacts: PropertyArtifacts) {
        self.entries.push((name, artifacts));
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, artifacts) in &self.entries {
            map.serialize_entry(name, artifacts)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexConstraint {
    pub name: Option<String>,
    pub expressions: Vec<String>,
    pub unique: Option<bool>,
}

/// One constructor / from-dict argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgArtifacts {
    pub name: String,
    pub required: bool,
    pub default: Option<MappedDefault>,
    pub read_only: Option<bool>,
}

/// Everything an emitter needs for one persisted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelArtifacts {
    pub name: String,
    pub tablename: String,
    pub description: Option<String>,
    /// Declared properties, then injected foreign key columns, then
    /// backreferences.
    pub properties: Properties,
    pub primary_keys: Vec<String>,
    pub composite_unique: Vec<UniqueConstraint>,
    pub composite_index: Vec<IndexConstraint>,
    pub backrefs: Vec<Backref>,
    pub mixins: Vec<String>,
    pub kwargs: Option<Map<String, Value>>,
}

impl ModelArtifacts {
    /// Names of properties of the given kind, in order.
    pub fn names_of(&self, kind: PropertyKind) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, artifacts)| artifacts.kind() == kind)
            .map(|(name, _)| name)
            .collect()
    }

    /// Arguments of the generated constructor, in property order.
    ///
    /// Backreferences and `x-dict-ignore` scalars are left out.
    pub fn constructor_args(&self) -> Vec<ArgArtifacts> {
        self.properties
            .iter()
            .filter(|(_, artifacts)| match artifacts {
                PropertyArtifacts::Backref(_) => false,
                PropertyArtifacts::Simple(simple) => simple.extension.dict_ignore != Some(true),
                _ => true,
            })
            .map(|(name, artifacts)| ArgArtifacts {
                name: name.to_string(),
                required: artifacts.required(),
                default: artifacts.default().cloned(),
                read_only: artifacts.read_only(),
            })
            .collect()
    }
}

/// A model's own properties, built but not yet merged with injections.
#[derive(Debug, Clone)]
pub(crate) struct DeclaredModel {
    pub name: String,
    /// Flattened model schema.
    pub schema: Value,
    pub properties: Vec<(String, BuiltProperty)>,
}

/// Build every declared property of the named model.
pub(crate) fn declare(
    name: &str,
    schemas: &Schemas,
    options: &GenerateOptions,
) -> Result<DeclaredModel, ArtifactError> {
    let schema = resolve_named(name, schemas)?;
    let required = facets::string_list(&schema, "required")?;

    let mut properties = Vec::new();
    if let Some(declared) = facets::object(&schema, "properties")? {
        for (property, property_schema) in declared {
            let built = build(
                name,
                property,
                property_schema,
                schemas,
                required.iter().any(|r| r == property),
                options,
            )
            .map_err(|err| err.in_property(name, property))?;
            properties.push((property.clone(), built));
        }
    }

    Ok(DeclaredModel {
        name: name.to_string(),
        schema,
        properties,
    })
}

/// Assemble one model from its declared properties and what other models
/// injected into it.
pub(crate) fn finish(
    declared: DeclaredModel,
    registry: &Registry,
) -> Result<ModelArtifacts, ArtifactError> {
    let DeclaredModel {
        name,
        schema,
        properties: built,
    } = declared;

    let tablename = facets::string(&schema, "x-tablename")?
        .ok_or_else(|| ArtifactError::MissingTablename {
            schema: name.clone(),
        })?
        .to_string();

    let mut properties = Properties::default();
    let mut declared_names = HashSet::new();
    for (property, built) in built {
        declared_names.insert(property.clone());
        properties.push(property, built.artifacts);
    }

    for column in registry.foreign_keys(&name) {
        if declared_names.contains(&column.name) {
            debug!(schema = %name, column = %column.name, "foreign key column already declared");
            continue;
        }
        if properties.contains(&column.name) {
            return Err(ArtifactError::DuplicateProperty {
                schema: name,
                name: column.name.clone(),
            });
        }
        properties.push(
            column.name.clone(),
            PropertyArtifacts::Simple(column.artifacts.clone()),
        );
    }

    let backrefs = registry.backrefs(&name).to_vec();
    for backref in &backrefs {
        if properties.contains(&backref.name) {
            return Err(ArtifactError::DuplicateProperty {
                schema: name,
                name: backref.name.clone(),
            });
        }
        properties.push(
            backref.name.clone(),
            PropertyArtifacts::Backref(BackrefArtifacts::from(backref)),
        );
    }

    let primary_keys = properties
        .iter()
        .filter(|(_, artifacts)| artifacts.primary_key())
        .map(|(property, _)| property.to_string())
        .collect();

    let composite_unique = match schema.get("x-composite-unique").filter(|v| !v.is_null()) {
        Some(value) => unique_constraints(&name, value)?,
        None => Vec::new(),
    };
    let composite_index = match schema.get("x-composite-index").filter(|v| !v.is_null()) {
        Some(value) => index_constraints(&name, value)?,
        None => Vec::new(),
    };

    let mixins = match schema.get("x-mixins").filter(|v| !v.is_null()) {
        None => Vec::new(),
        Some(Value::String(mixin)) => vec![mixin.clone()],
        Some(_) => facets::string_list(&schema, "x-mixins")?,
    };

    debug!(
        schema = %name,
        properties = properties.len(),
        backrefs = backrefs.len(),
        "assembled model"
    );

    Ok(ModelArtifacts {
        description: facets::string(&schema, "description")?.map(String::from),
        kwargs: facets::object(&schema, "x-kwargs")?.cloned(),
        name,
        tablename,
        properties,
        primary_keys,
        composite_unique,
        composite_index,
        backrefs,
        mixins,
    })
}

/// Assemble the named model against a registry already filled by every
/// model's injections (see [`crate::collect_injections`]).
///
/// # Errors
///
/// Fails with `ArtifactError::MissingTablename` for a schema that is not a
/// model, `ArtifactError::DuplicateProperty` when an injected name collides,
/// and `ArtifactError::InProperty` around any property that fails to build.
pub fn assemble(
    name: &str,
    schemas: &Schemas,
    registry: &Registry,
    options: &GenerateOptions,
) -> Result<ModelArtifacts, ArtifactError> {
    if !schemas.contains(name) {
        return Err(ResolveError::SchemaNotFound {
            name: name.to_string(),
            referenced_by: None,
        }
        .into());
    }
    finish(declare(name, schemas, options)?, registry)
}

fn malformed(schema: &str, message: impl Into<String>) -> ArtifactError {
    ArtifactError::MalformedSchema {
        schema: schema.to_string(),
        message: message.into(),
    }
}

fn strings(schema: &str, value: &Value, what: &str) -> Result<Vec<String>, ArtifactError> {
    let items = value
        .as_array()
        .ok_or_else(|| malformed(schema, format!("{} must be a list of strings", what)))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(String::from)
                .ok_or_else(|| malformed(schema, format!("{} must be a list of strings", what)))
        })
        .collect()
}

fn optional_name(schema: &str, object: &Map<String, Value>) -> Result<Option<String>, ArtifactError> {
    match object.get("name") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(name)) => Ok(Some(name.clone())),
        Some(_) => Err(malformed(schema, "constraint name must be a string")),
    }
}

/// Split a constraint facet into its entries.
///
/// A flat list of strings is a single entry; a list of lists or objects is
/// one entry each; an object is a single entry.
fn constraint_entries<'a>(schema: &str, value: &'a Value) -> Result<Vec<&'a Value>, ArtifactError> {
    match value {
        Value::Object(_) => Ok(vec![value]),
        Value::Array(items) if items.is_empty() => Ok(Vec::new()),
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(vec![value]),
        Value::Array(items) if items.iter().all(|i| i.is_array() || i.is_object()) => {
            Ok(items.iter().collect())
        }
        _ => Err(malformed(schema, "unsupported composite constraint shape")),
    }
}

fn unique_constraints(schema: &str, value: &Value) -> Result<Vec<UniqueConstraint>, ArtifactError> {
    constraint_entries(schema, value)?
        .into_iter()
        .map(|entry| match entry {
            Value::Object(object) => Ok(UniqueConstraint {
                name: optional_name(schema, object)?,
                columns: strings(
                    schema,
                    object.get("columns").unwrap_or(&Value::Null),
                    "unique columns",
                )?,
            }),
            other => Ok(UniqueConstraint {
                name: None,
                columns: strings(schema, other, "unique columns")?,
            }),
        })
        .collect()
}

fn index_constraints(schema: &str, value: &Value) -> Result<Vec<IndexConstraint>, ArtifactError> {
    constraint_entries(schema, value)?
        .into_iter()
        .map(|entry| match entry {
            Value::Object(object) => Ok(IndexConstraint {
                name: optional_name(schema, object)?,
                expressions: strings(
                    schema,
                    object.get("expressions").unwrap_or(&Value::Null),
                    "index expressions",
                )?,
                unique: match object.get("unique") {
                    None | Some(Value::Null) => None,
                    Some(Value::Bool(unique)) => Some(*unique),
                    Some(_) => return Err(malformed(schema, "index unique must be a boolean")),
                },
            }),
            other => Ok(IndexConstraint {
                name: None,
                expressions: strings(schema, other, "index expressions")?,
                unique: None,
            }),
        })
        .collect()
}

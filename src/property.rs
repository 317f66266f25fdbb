//! Per-property artifacts.
//!
//! [`build`] classifies a property and gathers everything an emitter needs
//! for it. Relationship properties may also contribute to other models;
//! those contributions come back as [`Injection`]s next to the artifacts.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::classify::{classify_resolved, BACKREF_POINTER};
use crate::defaults::{map_default, MappedDefault};
use crate::error::{ArtifactError, ResolveError};
use crate::facets;
use crate::foreign_key::{referenced_column, TargetSchema};
use crate::registry::{Backref, BackrefSubType, InjectedColumn, Injection};
use crate::relationship::{calculate_type, resolve_relationship, RelationshipLink};
use crate::resolver::{model_reference, resolve, resolve_deep, strip_extensions};
use crate::types::{GenerateOptions, PropertyKind, RelationshipType, Schemas};

/// Artifacts of one property, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyArtifacts {
    Simple(SimpleArtifacts),
    Json(JsonArtifacts),
    Relationship(RelationshipArtifacts),
    Backref(BackrefArtifacts),
}

impl PropertyArtifacts {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyArtifacts::Simple(_) => PropertyKind::Simple,
            PropertyArtifacts::Json(_) => PropertyKind::Json,
            PropertyArtifacts::Relationship(_) => PropertyKind::Relationship,
            PropertyArtifacts::Backref(_) => PropertyKind::Backref,
        }
    }

    /// Backreferences are never required.
    pub fn required(&self) -> bool {
        match self {
            PropertyArtifacts::Simple(a) => a.required,
            PropertyArtifacts::Json(a) => a.required,
            PropertyArtifacts::Relationship(a) => a.required,
            PropertyArtifacts::Backref(_) => false,
        }
    }

    pub fn primary_key(&self) -> bool {
        match self {
            PropertyArtifacts::Simple(a) => a.extension.primary_key,
            PropertyArtifacts::Json(a) => a.extension.primary_key,
            _ => false,
        }
    }

    pub fn default(&self) -> Option<&MappedDefault> {
        match self {
            PropertyArtifacts::Simple(a) => a.default.as_ref(),
            _ => None,
        }
    }

    pub fn read_only(&self) -> Option<bool> {
        match self {
            PropertyArtifacts::Simple(a) => a.open_api.read_only,
            PropertyArtifacts::Json(a) => a.open_api.read_only,
            _ => None,
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleArtifacts> {
        match self {
            PropertyArtifacts::Simple(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&RelationshipArtifacts> {
        match self {
            PropertyArtifacts::Relationship(a) => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleArtifacts {
    pub required: bool,
    /// Flattened schema without extension facets.
    pub schema: Value,
    pub open_api: SimpleOpenApi,
    pub extension: SimpleExtension,
    pub default: Option<MappedDefault>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleOpenApi {
    #[serde(rename = "type")]
    pub type_: String,
    pub format: Option<String>,
    pub max_length: Option<u64>,
    pub nullable: Option<bool>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub read_only: Option<bool>,
    pub write_only: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimpleExtension {
    pub primary_key: bool,
    pub autoincrement: Option<bool>,
    pub index: Option<bool>,
    pub unique: Option<bool>,
    pub foreign_key: Option<String>,
    pub kwargs: Option<Map<String, Value>>,
    pub foreign_key_kwargs: Option<Map<String, Value>>,
    /// Left out of dictionary conversion and constructor arguments.
    pub dict_ignore: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonArtifacts {
    pub required: bool,
    /// Fully inlined schema without extension facets.
    pub schema: Value,
    pub open_api: JsonOpenApi,
    pub extension: JsonExtension,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JsonOpenApi {
    pub nullable: Option<bool>,
    pub description: Option<String>,
    pub read_only: Option<bool>,
    pub write_only: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JsonExtension {
    pub primary_key: bool,
    pub index: Option<bool>,
    pub unique: Option<bool>,
    pub foreign_key: Option<String>,
    pub kwargs: Option<Map<String, Value>>,
    pub foreign_key_kwargs: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipArtifacts {
    pub required: bool,
    #[serde(rename = "type")]
    pub type_: RelationshipType,
    /// Model the property points at.
    pub target: String,
    pub schema: Value,
    pub description: Option<String>,
    /// Only meaningful for the to-one kinds.
    pub nullable: Option<bool>,
    pub write_only: Option<bool>,
    pub backref_property: Option<String>,
    pub kwargs: Option<Map<String, Value>>,
    pub link: RelationshipLink,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackrefArtifacts {
    pub sub_type: BackrefSubType,
    /// Model that owns the relationship.
    pub parent: String,
    pub schema: Value,
}

impl From<&Backref> for BackrefArtifacts {
    fn from(backref: &Backref) -> Self {
        Self {
            sub_type: backref.sub_type,
            parent: backref.parent.clone(),
            schema: backref.schema(),
        }
    }
}

/// A property's artifacts plus what it contributes to other models.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltProperty {
    pub artifacts: PropertyArtifacts,
    pub injections: Vec<Injection>,
}

impl BuiltProperty {
    fn plain(artifacts: PropertyArtifacts) -> Self {
        Self {
            artifacts,
            injections: Vec::new(),
        }
    }
}

/// Build the artifacts of property `name` declared on model `parent`.
///
/// `parent` must name an entry of `schemas` when the property is a
/// relationship; a `ONE_TO_MANY` foreign key points back at it.
///
/// # Errors
///
/// Resolution failures, relationship lookup failures and, with strict
/// defaults, unmappable default values.
pub fn build(
    parent: &str,
    name: &str,
    schema: &Value,
    schemas: &Schemas,
    required: bool,
    options: &GenerateOptions,
) -> Result<BuiltProperty, ArtifactError> {
    let resolved = resolve(schema, schemas)?;
    let kind = classify_resolved(schema, &resolved, schemas)?;
    debug!(schema = parent, property = name, ?kind, "building property");

    match kind {
        PropertyKind::Simple => {
            let artifacts = simple_artifacts(&resolved, required, options)?;
            Ok(BuiltProperty::plain(PropertyArtifacts::Simple(artifacts)))
        }
        PropertyKind::Json => {
            let artifacts = json_artifacts(schema, &resolved, schemas, required)?;
            Ok(BuiltProperty::plain(PropertyArtifacts::Json(artifacts)))
        }
        PropertyKind::Backref => {
            let artifacts = backref_artifacts(schema, &resolved, schemas)?;
            Ok(BuiltProperty::plain(PropertyArtifacts::Backref(artifacts)))
        }
        PropertyKind::Relationship => {
            relationship_artifacts(parent, name, schema, schemas, required, options)
        }
    }
}

fn extension_map(
    schema: &Value,
    key: &str,
) -> Result<Option<Map<String, Value>>, ArtifactError> {
    Ok(facets::object(schema, key)?.cloned())
}

/// Scalar artifacts from an already flattened schema.
pub(crate) fn simple_artifacts(
    resolved: &Value,
    required: bool,
    options: &GenerateOptions,
) -> Result<SimpleArtifacts, ArtifactError> {
    let type_ = facets::string(resolved, "type")?
        .ok_or_else(|| ArtifactError::MalformedReference {
            message: "scalar property has no type".to_string(),
        })?
        .to_string();
    let format = facets::string(resolved, "format")?.map(String::from);

    let raw_default = resolved.get("default").filter(|v| !v.is_null());
    let default = match map_default(&type_, format.as_deref(), raw_default) {
        Ok(mapped) => mapped,
        Err(err) if !options.strict_defaults => {
            warn!(error = %err, "dropping default value");
            None
        }
        Err(err) => return Err(err),
    };

    let open_api = SimpleOpenApi {
        type_,
        format,
        max_length: facets::unsigned(resolved, "maxLength")?,
        nullable: facets::boolean(resolved, "nullable")?,
        description: facets::string(resolved, "description")?.map(String::from),
        default: raw_default.cloned(),
        read_only: facets::boolean(resolved, "readOnly")?,
        write_only: facets::boolean(resolved, "writeOnly")?,
    };
    let extension = SimpleExtension {
        primary_key: facets::boolean(resolved, "x-primary-key")?.unwrap_or(false),
        autoincrement: facets::boolean(resolved, "x-autoincrement")?,
        index: facets::boolean(resolved, "x-index")?,
        unique: facets::boolean(resolved, "x-unique")?,
        foreign_key: facets::string(resolved, "x-foreign-key")?.map(String::from),
        kwargs: extension_map(resolved, "x-kwargs")?,
        foreign_key_kwargs: extension_map(resolved, "x-foreign-key-kwargs")?,
        dict_ignore: facets::boolean(resolved, "x-dict-ignore")?,
    };

    Ok(SimpleArtifacts {
        required,
        schema: strip_extensions(resolved),
        open_api,
        extension,
        default,
    })
}

fn json_artifacts(
    schema: &Value,
    resolved: &Value,
    schemas: &Schemas,
    required: bool,
) -> Result<JsonArtifacts, ArtifactError> {
    let open_api = JsonOpenApi {
        nullable: facets::boolean(resolved, "nullable")?,
        description: facets::string(resolved, "description")?.map(String::from),
        read_only: facets::boolean(resolved, "readOnly")?,
        write_only: facets::boolean(resolved, "writeOnly")?,
    };
    let extension = JsonExtension {
        primary_key: facets::boolean(resolved, "x-primary-key")?.unwrap_or(false),
        index: facets::boolean(resolved, "x-index")?,
        unique: facets::boolean(resolved, "x-unique")?,
        foreign_key: facets::string(resolved, "x-foreign-key")?.map(String::from),
        kwargs: extension_map(resolved, "x-kwargs")?,
        foreign_key_kwargs: extension_map(resolved, "x-foreign-key-kwargs")?,
    };

    Ok(JsonArtifacts {
        required,
        schema: strip_extensions(&resolve_deep(schema, schemas)?),
        open_api,
        extension,
    })
}

fn backref_artifacts(
    schema: &Value,
    resolved: &Value,
    schemas: &Schemas,
) -> Result<BackrefArtifacts, ArtifactError> {
    let sub_type = match facets::string(resolved, "type")? {
        Some("array") => BackrefSubType::Array,
        _ => BackrefSubType::Object,
    };

    let pointer_holder = match sub_type {
        BackrefSubType::Object => Some(resolved),
        BackrefSubType::Array => resolved.get("items"),
    };
    let pointer = pointer_holder
        .map(|holder| facets::string(holder, BACKREF_POINTER))
        .transpose()?
        .flatten();

    let parent = match pointer {
        Some(parent) => parent.to_string(),
        None => {
            let referencing = match sub_type {
                BackrefSubType::Object => Some(schema.clone()),
                BackrefSubType::Array => resolved.get("items").cloned(),
            };
            referencing
                .map(|holder| model_reference(&holder, schemas))
                .transpose()?
                .flatten()
                .ok_or_else(|| ArtifactError::MalformedReference {
                    message: "backref does not point at a model".to_string(),
                })?
        }
    };

    Ok(BackrefArtifacts {
        sub_type,
        schema: Backref::new("", sub_type, parent.as_str()).schema(),
        parent,
    })
}

fn relationship_artifacts(
    parent: &str,
    name: &str,
    schema: &Value,
    schemas: &Schemas,
    required: bool,
    options: &GenerateOptions,
) -> Result<BuiltProperty, ArtifactError> {
    let parent_schema = schemas
        .get(parent)
        .ok_or_else(|| ResolveError::SchemaNotFound {
            name: parent.to_string(),
            referenced_by: None,
        })?;

    let type_ = calculate_type(schema, schemas)?;
    let relationship = resolve_relationship(type_, parent, parent_schema, name, schema, schemas)?;

    let description = facets::local_string(schema, "description")?.map(String::from);
    let nullable = if type_.is_to_one() {
        facets::local_boolean(schema, "nullable")?
    } else {
        None
    };
    let write_only = facets::local_boolean(schema, "writeOnly")?;

    let mut shape = if type_.is_to_one() {
        json!({ "type": "object" })
    } else {
        json!({ "type": "array", "items": { "type": "object" } })
    };
    if let Some(map) = shape.as_object_mut() {
        if let Some(description) = &description {
            map.insert("description".into(), json!(description));
        }
        if let Some(nullable) = nullable {
            map.insert("nullable".into(), json!(nullable));
        }
        if let Some(write_only) = write_only {
            map.insert("writeOnly".into(), json!(write_only));
        }
    }

    let mut injections = Vec::new();
    if let RelationshipLink::ForeignKey(link) = &relationship.link {
        let referenced = TargetSchema::load(&link.referenced_schema, schemas)?;
        let column = referenced_column(&referenced, &link.column_name, schemas)?;
        let column_type = facets::string(&column, "type")?.ok_or_else(|| {
            ArtifactError::MalformedSchema {
                schema: referenced.name.clone(),
                message: format!("column '{}' has no type", link.column_name),
            }
        })?;

        let mut column_schema = json!({ "type": column_type });
        if let Some(map) = column_schema.as_object_mut() {
            for key in ["format", "maxLength"] {
                if let Some(value) = column.get(key).filter(|v| !v.is_null()) {
                    map.insert(key.to_string(), value.clone());
                }
            }
            if let Some(nullable) = nullable {
                map.insert("nullable".into(), json!(nullable));
            }
            map.insert("x-foreign-key".into(), json!(link.foreign_key));
            if let Some(kwargs) = facets::local_object(schema, "x-foreign-key-kwargs")?.cloned() {
                map.insert("x-foreign-key-kwargs".into(), Value::Object(kwargs));
            }
        }

        injections.push(Injection::ForeignKey {
            holder: link.holder.clone(),
            column: InjectedColumn {
                name: link.property_name.clone(),
                artifacts: simple_artifacts(&column_schema, false, options)?,
            },
        });
    }
    if let Some(backref) = &relationship.backref {
        injections.push(Injection::Backref {
            target: relationship.target.clone(),
            backref: backref.clone(),
        });
    }

    let artifacts = RelationshipArtifacts {
        required,
        type_,
        target: relationship.target,
        schema: shape,
        description,
        nullable,
        write_only,
        backref_property: relationship.backref.map(|backref| backref.name),
        kwargs: facets::local_object(schema, "x-kwargs")?.cloned(),
        link: relationship.link,
    };

    Ok(BuiltProperty {
        artifacts: PropertyArtifacts::Relationship(artifacts),
        injections,
    })
}

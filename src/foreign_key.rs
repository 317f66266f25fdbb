//! Foreign key naming and placement for relationships.
//!
//! For `MANY_TO_ONE` and `ONE_TO_ONE` the column lives on the referencing
//! model and points at the referenced model's table. For `ONE_TO_MANY` the
//! column lives on the child (the array's items) and points back at the
//! parent's table.

use serde_json::Value;

use crate::error::{ArtifactError, ResolveError};
use crate::facets;
use crate::resolver::{model_reference, resolve, resolve_named};
use crate::types::{RelationshipType, Schemas};

/// Column a foreign key references when no `x-foreign-key-column` is given.
pub const DEFAULT_FOREIGN_KEY_COLUMN: &str = "id";

/// A named, flattened model schema.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSchema {
    pub name: String,
    pub schema: Value,
}

impl TargetSchema {
    /// Flatten the named schema.
    pub fn load(name: &str, schemas: &Schemas) -> Result<Self, ArtifactError> {
        let schema = resolve_named(name, schemas).map_err(ArtifactError::from_target_lookup)?;
        Ok(Self {
            name: name.to_string(),
            schema,
        })
    }

    pub fn tablename(&self) -> Result<&str, ArtifactError> {
        facets::string(&self.schema, "x-tablename")?.ok_or_else(|| {
            ArtifactError::MissingTablename {
                schema: self.name.clone(),
            }
        })
    }
}

/// Schema a relationship's reference lives in: the property itself for
/// the to-one kinds, its `items` for the to-many kinds.
pub(crate) fn reference_holder(
    type_: RelationshipType,
    property_schema: &Value,
    schemas: &Schemas,
) -> Result<Value, ArtifactError> {
    if type_.is_to_one() {
        return Ok(property_schema.clone());
    }
    let resolved = resolve(property_schema, schemas).map_err(ArtifactError::from_target_lookup)?;
    resolved
        .get("items")
        .cloned()
        .ok_or_else(|| ArtifactError::MalformedReference {
            message: "array relationship has no items".to_string(),
        })
}

/// Name of the model a relationship property points at.
///
/// # Errors
///
/// `ArtifactError::MalformedReference` when no `$ref` (direct, inside
/// `allOf`, or under `items` for arrays) leads to a model, and
/// `ArtifactError::TargetSchemaNotFound` when the reference dangles.
pub fn target_name(
    type_: RelationshipType,
    property_schema: &Value,
    schemas: &Schemas,
) -> Result<String, ArtifactError> {
    let holder = reference_holder(type_, property_schema, schemas)?;
    model_reference(&holder, schemas)
        .map_err(ArtifactError::from_target_lookup)?
        .ok_or_else(|| ArtifactError::MalformedReference {
            message: if type_.is_to_one() {
                "expected a $ref to a model".to_string()
            } else {
                "expected items with a $ref to a model".to_string()
            },
        })
}

/// Name of the referenced column, `x-foreign-key-column` or `"id"`.
///
/// Read from the flattened property for the to-one kinds and from the
/// flattened items for the to-many kinds, so local overrides win over the
/// referenced model's value.
pub fn calculate_column_name(
    type_: RelationshipType,
    property_schema: &Value,
    schemas: &Schemas,
) -> Result<String, ArtifactError> {
    let holder = reference_holder(type_, property_schema, schemas)?;
    let resolved = resolve(&holder, schemas).map_err(ArtifactError::from_target_lookup)?;
    Ok(facets::string(&resolved, "x-foreign-key-column")?
        .unwrap_or(DEFAULT_FOREIGN_KEY_COLUMN)
        .to_string())
}

/// The model whose table the foreign key references.
///
/// For the to-one kinds this is the referenced model; for `ONE_TO_MANY`
/// it is the parent that declares the array.
pub fn get_target_schema(
    type_: RelationshipType,
    parent_name: &str,
    parent_schema: &Value,
    property_schema: &Value,
    schemas: &Schemas,
) -> Result<TargetSchema, ArtifactError> {
    match type_ {
        RelationshipType::OneToMany => Ok(TargetSchema {
            name: parent_name.to_string(),
            schema: resolve(parent_schema, schemas)?,
        }),
        _ => {
            let name = target_name(type_, property_schema, schemas)?;
            TargetSchema::load(&name, schemas)
        }
    }
}

/// Name of the property that holds the foreign key column.
///
/// `{property}_{column}` for the to-one kinds. For `ONE_TO_MANY` the column
/// lands on another table, so the referenced tablename is prefixed:
/// `{tablename}_{property}_{column}`.
pub fn calculate_prop_name(
    type_: RelationshipType,
    column_name: &str,
    property_name: &str,
    target: &TargetSchema,
) -> Result<String, ArtifactError> {
    if type_.is_to_one() {
        return Ok(format!("{}_{}", property_name, column_name));
    }
    Ok(format!(
        "{}_{}_{}",
        target.tablename()?,
        property_name,
        column_name
    ))
}

/// Qualified foreign key, `{tablename}.{column}`.
pub fn calculate_foreign_key(
    column_name: &str,
    target: &TargetSchema,
) -> Result<String, ArtifactError> {
    Ok(format!("{}.{}", target.tablename()?, column_name))
}

/// Look up the column a foreign key references on its target model.
pub(crate) fn referenced_column(
    target: &TargetSchema,
    column_name: &str,
    schemas: &Schemas,
) -> Result<Value, ArtifactError> {
    let missing = || ArtifactError::ForeignKeyColumnNotFound {
        schema: target.name.clone(),
        column: column_name.to_string(),
    };
    let column = facets::object(&target.schema, "properties")?
        .and_then(|props| props.get(column_name))
        .ok_or_else(missing)?;
    resolve(column, schemas).map_err(|err| match err {
        ResolveError::SchemaNotFound { .. } => missing(),
        other => other.into(),
    })
}

//! Relationship cardinality and link resolution.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ArtifactError;
use crate::facets;
use crate::foreign_key::{
    calculate_column_name, calculate_foreign_key, calculate_prop_name, get_target_schema,
    reference_holder, target_name, TargetSchema,
};
use crate::registry::{Backref, BackrefSubType};
use crate::resolver::resolve;
use crate::types::{RelationshipType, Schemas};

/// How the two tables of a relationship are joined.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipLink {
    ForeignKey(ForeignKeyLink),
    /// Association table named by `x-secondary`.
    Secondary { secondary: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyLink {
    /// Referenced column, `"id"` unless overridden.
    pub column_name: String,
    /// `{tablename}.{column}`.
    pub foreign_key: String,
    /// Property that stores the foreign key value.
    pub property_name: String,
    /// Model whose table is referenced.
    pub referenced_schema: String,
    /// Model that receives the foreign key column.
    pub holder: String,
}

/// Everything derived from a relationship property.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRelationship {
    pub cardinality: RelationshipType,
    /// Model the property points at.
    pub target: String,
    pub link: RelationshipLink,
    /// Reverse property to add to `target`, when `x-backref` is set.
    pub backref: Option<Backref>,
}

/// Facets of a relationship as seen through its reference.
///
/// For to-one properties this is the flattened property. For arrays the
/// array's own facets are the base and the flattened items are laid over
/// them, so the items win on a conflict.
pub(crate) fn relationship_view(
    type_: RelationshipType,
    property_schema: &Value,
    schemas: &Schemas,
) -> Result<Value, ArtifactError> {
    let resolved = resolve(property_schema, schemas)?;
    if type_.is_to_one() {
        return Ok(resolved);
    }
    let holder = reference_holder(type_, property_schema, schemas)?;
    let mut view = match resolved {
        Value::Object(own) => own
            .into_iter()
            .filter(|(key, _)| key != "items" && key != "type")
            .collect(),
        _ => Map::new(),
    };
    if let Value::Object(items) = resolve(&holder, schemas)? {
        view.extend(items);
    }
    Ok(Value::Object(view))
}

/// Work out the cardinality of a relationship property.
///
/// Arrays are `MANY_TO_MANY` when `x-secondary` is present on the property
/// or its target, `ONE_TO_MANY` otherwise. Objects are `ONE_TO_ONE` when
/// `x-uselist` is `false`, `MANY_TO_ONE` otherwise.
pub fn calculate_type(
    property_schema: &Value,
    schemas: &Schemas,
) -> Result<RelationshipType, ArtifactError> {
    let resolved = resolve(property_schema, schemas)?;
    if facets::string(&resolved, "type")? == Some("array") {
        let view = relationship_view(RelationshipType::OneToMany, property_schema, schemas)?;
        if facets::string(&view, "x-secondary")?.is_some() {
            return Ok(RelationshipType::ManyToMany);
        }
        return Ok(RelationshipType::OneToMany);
    }
    match facets::boolean(&resolved, "x-uselist")? {
        Some(false) => Ok(RelationshipType::OneToOne),
        _ => Ok(RelationshipType::ManyToOne),
    }
}

/// Shape of the backreference that a relationship of this cardinality adds
/// to its target.
pub fn backref_sub_type(type_: RelationshipType) -> BackrefSubType {
    match type_ {
        RelationshipType::ManyToOne | RelationshipType::ManyToMany => BackrefSubType::Array,
        RelationshipType::OneToOne | RelationshipType::OneToMany => BackrefSubType::Object,
    }
}

/// Resolve the target, join and backreference of a relationship property
/// declared as `property_name` on `parent_name`.
pub fn resolve_relationship(
    type_: RelationshipType,
    parent_name: &str,
    parent_schema: &Value,
    property_name: &str,
    property_schema: &Value,
    schemas: &Schemas,
) -> Result<ResolvedRelationship, ArtifactError> {
    let target = target_name(type_, property_schema, schemas)?;
    // Fails early with TargetSchemaNotFound for a dangling target.
    TargetSchema::load(&target, schemas)?;
    let view = relationship_view(type_, property_schema, schemas)?;

    let link = match type_ {
        RelationshipType::ManyToMany => {
            let secondary = facets::string(&view, "x-secondary")?.ok_or_else(|| {
                ArtifactError::MalformedReference {
                    message: "many-to-many relationship requires x-secondary".to_string(),
                }
            })?;
            RelationshipLink::Secondary {
                secondary: secondary.to_string(),
            }
        }
        _ => {
            let column_name = calculate_column_name(type_, property_schema, schemas)?;
            let referenced =
                get_target_schema(type_, parent_name, parent_schema, property_schema, schemas)?;
            let property_name = calculate_prop_name(type_, &column_name, property_name, &referenced)?;
            let foreign_key = calculate_foreign_key(&column_name, &referenced)?;
            let holder = if type_.is_to_one() {
                parent_name.to_string()
            } else {
                target.clone()
            };
            RelationshipLink::ForeignKey(ForeignKeyLink {
                column_name,
                foreign_key,
                property_name,
                referenced_schema: referenced.name,
                holder,
            })
        }
    };

    let backref = facets::string(&view, "x-backref")?
        .map(|name| Backref::new(name, backref_sub_type(type_), parent_name));

    Ok(ResolvedRelationship {
        cardinality: type_,
        target,
        link,
        backref,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schemas() -> Schemas {
        Schemas::from_value(json!({
            "Employee": {
                "type": "object",
                "x-tablename": "employee",
                "properties": {
                    "id": { "type": "integer" },
                    "division": {
                        "allOf": [
                            { "$ref": "#/components/schemas/Division" },
                            { "x-backref": "employees" }
                        ]
                    }
                }
            },
            "Division": {
                "type": "object",
                "x-tablename": "division",
                "properties": { "id": { "type": "integer" } }
            },
            "Passport": {
                "type": "object",
                "x-tablename": "passport",
                "x-uselist": false,
                "properties": { "id": { "type": "integer" } }
            },
            "Project": {
                "type": "object",
                "x-tablename": "project",
                "x-secondary": "employee_project",
                "properties": { "id": { "type": "integer" } }
            }
        }))
        .unwrap()
    }

    fn parent() -> Value {
        schemas().get("Employee").unwrap().clone()
    }

    #[test]
    fn cardinality() {
        let all = schemas();
        let cases = [
            (json!({ "$ref": "#/components/schemas/Division" }), RelationshipType::ManyToOne),
            (json!({ "$ref": "#/components/schemas/Passport" }), RelationshipType::OneToOne),
            (
                json!({ "allOf": [{ "$ref": "#/components/schemas/Division" }, { "x-uselist": false }] }),
                RelationshipType::OneToOne,
            ),
            (
                json!({ "type": "array", "items": { "$ref": "#/components/schemas/Division" } }),
                RelationshipType::OneToMany,
            ),
            (
                json!({ "type": "array", "items": { "$ref": "#/components/schemas/Project" } }),
                RelationshipType::ManyToMany,
            ),
            (
                json!({
                    "type": "array",
                    "x-secondary": "employee_division",
                    "items": { "$ref": "#/components/schemas/Division" }
                }),
                RelationshipType::ManyToMany,
            ),
        ];
        for (property, expected) in cases {
            assert_eq!(calculate_type(&property, &all).unwrap(), expected, "{}", property);
        }
    }

    #[test]
    fn backref_sub_types() {
        assert_eq!(backref_sub_type(RelationshipType::ManyToOne), BackrefSubType::Array);
        assert_eq!(backref_sub_type(RelationshipType::OneToOne), BackrefSubType::Object);
        assert_eq!(backref_sub_type(RelationshipType::OneToMany), BackrefSubType::Object);
        assert_eq!(backref_sub_type(RelationshipType::ManyToMany), BackrefSubType::Array);
    }

    #[test]
    fn many_to_one_puts_column_on_parent() {
        let all = schemas();
        let property = json!({
            "allOf": [{ "$ref": "#/components/schemas/Division" }, { "x-backref": "employees" }]
        });
        let resolved = resolve_relationship(
            RelationshipType::ManyToOne,
            "Employee",
            &parent(),
            "division",
            &property,
            &all,
        )
        .unwrap();

        assert_eq!(resolved.target, "Division");
        assert_eq!(
            resolved.link,
            RelationshipLink::ForeignKey(ForeignKeyLink {
                column_name: "id".into(),
                foreign_key: "division.id".into(),
                property_name: "division_id".into(),
                referenced_schema: "Division".into(),
                holder: "Employee".into(),
            })
        );
        assert_eq!(
            resolved.backref,
            Some(Backref::new("employees", BackrefSubType::Array, "Employee"))
        );
    }

    #[test]
    fn one_to_many_puts_column_on_child() {
        let all = schemas();
        let property = json!({
            "type": "array",
            "items": {
                "allOf": [{ "$ref": "#/components/schemas/Division" }, { "x-backref": "employee" }]
            }
        });
        let resolved = resolve_relationship(
            RelationshipType::OneToMany,
            "Employee",
            &parent(),
            "divisions",
            &property,
            &all,
        )
        .unwrap();

        let RelationshipLink::ForeignKey(link) = &resolved.link else {
            panic!("expected a foreign key link, got {:?}", resolved.link);
        };
        assert_eq!(link.property_name, "employee_divisions_id");
        assert_eq!(link.foreign_key, "employee.id");
        assert_eq!(link.referenced_schema, "Employee");
        assert_eq!(link.holder, "Division");
        assert_eq!(
            resolved.backref,
            Some(Backref::new("employee", BackrefSubType::Object, "Employee"))
        );
    }

    #[test]
    fn items_facets_override_array_facets() {
        let all = schemas();
        let property = json!({
            "type": "array",
            "x-backref": "from_array",
            "x-secondary": "array_table",
            "items": {
                "allOf": [
                    { "$ref": "#/components/schemas/Project" },
                    { "x-backref": "from_items" }
                ]
            }
        });

        let view =
            relationship_view(RelationshipType::ManyToMany, &property, &all).unwrap();
        assert_eq!(view["x-backref"], "from_items");
        assert_eq!(view["x-secondary"], "employee_project");
        assert!(view.get("items").is_none());

        let resolved = resolve_relationship(
            RelationshipType::ManyToMany,
            "Employee",
            &parent(),
            "projects",
            &property,
            &all,
        )
        .unwrap();
        assert_eq!(
            resolved.link,
            RelationshipLink::Secondary {
                secondary: "employee_project".into()
            }
        );
        assert_eq!(
            resolved.backref,
            Some(Backref::new("from_items", BackrefSubType::Array, "Employee"))
        );
    }

    #[test]
    fn array_facets_apply_when_items_are_silent() {
        let all = schemas();
        let property = json!({
            "type": "array",
            "x-backref": "employee",
            "items": { "$ref": "#/components/schemas/Division" }
        });
        let resolved = resolve_relationship(
            RelationshipType::OneToMany,
            "Employee",
            &parent(),
            "divisions",
            &property,
            &all,
        )
        .unwrap();
        assert_eq!(
            resolved.backref,
            Some(Backref::new("employee", BackrefSubType::Object, "Employee"))
        );
    }

    #[test]
    fn many_to_many_uses_secondary() {
        let all = schemas();
        let property = json!({ "type": "array", "items": { "$ref": "#/components/schemas/Project" } });
        let resolved = resolve_relationship(
            RelationshipType::ManyToMany,
            "Employee",
            &parent(),
            "projects",
            &property,
            &all,
        )
        .unwrap();
        assert_eq!(
            resolved.link,
            RelationshipLink::Secondary {
                secondary: "employee_project".into()
            }
        );
        assert_eq!(resolved.backref, None);
    }

    #[test]
    fn custom_foreign_key_column() {
        let all = schemas();
        let property = json!({
            "allOf": [
                { "$ref": "#/components/schemas/Division" },
                { "x-foreign-key-column": "code" }
            ]
        });
        let resolved = resolve_relationship(
            RelationshipType::ManyToOne,
            "Employee",
            &parent(),
            "division",
            &property,
            &all,
        )
        .unwrap();
        let RelationshipLink::ForeignKey(link) = resolved.link else {
            panic!("expected a foreign key link");
        };
        assert_eq!(link.property_name, "division_code");
        assert_eq!(link.foreign_key, "division.code");
    }

    #[test]
    fn dangling_target_fails() {
        let all = schemas();
        let result = resolve_relationship(
            RelationshipType::ManyToOne,
            "Employee",
            &parent(),
            "boss",
            &json!({ "$ref": "#/components/schemas/Manager" }),
            &all,
        );
        assert!(matches!(
            result,
            Err(ArtifactError::TargetSchemaNotFound { ref name, .. }) if name == "Manager"
        ));
    }
}

//! Schema resolution - flattens `$ref` and `allOf` into self-contained schemas.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ResolveError;
use crate::types::{is_extension_key, json_type_name, ref_name, Schemas};

/// Flatten a schema's own level.
///
/// `$ref` is replaced by the (recursively flattened) referenced schema and
/// `allOf` members are merged left to right, later members overwriting
/// earlier keys. Keys written next to `allOf` are applied last; keys next to
/// `$ref` are ignored. Nested `properties`/`items` are left untouched.
///
/// # Errors
///
/// Returns `ResolveError::SchemaNotFound` for a dangling reference and
/// `ResolveError::CircularReference` when a reference chain loops.
pub fn resolve(schema: &Value, schemas: &Schemas) -> Result<Value, ResolveError> {
    Walker::new(schemas)
        .flatten(schema, &mut Vec::new())
        .map(Value::Object)
}

/// Flatten a schema, optionally dropping every `x-*` facet of the result.
pub fn resolve_with(
    schema: &Value,
    schemas: &Schemas,
    skip_extensions: bool,
) -> Result<Value, ResolveError> {
    let resolved = resolve(schema, schemas)?;
    if skip_extensions {
        Ok(strip_extensions(&resolved))
    } else {
        Ok(resolved)
    }
}

/// Flatten a schema and every schema nested under `properties`, `items`
/// and `additionalProperties`.
///
/// The result contains no `$ref` or `allOf` at any depth. Recursive schemas
/// cannot be inlined and fail with `ResolveError::CircularReference`.
pub fn resolve_deep(schema: &Value, schemas: &Schemas) -> Result<Value, ResolveError> {
    Walker::new(schemas).flatten_deep(schema)
}

/// Flatten the named top-level schema.
pub fn resolve_named(name: &str, schemas: &Schemas) -> Result<Value, ResolveError> {
    let mut walker = Walker::new(schemas);
    walker.follow_name(name, &mut Vec::new()).map(Value::Object)
}

/// Remove `x-*` extension facets.
///
/// Descends through the schema positions (`properties`, `items`,
/// `additionalProperties`, composition members) but never into values such
/// as `default` or `example`.
pub fn strip_extensions(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut result = Map::new();
    for (key, value) in map {
        if is_extension_key(key) {
            continue;
        }
        let stripped = match key.as_str() {
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), strip_extensions(prop)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "items" | "additionalProperties" => strip_extensions(value),
            "allOf" | "anyOf" | "oneOf" => match value {
                Value::Array(members) => {
                    Value::Array(members.iter().map(strip_extensions).collect())
                }
                other => other.clone(),
            },
            _ => value.clone(),
        };
        result.insert(key.clone(), stripped);
    }
    Value::Object(result)
}

/// Whether a raw schema declares a persisted model itself.
///
/// `x-tablename` must appear at the top level or inside an inline `allOf`
/// member; a model reached only through `$ref` does not count.
pub fn is_model(schema: &Value) -> bool {
    if schema.get("$ref").is_some() {
        return false;
    }
    if schema.get("x-tablename").is_some() {
        return true;
    }
    schema
        .get("allOf")
        .and_then(Value::as_array)
        .map(|members| members.iter().any(is_model))
        .unwrap_or(false)
}

/// Find the model a schema points at through `$ref` or `allOf`.
///
/// Alias chains are followed until a schema that declares a model is
/// reached. Returns `None` when the schema references no model.
pub fn model_reference(schema: &Value, schemas: &Schemas) -> Result<Option<String>, ResolveError> {
    Walker::new(schemas).model_ref(schema)
}

// --- Internal implementation ---

struct Walker<'a> {
    schemas: &'a Schemas,
    /// Schema names currently being resolved, outermost first.
    stack: Vec<String>,
}

impl<'a> Walker<'a> {
    fn new(schemas: &'a Schemas) -> Self {
        Self {
            schemas,
            stack: Vec::new(),
        }
    }

    /// Flatten one level; every schema name followed is appended to `via`.
    fn flatten(
        &mut self,
        schema: &Value,
        via: &mut Vec<String>,
    ) -> Result<Map<String, Value>, ResolveError> {
        let Value::Object(map) = schema else {
            return Err(ResolveError::InvalidSchema {
                message: format!("schema must be an object, got {}", json_type_name(schema)),
            });
        };

        if let Some(reference) = map.get("$ref") {
            let reference = reference.as_str().ok_or_else(|| ResolveError::InvalidFacet {
                key: "$ref".to_string(),
                expected: "string",
                actual: json_type_name(reference),
            })?;
            return self.follow_name(ref_name(reference)?, via);
        }

        match map.get("allOf") {
            None => Ok(map.clone()),
            Some(Value::Array(members)) => {
                let mut merged = Map::new();
                for member in members {
                    for (key, value) in self.flatten(member, via)? {
                        merged.insert(key, value);
                    }
                }
                for (key, value) in map {
                    if key != "allOf" {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                Ok(merged)
            }
            Some(other) => Err(ResolveError::InvalidFacet {
                key: "allOf".to_string(),
                expected: "array",
                actual: json_type_name(other),
            }),
        }
    }

    fn follow_name(
        &mut self,
        name: &str,
        via: &mut Vec<String>,
    ) -> Result<Map<String, Value>, ResolveError> {
        let target = self.enter(name)?;
        trace!(schema = name, depth = self.stack.len(), "following reference");
        via.push(name.to_string());
        let result = self.flatten(target, via);
        self.stack.pop();
        result
    }

    /// Push `name` onto the resolution stack and return its raw schema.
    fn enter(&mut self, name: &str) -> Result<&'a Value, ResolveError> {
        if self.stack.iter().any(|n| n == name) {
            let mut path = self.stack.clone();
            path.push(name.to_string());
            return Err(ResolveError::CircularReference { path });
        }
        let schemas = self.schemas;
        let target = schemas
            .get(name)
            .ok_or_else(|| ResolveError::SchemaNotFound {
                name: name.to_string(),
                referenced_by: self.stack.last().cloned(),
            })?;
        self.stack.push(name.to_string());
        Ok(target)
    }

    fn flatten_deep(&mut self, schema: &Value) -> Result<Value, ResolveError> {
        let mut via = Vec::new();
        let mut flat = self.flatten(schema, &mut via)?;

        // Names followed here stay on the stack while nested schemas are
        // resolved so that recursive definitions are caught.
        let depth = self.stack.len();
        self.stack.extend(via);
        let result = self.flatten_children(&mut flat);
        self.stack.truncate(depth);
        result?;

        Ok(Value::Object(flat))
    }

    fn flatten_children(&mut self, flat: &mut Map<String, Value>) -> Result<(), ResolveError> {
        if let Some(Value::Object(props)) = flat.get_mut("properties") {
            for prop in props.values_mut() {
                let resolved = self.flatten_deep(prop)?;
                *prop = resolved;
            }
        }
        for key in ["items", "additionalProperties"] {
            if let Some(child) = flat.get_mut(key) {
                if child.is_object() {
                    let resolved = self.flatten_deep(child)?;
                    *child = resolved;
                }
            }
        }
        Ok(())
    }

    fn model_ref(&mut self, schema: &Value) -> Result<Option<String>, ResolveError> {
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            let name = ref_name(reference)?;
            let target = self.enter(name)?;
            let found = if is_model(target) {
                Ok(Some(name.to_string()))
            } else {
                self.model_ref(target)
            };
            self.stack.pop();
            return found;
        }

        if let Some(members) = schema.get("allOf").and_then(Value::as_array) {
            for member in members {
                if let Some(name) = self.model_ref(member)? {
                    return Ok(Some(name));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schemas(value: Value) -> Schemas {
        Schemas::from_value(value).unwrap()
    }

    fn contains_composition(value: &Value) -> bool {
        match value {
            Value::Object(map) => {
                map.contains_key("$ref")
                    || map.contains_key("allOf")
                    || map.values().any(contains_composition)
            }
            Value::Array(items) => items.iter().any(contains_composition),
            _ => false,
        }
    }

    // === Flattening ===

    #[test]
    fn plain_schema_is_returned_unchanged() {
        let schema = json!({ "type": "integer", "x-primary-key": true });
        let resolved = resolve(&schema, &Schemas::new()).unwrap();
        assert_eq!(resolved, schema);
    }

    #[test]
    fn ref_is_followed() {
        let all = schemas(json!({ "RefSchema": { "type": "string" } }));
        let resolved = resolve(&json!({ "$ref": "#/components/schemas/RefSchema" }), &all).unwrap();
        assert_eq!(resolved, json!({ "type": "string" }));
    }

    #[test]
    fn ref_chain_is_followed() {
        let all = schemas(json!({
            "A": { "$ref": "#/components/schemas/B" },
            "B": { "$ref": "#/components/schemas/C" },
            "C": { "type": "boolean" }
        }));
        let resolved = resolve(&json!({ "$ref": "#/components/schemas/A" }), &all).unwrap();
        assert_eq!(resolved, json!({ "type": "boolean" }));
    }

    #[test]
    fn ref_siblings_are_ignored() {
        let all = schemas(json!({ "RefSchema": { "type": "string" } }));
        let schema = json!({ "$ref": "#/components/schemas/RefSchema", "nullable": true });
        let resolved = resolve(&schema, &all).unwrap();
        assert_eq!(resolved, json!({ "type": "string" }));
    }

    #[test]
    fn all_of_later_member_wins() {
        let schema = json!({
            "allOf": [
                { "type": "string", "maxLength": 10, "description": "a" },
                { "maxLength": 20, "nullable": true }
            ]
        });
        let resolved = resolve(&schema, &Schemas::new()).unwrap();
        assert_eq!(
            resolved,
            json!({ "type": "string", "maxLength": 20, "description": "a", "nullable": true })
        );
    }

    #[test]
    fn all_of_with_ref_members() {
        let all = schemas(json!({
            "Base": { "type": "integer", "description": "base" }
        }));
        let schema = json!({
            "allOf": [
                { "$ref": "#/components/schemas/Base" },
                { "description": "override" }
            ]
        });
        let resolved = resolve(&schema, &all).unwrap();
        assert_eq!(resolved, json!({ "type": "integer", "description": "override" }));
    }

    #[test]
    fn all_of_siblings_apply_last() {
        let schema = json!({
            "description": "sibling",
            "allOf": [{ "type": "string", "description": "member" }]
        });
        let resolved = resolve(&schema, &Schemas::new()).unwrap();
        assert_eq!(resolved, json!({ "type": "string", "description": "sibling" }));
    }

    #[test]
    fn nested_all_of_is_merged() {
        let schema = json!({
            "allOf": [
                { "allOf": [{ "type": "number" }, { "format": "float" }] },
                { "format": "double" }
            ]
        });
        let resolved = resolve(&schema, &Schemas::new()).unwrap();
        assert_eq!(resolved, json!({ "type": "number", "format": "double" }));
    }

    #[test]
    fn same_schema_twice_in_all_of_is_not_a_cycle() {
        let all = schemas(json!({ "Base": { "type": "string" } }));
        let schema = json!({
            "allOf": [
                { "$ref": "#/components/schemas/Base" },
                { "$ref": "#/components/schemas/Base" }
            ]
        });
        assert!(resolve(&schema, &all).is_ok());
    }

    #[test]
    fn nested_properties_are_not_resolved() {
        let schema = json!({
            "type": "object",
            "properties": { "a": { "$ref": "#/components/schemas/Missing" } }
        });
        let resolved = resolve(&schema, &Schemas::new()).unwrap();
        assert_eq!(resolved, schema);
    }

    #[test]
    fn resolve_does_not_mutate_schemas() {
        let all = schemas(json!({
            "Base": { "allOf": [{ "type": "string" }, { "x-index": true }] }
        }));
        let original = all.clone();
        resolve(&json!({ "$ref": "#/components/schemas/Base" }), &all).unwrap();
        assert_eq!(all, original);
    }

    #[test]
    fn resolve_with_skips_extensions() {
        let all = schemas(json!({ "Base": { "type": "string", "x-unique": true } }));
        let schema = json!({ "$ref": "#/components/schemas/Base" });
        assert_eq!(
            resolve_with(&schema, &all, true).unwrap(),
            json!({ "type": "string" })
        );
        assert_eq!(
            resolve_with(&schema, &all, false).unwrap(),
            json!({ "type": "string", "x-unique": true })
        );
    }

    #[test]
    fn resolve_named_schema() {
        let all = schemas(json!({
            "Employee": { "allOf": [{ "type": "object" }, { "x-tablename": "employee" }] }
        }));
        let resolved = resolve_named("Employee", &all).unwrap();
        assert_eq!(resolved, json!({ "type": "object", "x-tablename": "employee" }));
    }

    // === Errors ===

    #[test]
    fn missing_schema_errors() {
        let all = schemas(json!({ "A": { "$ref": "#/components/schemas/B" } }));
        let result = resolve(&json!({ "$ref": "#/components/schemas/A" }), &all);
        assert!(matches!(
            result,
            Err(ResolveError::SchemaNotFound { ref name, ref referenced_by })
                if name == "B" && referenced_by.as_deref() == Some("A")
        ));
    }

    #[test]
    fn circular_reference_errors() {
        let all = schemas(json!({
            "A": { "$ref": "#/components/schemas/B" },
            "B": { "$ref": "#/components/schemas/A" }
        }));
        let result = resolve(&json!({ "$ref": "#/components/schemas/A" }), &all);
        match result {
            Err(ResolveError::CircularReference { path }) => {
                assert_eq!(path, vec!["A", "B", "A"]);
            }
            other => panic!("expected circular reference, got {:?}", other),
        }
    }

    #[test]
    fn circular_reference_through_all_of_errors() {
        let all = schemas(json!({
            "A": { "allOf": [{ "$ref": "#/components/schemas/A" }] }
        }));
        let result = resolve(&json!({ "$ref": "#/components/schemas/A" }), &all);
        assert!(matches!(result, Err(ResolveError::CircularReference { .. })));
    }

    #[test]
    fn all_of_must_be_array() {
        let result = resolve(&json!({ "allOf": {} }), &Schemas::new());
        assert!(matches!(result, Err(ResolveError::InvalidFacet { .. })));
    }

    // === Deep resolution ===

    #[test]
    fn deep_resolution_eliminates_refs() {
        let all = schemas(json!({
            "Address": {
                "type": "object",
                "properties": {
                    "street": { "allOf": [{ "type": "string" }, { "maxLength": 80 }] },
                    "geo": { "$ref": "#/components/schemas/Geo" }
                }
            },
            "Geo": {
                "type": "object",
                "properties": { "lat": { "type": "number" } }
            },
            "Tag": { "type": "string" }
        }));
        let schema = json!({
            "type": "object",
            "properties": {
                "address": { "$ref": "#/components/schemas/Address" },
                "tags": { "type": "array", "items": { "$ref": "#/components/schemas/Tag" } },
                "extra": { "additionalProperties": { "$ref": "#/components/schemas/Tag" } }
            }
        });

        let resolved = resolve_deep(&schema, &all).unwrap();

        assert!(!contains_composition(&resolved));
        assert_eq!(
            resolved["properties"]["address"]["properties"]["street"],
            json!({ "type": "string", "maxLength": 80 })
        );
        assert_eq!(
            resolved["properties"]["address"]["properties"]["geo"]["properties"]["lat"],
            json!({ "type": "number" })
        );
        assert_eq!(resolved["properties"]["tags"]["items"], json!({ "type": "string" }));
    }

    #[test]
    fn deep_resolution_detects_recursive_schema() {
        let all = schemas(json!({
            "Node": {
                "type": "object",
                "properties": {
                    "children": { "type": "array", "items": { "$ref": "#/components/schemas/Node" } }
                }
            }
        }));
        let result = resolve_deep(&json!({ "$ref": "#/components/schemas/Node" }), &all);
        assert!(matches!(result, Err(ResolveError::CircularReference { .. })));
    }

    #[test]
    fn deep_resolution_allows_sibling_reuse() {
        let all = schemas(json!({ "Name": { "type": "string" } }));
        let schema = json!({
            "type": "object",
            "properties": {
                "first": { "$ref": "#/components/schemas/Name" },
                "last": { "$ref": "#/components/schemas/Name" }
            }
        });
        let resolved = resolve_deep(&schema, &all).unwrap();
        assert_eq!(resolved["properties"]["last"], json!({ "type": "string" }));
    }

    // === Extension stripping ===

    #[test]
    fn strip_extensions_removes_nested_facets() {
        let schema = json!({
            "type": "object",
            "x-tablename": "t",
            "properties": {
                "id": { "type": "integer", "x-primary-key": true },
                "tags": { "type": "array", "items": { "type": "string", "x-json": true } }
            }
        });
        let stripped = strip_extensions(&schema);
        assert_eq!(
            stripped,
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            })
        );
    }

    #[test]
    fn strip_extensions_keeps_default_values() {
        let schema = json!({ "type": "object", "default": { "x-key": 1 } });
        assert_eq!(strip_extensions(&schema), schema);
    }

    #[test]
    fn strip_extensions_is_idempotent() {
        let schema = json!({
            "x-kwargs": {},
            "allOf": [{ "x-index": true, "type": "string" }],
            "properties": { "a": { "x-unique": true } }
        });
        let once = strip_extensions(&schema);
        assert_eq!(strip_extensions(&once), once);
    }

    // === Model references ===

    #[test]
    fn is_model_checks_own_and_inline_members() {
        assert!(is_model(&json!({ "x-tablename": "employee" })));
        assert!(is_model(&json!({ "allOf": [{ "x-tablename": "employee" }] })));
        assert!(!is_model(&json!({ "allOf": [{ "$ref": "#/components/schemas/Employee" }] })));
        assert!(!is_model(&json!({ "type": "object" })));
    }

    #[test]
    fn model_reference_follows_aliases() {
        let all = schemas(json!({
            "Employee": { "type": "object", "x-tablename": "employee" },
            "EmployeeRef": {
                "allOf": [
                    { "$ref": "#/components/schemas/Employee" },
                    { "x-backref": "division" }
                ]
            },
            "Plain": { "type": "object" }
        }));
        let found = model_reference(&json!({ "$ref": "#/components/schemas/EmployeeRef" }), &all);
        assert_eq!(found.unwrap().as_deref(), Some("Employee"));

        let found = model_reference(&json!({ "$ref": "#/components/schemas/Plain" }), &all);
        assert_eq!(found.unwrap(), None);

        let found = model_reference(&json!({ "type": "object" }), &all);
        assert_eq!(found.unwrap(), None);
    }

    #[test]
    fn model_reference_stops_at_inheriting_model() {
        let all = schemas(json!({
            "Employee": { "type": "object", "x-tablename": "employee" },
            "Manager": {
                "allOf": [
                    { "$ref": "#/components/schemas/Employee" },
                    { "x-tablename": "manager" }
                ]
            }
        }));
        let found = model_reference(&json!({ "$ref": "#/components/schemas/Manager" }), &all);
        assert_eq!(found.unwrap().as_deref(), Some("Manager"));
    }
}

//! Property classification into scalar, JSON, relationship or backreference.

use serde_json::Value;

use crate::error::ResolveError;
use crate::facets;
use crate::resolver::{model_reference, resolve};
use crate::types::{PropertyKind, Schemas, PRIMITIVE_TYPES};

/// Reverse pointer carried by a computed backreference.
pub const BACKREF_POINTER: &str = "x-de-$ref";

/// Classify a property schema.
///
/// - `object`/`array` pointing at a model is a relationship, or a
///   backreference when it is `readOnly` or carries `x-de-$ref`
/// - `object`/`array` that is not an association is JSON
/// - a primitive type is a scalar column unless `x-json` is set
/// - anything without a recognised type is JSON
pub fn classify(schema: &Value, schemas: &Schemas) -> Result<PropertyKind, ResolveError> {
    let resolved = resolve(schema, schemas)?;
    classify_resolved(schema, &resolved, schemas)
}

/// Classify using an already flattened copy of `schema`.
///
/// The raw schema is still needed: whether an object points at a model is
/// decided by its `$ref` chain, which flattening erases.
pub fn classify_resolved(
    schema: &Value,
    resolved: &Value,
    schemas: &Schemas,
) -> Result<PropertyKind, ResolveError> {
    let json = facets::boolean(resolved, "x-json")?.unwrap_or(false);

    match facets::string(resolved, "type")? {
        Some(type_ @ ("object" | "array")) => {
            if has_backref_pointer(resolved) {
                return Ok(PropertyKind::Backref);
            }
            if json {
                return Ok(PropertyKind::Json);
            }
            let association = if type_ == "object" {
                model_reference(schema, schemas)?
            } else {
                match resolved.get("items") {
                    Some(items) => model_reference(items, schemas)?,
                    None => None,
                }
            };
            match association {
                Some(_) if facets::boolean(resolved, "readOnly")?.unwrap_or(false) => {
                    Ok(PropertyKind::Backref)
                }
                Some(_) => Ok(PropertyKind::Relationship),
                None => Ok(PropertyKind::Json),
            }
        }
        Some(type_) if PRIMITIVE_TYPES.contains(&type_) => {
            if json {
                Ok(PropertyKind::Json)
            } else {
                Ok(PropertyKind::Simple)
            }
        }
        _ => Ok(PropertyKind::Json),
    }
}

fn has_backref_pointer(resolved: &Value) -> bool {
    resolved.get(BACKREF_POINTER).is_some()
        || resolved
            .get("items")
            .map(|items| items.get(BACKREF_POINTER).is_some())
            .unwrap_or(false)
}

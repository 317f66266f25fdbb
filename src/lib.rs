//! ORM Artifacts
//!
//! Derives persistence artifacts from OpenAPI component schemas annotated
//! with `x-*` extensions.
//!
//! A schema that declares `x-tablename` is a model. For every model this
//! library flattens `$ref`/`allOf` composition, classifies each property
//! (scalar column, JSON column, relationship, or backreference), works out
//! relationship cardinality and foreign keys, and assembles the result into
//! a [`ModelArtifacts`] ready for templating.
//!
//! # Example
//!
//! ```
//! use orm_artifacts::{generate, GenerateOptions, PropertyKind, Schemas};
//! use serde_json::json;
//!
//! let schemas = Schemas::from_value(json!({
//!     "Employee": {
//!         "type": "object",
//!         "x-tablename": "employee",
//!         "properties": {
//!             "id": { "type": "integer", "x-primary-key": true },
//!             "division": {
//!                 "allOf": [
//!                     { "$ref": "#/components/schemas/Division" },
//!                     { "x-backref": "employees" }
//!                 ]
//!             }
//!         }
//!     },
//!     "Division": {
//!         "type": "object",
//!         "x-tablename": "division",
//!         "properties": { "id": { "type": "integer", "x-primary-key": true } }
//!     }
//! }))
//! .unwrap();
//!
//! let models = generate(&schemas, &GenerateOptions::default()).unwrap();
//!
//! // The relationship adds a foreign key column to Employee...
//! let employee = &models["Employee"];
//! assert_eq!(employee.names_of(PropertyKind::Simple), ["id", "division_id"]);
//!
//! // ...and a backreference to Division.
//! let division = &models["Division"];
//! assert_eq!(division.names_of(PropertyKind::Backref), ["employees"]);
//! ```
//!
//! # Property Kinds
//!
//! | Schema | Kind |
//! |--------|------|
//! | primitive `type` | `SIMPLE` (`JSON` with `x-json: true`) |
//! | object/array referencing a model | `RELATIONSHIP` |
//! | same, `readOnly` or carrying `x-de-$ref` | `BACKREF` |
//! | any other object/array, or no type | `JSON` |
//!
//! # Relationship Cardinality
//!
//! | Schema | Cardinality |
//! |--------|-------------|
//! | object `$ref` | `MANY_TO_ONE` |
//! | object `$ref`, target `x-uselist: false` | `ONE_TO_ONE` |
//! | array of `$ref` | `ONE_TO_MANY` |
//! | array of `$ref` with `x-secondary` | `MANY_TO_MANY` |

mod classify;
mod config;
mod defaults;
mod error;
mod facets;
mod foreign_key;
mod loader;
mod model;
mod pipeline;
mod property;
mod registry;
mod relationship;
mod resolver;
mod types;

pub use classify::{classify, BACKREF_POINTER};
pub use config::{ArtifactsConfig, GenerateConfig, OutputConfig};
pub use defaults::{map_default, MappedDefault};
pub use error::{ArtifactError, ResolveError};
pub use foreign_key::{
    calculate_column_name, calculate_foreign_key, calculate_prop_name, get_target_schema,
    target_name, TargetSchema, DEFAULT_FOREIGN_KEY_COLUMN,
};
pub use loader::{extract_schemas, is_url, load_document, load_document_auto, load_document_str};
pub use model::{
    assemble, ArgArtifacts, IndexConstraint, ModelArtifacts, Properties, UniqueConstraint,
};
pub use pipeline::{collect_injections, generate, model_names};
pub use property::{
    build, BackrefArtifacts, BuiltProperty, JsonArtifacts, JsonExtension, JsonOpenApi,
    PropertyArtifacts, RelationshipArtifacts, SimpleArtifacts, SimpleExtension, SimpleOpenApi,
};
pub use registry::{Backref, BackrefSubType, InjectedColumn, Injection, Registry};
pub use relationship::{
    backref_sub_type, calculate_type, resolve_relationship, ForeignKeyLink, RelationshipLink,
    ResolvedRelationship,
};
pub use resolver::{
    is_model, model_reference, resolve, resolve_deep, resolve_named, resolve_with,
    strip_extensions,
};
pub use types::{GenerateOptions, PropertyKind, RelationshipType, Schemas};

#[cfg(feature = "remote")]
pub use loader::load_document_url;

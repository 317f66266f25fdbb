//! Whole-document generation run.
//!
//! Phase 1 builds every model's declared properties and records what they
//! inject into other models. Phase 2 assembles each model once the registry
//! is complete. Nothing is returned unless every model succeeds.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::ArtifactError;
use crate::model::{declare, finish, DeclaredModel, ModelArtifacts};
use crate::registry::Registry;
use crate::resolver::is_model;
use crate::types::{GenerateOptions, Schemas};

/// Names of the schemas that declare a persisted model, in document order.
pub fn model_names(schemas: &Schemas) -> Vec<&str> {
    schemas
        .iter()
        .filter(|(_, schema)| is_model(schema))
        .map(|(name, _)| name)
        .collect()
}

fn declare_all(
    schemas: &Schemas,
    options: &GenerateOptions,
) -> Result<(Vec<DeclaredModel>, Registry), ArtifactError> {
    let mut declared = Vec::new();
    let mut registry = Registry::new();
    for name in model_names(schemas) {
        debug!(schema = name, "declaring model");
        let model = declare(name, schemas, options)?;
        for (_, built) in &model.properties {
            registry.extend(built.injections.iter().cloned());
        }
        declared.push(model);
    }
    Ok((declared, registry))
}

/// Run phase 1 only: the backreferences and foreign key columns every
/// model contributes.
pub fn collect_injections(
    schemas: &Schemas,
    options: &GenerateOptions,
) -> Result<Registry, ArtifactError> {
    declare_all(schemas, options).map(|(_, registry)| registry)
}

/// Derive the artifacts of every model in `schemas`.
///
/// # Errors
///
/// The first failure of any model; no partial result is returned.
pub fn generate(
    schemas: &Schemas,
    options: &GenerateOptions,
) -> Result<BTreeMap<String, ModelArtifacts>, ArtifactError> {
    debug!(schemas = schemas.len(), "collecting injections");
    let (declared, registry) = declare_all(schemas, options)?;

    debug!(models = declared.len(), "assembling models");
    let mut models = BTreeMap::new();
    for model in declared {
        let artifacts = finish(model, &registry)?;
        models.insert(artifacts.name.clone(), artifacts);
    }
    debug!(models = models.len(), "generation complete");
    Ok(models)
}

//! Collects what one model's properties contribute to other models.
//!
//! Building a model's properties can add a backreference to the referenced
//! model and a foreign key column to whichever side holds it. Builders
//! return these as [`Injection`] values; the registry gathers them so they
//! can be applied once every model has been visited.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::trace;

use crate::classify::BACKREF_POINTER;
use crate::property::SimpleArtifacts;

/// Whether a backreference holds one object or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackrefSubType {
    Object,
    Array,
}

/// Reverse side of a relationship, computed on the referenced model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Backref {
    /// Property name on the referenced model.
    pub name: String,
    pub sub_type: BackrefSubType,
    /// Model that declared the relationship.
    pub parent: String,
}

impl Backref {
    pub fn new(name: impl Into<String>, sub_type: BackrefSubType, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_type,
            parent: parent.into(),
        }
    }

    /// Schema entry for the backreference, pointing back with `x-de-$ref`.
    pub fn schema(&self) -> Value {
        let object = json!({ "type": "object", BACKREF_POINTER: self.parent });
        match self.sub_type {
            BackrefSubType::Object => object,
            BackrefSubType::Array => json!({ "type": "array", "items": object }),
        }
    }
}

/// A foreign key column to be added to the model that stores it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectedColumn {
    pub name: String,
    pub artifacts: SimpleArtifacts,
}

/// One contribution from a property to another model (or its own).
#[derive(Debug, Clone, PartialEq)]
pub enum Injection {
    Backref {
        target: String,
        backref: Backref,
    },
    ForeignKey {
        holder: String,
        column: InjectedColumn,
    },
}

/// Backreferences and foreign key columns per model, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    backrefs: BTreeMap<String, Vec<Backref>>,
    foreign_keys: BTreeMap<String, Vec<InjectedColumn>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, injection: Injection) {
        match injection {
            Injection::Backref { target, backref } => self.add_backref(target, backref),
            Injection::ForeignKey { holder, column } => {
                trace!(schema = %holder, column = %column.name, "recording foreign key column");
                self.foreign_keys.entry(holder).or_default().push(column);
            }
        }
    }

    /// Append a backreference. Entries are never deduplicated.
    pub fn add_backref(&mut self, target: impl Into<String>, backref: Backref) {
        let target = target.into();
        trace!(schema = %target, backref = %backref.name, "recording backref");
        self.backrefs.entry(target).or_default().push(backref);
    }

    pub fn backrefs(&self, schema: &str) -> &[Backref] {
        self.backrefs.get(schema).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn foreign_keys(&self, schema: &str) -> &[InjectedColumn] {
        self.foreign_keys
            .get(schema)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Extend<Injection> for Registry {
    fn extend<I: IntoIterator<Item = Injection>>(&mut self, iter: I) {
        for injection in iter {
            self.record(injection);
        }
    }
}

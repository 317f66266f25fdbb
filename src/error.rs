//! Error types for schema resolution and artifact derivation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading or flattening schemas.
#[derive(Debug, Error)]
pub enum ResolveError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    // Reference errors (exit code 2)
    #[error(
        "schema '{name}' not found{}",
        .referenced_by.as_deref().map(|r| format!(" (referenced from '{r}')")).unwrap_or_default()
    )]
    SchemaNotFound {
        name: String,
        referenced_by: Option<String>,
    },

    #[error("circular reference: {}", .path.join(" -> "))]
    CircularReference { path: Vec<String> },

    #[error("unsupported reference '{reference}': only local component references are resolved")]
    UnsupportedRef { reference: String },

    #[error("invalid value for '{key}': expected {expected}, got {actual}")]
    InvalidFacet {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::FileNotFound { .. } | ResolveError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            ResolveError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while deriving property or model artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(
        "relationship target '{name}' not found{}",
        .referenced_by.as_deref().map(|r| format!(" (referenced from '{r}')")).unwrap_or_default()
    )]
    TargetSchemaNotFound {
        name: String,
        referenced_by: Option<String>,
    },

    #[error("malformed reference: {message}")]
    MalformedReference { message: String },

    #[error(
        "no default mapping for type '{open_api_type}'{}",
        .format.as_deref().map(|f| format!(" with format '{f}'")).unwrap_or_default()
    )]
    UnsupportedDefault {
        open_api_type: String,
        format: Option<String>,
    },

    #[error("default {value} is not a valid '{open_api_type}': {message}")]
    InvalidDefault {
        value: String,
        open_api_type: String,
        message: String,
    },

    #[error("property '{name}' is defined more than once on '{schema}'")]
    DuplicateProperty { schema: String, name: String },

    #[error("schema '{schema}' has no x-tablename")]
    MissingTablename { schema: String },

    #[error("foreign key column '{column}' is not a property of '{schema}'")]
    ForeignKeyColumnNotFound { schema: String, column: String },

    #[error("malformed schema '{schema}': {message}")]
    MalformedSchema { schema: String, message: String },

    #[error("{schema}.{property}: {source}")]
    InProperty {
        schema: String,
        property: String,
        #[source]
        source: Box<ArtifactError>,
    },
}

impl ArtifactError {
    /// Re-label a dangling reference met while locating a relationship target.
    pub(crate) fn from_target_lookup(err: ResolveError) -> Self {
        match err {
            ResolveError::SchemaNotFound {
                name,
                referenced_by,
            } => ArtifactError::TargetSchemaNotFound {
                name,
                referenced_by,
            },
            other => ArtifactError::Resolve(other),
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArtifactError::Resolve(e) => e.exit_code(),
            ArtifactError::InProperty { source, .. } => source.exit_code(),
            _ => 2,
        }
    }

    /// Attach the schema and property being built.
    pub(crate) fn in_property(self, schema: &str, property: &str) -> Self {
        ArtifactError::InProperty {
            schema: schema.to_string(),
            property: property.to_string(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_exit_codes() {
        let err = ResolveError::FileNotFound {
            path: PathBuf::from("openapi.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = ResolveError::SchemaNotFound {
            name: "Employee".into(),
            referenced_by: None,
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn artifact_error_exit_codes() {
        let err = ArtifactError::from(ResolveError::FileNotFound {
            path: PathBuf::from("openapi.json"),
        });
        assert_eq!(err.exit_code(), 3);

        let err = ArtifactError::MissingTablename {
            schema: "Employee".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn schema_not_found_display() {
        let err = ResolveError::SchemaNotFound {
            name: "Division".into(),
            referenced_by: Some("Employee".into()),
        };
        assert_eq!(
            err.to_string(),
            "schema 'Division' not found (referenced from 'Employee')"
        );

        let err = ResolveError::SchemaNotFound {
            name: "Division".into(),
            referenced_by: None,
        };
        assert_eq!(err.to_string(), "schema 'Division' not found");
    }

    #[test]
    fn circular_reference_display() {
        let err = ResolveError::CircularReference {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "circular reference: A -> B -> A");
    }

    #[test]
    fn target_lookup_relabels_missing_schema() {
        let err = ArtifactError::from_target_lookup(ResolveError::SchemaNotFound {
            name: "Division".into(),
            referenced_by: None,
        });
        assert!(matches!(err, ArtifactError::TargetSchemaNotFound { ref name, .. } if name == "Division"));

        let err = ArtifactError::from_target_lookup(ResolveError::CircularReference {
            path: vec!["A".into(), "A".into()],
        });
        assert!(matches!(err, ArtifactError::Resolve(ResolveError::CircularReference { .. })));
    }

    #[test]
    fn in_property_wraps_source() {
        let err = ArtifactError::UnsupportedDefault {
            open_api_type: "object".into(),
            format: None,
        }
        .in_property("Employee", "data");
        assert_eq!(
            err.to_string(),
            "Employee.data: no default mapping for type 'object'"
        );
        assert_eq!(err.exit_code(), 2);
    }
}

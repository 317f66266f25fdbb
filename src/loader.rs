//! Document loading from files, strings, and HTTP URLs.

use std::path::Path;

use serde_json::Value;

use crate::error::ResolveError;
use crate::types::{json_type_name, Schemas};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `ResolveError::FileNotFound` if the file doesn't exist,
/// or `ResolveError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ResolveError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
pub fn load_document_str(content: &str) -> Result<Value, ResolveError> {
    serde_json::from_str(content).map_err(|source| ResolveError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `ResolveError::NetworkError` if the request fails or answers
/// with an error status, or if the body isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, ResolveError> {
    let network = |source| ResolveError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<Value, ResolveError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(ResolveError::UnsupportedRef {
                reference: source.to_string(),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// Pull the named schemas out of a document.
///
/// An OpenAPI document yields `components.schemas`, or nothing when it has
/// no `components`. A document with neither an `openapi`/`swagger` version
/// nor `components` is taken to be the schema map itself.
///
/// # Errors
///
/// `ResolveError::InvalidSchema` when the document or its schema map is
/// not an object.
pub fn extract_schemas(document: Value) -> Result<Schemas, ResolveError> {
    let Value::Object(mut root) = document else {
        return Err(ResolveError::InvalidSchema {
            message: format!("document must be an object, got {}", json_type_name(&document)),
        });
    };

    match root.remove("components") {
        None if root.contains_key("openapi") || root.contains_key("swagger") => Ok(Schemas::new()),
        None => Ok(Schemas::from(root)),
        Some(Value::Object(mut components)) => match components.remove("schemas") {
            Some(schemas) => Schemas::from_value(schemas),
            None => Ok(Schemas::new()),
        },
        Some(other) => Err(ResolveError::InvalidSchema {
            message: format!("components must be an object, got {}", json_type_name(&other)),
        }),
    }
}

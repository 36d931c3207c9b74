//! Custom filters available to environment and file templates
//!
//! - `default`: fallback for undefined values
//! - `required`: fail if the value is undefined or empty
//! - `base64_encode` / `base64_decode`
//! - `upper` / `lower`

use base64::{engine::general_purpose::STANDARD, Engine};
use minijinja::{Error, ErrorKind, Value};

/// Default filter - returns fallback if value is undefined or none
///
/// Usage: `{{ value | default("fallback") }}`
pub fn default_filter(value: Value, fallback: Value) -> Value {
    if value.is_undefined() || value.is_none() {
        fallback
    } else {
        value
    }
}

/// Base64 encode filter
///
/// Usage: `{{ value | base64_encode }}`
pub fn base64_encode(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Base64 decode filter
///
/// Usage: `{{ value | base64_decode }}`
pub fn base64_decode(value: &str) -> Result<String, Error> {
    STANDARD
        .decode(value)
        .map_err(|e| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("base64 decode error: {}", e),
            )
        })
        .and_then(|bytes| {
            String::from_utf8(bytes).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("base64 decode produced invalid UTF-8: {}", e),
                )
            })
        })
}

/// Required filter - fails if value is undefined or an empty string
///
/// Relation data often arrives in several steps; a peer may have joined
/// without publishing the field yet.
///
/// Usage: `{{ relations.consumed.database.app.uri | required }}`
pub fn required(value: Value) -> Result<Value, Error> {
    if value.is_undefined() || value.is_none() {
        Err(Error::new(
            ErrorKind::UndefinedError,
            "required value is undefined",
        ))
    } else if value.as_str().is_some_and(str::is_empty) {
        Err(Error::new(
            ErrorKind::UndefinedError,
            "required value is empty",
        ))
    } else {
        Ok(value)
    }
}

/// Upper case filter
pub fn upper(value: &str) -> String {
    value.to_uppercase()
}

/// Lower case filter
pub fn lower(value: &str) -> String {
    value.to_lowercase()
}

//! Error types for the itemcmp core library.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering comparison, catalog, caching, and configuration domains.
//! [`ItemcmpError`] is what the binary surfaces; the gateway renders
//! [`CompareError`] directly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level error type for the itemcmp core library.
#[derive(Debug, thiserror::Error)]
pub enum ItemcmpError {
    #[error("Compare error: {0}")]
    Compare(#[from] CompareError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Wire-level error codes returned to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    MissingField,
    InvalidRequest,
    AtLeastTwoIds,
    IdNotFound,
    UnknownField,
    Conflict,
}

impl ErrorCode {
    /// HTTP status code for this error code.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::MissingField | ErrorCode::InvalidRequest => 400,
            ErrorCode::IdNotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::AtLeastTwoIds | ErrorCode::UnknownField => 422,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingField => "MissingField",
            ErrorCode::InvalidRequest => "InvalidRequest",
            ErrorCode::AtLeastTwoIds => "AtLeastTwoIds",
            ErrorCode::IdNotFound => "IdNotFound",
            ErrorCode::UnknownField => "UnknownField",
            ErrorCode::Conflict => "Conflict",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business failures of a comparison request.
///
/// Every variant is terminal for the request; nothing is retried internally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    #[error("Missing mandatory field '{field}'")]
    MissingField { field: String },

    #[error("{message}")]
    InvalidRequest { message: String },

    #[error("At least 2 unique ids are required.")]
    AtLeastTwoIds,

    #[error("Some products were not found.")]
    IdNotFound { missing_ids: Vec<String> },

    /// `unknown_fields` is `None` when the client sent no field filter and
    /// nothing was comparable at all.
    #[error("{}", unknown_field_message(.unknown_fields))]
    UnknownField { unknown_fields: Option<Vec<String>> },

    #[error("Request with same Idempotency-Key but different body already exists.")]
    Conflict,

    #[error("Request was cancelled.")]
    Cancelled,
}

fn unknown_field_message(unknown_fields: &Option<Vec<String>>) -> &'static str {
    if unknown_fields.is_some() {
        "Unknown fields requested."
    } else {
        "No comparable fields found."
    }
}

impl CompareError {
    /// Wire error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            CompareError::MissingField { .. } => ErrorCode::MissingField,
            CompareError::InvalidRequest { .. } | CompareError::Cancelled => {
                ErrorCode::InvalidRequest
            }
            CompareError::AtLeastTwoIds => ErrorCode::AtLeastTwoIds,
            CompareError::IdNotFound { .. } => ErrorCode::IdNotFound,
            CompareError::UnknownField { .. } => ErrorCode::UnknownField,
            CompareError::Conflict => ErrorCode::Conflict,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.code().http_status()
    }
}

/// Serialized form of a [`CompareError`] inside the response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

impl From<&CompareError> for ErrorResponse {
    fn from(err: &CompareError) -> Self {
        let (missing_ids, unknown_fields) = match err {
            CompareError::IdNotFound { missing_ids } => (missing_ids.clone(), Vec::new()),
            CompareError::UnknownField { unknown_fields } => {
                (Vec::new(), unknown_fields.clone().unwrap_or_default())
            }
            _ => (Vec::new(), Vec::new()),
        };
        Self {
            error_code: err.code(),
            message: err.to_string(),
            missing_ids,
            unknown_fields,
        }
    }
}

/// Errors from computing per-field differences.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiffError {
    #[error("Unsupported field path: {path}")]
    UnsupportedPath { path: String },
}

/// Errors from loading or publishing the item catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid catalog item '{id}': {reason}")]
    InvalidItem { id: String, reason: String },
}

/// Errors from the response and idempotency caches.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("Cache operation was cancelled")]
    Cancelled,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `ItemcmpError`.
pub type Result<T> = std::result::Result<T, ItemcmpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::AtLeastTwoIds.http_status(), 422);
        assert_eq!(ErrorCode::IdNotFound.http_status(), 404);
        assert_eq!(ErrorCode::UnknownField.http_status(), 422);
        assert_eq!(ErrorCode::MissingField.http_status(), 400);
        assert_eq!(ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorCode::Conflict.http_status(), 409);
    }

    #[test]
    fn test_error_code_serializes_as_name() {
        let json = serde_json::to_string(&ErrorCode::AtLeastTwoIds).unwrap();
        assert_eq!(json, "\"AtLeastTwoIds\"");
        assert_eq!(ErrorCode::IdNotFound.to_string(), "IdNotFound");
    }

    #[test]
    fn test_unknown_field_messages() {
        let with_fields = CompareError::UnknownField {
            unknown_fields: Some(vec!["specifications.foo".into()]),
        };
        assert_eq!(with_fields.to_string(), "Unknown fields requested.");

        let without = CompareError::UnknownField {
            unknown_fields: None,
        };
        assert_eq!(without.to_string(), "No comparable fields found.");
    }

    #[test]
    fn test_cancelled_maps_to_invalid_request() {
        assert_eq!(CompareError::Cancelled.code(), ErrorCode::InvalidRequest);
        assert_eq!(CompareError::Cancelled.http_status(), 400);
    }

    #[test]
    fn test_error_response_from_id_not_found() {
        let err = CompareError::IdNotFound {
            missing_ids: vec!["b".into(), "a".into()],
        };
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.error_code, ErrorCode::IdNotFound);
        assert_eq!(resp.message, "Some products were not found.");
        assert_eq!(resp.missing_ids, vec!["b", "a"]);
        assert!(resp.unknown_fields.is_empty());
    }

    #[test]
    fn test_error_response_omits_empty_lists() {
        let resp = ErrorResponse::from(&CompareError::AtLeastTwoIds);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error_code"], "AtLeastTwoIds");
        assert!(json.get("missing_ids").is_none());
        assert!(json.get("unknown_fields").is_none());
    }

    #[test]
    fn test_error_display_catalog() {
        let err = ItemcmpError::Catalog(CatalogError::InvalidItem {
            id: "p-1".into(),
            reason: "price must be non-negative".into(),
        });
        assert_eq!(
            err.to_string(),
            "Catalog error: Invalid catalog item 'p-1': price must be non-negative"
        );
    }

    #[test]
    fn test_error_from_config() {
        let err: ItemcmpError = ConfigError::FileNotFound {
            path: PathBuf::from("missing.toml"),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Configuration file not found: missing.toml"
        );
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: ItemcmpError = serde_err.into();
        assert!(matches!(err, ItemcmpError::Serialization(_)));
    }
}

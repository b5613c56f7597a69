//! API boundary error types

use intake_validation::{SchemaError, ValidationErrors};
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to the surrounding HTTP layer
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 422,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::BadRequest(_) => 400,
            ApiError::Serialization(_) => 500,
        }
    }

    /// Failure body: `{"detail": [{"loc", "msg", "type"}, ...]}` for validation
    /// errors, `{"detail": "<message>"}` otherwise
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ApiError::Validation(errors) => serde_json::json!({ "detail": errors.to_json() }),
            other => serde_json::json!({ "detail": other.to_string() }),
        }
    }

    /// Validation errors, if this is a validation failure
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Serialization(err.to_string())
    }
}

/// A malformed endpoint declaration, detected at registration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Endpoint {method} {path} is already registered")]
    DuplicateEndpoint { method: String, path: String },

    #[error("Invalid path template '{path}': {reason}")]
    InvalidTemplate { path: String, reason: String },

    #[error("Path parameter '{param}' is not in template '{path}'")]
    PathParamNotInTemplate { path: String, param: String },

    #[error("Template '{path}' has placeholder '{param}' with no declared path parameter")]
    UndeclaredPathParam { path: String, param: String },

    #[error("Path parameter '{param}' of '{path}' must be required")]
    OptionalPathParam { path: String, param: String },

    #[error("{method} {path} declares body parameter '{param}'")]
    BodyNotAllowed {
        method: String,
        path: String,
        param: String,
    },

    #[error("Parameter '{param}' of {path} is marked embed but is not a body parameter")]
    EmbedOutsideBody { path: String, param: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

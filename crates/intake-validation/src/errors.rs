//! Validation error types
//!
//! Request-time failures are data: a [`ValidationErrors`] collection of
//! [`FieldError`]s, never a panic. Malformed schemas are a [`SchemaError`],
//! raised once while a registry is being built.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Validation Result
// ============================================================================

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationErrors>;

// ============================================================================
// Validation Errors Collection
// ============================================================================

/// Collection of validation errors, in the order they were found
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    /// List of individual validation errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create a new empty validation errors collection
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Add a validation error to the collection
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Merge another ValidationErrors into this one
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    /// Convert to Result - Ok if no errors, Err if there are errors
    pub fn into_result<T>(self, value: T) -> ValidationResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Get errors as a slice
    pub fn as_slice(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.errors.iter()
    }

    /// Errors of one kind
    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &FieldError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Render as the conventional `[{"loc": [...], "msg": ..., "type": ...}]` list
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.errors.iter().map(FieldError::to_json).collect())
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Error Kind Classification
// ============================================================================

/// Classification of validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required field absent from the input
    MissingField,
    /// Raw value could not be converted to the declared type
    TypeMismatch,
    /// Numeric bound (`gt`, `ge`, `lt`, `le`) violated
    RangeViolation,
    /// `min_length` / `max_length` violated
    LengthViolation,
    /// `pattern` did not match the whole string
    PatternViolation,
    /// Value not in the allowed `enum` set
    EnumViolation,
    /// A custom validator rejected the value
    CustomViolation,
    /// A body value cannot match its target model (e.g. a scalar for a mapping)
    UnknownNestedShape,
    /// Undeclared key under the `forbid` extra policy
    ExtraForbidden,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::TypeMismatch => "type_mismatch",
            Self::RangeViolation => "range_violation",
            Self::LengthViolation => "length_violation",
            Self::PatternViolation => "pattern_violation",
            Self::EnumViolation => "enum_violation",
            Self::CustomViolation => "custom_violation",
            Self::UnknownNestedShape => "unknown_nested_shape",
            Self::ExtraForbidden => "extra_forbidden",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Paths
// ============================================================================

/// One step of a field path: a key in a mapping or an index in a sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => f.write_str(k),
            Self::Index(i) => write!(f, "{}", i),
        }
    }
}

// ============================================================================
// Single Field Error
// ============================================================================

/// A single validation error
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Request source ("path", "query", "body"); empty when a model is
    /// validated directly rather than through a request binder
    pub location: String,

    /// Path from the top-level value to the failing field
    pub path: Vec<PathSegment>,

    /// Error classification
    pub kind: ErrorKind,

    /// Human-readable error message
    pub message: String,
}

impl FieldError {
    pub fn new(
        location: impl Into<String>,
        path: Vec<PathSegment>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            path,
            kind,
            message: message.into(),
        }
    }

    /// Dotted field path, e.g. `item.image.0.url`
    pub fn dotted_path(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// `[source, field-path...]`; the source is omitted when empty
    pub fn loc(&self) -> Vec<PathSegment> {
        let mut loc = Vec::with_capacity(self.path.len() + 1);
        if !self.location.is_empty() {
            loc.push(PathSegment::Key(self.location.clone()));
        }
        loc.extend(self.path.iter().cloned());
        loc
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        let loc: Vec<serde_json::Value> = self
            .loc()
            .into_iter()
            .map(|segment| match segment {
                PathSegment::Key(k) => serde_json::Value::String(k),
                PathSegment::Index(i) => serde_json::Value::from(i),
            })
            .collect();
        serde_json::json!({
            "loc": loc,
            "msg": self.message,
            "type": self.kind.as_str(),
        })
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc = self
            .loc()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}: {} [{}]", loc, self.message, self.kind)
    }
}

// ============================================================================
// Validation Context
// ============================================================================

/// Tracks the current location while descending into nested values
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    location: String,
    path: Vec<PathSegment>,
}

impl ValidationContext {
    /// Create a new validation context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validation context for a request source ("path", "query", "body")
    pub fn with_location(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            path: Vec::new(),
        }
    }

    /// Start below an existing prefix
    pub fn with_prefix(location: impl Into<String>, prefix: Vec<PathSegment>) -> Self {
        Self {
            location: location.into(),
            path: prefix,
        }
    }

    pub fn push_key(&mut self, key: &str) {
        self.path.push(PathSegment::Key(key.to_string()));
    }

    pub fn push_index(&mut self, index: usize) {
        self.path.push(PathSegment::Index(index));
    }

    pub fn pop(&mut self) {
        self.path.pop();
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Build an error at the current position
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> FieldError {
        FieldError::new(self.location.clone(), self.path.clone(), kind, message)
    }
}

// ============================================================================
// Schema Construction Errors
// ============================================================================

/// A malformed schema. Detected while building a registry; never per request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Model '{0}' is already registered")]
    DuplicateModel(String),

    #[error("'{owner}' declares field '{field}' more than once")]
    DuplicateField { owner: String, field: String },

    #[error("Field '{field}' in '{owner}' is optional but has no default and type '{ty}' does not admit None")]
    MissingDefault {
        owner: String,
        field: String,
        ty: String,
    },

    #[error("Field '{field}' in '{owner}' is required but declares a default")]
    RequiredWithDefault { owner: String, field: String },

    #[error("Field '{field}' in '{owner}' references unknown model '{model}'")]
    UnknownModel {
        owner: String,
        field: String,
        model: String,
    },

    #[error("Cyclic model nesting detected involving: {0:?}")]
    CyclicNesting(Vec<String>),

    #[error("Constraint '{constraint}' on field '{field}' in '{owner}' does not apply to type '{ty}'")]
    IncompatibleConstraint {
        owner: String,
        field: String,
        constraint: String,
        ty: String,
    },

    #[error("Enum value {value} of field '{field}' in '{owner}' is not a valid '{ty}'")]
    InvalidEnumValue {
        owner: String,
        field: String,
        value: String,
        ty: String,
    },

    #[error("Field '{field}' in '{owner}' has non-scalar dict key type '{ty}'")]
    InvalidMapKey {
        owner: String,
        field: String,
        ty: String,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid type annotation '{annotation}': {reason}")]
    InvalidAnnotation { annotation: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_empty() {
        let errors = ValidationErrors::new();
        assert!(errors.is_empty());
        assert_eq!(errors.len(), 0);
        assert_eq!(errors.into_result(7), Ok(7));
    }

    #[test]
    fn test_validation_errors_add() {
        let mut errors = ValidationErrors::new();
        let ctx = ValidationContext::with_location("query");
        errors.add(ctx.error(ErrorKind::MissingField, "Field required"));
        assert!(!errors.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.of_kind(ErrorKind::MissingField).count(), 1);
        assert!(errors.into_result(()).is_err());
    }

    #[test]
    fn test_validation_context() {
        let mut ctx = ValidationContext::with_location("body");
        assert!(ctx.path().is_empty());

        ctx.push_key("item");
        ctx.push_key("image");
        ctx.push_index(1);
        ctx.push_key("url");
        let error = ctx.error(ErrorKind::TypeMismatch, "bad");
        assert_eq!(error.dotted_path(), "item.image.1.url");
        assert_eq!(error.loc().len(), 5);

        ctx.pop();
        ctx.pop();
        assert_eq!(ctx.path().len(), 2);
    }

    #[test]
    fn test_field_error_display() {
        let error = FieldError::new(
            "path",
            vec![PathSegment::Key("item_id".to_string())],
            ErrorKind::TypeMismatch,
            "Expected int, got string \"foo\"",
        );
        assert_eq!(
            error.to_string(),
            "path.item_id: Expected int, got string \"foo\" [type_mismatch]"
        );
    }

    #[test]
    fn test_loc_without_location() {
        let error = FieldError::new(
            "",
            vec![PathSegment::Key("name".to_string())],
            ErrorKind::MissingField,
            "Field required",
        );
        assert_eq!(error.loc(), vec![PathSegment::Key("name".to_string())]);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::MissingField.to_string(), "missing_field");
        assert_eq!(ErrorKind::UnknownNestedShape.to_string(), "unknown_nested_shape");
        assert_eq!(ErrorKind::ExtraForbidden.as_str(), "extra_forbidden");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_to_json() {
        let error = FieldError::new(
            "body",
            vec![PathSegment::Key("tags".to_string()), PathSegment::Index(2)],
            ErrorKind::TypeMismatch,
            "Expected str, got integer 3",
        );
        let json = error.to_json();
        assert_eq!(json["loc"], serde_json::json!(["body", "tags", 2]));
        assert_eq!(json["type"], "type_mismatch");
    }
}

//! Intake Validation
//!
//! Declarative validation and coercion for the Intake request layer.
//!
//! Field and model schemas are declared once, checked and frozen into a
//! [`SchemaRegistry`], then used to turn untyped raw input (path segments,
//! query strings, decoded bodies) into validated [`ModelInstance`]s, or into a
//! complete list of located [`FieldError`]s.
//!
//! This crate is the foundation for:
//! - `intake-api`: binding HTTP requests to endpoint parameters
//! - `intake-cli`: checking definition files and dry-running requests
//!
//! # Features
//!
//! - **serde** (default): JSON conversions for [`Value`] and typed
//!   deserialization of validated instances
//!
//! # Example
//!
//! ```rust
//! use intake_validation::{ErrorKind, FieldSchema, FieldType, ModelSchema, SchemaRegistryBuilder, Value};
//!
//! let mut builder = SchemaRegistryBuilder::new();
//! builder
//!     .register(
//!         ModelSchema::new("Query")
//!             .field(FieldSchema::new("limit", FieldType::Int).ge(0).le(100).default_value(10)),
//!     )
//!     .unwrap();
//! let registry = builder.build().unwrap();
//!
//! let raw = Value::Object(vec![("limit".to_string(), Value::from("101"))]);
//! let errors = registry.validate("Query", &raw).unwrap_err();
//! assert_eq!(errors.errors[0].kind, ErrorKind::RangeViolation);
//! ```

// Public modules
pub mod annotation;
pub mod coerce;
pub mod config;
pub mod constraints;
pub mod engine;
pub mod errors;
pub mod instance;
pub mod schema;
pub mod types;

// Re-export commonly used types
pub use annotation::parse_annotation;
pub use config::{ExtraFields, ValidationConfig};
pub use constraints::{
    Bound, BoxedCustomValidator, Constraint, ConstraintViolation, CustomValidator, FnValidator,
    Pattern,
};
pub use engine::{coerce_value, validate, validate_field, validate_with_context};
pub use errors::{
    ErrorKind, FieldError, PathSegment, SchemaError, ValidationContext, ValidationErrors,
    ValidationResult,
};
pub use instance::ModelInstance;
pub use schema::{FieldSchema, ModelSchema, SchemaRegistry, SchemaRegistryBuilder, Source};
pub use types::{FieldType, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

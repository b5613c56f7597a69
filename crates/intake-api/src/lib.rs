//! Intake API
//!
//! Request binding on top of `intake-validation`: endpoints declare their
//! path, query and body parameters once, and each incoming request snapshot is
//! bound to typed values or rejected with every field error at once.
//!
//! # Modules
//!
//! - [`request`]: raw request snapshot (method, path, query, parsed body)
//! - [`binder`]: endpoint schemas and per-request binding
//! - [`registry`]: endpoints keyed by method and path template
//! - [`extractors`]: typed `Path<T>`, `Query<T>`, `Body<T>`
//! - [`definition`]: YAML/JSON definition files
//! - [`error`]: boundary error types

pub mod binder;
pub mod definition;
pub mod error;
pub mod extractors;
pub mod registry;
pub mod request;
pub mod template;

pub use binder::{BoundParam, BoundRequest, EndpointSchema, ParamSpec};
pub use definition::{Definitions, DefinitionError};
pub use error::{ApiError, ApiResult, RegistrationError};
pub use extractors::{Body, Path, Query};
pub use registry::EndpointRegistry;
pub use request::{HttpMethod, QueryParams, RawBody, RawRequest};
pub use template::PathTemplate;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

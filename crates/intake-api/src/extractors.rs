//! Typed extractors
//!
//! Extractors pull typed data out of a [`BoundRequest`]. Values are already
//! coerced and validated, so deserialization only fails when the target struct
//! disagrees with the declared parameters.

use crate::binder::BoundRequest;
use crate::error::{ApiError, ApiResult};
use intake_validation::{Source, Value};
use serde::de::DeserializeOwned;

fn extract<T: DeserializeOwned>(value: Value, what: &str) -> ApiResult<T> {
    serde_json::from_value(serde_json::Value::from(value))
        .map_err(|e| ApiError::Serialization(format!("Invalid {}: {}", what, e)))
}

/// Path parameter extractor
#[derive(Debug)]
pub struct Path<T> {
    pub inner: T,
}

impl<T> Path<T>
where
    T: DeserializeOwned,
{
    /// Extract path parameters from a bound request
    pub fn from_bound(req: &BoundRequest) -> ApiResult<Self> {
        let inner = extract(req.source_value(Source::Path), "path parameters")?;
        Ok(Path { inner })
    }
}

/// Query parameter extractor
#[derive(Debug)]
pub struct Query<T> {
    pub inner: T,
}

impl<T> Query<T>
where
    T: DeserializeOwned,
{
    /// Extract query parameters from a bound request
    pub fn from_bound(req: &BoundRequest) -> ApiResult<Self> {
        let inner = extract(req.source_value(Source::Query), "query parameters")?;
        Ok(Query { inner })
    }
}

/// Body extractor
///
/// For an endpoint whose single body parameter consumes the whole body, `T`
/// is that parameter's type; otherwise `T` holds one field per body parameter.
#[derive(Debug)]
pub struct Body<T> {
    pub inner: T,
}

impl<T> Body<T>
where
    T: DeserializeOwned,
{
    /// Extract the body from a bound request
    pub fn from_bound(req: &BoundRequest) -> ApiResult<Self> {
        let inner = extract(req.body_value(), "body")?;
        Ok(Body { inner })
    }
}

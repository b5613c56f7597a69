//! Endpoint registry
//!
//! Built once at startup: holds the shared model registry and every checked
//! endpoint, and dispatches raw requests to the endpoint they belong to.

use crate::binder::{BoundRequest, EndpointSchema};
use crate::error::{ApiError, ApiResult, RegistrationError};
use crate::request::{HttpMethod, RawRequest};
use crate::template::PathTemplate;
use intake_validation::SchemaRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registered endpoints keyed by method and path template
#[derive(Debug)]
pub struct EndpointRegistry {
    schemas: Arc<SchemaRegistry>,
    endpoints: Vec<(EndpointSchema, PathTemplate)>,
    index: HashMap<(HttpMethod, String), usize>,
}

impl EndpointRegistry {
    pub fn new(schemas: impl Into<Arc<SchemaRegistry>>) -> Self {
        Self {
            schemas: schemas.into(),
            endpoints: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Model registry shared by every endpoint
    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Check and register an endpoint
    pub fn register(&mut self, mut endpoint: EndpointSchema) -> Result<(), RegistrationError> {
        let key = (endpoint.method, endpoint.path.clone());
        if self.index.contains_key(&key) {
            return Err(RegistrationError::DuplicateEndpoint {
                method: endpoint.method.to_string(),
                path: endpoint.path,
            });
        }
        endpoint.check(&self.schemas)?;
        for spec in &mut endpoint.params {
            spec.field.coerce_literals();
        }
        let template = PathTemplate::parse(&endpoint.path)?;

        debug!(endpoint = %endpoint, params = endpoint.params.len(), "registered endpoint");
        self.index.insert(key, self.endpoints.len());
        self.endpoints.push((endpoint, template));
        Ok(())
    }

    /// Exact lookup by method and template
    pub fn get(&self, method: HttpMethod, template: &str) -> Option<&EndpointSchema> {
        self.index
            .get(&(method, template.to_string()))
            .map(|&i| &self.endpoints[i].0)
    }

    /// Endpoints in registration order
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointSchema> {
        self.endpoints.iter().map(|(e, _)| e)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Bind a request against the endpoint registered under `template`
    pub fn bind(
        &self,
        method: HttpMethod,
        template: &str,
        request: &RawRequest,
    ) -> ApiResult<BoundRequest> {
        let endpoint = self
            .get(method, template)
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", method, template)))?;
        endpoint.bind(&self.schemas, request)
    }

    /// Find the endpoint for a concrete request path and bind the request
    ///
    /// Path parameters matched from the path are added to those already on
    /// the request.
    pub fn dispatch(&self, request: &RawRequest) -> ApiResult<BoundRequest> {
        let mut path_matched = false;
        for (endpoint, template) in &self.endpoints {
            let Some(params) = template.match_path(&request.path) else {
                continue;
            };
            path_matched = true;
            if endpoint.method != request.method {
                continue;
            }

            let mut request = request.clone();
            // Values matched from the path win over caller-supplied ones
            request.path_params.extend(params);
            let result = endpoint.bind(&self.schemas, &request);
            if let Err(ApiError::Validation(errors)) = &result {
                info!(endpoint = %endpoint, errors = errors.len(), "request rejected");
            }
            return result;
        }

        if path_matched {
            Err(ApiError::MethodNotAllowed(format!("{} {}", request.method, request.path)))
        } else {
            Err(ApiError::NotFound(request.path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_validation::{Constraint, FieldSchema, FieldType, Value};

    fn registry() -> EndpointRegistry {
        let mut registry = EndpointRegistry::new(SchemaRegistry::empty());
        registry
            .register(
                EndpointSchema::new(HttpMethod::Get, "/items/{item_id}")
                    .name("read_item")
                    .param(FieldSchema::path("item_id", FieldType::Int)),
            )
            .unwrap();
        registry
            .register(
                EndpointSchema::new(HttpMethod::Get, "/users/me").name("read_user_me"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_endpoint() {
        let mut registry = registry();
        let err = registry
            .register(
                EndpointSchema::new(HttpMethod::Get, "/items/{item_id}")
                    .param(FieldSchema::path("item_id", FieldType::Str)),
            )
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateEndpoint { .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_by_template() {
        let registry = registry();
        let endpoint = registry.get(HttpMethod::Get, "/items/{item_id}").unwrap();
        assert_eq!(endpoint.name.as_deref(), Some("read_item"));
        assert!(registry.get(HttpMethod::Post, "/items/{item_id}").is_none());
    }

    #[test]
    fn test_dispatch() {
        let registry = registry();

        let bound = registry
            .dispatch(&RawRequest::new(HttpMethod::Get, "/items/42"))
            .unwrap();
        assert_eq!(bound.get("item_id").and_then(|v| v.as_i64()), Some(42));
        assert_eq!(bound.endpoint(), "GET /items/{item_id}");

        let err = registry
            .dispatch(&RawRequest::new(HttpMethod::Get, "/items/foo"))
            .unwrap_err();
        assert_eq!(err.status_code(), 422);

        let err = registry
            .dispatch(&RawRequest::new(HttpMethod::Delete, "/items/42"))
            .unwrap_err();
        assert_eq!(err.status_code(), 405);

        let err = registry
            .dispatch(&RawRequest::new(HttpMethod::Get, "/nowhere"))
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_dispatch_uses_matched_path_values() {
        let registry = registry();
        let request = RawRequest::new(HttpMethod::Get, "/items/42").with_path_param("item_id", "7");
        let bound = registry.dispatch(&request).unwrap();
        assert_eq!(bound.get("item_id").and_then(|v| v.as_i64()), Some(42));
    }

    #[test]
    fn test_register_coerces_enum_literals() {
        let mut registry = EndpointRegistry::new(SchemaRegistry::empty());
        let mut size = FieldSchema::query("size", FieldType::Float);
        size.constraints.push(Constraint::one_of([1i64, 2]));
        registry
            .register(EndpointSchema::new(HttpMethod::Get, "/shirts/").param(size))
            .unwrap();

        let request = RawRequest::new(HttpMethod::Get, "/shirts/").with_query_param("size", "2");
        let bound = registry.dispatch(&request).unwrap();
        assert_eq!(bound.get("size"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn test_bind_by_template() {
        let registry = registry();
        let request = RawRequest::new(HttpMethod::Get, "/items/7").with_path_param("item_id", "7");
        assert!(registry.bind(HttpMethod::Get, "/items/{item_id}", &request).is_ok());
        let err = registry
            .bind(HttpMethod::Get, "/missing", &request)
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}

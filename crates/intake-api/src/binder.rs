//! Request binding
//!
//! An [`EndpointSchema`] declares the parameters of one endpoint. Binding a
//! [`RawRequest`] against it resolves every parameter from its source, runs the
//! validation engine once per parameter and either returns all typed values in
//! declaration order or rejects the request with the union of every error.
//!
//! # Body layout
//!
//! - A single body parameter that is not marked `embed` consumes the whole
//!   body: `{"name": "Foo", ...}` is the `item` itself.
//! - A single embedded body parameter, or several body parameters, are each
//!   read from under their own key: `{"item": {...}, "user": {...}}`.
//! - Form bodies are read key by key like a query string, except that a single
//!   un-embedded model parameter is assembled from all form fields.
//!
//! # Example
//!
//! ```rust
//! use intake_api::{EndpointSchema, HttpMethod, RawRequest};
//! use intake_validation::{FieldSchema, FieldType, SchemaRegistry};
//!
//! let endpoint = EndpointSchema::new(HttpMethod::Get, "/items/{item_id}")
//!     .param(FieldSchema::path("item_id", FieldType::Int))
//!     .param(FieldSchema::query("q", FieldType::optional(FieldType::Str)).optional());
//! let registry = SchemaRegistry::empty();
//! endpoint.check(&registry).unwrap();
//!
//! let request = RawRequest::new(HttpMethod::Get, "/items/5")
//!     .with_path_param("item_id", "5")
//!     .with_query_param("q", "somequery");
//! let bound = endpoint.bind(&registry, &request).unwrap();
//! assert_eq!(bound.get("item_id").and_then(|v| v.as_i64()), Some(5));
//! ```

use crate::error::{ApiError, ApiResult, RegistrationError};
use crate::request::{HttpMethod, QueryParams, RawBody, RawRequest};
use crate::template::PathTemplate;
use intake_validation::{
    validate_field, ErrorKind, FieldSchema, FieldType, ModelSchema, SchemaRegistry, Source,
    ValidationContext, ValidationErrors, Value,
};
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::debug;

// ============================================================================
// Endpoint Schema
// ============================================================================

/// One declared endpoint parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub field: FieldSchema,
    /// Read a single body parameter from under its own key
    pub embed: bool,
}

/// Parameters of one endpoint, keyed by method and path template
#[derive(Debug, Clone)]
pub struct EndpointSchema {
    pub method: HttpMethod,
    pub path: String,
    /// Operation name, for logs and listings
    pub name: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl EndpointSchema {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            name: None,
            params: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a parameter; its source comes from the field
    pub fn param(mut self, field: FieldSchema) -> Self {
        self.params.push(ParamSpec { field, embed: false });
        self
    }

    /// Add a body parameter read from under its own key
    pub fn embedded(mut self, field: FieldSchema) -> Self {
        self.params.push(ParamSpec {
            field: field.source(Source::Body),
            embed: true,
        });
        self
    }

    pub fn params_from(&self, source: Source) -> impl Iterator<Item = &FieldSchema> {
        self.params
            .iter()
            .map(|p| &p.field)
            .filter(move |f| f.source == source)
    }

    /// Whether the lone body parameter is the whole body
    pub fn consumes_whole_body(&self) -> bool {
        let mut body = self.params.iter().filter(|p| p.field.source == Source::Body);
        matches!((body.next(), body.next()), (Some(only), None) if !only.embed)
    }

    /// Check the declaration against the template and the model registry
    pub fn check(&self, registry: &SchemaRegistry) -> Result<(), RegistrationError> {
        let template = PathTemplate::parse(&self.path)?;
        let fields: Vec<FieldSchema> = self.params.iter().map(|p| p.field.clone()).collect();
        registry.check_fields(&self.to_string(), &fields)?;

        for spec in &self.params {
            let field = &spec.field;
            if spec.embed && field.source != Source::Body {
                return Err(RegistrationError::EmbedOutsideBody {
                    path: self.path.clone(),
                    param: field.name.clone(),
                });
            }
            match field.source {
                Source::Path => {
                    if !field.lookup_keys().any(|k| template.has_param(k)) {
                        return Err(RegistrationError::PathParamNotInTemplate {
                            path: self.path.clone(),
                            param: field.name.clone(),
                        });
                    }
                    if !field.required {
                        return Err(RegistrationError::OptionalPathParam {
                            path: self.path.clone(),
                            param: field.name.clone(),
                        });
                    }
                }
                Source::Body if !self.method.allows_body() => {
                    return Err(RegistrationError::BodyNotAllowed {
                        method: self.method.to_string(),
                        path: self.path.clone(),
                        param: field.name.clone(),
                    });
                }
                _ => {}
            }
        }

        for placeholder in template.param_names() {
            let declared = self
                .params_from(Source::Path)
                .any(|f| f.lookup_keys().any(|k| k == placeholder));
            if !declared {
                return Err(RegistrationError::UndeclaredPathParam {
                    path: self.path.clone(),
                    param: placeholder.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Bind a request, collecting errors across every parameter
    pub fn bind(&self, registry: &SchemaRegistry, request: &RawRequest) -> ApiResult<BoundRequest> {
        let config = registry.config();
        let mut errors = ValidationErrors::new();
        let body = self.body_input(registry, request.body.as_ref(), &mut errors);

        let mut values = Vec::with_capacity(self.params.len());
        for spec in &self.params {
            let field = &spec.field;
            let mut ctx = ValidationContext::with_location(field.source.as_str());

            let raw = match field.source {
                Source::Path => {
                    ctx.push_key(field.input_name());
                    field
                        .lookup_keys()
                        .find_map(|k| request.path_params.get(k))
                        .map(|s| Value::from(s.as_str()))
                }
                Source::Query => {
                    ctx.push_key(field.input_name());
                    query_lookup(&request.query, field)
                }
                Source::Body => match &body {
                    BodyInput::Rejected => continue,
                    BodyInput::Whole(value) => value.clone(),
                    BodyInput::Keyed(object) => {
                        ctx.push_key(field.input_name());
                        object.and_then(|o| field.lookup_keys().find_map(|k| o.get(k)).cloned())
                    }
                    BodyInput::Form(form) => {
                        ctx.push_key(field.input_name());
                        query_lookup(form, field)
                    }
                },
            };

            if let Some(value) = validate_field(registry, field, raw.as_ref(), config, &mut ctx, &mut errors) {
                values.push(BoundParam {
                    name: field.name.clone(),
                    source: field.source,
                    value,
                });
            }
        }

        debug!(
            endpoint = %self,
            params = self.params.len(),
            errors = errors.len(),
            "bound request"
        );

        let bound = BoundRequest {
            endpoint: self.to_string(),
            whole_body: self.consumes_whole_body(),
            params: values,
        };
        errors.into_result(bound).map_err(ApiError::Validation)
    }

    fn body_input<'a>(
        &self,
        registry: &SchemaRegistry,
        body: Option<&'a RawBody>,
        errors: &mut ValidationErrors,
    ) -> BodyInput<'a> {
        let whole = self.consumes_whole_body();
        match body {
            None if whole => BodyInput::Whole(None),
            None => BodyInput::Keyed(None),
            Some(RawBody::Json(value)) if whole => BodyInput::Whole(Some(value.clone())),
            Some(RawBody::Json(value @ Value::Object(_))) => BodyInput::Keyed(Some(value)),
            Some(RawBody::Json(other)) => {
                if self.params_from(Source::Body).next().is_some() {
                    let ctx = ValidationContext::with_location("body");
                    errors.add(ctx.error(
                        ErrorKind::UnknownNestedShape,
                        format!("Expected object body, got {} {}", other.type_name(), other),
                    ));
                }
                BodyInput::Rejected
            }
            Some(RawBody::Form(form)) => {
                let model = self
                    .params_from(Source::Body)
                    .next()
                    .and_then(|f| match f.field_type.non_optional() {
                        FieldType::Model(name) => registry.get(name),
                        _ => None,
                    });
                match model {
                    Some(model) if whole => BodyInput::Whole(Some(form_object(form, model))),
                    _ => BodyInput::Form(form),
                }
            }
        }
    }
}

impl fmt::Display for EndpointSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Where body parameters are read from for one request
enum BodyInput<'a> {
    Whole(Option<Value>),
    Keyed(Option<&'a Value>),
    Form(&'a QueryParams),
    /// Body has the wrong shape; already reported
    Rejected,
}

fn query_lookup(query: &QueryParams, field: &FieldSchema) -> Option<Value> {
    let sequence = field.field_type.is_sequence();
    field.lookup_keys().find_map(|k| query.raw_value(k, sequence))
}

/// Assemble a model's raw mapping from form fields
fn form_object(form: &QueryParams, model: &ModelSchema) -> Value {
    let mut pairs: Vec<(String, Value)> = Vec::new();
    for (key, _) in form.iter() {
        if pairs.iter().any(|(k, _)| k == key) {
            continue;
        }
        let sequence = model
            .fields
            .iter()
            .find(|f| f.lookup_keys().any(|k| k == key))
            .map_or(false, |f| f.field_type.is_sequence());
        if let Some(value) = form.raw_value(key, sequence) {
            pairs.push((key.to_string(), value));
        }
    }
    Value::Object(pairs)
}

// ============================================================================
// Bound Request
// ============================================================================

/// One resolved parameter
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub source: Source,
    pub value: Value,
}

/// Typed values of a successfully bound request, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRequest {
    endpoint: String,
    whole_body: bool,
    params: Vec<BoundParam>,
}

impl BoundRequest {
    /// `METHOD /template` of the endpoint this request was bound to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn params(&self) -> &[BoundParam] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Mapping of the parameters from one source, by name
    pub fn source_value(&self, source: Source) -> Value {
        Value::Object(
            self.params
                .iter()
                .filter(|p| p.source == source)
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect(),
        )
    }

    /// The body as the handler sees it: the lone parameter's value when it
    /// consumed the whole body, otherwise a mapping of body parameters
    pub fn body_value(&self) -> Value {
        if self.whole_body {
            if let Some(param) = self.params.iter().find(|p| p.source == Source::Body) {
                return param.value.clone();
            }
        }
        self.source_value(Source::Body)
    }

    /// All parameters as one mapping, by name
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.params
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect(),
        )
    }

    /// Deserialize one parameter
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> ApiResult<T> {
        let value = self
            .get(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Parameter '{}' was not bound", name)))?;
        Ok(serde_json::from_value(serde_json::Value::from(value.clone()))?)
    }

    /// Deserialize every parameter into a handler-specific struct
    pub fn into_struct<T: DeserializeOwned>(&self) -> ApiResult<T> {
        Ok(serde_json::from_value(serde_json::Value::from(self.to_value()))?)
    }
}

//! Declarative definition files
//!
//! Models and endpoints can be declared in YAML (or JSON) instead of code:
//!
//! ```yaml
//! config:
//!   extra: ignore
//! models:
//!   - name: Item
//!     fields:
//!       - { name: name, type: str }
//!       - { name: price, type: float, gt: 0 }
//!       - { name: tax, type: float | None }
//!       - { name: tags, type: "set[str]", default: [] }
//! endpoints:
//!   - method: PUT
//!     path: /items/{item_id}
//!     params:
//!       - { name: item_id, type: int }
//!       - { name: item, type: Item, embed: true }
//! ```
//!
//! Presence rules: a field with a `default` is optional; otherwise a field
//! whose type admits `None` is optional (absent means null) and anything else
//! is required. `required:` overrides either way.
//!
//! Parameters without `in:` follow the usual inference: a name that appears in
//! the path template is a path parameter, a type naming a model is a body
//! parameter, anything else is a query parameter.

use crate::binder::EndpointSchema;
use crate::error::RegistrationError;
use crate::registry::EndpointRegistry;
use crate::request::HttpMethod;
use crate::template::PathTemplate;
use intake_validation::{
    parse_annotation, Bound, ExtraFields, FieldSchema, ModelSchema, SchemaError,
    SchemaRegistryBuilder, Source, ValidationConfig, Value,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors loading a definition file
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{owner}: {reason}")]
    Invalid { owner: String, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

// ============================================================================
// File Format
// ============================================================================

/// Top-level definition document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigDef>,
    #[serde(default)]
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDef>,
}

/// Validation config section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigDef {
    /// `ignore`, `allow` or `forbid`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(default)]
    pub str_strip_whitespace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDef {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub params: Vec<FieldDef>,
}

/// A model field or endpoint parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Type annotation, e.g. `list[Image] | None`
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// `path`, `query` or `body` (parameters only)
    #[serde(default, rename = "in", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Read a single body parameter from under its own key (parameters only)
    #[serde(default)]
    pub embed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Present-but-null is a null default, not an absent one
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ge: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub le: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<serde_json::Value>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

// ============================================================================
// Loading
// ============================================================================

impl Definitions {
    pub fn from_yaml_str(input: &str) -> Result<Self, DefinitionError> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Read a definition file; `.json` files are parsed as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Compile into a checked endpoint registry
    pub fn build(&self) -> Result<EndpointRegistry, DefinitionError> {
        let mut builder = SchemaRegistryBuilder::new();
        if let Some(config) = &self.config {
            builder = builder.config(config.to_config("config")?);
        }
        for model in &self.models {
            builder.register(model.to_schema()?)?;
        }
        let mut registry = EndpointRegistry::new(builder.build()?);
        for endpoint in &self.endpoints {
            registry.register(endpoint.to_schema()?)?;
        }
        debug!(
            models = self.models.len(),
            endpoints = registry.len(),
            "definitions compiled"
        );
        Ok(registry)
    }
}

impl ConfigDef {
    fn to_config(&self, owner: &str) -> Result<ValidationConfig, DefinitionError> {
        let extra = match &self.extra {
            Some(extra) => extra
                .parse::<ExtraFields>()
                .map_err(|reason| invalid(owner, reason))?,
            None => ExtraFields::default(),
        };
        Ok(ValidationConfig::new()
            .extra(extra)
            .strip_whitespace(self.str_strip_whitespace))
    }
}

impl ModelDef {
    pub fn to_schema(&self) -> Result<ModelSchema, DefinitionError> {
        let mut model = ModelSchema::new(&self.name);
        if let Some(config) = &self.config {
            model = model.with_config(config.to_config(&self.name)?);
        }
        for def in &self.fields {
            if def.source.is_some() || def.embed {
                return Err(invalid(
                    &self.name,
                    format!("field '{}': 'in' and 'embed' apply to endpoint parameters only", def.name),
                ));
            }
            model = model.field(def.to_field(&self.name)?);
        }
        Ok(model)
    }
}

impl EndpointDef {
    pub fn to_schema(&self) -> Result<EndpointSchema, DefinitionError> {
        let owner = format!("{} {}", self.method, self.path);
        let method: HttpMethod = self.method.parse().map_err(|reason| invalid(&owner, reason))?;
        let template = PathTemplate::parse(&self.path)?;

        let mut endpoint = EndpointSchema::new(method, &self.path);
        if let Some(name) = &self.name {
            endpoint = endpoint.name(name);
        }
        for def in &self.params {
            let field = def.to_field(&owner)?;
            let source = match &def.source {
                Some(source) => source
                    .parse::<Source>()
                    .map_err(|reason| invalid(&owner, reason))?,
                None if field.lookup_keys().any(|k| template.has_param(k)) => Source::Path,
                None if references_model(&field) => Source::Body,
                None => Source::Query,
            };
            let field = field.source(source);
            endpoint = if def.embed {
                endpoint.embedded(field)
            } else {
                endpoint.param(field)
            };
        }
        Ok(endpoint)
    }
}

impl FieldDef {
    /// Build the field schema; `owner` names the model or endpoint for errors
    pub fn to_field(&self, owner: &str) -> Result<FieldSchema, DefinitionError> {
        let ty = parse_annotation(&self.ty)?;
        let admits_absent = ty.admits_absent();
        let mut field = FieldSchema::new(&self.name, ty);

        if let Some(alias) = &self.alias {
            field = field.alias(alias);
        }
        if let Some(description) = &self.description {
            field = field.description(description);
        }

        if let Some(default) = &self.default {
            field = field.default_value(Value::from(default.clone()));
        } else if admits_absent {
            field = field.optional();
        }
        match self.required {
            Some(true) => field = field.required(),
            Some(false) => field = field.optional(),
            None => {}
        }

        let bounds = [
            (&self.gt, "gt"),
            (&self.ge, "ge"),
            (&self.lt, "lt"),
            (&self.le, "le"),
        ];
        for (number, kind) in bounds {
            let Some(number) = number else { continue };
            let bound = bound_from(number)
                .ok_or_else(|| invalid(owner, format!("field '{}': {} is not a number", self.name, kind)))?;
            field = match kind {
                "gt" => field.gt(bound),
                "ge" => field.ge(bound),
                "lt" => field.lt(bound),
                _ => field.le(bound),
            };
        }
        if let Some(n) = self.min_length {
            field = field.min_length(n);
        }
        if let Some(n) = self.max_length {
            field = field.max_length(n);
        }
        if let Some(pattern) = &self.pattern {
            field = field.pattern(pattern)?;
        }
        if let Some(values) = &self.one_of {
            field = field.one_of(values.iter().cloned().map(Value::from));
        }
        Ok(field)
    }
}

fn bound_from(number: &serde_json::Number) -> Option<Bound> {
    match number.as_i64() {
        Some(i) => Some(Bound::Int(i)),
        None => number.as_f64().map(Bound::Float),
    }
}

fn references_model(field: &FieldSchema) -> bool {
    let mut refs = Vec::new();
    field.field_type.referenced_models(&mut refs);
    !refs.is_empty()
}

fn invalid(owner: &str, reason: impl Into<String>) -> DefinitionError {
    DefinitionError::Invalid {
        owner: owner.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_validation::FieldType;

    #[test]
    fn test_presence_rules() {
        let def: FieldDef = serde_yaml::from_str("{ name: q, type: str | None }").unwrap();
        let field = def.to_field("read_items").unwrap();
        assert!(!field.required);
        assert_eq!(field.default, None);

        let def: FieldDef = serde_yaml::from_str("{ name: skip, type: int, default: 0 }").unwrap();
        let field = def.to_field("read_items").unwrap();
        assert!(!field.required);
        assert_eq!(field.default, Some(Value::Int(0)));

        let def: FieldDef = serde_yaml::from_str("{ name: tax, type: float | None, default: null }").unwrap();
        assert_eq!(def.default, Some(serde_json::Value::Null));

        let def: FieldDef =
            serde_yaml::from_str("{ name: q, type: str | None, required: true }").unwrap();
        assert!(def.to_field("read_items").unwrap().required);
    }

    #[test]
    fn test_constraints_from_definition() {
        let def: FieldDef = serde_yaml::from_str(
            "{ name: size, type: float, gt: 0, lt: 10.5, enum: [1, 2.5] }",
        )
        .unwrap();
        let field = def.to_field("Item").unwrap();
        let kinds: Vec<&str> = field.constraints.iter().map(|c| c.kind_name()).collect();
        assert_eq!(kinds, vec!["gt", "lt", "enum"]);
    }

    #[test]
    fn test_bad_pattern_is_schema_error() {
        let def: FieldDef = serde_yaml::from_str("{ name: q, type: str, pattern: '(' }").unwrap();
        assert!(matches!(
            def.to_field("read_items"),
            Err(DefinitionError::Schema(SchemaError::InvalidPattern { .. }))
        ));
    }

    #[test]
    fn test_source_inference() {
        let yaml = r#"
method: PUT
path: /items/{item_id}
params:
  - { name: item_id, type: int }
  - { name: q, type: str | None }
  - { name: item, type: Item }
  - { name: importance, type: int, in: body, gt: 0 }
"#;
        let def: EndpointDef = serde_yaml::from_str(yaml).unwrap();
        let endpoint = def.to_schema().unwrap();
        let sources: Vec<Source> = endpoint.params.iter().map(|p| p.field.source).collect();
        assert_eq!(
            sources,
            vec![Source::Path, Source::Query, Source::Body, Source::Body]
        );
        assert_eq!(endpoint.params[2].field.field_type, FieldType::model("Item"));
    }

    #[test]
    fn test_model_field_rejects_param_keys() {
        let yaml = "{ name: Item, fields: [ { name: name, type: str, in: query } ] }";
        let def: ModelDef = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(def.to_schema(), Err(DefinitionError::Invalid { .. })));
    }

    #[test]
    fn test_unknown_extra_policy() {
        let yaml = "{ config: { extra: strict } }";
        let defs = Definitions::from_yaml_str(yaml).unwrap();
        assert!(matches!(defs.build(), Err(DefinitionError::Invalid { .. })));
    }

    #[test]
    fn test_json_definitions() {
        let json = r#"{
            "models": [{"name": "Image", "fields": [
                {"name": "url", "type": "HttpUrl"},
                {"name": "name", "type": "str"}
            ]}],
            "endpoints": [{"method": "POST", "path": "/images/multiple/", "params": [
                {"name": "images", "type": "list[Image]"}
            ]}]
        }"#;
        let registry = Definitions::from_json_str(json).unwrap().build().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.schemas().contains("Image"));
    }
}

//! Field and model schemas, and the registry that holds them
//!
//! Schemas are declared once at startup with builder methods, registered in a
//! [`SchemaRegistryBuilder`], and frozen into an immutable [`SchemaRegistry`].
//! Every structural check happens in [`SchemaRegistryBuilder::build`]; a
//! registry that exists is well-formed, so validation never has to report a
//! schema problem.
//!
//! # Example
//!
//! ```
//! use intake_validation::{FieldSchema, FieldType, ModelSchema, SchemaRegistryBuilder, Value};
//!
//! let mut builder = SchemaRegistryBuilder::new();
//! builder
//!     .register(
//!         ModelSchema::new("Image")
//!             .field(FieldSchema::new("url", FieldType::Url))
//!             .field(FieldSchema::new("name", FieldType::Str)),
//!     )
//!     .unwrap();
//! builder
//!     .register(
//!         ModelSchema::new("Item")
//!             .field(FieldSchema::new("name", FieldType::Str))
//!             .field(FieldSchema::new("price", FieldType::Float).gt(0))
//!             .field(
//!                 FieldSchema::new("tags", FieldType::set(FieldType::Str))
//!                     .default_value(Value::List(vec![])),
//!             )
//!             .field(
//!                 FieldSchema::new("image", FieldType::optional(FieldType::model("Image")))
//!                     .optional(),
//!             ),
//!     )
//!     .unwrap();
//! let registry = builder.build().unwrap();
//! assert_eq!(registry.len(), 2);
//! ```

use crate::config::ValidationConfig;
use crate::constraints::Constraint;
use crate::errors::SchemaError;
use crate::types::{FieldType, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Source
// ============================================================================

/// Where a parameter's raw value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Source {
    /// Path segment (e.g. `/items/{item_id}`)
    Path,
    /// Query string (e.g. `?skip=0&limit=10`)
    Query,
    /// Request body
    #[default]
    Body,
}

impl Source {
    /// Get string representation for error locations
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(Self::Path),
            "query" => Ok(Self::Query),
            "body" => Ok(Self::Body),
            other => Err(format!(
                "Unknown parameter source: {}. Use 'path', 'query' or 'body'.",
                other
            )),
        }
    }
}

// ============================================================================
// Field Schema
// ============================================================================

/// One named value: its type, presence rules, source and constraints
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Field name
    pub name: String,
    /// Input key tried before `name`
    pub alias: Option<String>,
    /// Where a top-level parameter is read from; nested fields inherit their parent's
    pub source: Source,
    /// Declared type
    pub field_type: FieldType,
    /// Whether absence is an error
    pub required: bool,
    /// Substituted (not re-validated) when the field is absent
    pub default: Option<Value>,
    /// Checked in declaration order after coercion
    pub constraints: Vec<Constraint>,
    /// Optional description for documentation
    pub description: Option<String>,
}

impl FieldSchema {
    /// Create a new required field read from the body
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: None,
            source: Source::Body,
            field_type,
            required: true,
            default: None,
            constraints: Vec::new(),
            description: None,
        }
    }

    /// Shorthand for a path parameter
    pub fn path(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type).source(Source::Path)
    }

    /// Shorthand for a query parameter
    pub fn query(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type).source(Source::Query)
    }

    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Mark as not required; the type must admit None unless a default is set
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set default value (implies not required)
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn constraint(mut self, mut constraint: Constraint) -> Self {
        constraint.coerce_literals(&self.field_type);
        self.constraints.push(constraint);
        self
    }

    pub fn gt(self, bound: impl Into<crate::constraints::Bound>) -> Self {
        self.constraint(Constraint::gt(bound))
    }

    pub fn ge(self, bound: impl Into<crate::constraints::Bound>) -> Self {
        self.constraint(Constraint::ge(bound))
    }

    pub fn lt(self, bound: impl Into<crate::constraints::Bound>) -> Self {
        self.constraint(Constraint::lt(bound))
    }

    pub fn le(self, bound: impl Into<crate::constraints::Bound>) -> Self {
        self.constraint(Constraint::le(bound))
    }

    pub fn min_length(self, n: usize) -> Self {
        self.constraint(Constraint::min_length(n))
    }

    pub fn max_length(self, n: usize) -> Self {
        self.constraint(Constraint::max_length(n))
    }

    /// Add a full-match pattern; fails if the pattern does not compile
    pub fn pattern(self, source: &str) -> Result<Self, SchemaError> {
        Ok(self.constraint(Constraint::pattern(source)?))
    }

    pub fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraint(Constraint::one_of(values))
    }

    /// Coerce `enum` literals into the field type; constraints pushed
    /// directly onto `constraints` skip the builder
    pub fn coerce_literals(&mut self) {
        for constraint in &mut self.constraints {
            constraint.coerce_literals(&self.field_type);
        }
    }

    /// Key that input is looked up by first (alias, else name)
    pub fn input_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Keys tried when resolving raw input: alias first, then name
    pub fn lookup_keys(&self) -> impl Iterator<Item = &str> {
        self.alias.as_deref().into_iter().chain(std::iter::once(self.name.as_str()))
    }

    /// Value used when the field is absent from input and not required
    pub fn absent_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// Check the field in isolation (`owner` names the model or endpoint)
    pub fn check(&self, owner: &str) -> Result<(), SchemaError> {
        if self.required && self.default.is_some() {
            return Err(SchemaError::RequiredWithDefault {
                owner: owner.to_string(),
                field: self.name.clone(),
            });
        }
        if !self.required && self.default.is_none() && !self.field_type.admits_absent() {
            return Err(SchemaError::MissingDefault {
                owner: owner.to_string(),
                field: self.name.clone(),
                ty: self.field_type.to_string(),
            });
        }
        for constraint in &self.constraints {
            if !constraint.applies_to(&self.field_type) {
                return Err(SchemaError::IncompatibleConstraint {
                    owner: owner.to_string(),
                    field: self.name.clone(),
                    constraint: constraint.kind_name().to_string(),
                    ty: self.field_type.to_string(),
                });
            }
            if let Some(literal) = constraint.unconvertible_literal(&self.field_type) {
                return Err(SchemaError::InvalidEnumValue {
                    owner: owner.to_string(),
                    field: self.name.clone(),
                    value: literal.to_string(),
                    ty: self.field_type.to_string(),
                });
            }
        }
        check_map_keys(&self.field_type, owner, &self.name)
    }
}

fn check_map_keys(ty: &FieldType, owner: &str, field: &str) -> Result<(), SchemaError> {
    match ty {
        FieldType::Map { key, value } => {
            if !matches!(
                key.as_ref(),
                FieldType::Str | FieldType::Int | FieldType::Float | FieldType::Bool
            ) {
                return Err(SchemaError::InvalidMapKey {
                    owner: owner.to_string(),
                    field: field.to_string(),
                    ty: key.to_string(),
                });
            }
            check_map_keys(value, owner, field)
        }
        FieldType::Optional(inner) | FieldType::List(inner) | FieldType::Set(inner) => {
            check_map_keys(inner, owner, field)
        }
        _ => Ok(()),
    }
}

// ============================================================================
// Model Schema
// ============================================================================

/// Named, ordered collection of fields
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    /// Overrides the registry-wide config for this model
    pub config: Option<ValidationConfig>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            config: None,
        }
    }

    /// Add a field
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check fields and name uniqueness (aliases included)
    pub fn check(&self) -> Result<(), SchemaError> {
        check_fields(&self.name, &self.fields)
    }

    /// Names of models this model nests directly
    pub fn referenced_models(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.field_type.referenced_models(&mut out);
        }
        out
    }
}

/// Check a sequence of fields declared together under `owner`
pub fn check_fields(owner: &str, fields: &[FieldSchema]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for field in fields {
        field.check(owner)?;
        let mut keys: Vec<&str> = field.lookup_keys().collect();
        keys.dedup();
        for key in keys {
            if !seen.insert(key) {
                return Err(SchemaError::DuplicateField {
                    owner: owner.to_string(),
                    field: key.to_string(),
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Registry
// ============================================================================

/// Collects model schemas before they are checked and frozen
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    models: Vec<ModelSchema>,
    config: ValidationConfig,
}

impl SchemaRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry-wide validation config
    pub fn config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a model
    pub fn register(&mut self, mut model: ModelSchema) -> Result<(), SchemaError> {
        if self.models.iter().any(|m| m.name == model.name) {
            return Err(SchemaError::DuplicateModel(model.name));
        }
        for field in &mut model.fields {
            field.coerce_literals();
        }
        self.models.push(model);
        Ok(())
    }

    /// Check every model, resolve references and reject cyclic nesting
    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        for model in &self.models {
            model.check()?;
        }

        let known: HashSet<&str> = self.models.iter().map(|m| m.name.as_str()).collect();
        for model in &self.models {
            for field in &model.fields {
                let mut refs = Vec::new();
                field.field_type.referenced_models(&mut refs);
                if let Some(missing) = refs.into_iter().find(|r| !known.contains(r)) {
                    return Err(SchemaError::UnknownModel {
                        owner: model.name.clone(),
                        field: field.name.clone(),
                        model: missing.to_string(),
                    });
                }
            }
        }

        let order = self.nesting_order()?;
        debug!(
            models = self.models.len(),
            order = ?order,
            "schema registry compiled"
        );

        let names = self.models.iter().map(|m| m.name.clone()).collect();
        let models = self
            .models
            .into_iter()
            .map(|m| (m.name.clone(), Arc::new(m)))
            .collect();
        Ok(SchemaRegistry {
            models,
            names,
            order,
            config: self.config,
        })
    }

    /// Topological order, leaves first (Kahn's algorithm); anything left over is on a cycle
    fn nesting_order(&self) -> Result<Vec<String>, SchemaError> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for model in &self.models {
            in_degree.entry(model.name.as_str()).or_insert(0);
            let mut nested = model.referenced_models();
            nested.sort_unstable();
            nested.dedup();
            for dep in nested {
                dependents.entry(dep).or_default().push(model.name.as_str());
                *in_degree.entry(model.name.as_str()).or_insert(0) += 1;
            }
        }

        // Registration order among ready models keeps the result deterministic
        let mut queue: VecDeque<&str> = self
            .models
            .iter()
            .map(|m| m.name.as_str())
            .filter(|name| in_degree.get(name) == Some(&0))
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(self.models.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());
            if let Some(next) = dependents.get(name) {
                for &dependent in next {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if order.len() != self.models.len() {
            let mut remaining: Vec<String> = self
                .models
                .iter()
                .map(|m| m.name.clone())
                .filter(|name| !order.contains(name))
                .collect();
            remaining.sort();
            return Err(SchemaError::CyclicNesting(remaining));
        }
        Ok(order)
    }
}

/// Immutable set of well-formed model schemas
///
/// Shared read-only across threads (wrap in `Arc`); validation needs no locks.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    models: HashMap<String, Arc<ModelSchema>>,
    names: Vec<String>,
    order: Vec<String>,
    config: ValidationConfig,
}

impl SchemaRegistry {
    /// Empty registry, for binding scalar-only parameters
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
            names: Vec::new(),
            order: Vec::new(),
            config: ValidationConfig::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSchema> {
        self.models.get(name).map(|m| m.as_ref())
    }

    /// Shared handle to a model
    pub fn get_shared(&self, name: &str) -> Option<Arc<ModelSchema>> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Model names in registration order
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Model names with every model after the models it nests
    pub fn nesting_order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registry-wide config
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Effective config for a model
    pub fn config_for<'a>(&'a self, model: &'a ModelSchema) -> &'a ValidationConfig {
        model.config.as_ref().unwrap_or(&self.config)
    }

    /// Check fields declared outside any model (e.g. endpoint parameters)
    /// against this registry
    pub fn check_fields(&self, owner: &str, fields: &[FieldSchema]) -> Result<(), SchemaError> {
        check_fields(owner, fields)?;
        for field in fields {
            let mut refs = Vec::new();
            field.field_type.referenced_models(&mut refs);
            if let Some(missing) = refs.into_iter().find(|r| !self.contains(r)) {
                return Err(SchemaError::UnknownModel {
                    owner: owner.to_string(),
                    field: field.name.clone(),
                    model: missing.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ModelSchema {
        ModelSchema::new("Image")
            .field(FieldSchema::new("url", FieldType::Url))
            .field(FieldSchema::new("name", FieldType::Str))
    }

    #[test]
    fn test_source_round_trip() {
        for source in [Source::Path, Source::Query, Source::Body] {
            assert_eq!(source.as_str().parse::<Source>(), Ok(source));
        }
        assert!("header".parse::<Source>().is_err());
    }

    #[test]
    fn test_field_builder_defaults() {
        let field = FieldSchema::new("q", FieldType::optional(FieldType::Str));
        assert!(field.required);
        assert_eq!(field.source, Source::Body);

        let field = FieldSchema::query("skip", FieldType::Int).default_value(0);
        assert!(!field.required);
        assert_eq!(field.default, Some(Value::Int(0)));
        assert_eq!(field.absent_value(), Value::Int(0));
    }

    #[test]
    fn test_lookup_keys_alias_first() {
        let field = FieldSchema::new("item_query", FieldType::Str).alias("item-query");
        let keys: Vec<&str> = field.lookup_keys().collect();
        assert_eq!(keys, vec!["item-query", "item_query"]);
        assert_eq!(field.input_name(), "item-query");
    }

    #[test]
    fn test_optional_without_default_needs_optional_type() {
        let err = FieldSchema::new("limit", FieldType::Int)
            .optional()
            .check("read_items")
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingDefault { .. }));

        assert!(FieldSchema::new("limit", FieldType::optional(FieldType::Int))
            .optional()
            .check("read_items")
            .is_ok());
    }

    #[test]
    fn test_required_with_default_is_rejected() {
        let err = FieldSchema::new("skip", FieldType::Int)
            .default_value(0)
            .required()
            .check("read_items")
            .unwrap_err();
        assert!(matches!(err, SchemaError::RequiredWithDefault { .. }));
    }

    #[test]
    fn test_incompatible_constraint() {
        let err = FieldSchema::new("name", FieldType::Str)
            .ge(0)
            .check("Item")
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::IncompatibleConstraint {
                owner: "Item".to_string(),
                field: "name".to_string(),
                constraint: "ge".to_string(),
                ty: "str".to_string(),
            }
        );
    }

    #[test]
    fn test_enum_literal_must_fit_field_type() {
        let err = FieldSchema::new("n", FieldType::Int)
            .one_of(["a", "b"])
            .check("read_item")
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidEnumValue {
                owner: "read_item".to_string(),
                field: "n".to_string(),
                value: "\"a\"".to_string(),
                ty: "int".to_string(),
            }
        );

        let mut builder = SchemaRegistryBuilder::new();
        builder
            .register(ModelSchema::new("Shirt").field(FieldSchema::new("size", FieldType::Int).one_of(["S"])))
            .unwrap();
        assert!(matches!(builder.build(), Err(SchemaError::InvalidEnumValue { .. })));

        assert!(FieldSchema::new("n", FieldType::Int).one_of(["1", "2"]).check("read_item").is_ok());
    }

    #[test]
    fn test_register_coerces_enum_literals() {
        let mut field = FieldSchema::new("size", FieldType::Float);
        field.constraints.push(Constraint::one_of([1i64, 2]));
        let mut builder = SchemaRegistryBuilder::new();
        builder.register(ModelSchema::new("Shirt").field(field)).unwrap();
        let registry = builder.build().unwrap();

        let size = &registry.get("Shirt").unwrap().fields[0];
        match &size.constraints[0] {
            Constraint::Enum(allowed) => assert_eq!(allowed, &vec![Value::Float(1.0), Value::Float(2.0)]),
            other => panic!("unexpected constraint {:?}", other),
        }
    }

    #[test]
    fn test_non_scalar_map_key() {
        let err = FieldSchema::new("weights", FieldType::map(FieldType::list(FieldType::Int), FieldType::Float))
            .check("create_index_weights")
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidMapKey { .. }));
    }

    #[test]
    fn test_duplicate_field_and_alias_clash() {
        let model = ModelSchema::new("User")
            .field(FieldSchema::new("username", FieldType::Str))
            .field(FieldSchema::new("full_name", FieldType::Str).alias("username"));
        assert!(matches!(model.check(), Err(SchemaError::DuplicateField { .. })));
    }

    #[test]
    fn test_duplicate_model() {
        let mut builder = SchemaRegistryBuilder::new();
        builder.register(image()).unwrap();
        assert_eq!(
            builder.register(image()),
            Err(SchemaError::DuplicateModel("Image".to_string()))
        );
    }

    #[test]
    fn test_unknown_model_reference() {
        let mut builder = SchemaRegistryBuilder::new();
        builder
            .register(ModelSchema::new("Item").field(FieldSchema::new("image", FieldType::model("Image"))))
            .unwrap();
        assert!(matches!(builder.build(), Err(SchemaError::UnknownModel { .. })));
    }

    #[test]
    fn test_direct_cycle_detected() {
        let mut builder = SchemaRegistryBuilder::new();
        builder
            .register(
                ModelSchema::new("Node").field(
                    FieldSchema::new("child", FieldType::optional(FieldType::model("Node"))).optional(),
                ),
            )
            .unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            SchemaError::CyclicNesting(vec!["Node".to_string()])
        );
    }

    #[test]
    fn test_transitive_cycle_detected() {
        let mut builder = SchemaRegistryBuilder::new();
        builder.register(image()).unwrap();
        builder
            .register(ModelSchema::new("A").field(FieldSchema::new("b", FieldType::list(FieldType::model("B")))))
            .unwrap();
        builder
            .register(ModelSchema::new("B").field(FieldSchema::new("c", FieldType::model("C"))))
            .unwrap();
        builder
            .register(
                ModelSchema::new("C")
                    .field(FieldSchema::new("a", FieldType::map(FieldType::Str, FieldType::model("A"))))
                    .field(FieldSchema::new("image", FieldType::model("Image"))),
            )
            .unwrap();
        assert_eq!(
            builder.build().unwrap_err(),
            SchemaError::CyclicNesting(vec!["A".to_string(), "B".to_string(), "C".to_string()])
        );
    }

    #[test]
    fn test_nesting_order_leaves_first() {
        let mut builder = SchemaRegistryBuilder::new();
        builder
            .register(ModelSchema::new("Item").field(FieldSchema::new("image", FieldType::model("Image"))))
            .unwrap();
        builder.register(image()).unwrap();
        let registry = builder.build().unwrap();
        assert_eq!(registry.nesting_order(), &["Image".to_string(), "Item".to_string()]);
        let names: Vec<&str> = registry.model_names().collect();
        assert_eq!(names, vec!["Item", "Image"]);
    }

    #[test]
    fn test_config_override() {
        let mut builder = SchemaRegistryBuilder::new().config(ValidationConfig::new().forbid_extra());
        builder.register(image()).unwrap();
        builder
            .register(ModelSchema::new("Loose").with_config(ValidationConfig::new().allow_extra()))
            .unwrap();
        let registry = builder.build().unwrap();

        let image = registry.get("Image").unwrap();
        let loose = registry.get("Loose").unwrap();
        assert_eq!(registry.config_for(image).extra, crate::config::ExtraFields::Forbid);
        assert_eq!(registry.config_for(loose).extra, crate::config::ExtraFields::Allow);
    }

    #[test]
    fn test_check_fields_against_registry() {
        let registry = SchemaRegistry::empty();
        let params = vec![FieldSchema::new("item", FieldType::model("Item"))];
        assert!(matches!(
            registry.check_fields("update_item", &params),
            Err(SchemaError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemaRegistry>();
    }
}

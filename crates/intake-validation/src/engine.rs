//! Validation engine
//!
//! Walks a raw value against a schema, coercing as it goes. Every field is
//! visited even after a failure so that one pass reports every problem; within
//! a single field the first failing step (coercion, then constraints in
//! declaration order) is the only one reported.

use crate::coerce::{coerce_scalar, key_to_string, mismatch_message};
use crate::config::{ExtraFields, ValidationConfig};
use crate::errors::{ErrorKind, ValidationContext, ValidationErrors, ValidationResult};
use crate::instance::ModelInstance;
use crate::schema::{FieldSchema, ModelSchema, SchemaRegistry};
use crate::types::{FieldType, Value};
use std::collections::HashSet;
use tracing::trace;

/// Validate a raw value against a model
///
/// # Example
///
/// ```
/// use intake_validation::{validate, FieldSchema, FieldType, ModelSchema, SchemaRegistryBuilder, Value};
///
/// let mut builder = SchemaRegistryBuilder::new();
/// builder
///     .register(
///         ModelSchema::new("Item")
///             .field(FieldSchema::new("name", FieldType::Str))
///             .field(FieldSchema::new("price", FieldType::Float).gt(0)),
///     )
///     .unwrap();
/// let registry = builder.build().unwrap();
/// let item = registry.get("Item").unwrap();
///
/// let raw = Value::Object(vec![
///     ("name".to_string(), Value::from("Foo")),
///     ("price".to_string(), Value::from("35.4")),
/// ]);
/// let instance = validate(&registry, item, &raw).unwrap();
/// assert_eq!(instance.get_float("price"), Some(35.4));
/// ```
pub fn validate(
    registry: &SchemaRegistry,
    model: &ModelSchema,
    raw: &Value,
) -> ValidationResult<ModelInstance> {
    let mut ctx = ValidationContext::new();
    validate_with_context(registry, model, raw, &mut ctx)
}

/// Validate a raw value against a model, reporting errors below `ctx`
pub fn validate_with_context(
    registry: &SchemaRegistry,
    model: &ModelSchema,
    raw: &Value,
    ctx: &mut ValidationContext,
) -> ValidationResult<ModelInstance> {
    let mut errors = ValidationErrors::new();
    let fields = validate_model(registry, model, raw, ctx, &mut errors);
    trace!(model = %model.name, errors = errors.len(), "validated model");
    match fields {
        Some(fields) if errors.is_empty() => Ok(ModelInstance::new(model.name.clone(), fields)),
        _ => Err(errors),
    }
}

impl SchemaRegistry {
    /// Validate a raw value against the model registered as `model`
    pub fn validate(&self, model: &str, raw: &Value) -> ValidationResult<ModelInstance> {
        match self.get(model) {
            Some(schema) => validate(self, schema, raw),
            None => {
                let ctx = ValidationContext::new();
                let mut errors = ValidationErrors::new();
                errors.add(ctx.error(
                    ErrorKind::UnknownNestedShape,
                    format!("Unknown model '{}'", model),
                ));
                Err(errors)
            }
        }
    }
}

/// Validate the fields of a model; `None` if anything failed
fn validate_model(
    registry: &SchemaRegistry,
    model: &ModelSchema,
    raw: &Value,
    ctx: &mut ValidationContext,
    errors: &mut ValidationErrors,
) -> Option<Vec<(String, Value)>> {
    let pairs = match raw {
        Value::Object(pairs) => pairs,
        other => {
            errors.add(ctx.error(
                ErrorKind::UnknownNestedShape,
                format!("Expected object for {}, got {} {}", model.name, other.type_name(), other),
            ));
            return None;
        }
    };

    let config = registry.config_for(model);
    let before = errors.len();
    let mut out = Vec::with_capacity(model.fields.len());

    for field in &model.fields {
        let input = field.lookup_keys().find_map(|key| raw.get(key));
        ctx.push_key(field.input_name());
        if let Some(value) = validate_field(registry, field, input, config, ctx, errors) {
            out.push((field.name.clone(), value));
        }
        ctx.pop();
    }

    if config.extra != ExtraFields::Ignore {
        for (key, value) in pairs {
            let declared = model
                .fields
                .iter()
                .any(|f| f.lookup_keys().any(|k| k == key));
            if declared {
                continue;
            }
            match config.extra {
                ExtraFields::Allow => out.push((key.clone(), value.clone())),
                ExtraFields::Forbid => {
                    ctx.push_key(key);
                    errors.add(ctx.error(ErrorKind::ExtraForbidden, "Extra inputs are not permitted"));
                    ctx.pop();
                }
                ExtraFields::Ignore => {}
            }
        }
    }

    (errors.len() == before).then_some(out)
}

/// Resolve one field from its raw input (`None` when absent)
///
/// Errors are appended to `errors` at the current position of `ctx`, which
/// the caller has already pointed at the field. Returns the coerced value,
/// the default when absent, or `None` when the field failed.
pub fn validate_field(
    registry: &SchemaRegistry,
    field: &FieldSchema,
    raw: Option<&Value>,
    config: &ValidationConfig,
    ctx: &mut ValidationContext,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    let raw = match raw {
        Some(raw) => raw,
        None if field.required => {
            errors.add(ctx.error(ErrorKind::MissingField, "Field required"));
            return None;
        }
        // Defaults are trusted as declared
        None => return Some(field.absent_value()),
    };

    let mut value = coerce_value(registry, &field.field_type, raw, config, ctx, errors)?;
    if value.is_null() && field.field_type.admits_absent() {
        return Some(value);
    }

    for constraint in &field.constraints {
        match constraint.apply(value) {
            Ok(next) => value = next,
            Err(violation) => {
                errors.add(ctx.error(violation.kind, violation.message));
                return None;
            }
        }
    }
    Some(value)
}

/// Coerce a raw value into `ty`, recursing into collections and models
pub fn coerce_value(
    registry: &SchemaRegistry,
    ty: &FieldType,
    raw: &Value,
    config: &ValidationConfig,
    ctx: &mut ValidationContext,
    errors: &mut ValidationErrors,
) -> Option<Value> {
    match ty {
        FieldType::Any => Some(raw.clone()),

        FieldType::Optional(_) if raw.is_null() => Some(Value::Null),
        FieldType::Optional(inner) => coerce_value(registry, inner, raw, config, ctx, errors),

        FieldType::List(inner) => {
            coerce_items(registry, ty, inner, raw, config, ctx, errors).map(Value::List)
        }

        FieldType::Set(inner) => {
            let items = coerce_items(registry, ty, inner, raw, config, ctx, errors)?;
            Some(Value::List(dedupe(items)))
        }

        FieldType::Map { key, value } => {
            let pairs = match raw {
                Value::Object(pairs) => pairs,
                other => {
                    errors.add(ctx.error(ErrorKind::TypeMismatch, mismatch_message(ty, other)));
                    return None;
                }
            };
            let before = errors.len();
            let mut out: Vec<(String, Value)> = Vec::with_capacity(pairs.len());
            for (raw_key, raw_value) in pairs {
                ctx.push_key(raw_key);
                let coerced_key = match coerce_scalar(&Value::String(raw_key.clone()), key, config) {
                    Ok(k) => Some(key_to_string(&k)),
                    Err(message) => {
                        errors.add(ctx.error(ErrorKind::TypeMismatch, message));
                        None
                    }
                };
                let coerced_value = coerce_value(registry, value, raw_value, config, ctx, errors);
                ctx.pop();

                if let (Some(k), Some(v)) = (coerced_key, coerced_value) {
                    // "01" and "1" collapse to one int key; the later entry wins
                    match out.iter_mut().find(|(existing, _)| *existing == k) {
                        Some(slot) => slot.1 = v,
                        None => out.push((k, v)),
                    }
                }
            }
            (errors.len() == before).then_some(Value::Object(out))
        }

        FieldType::Model(name) => {
            let Some(model) = registry.get(name) else {
                errors.add(ctx.error(
                    ErrorKind::UnknownNestedShape,
                    format!("Unknown model '{}'", name),
                ));
                return None;
            };
            validate_model(registry, model, raw, ctx, errors).map(Value::Object)
        }

        FieldType::Str | FieldType::Int | FieldType::Float | FieldType::Bool | FieldType::Url => {
            match coerce_scalar(raw, ty, config) {
                Ok(value) => Some(value),
                Err(message) => {
                    errors.add(ctx.error(ErrorKind::TypeMismatch, message));
                    None
                }
            }
        }
    }
}

fn coerce_items(
    registry: &SchemaRegistry,
    ty: &FieldType,
    inner: &FieldType,
    raw: &Value,
    config: &ValidationConfig,
    ctx: &mut ValidationContext,
    errors: &mut ValidationErrors,
) -> Option<Vec<Value>> {
    let Some(items) = raw.as_list() else {
        errors.add(ctx.error(ErrorKind::TypeMismatch, mismatch_message(ty, raw)));
        return None;
    };
    let before = errors.len();
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        ctx.push_index(i);
        if let Some(value) = coerce_value(registry, inner, item, config, ctx, errors) {
            out.push(value);
        }
        ctx.pop();
    }
    (errors.len() == before).then_some(out)
}

/// Drop repeated items, keeping the first occurrence of each
///
/// Items are keyed by their `Debug` rendering, which is unambiguous across
/// variants (`Int(1)` and `Float(1.0)` stay distinct).
fn dedupe(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(format!("{:?}", item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PathSegment;
    use crate::schema::SchemaRegistryBuilder;

    fn obj(pairs: Vec<(&str, Value)>) -> Value {
        Value::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn registry(models: Vec<ModelSchema>) -> SchemaRegistry {
        let mut builder = SchemaRegistryBuilder::new();
        for model in models {
            builder.register(model).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_missing_and_default() {
        let reg = registry(vec![ModelSchema::new("Q")
            .field(FieldSchema::new("q", FieldType::Str))
            .field(FieldSchema::new("skip", FieldType::Int).default_value(0))]);

        let err = reg.validate("Q", &obj(vec![])).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.errors[0].kind, ErrorKind::MissingField);
        assert_eq!(err.errors[0].dotted_path(), "q");

        let ok = reg.validate("Q", &obj(vec![("q", Value::from("x"))])).unwrap();
        assert_eq!(ok.get_int("skip"), Some(0));
    }

    #[test]
    fn test_default_is_not_revalidated() {
        let reg = registry(vec![ModelSchema::new("Q")
            .field(FieldSchema::new("limit", FieldType::Int).ge(1).default_value(0))]);
        let ok = reg.validate("Q", &obj(vec![])).unwrap();
        assert_eq!(ok.get_int("limit"), Some(0));
    }

    #[test]
    fn test_first_failure_wins_per_field() {
        let reg = registry(vec![ModelSchema::new("Q").field(
            FieldSchema::new("q", FieldType::Str)
                .min_length(3)
                .pattern("^fixedquery$")
                .unwrap(),
        )]);
        let err = reg.validate("Q", &obj(vec![("q", Value::from("ab"))])).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.errors[0].kind, ErrorKind::LengthViolation);
    }

    #[test]
    fn test_null_on_optional_skips_constraints() {
        let reg = registry(vec![ModelSchema::new("Q").field(
            FieldSchema::new("q", FieldType::optional(FieldType::Str))
                .min_length(3)
                .optional(),
        )]);
        let ok = reg.validate("Q", &obj(vec![("q", Value::Null)])).unwrap();
        assert_eq!(ok.get("q"), Some(&Value::Null));
    }

    #[test]
    fn test_list_element_error_path() {
        let reg = registry(vec![ModelSchema::new("Q")
            .field(FieldSchema::new("ids", FieldType::list(FieldType::Int)))]);
        let raw = obj(vec![("ids", Value::from(vec!["1", "x", "3"]))]);
        let err = reg.validate("Q", &raw).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(
            err.errors[0].path,
            vec![PathSegment::Key("ids".to_string()), PathSegment::Index(1)]
        );
    }

    #[test]
    fn test_set_dedupes_before_constraints() {
        let reg = registry(vec![ModelSchema::new("Q")
            .field(FieldSchema::new("tags", FieldType::set(FieldType::Str)).max_length(2))]);
        let ok = reg
            .validate("Q", &obj(vec![("tags", Value::from(vec!["a", "a", "b"]))]))
            .unwrap();
        assert_eq!(ok.get("tags"), Some(&Value::from(vec!["a", "b"])));
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let items = vec![
            Value::from("b"),
            Value::Int(1),
            Value::from("a"),
            Value::Float(1.0),
            Value::from("b"),
            Value::Int(1),
        ];
        assert_eq!(
            dedupe(items),
            vec![Value::from("b"), Value::Int(1), Value::from("a"), Value::Float(1.0)]
        );
    }

    #[test]
    fn test_map_keys_coerced() {
        let reg = registry(vec![ModelSchema::new("W").field(FieldSchema::new(
            "weights",
            FieldType::map(FieldType::Int, FieldType::Float),
        ))]);
        let raw = obj(vec![(
            "weights",
            obj(vec![("01", Value::Float(2.5)), ("2", Value::Int(3))]),
        )]);
        let ok = reg.validate("W", &raw).unwrap();
        assert_eq!(
            ok.get("weights"),
            Some(&obj(vec![("1", Value::Float(2.5)), ("2", Value::Float(3.0))]))
        );

        let bad = obj(vec![("weights", obj(vec![("foo", Value::Float(2.5))]))]);
        let err = reg.validate("W", &bad).unwrap_err();
        assert_eq!(err.errors[0].dotted_path(), "weights.foo");
        assert_eq!(err.errors[0].kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_nested_model_shape() {
        let reg = registry(vec![
            ModelSchema::new("Image").field(FieldSchema::new("url", FieldType::Url)),
            ModelSchema::new("Item").field(FieldSchema::new("image", FieldType::model("Image"))),
        ]);
        let err = reg
            .validate("Item", &obj(vec![("image", Value::from("http://x.com"))]))
            .unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::UnknownNestedShape);
        assert_eq!(err.errors[0].dotted_path(), "image");
    }

    #[test]
    fn test_extra_policies() {
        let model = ModelSchema::new("M").field(FieldSchema::new("a", FieldType::Int));
        let raw = obj(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);

        let reg = registry(vec![model.clone()]);
        assert_eq!(reg.validate("M", &raw).unwrap().fields().len(), 1);

        let reg = registry(vec![model.clone().with_config(ValidationConfig::new().allow_extra())]);
        assert_eq!(reg.validate("M", &raw).unwrap().get_int("b"), Some(2));

        let reg = registry(vec![model.with_config(ValidationConfig::new().forbid_extra())]);
        let err = reg.validate("M", &raw).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::ExtraForbidden);
        assert_eq!(err.errors[0].dotted_path(), "b");
    }

    #[test]
    fn test_alias_lookup_and_error_key() {
        let reg = registry(vec![ModelSchema::new("Q")
            .field(FieldSchema::new("item_query", FieldType::Int).alias("item-query"))]);

        let ok = reg.validate("Q", &obj(vec![("item-query", Value::from("5"))])).unwrap();
        assert_eq!(ok.get_int("item_query"), Some(5));

        let ok = reg.validate("Q", &obj(vec![("item_query", Value::from("6"))])).unwrap();
        assert_eq!(ok.get_int("item_query"), Some(6));

        let err = reg.validate("Q", &obj(vec![])).unwrap_err();
        assert_eq!(err.errors[0].dotted_path(), "item-query");
    }

    #[test]
    fn test_unknown_model_name() {
        let reg = SchemaRegistry::empty();
        let err = reg.validate("Nope", &obj(vec![])).unwrap_err();
        assert_eq!(err.errors[0].kind, ErrorKind::UnknownNestedShape);
    }

    #[test]
    fn test_validate_field_with_location() {
        let reg = SchemaRegistry::empty();
        let field = FieldSchema::path("item_id", FieldType::Int);
        let mut ctx = ValidationContext::with_location("path");
        ctx.push_key("item_id");
        let mut errors = ValidationErrors::new();
        let value = validate_field(
            &reg,
            &field,
            Some(&Value::from("foo")),
            reg.config(),
            &mut ctx,
            &mut errors,
        );
        assert!(value.is_none());
        assert_eq!(errors.errors[0].to_string(), "path.item_id: Expected int, got string \"foo\" [type_mismatch]");
    }
}

//! Constraint library
//!
//! Constraints run after coercion, in declaration order, against the coerced
//! value. They are pure: the only effect a constraint may have is a `custom`
//! validator returning a transformed value, which replaces the original for
//! every constraint after it.
//!
//! # Example
//!
//! ```
//! use intake_validation::constraints::Constraint;
//! use intake_validation::Value;
//!
//! let ge = Constraint::ge(0);
//! assert!(ge.apply(Value::Int(0)).is_ok());
//! assert!(ge.apply(Value::Int(-1)).is_err());
//! ```

use crate::coerce::coerce_scalar;
use crate::config::ValidationConfig;
use crate::errors::{ErrorKind, SchemaError};
use crate::types::{FieldType, Value};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Numeric Bounds
// ============================================================================

/// Numeric bound for `gt` / `ge` / `lt` / `le`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Int(i64),
    Float(f64),
}

impl Bound {
    /// Order `value` relative to this bound; `None` for non-numeric or NaN
    fn compare(&self, value: &Value) -> Option<Ordering> {
        match (value, self) {
            (Value::Int(a), Bound::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Bound::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Bound::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Bound::Float(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<i64> for Bound {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Bound {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Bound {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// A regular expression that must match the whole string
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source`, anchored at both ends
    pub fn new(source: &str) -> Result<Self, SchemaError> {
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            SchemaError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

// ============================================================================
// Custom Validators
// ============================================================================

/// Caller-supplied check run as a `custom` constraint
///
/// Returning `Ok` with a different value replaces the field value for all
/// later constraints and in the validated instance (e.g. normalisation).
pub trait CustomValidator: Send + Sync {
    /// Name used in error messages and debug output
    fn name(&self) -> &str;

    fn validate(&self, value: Value) -> Result<Value, String>;
}

impl fmt::Debug for dyn CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomValidator({})", self.name())
    }
}

/// Type alias for a shared custom validator
pub type BoxedCustomValidator = Arc<dyn CustomValidator>;

/// Custom validator from a closure
pub struct FnValidator<F>
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync,
{
    name: String,
    validate_fn: F,
}

impl<F> FnValidator<F>
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, validate_fn: F) -> Self {
        Self {
            name: name.into(),
            validate_fn,
        }
    }
}

impl<F> CustomValidator for FnValidator<F>
where
    F: Fn(Value) -> Result<Value, String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, value: Value) -> Result<Value, String> {
        (self.validate_fn)(value)
    }
}

// ============================================================================
// Constraint
// ============================================================================

/// Why a constraint rejected a value
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    pub kind: ErrorKind,
    pub message: String,
}

impl ConstraintViolation {
    fn new(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// A named, parameterized rule a coerced value must satisfy
#[derive(Debug, Clone)]
pub enum Constraint {
    Gt(Bound),
    Ge(Bound),
    Lt(Bound),
    Le(Bound),
    /// Unicode code points for strings, elements for collections
    MinLength(usize),
    MaxLength(usize),
    Pattern(Pattern),
    /// Allowed literal values, in declaration order
    Enum(Vec<Value>),
    Custom(BoxedCustomValidator),
}

impl Constraint {
    pub fn gt(bound: impl Into<Bound>) -> Self {
        Self::Gt(bound.into())
    }

    pub fn ge(bound: impl Into<Bound>) -> Self {
        Self::Ge(bound.into())
    }

    pub fn lt(bound: impl Into<Bound>) -> Self {
        Self::Lt(bound.into())
    }

    pub fn le(bound: impl Into<Bound>) -> Self {
        Self::Le(bound.into())
    }

    pub fn min_length(n: usize) -> Self {
        Self::MinLength(n)
    }

    pub fn max_length(n: usize) -> Self {
        Self::MaxLength(n)
    }

    pub fn pattern(source: &str) -> Result<Self, SchemaError> {
        Pattern::new(source).map(Self::Pattern)
    }

    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    pub fn custom(validator: impl CustomValidator + 'static) -> Self {
        Self::Custom(Arc::new(validator))
    }

    /// Shorthand for a closure-backed `custom` constraint
    pub fn custom_fn<F>(name: impl Into<String>, validate_fn: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::custom(FnValidator::new(name, validate_fn))
    }

    /// Kind tag as written in declarations
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Gt(_) => "gt",
            Self::Ge(_) => "ge",
            Self::Lt(_) => "lt",
            Self::Le(_) => "le",
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::Pattern(_) => "pattern",
            Self::Enum(_) => "enum",
            Self::Custom(_) => "custom",
        }
    }

    /// Whether this constraint is meaningful for values of `ty`
    pub fn applies_to(&self, ty: &FieldType) -> bool {
        if matches!(ty.non_optional(), FieldType::Any) {
            return true;
        }
        match self {
            Self::Gt(_) | Self::Ge(_) | Self::Lt(_) | Self::Le(_) => ty.is_numeric(),
            Self::MinLength(_) | Self::MaxLength(_) => ty.is_sized(),
            Self::Pattern(_) => ty.is_textual(),
            Self::Enum(_) => ty.is_scalar(),
            Self::Custom(_) => true,
        }
    }

    /// Coerce `enum` literals into the scalar type of `ty`, so that membership
    /// compares coerced values against coerced literals. Literals that do not
    /// convert are left as written; see [`Constraint::unconvertible_literal`].
    pub fn coerce_literals(&mut self, ty: &FieldType) {
        let target = ty.non_optional();
        if let Self::Enum(allowed) = self {
            if !target.is_scalar() {
                return;
            }
            let config = ValidationConfig::default();
            for literal in allowed.iter_mut() {
                if let Ok(coerced) = coerce_scalar(literal, target, &config) {
                    *literal = coerced;
                }
            }
        }
    }

    /// First `enum` literal that cannot be a value of `ty`
    pub fn unconvertible_literal(&self, ty: &FieldType) -> Option<&Value> {
        let target = ty.non_optional();
        match self {
            Self::Enum(allowed) if target.is_scalar() => {
                let config = ValidationConfig::default();
                allowed
                    .iter()
                    .find(|literal| coerce_scalar(literal, target, &config).is_err())
            }
            _ => None,
        }
    }

    /// Check a coerced value, returning it (possibly transformed) on success
    pub fn apply(&self, value: Value) -> Result<Value, ConstraintViolation> {
        match self {
            Self::Gt(bound) => check_bound(value, bound, ">", |o| o == Ordering::Greater),
            Self::Ge(bound) => check_bound(value, bound, ">=", |o| o != Ordering::Less),
            Self::Lt(bound) => check_bound(value, bound, "<", |o| o == Ordering::Less),
            Self::Le(bound) => check_bound(value, bound, "<=", |o| o != Ordering::Greater),
            Self::MinLength(min) => {
                let len = length_of(&value);
                if len < *min {
                    return Err(ConstraintViolation::new(
                        ErrorKind::LengthViolation,
                        format!(
                            "{} must have at least {} {} (got {})",
                            sized_noun(&value),
                            min,
                            unit_noun(&value),
                            len
                        ),
                    ));
                }
                Ok(value)
            }
            Self::MaxLength(max) => {
                let len = length_of(&value);
                if len > *max {
                    return Err(ConstraintViolation::new(
                        ErrorKind::LengthViolation,
                        format!(
                            "{} must have at most {} {} (got {})",
                            sized_noun(&value),
                            max,
                            unit_noun(&value),
                            len
                        ),
                    ));
                }
                Ok(value)
            }
            Self::Pattern(pattern) => match &value {
                Value::String(s) if pattern.is_full_match(s) => Ok(value),
                _ => Err(ConstraintViolation::new(
                    ErrorKind::PatternViolation,
                    format!("String does not match pattern: {}", pattern.as_str()),
                )),
            },
            Self::Enum(allowed) => {
                if allowed.iter().any(|literal| same_literal(literal, &value)) {
                    Ok(value)
                } else {
                    let formatted: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                    Err(ConstraintViolation::new(
                        ErrorKind::EnumViolation,
                        format!(
                            "Value must be one of: [{}] (got {})",
                            formatted.join(", "),
                            value
                        ),
                    ))
                }
            }
            Self::Custom(validator) => validator
                .validate(value)
                .map_err(|message| ConstraintViolation::new(ErrorKind::CustomViolation, message)),
        }
    }
}

fn check_bound(
    value: Value,
    bound: &Bound,
    op: &str,
    accept: impl Fn(Ordering) -> bool,
) -> Result<Value, ConstraintViolation> {
    match bound.compare(&value) {
        Some(ordering) if accept(ordering) => Ok(value),
        _ => Err(ConstraintViolation::new(
            ErrorKind::RangeViolation,
            format!("Value must be {} {} (got {})", op, bound, value),
        )),
    }
}

/// Literal equality; integers and floats compare by numeric value
fn same_literal(literal: &Value, value: &Value) -> bool {
    match (literal, value) {
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
        _ => literal == value,
    }
}

fn length_of(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Object(pairs) => pairs.len(),
        _ => 0,
    }
}

fn sized_noun(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "String",
        Value::Object(_) => "Mapping",
        _ => "Collection",
    }
}

fn unit_noun(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "characters",
        _ => "items",
    }
}

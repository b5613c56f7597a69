//! Core type system for validation
//!
//! This module defines the runtime [`Value`] shared by raw input and coerced
//! output, and the declared [`FieldType`] a raw value is coerced into.

use std::fmt;

// ============================================================================
// Value Enum - Runtime values (raw and coerced)
// ============================================================================

/// Runtime value that can be coerced and validated
///
/// Path and query input arrives as `String`s; request bodies arrive as
/// arbitrary trees. Coerced instances use the same representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (i64)
    Int(i64),
    /// Float value (f64)
    Float(f64),
    /// String value
    String(String),
    /// List/Array of values
    List(Vec<Value>),
    /// Object/Dictionary (ordered key-value pairs)
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Get human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a key in an object value (first match wins)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{:?}", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Object(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// FieldType - Declared types that raw values are coerced into
// ============================================================================

/// Declared type of a field
///
/// Model references are by name and resolved through a
/// [`SchemaRegistry`](crate::schema::SchemaRegistry), which is what makes
/// cycle detection at construction time possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// `str`
    Str,
    /// `int` (i64)
    Int,
    /// `float` (f64)
    Float,
    /// `bool`
    Bool,
    /// `HttpUrl`: a string that must be an http(s) URL
    Url,
    /// `Any`: passed through without coercion
    Any,
    /// `T | None`
    Optional(Box<FieldType>),
    /// `list[T]`
    List(Box<FieldType>),
    /// `set[T]`: de-duplicated by equality, first occurrence order kept
    Set(Box<FieldType>),
    /// `dict[K, V]`: keys are coerced from their string form into `K`
    Map {
        key: Box<FieldType>,
        value: Box<FieldType>,
    },
    /// A nested model, by registered name
    Model(String),
}

impl FieldType {
    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn set(inner: FieldType) -> Self {
        Self::Set(Box::new(inner))
    }

    pub fn map(key: FieldType, value: FieldType) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn model(name: impl Into<String>) -> Self {
        Self::Model(name.into())
    }

    /// Whether an explicit "absent" value (null) is a member of this type
    pub fn admits_absent(&self) -> bool {
        matches!(self, Self::Optional(_) | Self::Any)
    }

    /// The type with any outer `Optional` removed
    pub fn non_optional(&self) -> &FieldType {
        match self {
            Self::Optional(inner) => inner.non_optional(),
            other => other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.non_optional(), Self::Int | Self::Float)
    }

    /// Types whose coerced value has a length (strings and collections)
    pub fn is_sized(&self) -> bool {
        matches!(
            self.non_optional(),
            Self::Str | Self::Url | Self::List(_) | Self::Set(_) | Self::Map { .. }
        )
    }

    pub fn is_textual(&self) -> bool {
        matches!(self.non_optional(), Self::Str | Self::Url)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.non_optional(),
            Self::Str | Self::Int | Self::Float | Self::Bool | Self::Url
        )
    }

    /// Whether raw input for this type is a sequence (repeated query keys)
    pub fn is_sequence(&self) -> bool {
        matches!(self.non_optional(), Self::List(_) | Self::Set(_))
    }

    /// Collect the names of all models referenced anywhere in this type
    pub fn referenced_models<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Model(name) => out.push(name),
            Self::Optional(inner) | Self::List(inner) | Self::Set(inner) => {
                inner.referenced_models(out)
            }
            Self::Map { key, value } => {
                key.referenced_models(out);
                value.referenced_models(out);
            }
            _ => {}
        }
    }
}

impl fmt::Display for FieldType {
    /// Renders the annotation form accepted by [`parse_annotation`](crate::annotation::parse_annotation)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "str"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Url => write!(f, "HttpUrl"),
            Self::Any => write!(f, "Any"),
            Self::Optional(inner) => write!(f, "{} | None", inner),
            Self::List(inner) => write!(f, "list[{}]", inner),
            Self::Set(inner) => write!(f, "set[{}]", inner),
            Self::Map { key, value } => write!(f, "dict[{}, {}]", key, value),
            Self::Model(name) => write!(f, "{}", name),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

#[cfg(feature = "serde")]
impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                // u64 above i64::MAX and real numbers
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Into::into).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

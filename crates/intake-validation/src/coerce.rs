//! Scalar coercion
//!
//! Converts raw scalars into the declared scalar types. Path and query values
//! are always strings, so every scalar target accepts its textual form; body
//! values may already carry the right JSON type.
//!
//! Compound types (lists, sets, dicts, models) are handled by the engine, which
//! calls back into here per element.

use crate::config::ValidationConfig;
use crate::types::{FieldType, Value};
use once_cell::sync::Lazy;
use regex::Regex;

/// http(s) URL, as accepted for `HttpUrl` fields
static HTTP_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("HTTP URL regex is valid")
});

/// Coerce a raw scalar into `ty`
///
/// `ty` must be a scalar type (`str`, `int`, `float`, `bool`, `HttpUrl`);
/// anything else is reported as a mismatch. The error is the human message for
/// a `type_mismatch`, naming the attempted type and the raw value.
pub fn coerce_scalar(raw: &Value, ty: &FieldType, config: &ValidationConfig) -> Result<Value, String> {
    let coerced = match ty {
        FieldType::Str => coerce_str(raw, config).map(Value::String),
        FieldType::Url => coerce_url(raw, config).map(Value::String),
        FieldType::Int => coerce_int(raw).map(Value::Int),
        FieldType::Float => coerce_float(raw).map(Value::Float),
        FieldType::Bool => coerce_bool(raw).map(Value::Bool),
        _ => None,
    };
    coerced.ok_or_else(|| mismatch_message(ty, raw))
}

/// Message for a raw value that cannot become `ty`
pub fn mismatch_message(ty: &FieldType, raw: &Value) -> String {
    format!("Expected {}, got {} {}", ty, raw.type_name(), raw)
}

fn coerce_str(raw: &Value, config: &ValidationConfig) -> Option<String> {
    match raw {
        Value::String(s) => Some(config.process_string(s).into_owned()),
        _ => None,
    }
}

fn coerce_url(raw: &Value, config: &ValidationConfig) -> Option<String> {
    coerce_str(raw, config).filter(|s| is_http_url(s))
}

/// Validate URL format (http/https)
pub fn is_http_url(value: &str) -> bool {
    HTTP_URL_REGEX.is_match(value)
}

/// int: integers, floats with no fractional part, decimal strings
pub fn coerce_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.is_finite() && f.fract() == 0.0 => float_to_i64(*f),
        Value::String(s) => parse_int(s.trim()),
        _ => None,
    }
}

fn parse_int(s: &str) -> Option<i64> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    // "3.0" is an integer in textual form too; exponents are not
    let (whole, fraction) = s.split_once('.')?;
    if fraction.is_empty() || !fraction.bytes().all(|b| b == b'0') {
        return None;
    }
    whole.parse::<i64>().ok()
}

fn float_to_i64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which does not fit
    if f >= -(2f64.powi(63)) && f < 2f64.powi(63) {
        Some(f as i64)
    } else {
        None
    }
}

/// float: finite floats, integers, numeric strings
///
/// `nan` and `inf` are rejected: they have no JSON form, so a bound value
/// could not be handed on to typed results.
pub fn coerce_float(raw: &Value) -> Option<f64> {
    let f = match raw {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// bool: booleans, 0/1, and the usual textual spellings (case-insensitive)
pub fn coerce_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Canonical string form of a coerced dict key
pub fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

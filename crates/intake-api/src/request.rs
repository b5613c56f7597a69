//! Raw request snapshot
//!
//! What the surrounding HTTP layer hands to the binder: a method, the concrete
//! path, decoded path parameters, a repeated-key-aware query mapping and an
//! already-parsed body.

use crate::error::{ApiError, ApiResult};
use intake_validation::Value;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// HTTP Method
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether a request body is meaningful for this method
    pub fn allows_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!("Unsupported HTTP method: {}", other)),
        }
    }
}

// ============================================================================
// Query / Form Parameters
// ============================================================================

/// Multi-valued key/value pairs, in arrival order
///
/// Used for both query strings and `application/x-www-form-urlencoded` bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `a=1&b=2&a=3`; `+` decodes to a space
    pub fn parse(input: &str) -> ApiResult<Self> {
        let input = input.strip_prefix('?').unwrap_or(input);
        let mut pairs = Vec::new();
        for part in input.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            pairs.push((decode_component(key)?, decode_component(value)?));
        }
        Ok(Self { pairs })
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// All values for `key`, in order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Last value for `key`
    pub fn get_last(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw value for a field: every repeated value for sequence fields,
    /// otherwise the last one
    pub fn raw_value(&self, key: &str, sequence: bool) -> Option<Value> {
        if !self.contains_key(key) {
            return None;
        }
        if sequence {
            Some(Value::List(self.get_all(key).map(Value::from).collect()))
        } else {
            self.get_last(key).map(Value::from)
        }
    }
}

fn decode_component(s: &str) -> ApiResult<String> {
    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|cow| cow.into_owned())
        .map_err(|e| ApiError::BadRequest(format!("Invalid percent-encoding in '{}': {}", s, e)))
}

// ============================================================================
// Body
// ============================================================================

/// Parsed request body
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    /// `application/json`
    Json(Value),
    /// `application/x-www-form-urlencoded`
    Form(QueryParams),
}

impl RawBody {
    /// Parse a JSON body
    pub fn json(input: &str) -> ApiResult<Self> {
        let parsed: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        Ok(Self::Json(Value::from(parsed)))
    }

    /// Parse a form-encoded body
    pub fn form(input: &str) -> ApiResult<Self> {
        QueryParams::parse(input).map(Self::Form)
    }
}

// ============================================================================
// Raw Request
// ============================================================================

/// One request, before binding
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: HttpMethod,
    /// Concrete request path (e.g. `/items/5`)
    pub path: String,
    /// Decoded path parameters by name
    pub path_params: HashMap<String, String>,
    pub query: QueryParams,
    pub body: Option<RawBody>,
}

impl RawRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: HashMap::new(),
            query: QueryParams::new(),
            body: None,
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push(key, value);
        self
    }

    /// Replace the query with a parsed query string
    pub fn with_query_string(mut self, query: &str) -> ApiResult<Self> {
        self.query = QueryParams::parse(query)?;
        Ok(self)
    }

    pub fn with_body(mut self, body: RawBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_json_body(self, body: serde_json::Value) -> Self {
        self.with_body(RawBody::Json(Value::from(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("put".parse::<HttpMethod>(), Ok(HttpMethod::Put));
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert!("BREW".parse::<HttpMethod>().is_err());
        assert!(!HttpMethod::Get.allows_body());
    }

    #[test]
    fn test_query_parse_repeated() {
        let query = QueryParams::parse("?q=foo&q=bar&short=1").unwrap();
        let all: Vec<&str> = query.get_all("q").collect();
        assert_eq!(all, vec!["foo", "bar"]);
        assert_eq!(query.get_last("q"), Some("bar"));
        assert_eq!(query.get_last("short"), Some("1"));
        assert_eq!(query.get_last("missing"), None);
    }

    #[test]
    fn test_query_decoding() {
        let query = QueryParams::parse("item-query=a%20b&name=c+d&flag").unwrap();
        assert_eq!(query.get_last("item-query"), Some("a b"));
        assert_eq!(query.get_last("name"), Some("c d"));
        assert_eq!(query.get_last("flag"), Some(""));
    }

    #[test]
    fn test_query_invalid_utf8() {
        assert!(QueryParams::parse("q=%FF").is_err());
    }

    #[test]
    fn test_raw_value() {
        let query = QueryParams::parse("q=foo&q=bar").unwrap();
        assert_eq!(query.raw_value("q", false), Some(Value::from("bar")));
        assert_eq!(query.raw_value("q", true), Some(Value::from(vec!["foo", "bar"])));
        assert_eq!(query.raw_value("x", true), None);
    }

    #[test]
    fn test_json_body() {
        let body = RawBody::json(r#"{"name": "Foo", "price": 35.4}"#).unwrap();
        match body {
            RawBody::Json(value) => assert_eq!(value.get("price"), Some(&Value::Float(35.4))),
            other => panic!("expected json body, got {:?}", other),
        }
        assert!(RawBody::json("{not json").is_err());
    }
}

//! Type annotation parsing
//!
//! Turns annotation strings such as `list[Image] | None` or `dict[int, float]`
//! into a [`FieldType`]. Used by definition files, where field types are
//! written the way they would be annotated in source.

use crate::errors::SchemaError;
use crate::types::FieldType;

/// Parse a type annotation string
///
/// Accepted forms:
/// - scalars: `str`, `int`, `float`, `bool`, `HttpUrl` (`AnyUrl`), `Any`
/// - `T | None`, `None | T`, `Optional[T]`, `Union[T, None]`
/// - `list[T]` / `List[T]`, `set[T]` / `Set[T]` / `frozenset[T]`
/// - `dict[K, V]` / `Dict[K, V]`
/// - any other identifier names a model
pub fn parse_annotation(annotation: &str) -> Result<FieldType, SchemaError> {
    let annotation = annotation.trim();
    if annotation.is_empty() {
        return Err(invalid(annotation, "empty annotation"));
    }

    // T | None
    let parts = split_top_level(annotation, '|');
    if parts.len() > 1 {
        return parse_union(annotation, &parts);
    }

    if let Some(inner) = strip_generic(annotation, &["Optional"]) {
        return Ok(FieldType::optional(parse_annotation(inner)?));
    }

    if let Some(inner) = strip_generic(annotation, &["Union"]) {
        let parts = split_top_level(inner, ',');
        return parse_union(annotation, &parts);
    }

    if let Some(inner) = strip_generic(annotation, &["list", "List"]) {
        return Ok(FieldType::list(parse_annotation(inner)?));
    }

    if let Some(inner) = strip_generic(annotation, &["set", "Set", "frozenset", "FrozenSet"]) {
        return Ok(FieldType::set(parse_annotation(inner)?));
    }

    if let Some(inner) = strip_generic(annotation, &["dict", "Dict"]) {
        let parts = split_top_level(inner, ',');
        if parts.len() != 2 {
            return Err(invalid(annotation, "dict takes exactly two type arguments"));
        }
        return Ok(FieldType::map(
            parse_annotation(parts[0])?,
            parse_annotation(parts[1])?,
        ));
    }

    match annotation {
        "str" | "String" => Ok(FieldType::Str),
        "int" | "Integer" => Ok(FieldType::Int),
        "float" | "Float" | "Double" => Ok(FieldType::Float),
        "bool" | "Boolean" => Ok(FieldType::Bool),
        "HttpUrl" | "AnyUrl" => Ok(FieldType::Url),
        "Any" => Ok(FieldType::Any),
        "None" | "NoneType" => Err(invalid(annotation, "None is only valid inside a union")),
        name if is_identifier(name) => Ok(FieldType::model(name)),
        _ => Err(invalid(annotation, "unrecognized type")),
    }
}

impl std::str::FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_annotation(s)
    }
}

/// Only `T | None` unions are supported
fn parse_union(annotation: &str, parts: &[&str]) -> Result<FieldType, SchemaError> {
    let non_none: Vec<&str> = parts
        .iter()
        .copied()
        .filter(|p| !matches!(*p, "None" | "NoneType"))
        .collect();
    if non_none.len() == parts.len() {
        return Err(invalid(annotation, "unions other than T | None are not supported"));
    }
    match non_none.as_slice() {
        [single] => Ok(FieldType::optional(parse_annotation(single)?)),
        [] => Err(invalid(annotation, "union has no non-None member")),
        _ => Err(invalid(annotation, "unions other than T | None are not supported")),
    }
}

/// `Name[inner]` for any of `names`, with the closing bracket matching the opening one
fn strip_generic<'a>(s: &'a str, names: &[&str]) -> Option<&'a str> {
    let open = s.find('[')?;
    if !names.contains(&s[..open].trim_end()) || !s.ends_with(']') {
        return None;
    }
    let inner = &s[open + 1..s.len() - 1];
    // Reject `list[a][b]`: the first bracket must close at the very end
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then(|| inner.trim())
}

/// Split on `sep` outside of brackets
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn invalid(annotation: &str, reason: &str) -> SchemaError {
    SchemaError::InvalidAnnotation {
        annotation: annotation.to_string(),
        reason: reason.to_string(),
    }
}

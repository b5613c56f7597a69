//! Path templates (`/items/{item_id}`)

use crate::error::RegistrationError;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    /// `{name:path}`: the rest of the path, slashes included
    Rest(String),
}

/// A parsed path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template; placeholders must fill a whole segment
    pub fn parse(template: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: &str| RegistrationError::InvalidTemplate {
            path: template.to_string(),
            reason: reason.to_string(),
        };

        if !template.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        for raw in template.split('/').skip(1) {
            if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
                let (name, rest) = match inner.split_once(':') {
                    Some((name, "path")) => (name, true),
                    Some(_) => return Err(invalid("only the ':path' converter is supported")),
                    None => (inner, false),
                };
                if matches!(segments.last(), Some(Segment::Rest(_))) {
                    return Err(invalid("a ':path' placeholder must be last"));
                }
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                    return Err(invalid("placeholder names must be identifiers"));
                }
                if !seen.insert(name) {
                    return Err(invalid("placeholder repeated"));
                }
                segments.push(if rest {
                    Segment::Rest(name.to_string())
                } else {
                    Segment::Param(name.to_string())
                });
            } else if matches!(segments.last(), Some(Segment::Rest(_))) {
                return Err(invalid("a ':path' placeholder must be last"));
            } else if raw.contains('{') || raw.contains('}') {
                return Err(invalid("placeholders must span a whole segment"));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) | Segment::Rest(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param_names().any(|p| p == name)
    }

    /// Match a concrete path, returning percent-decoded placeholder values
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let parts: Vec<&str> = path.strip_prefix('/')?.split('/').collect();
        let has_rest = matches!(self.segments.last(), Some(Segment::Rest(_)));
        let fits = if has_rest {
            parts.len() >= self.segments.len()
        } else {
            parts.len() == self.segments.len()
        };
        if !fits {
            return None;
        }

        let mut params = HashMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            let part = parts[i];
            match segment {
                Segment::Rest(name) => {
                    let rest = parts[i..].join("/");
                    if rest.is_empty() {
                        return None;
                    }
                    let decoded = urlencoding::decode(&rest).ok()?;
                    params.insert(name.clone(), decoded.into_owned());
                }
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    let decoded = urlencoding::decode(part).ok()?;
                    params.insert(name.clone(), decoded.into_owned());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

//! Configuration options for validation behavior
//!
//! Set once on a registry, optionally overridden per model.

use std::borrow::Cow;

// ============================================================================
// Extra Field Handling
// ============================================================================

/// How to handle input keys a model does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtraFields {
    /// Drop extra keys (default)
    #[default]
    Ignore,
    /// Copy extra keys into the instance unvalidated
    Allow,
    /// Reject extra keys with `extra_forbidden`
    Forbid,
}

impl std::str::FromStr for ExtraFields {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "allow" => Ok(Self::Allow),
            "forbid" => Ok(Self::Forbid),
            other => Err(format!(
                "Unknown extra policy: {}. Use 'ignore', 'allow' or 'forbid'.",
                other
            )),
        }
    }
}

// ============================================================================
// Validation Config
// ============================================================================

/// Configuration options for validation behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationConfig {
    /// How to handle extra fields
    pub extra: ExtraFields,

    /// Strip surrounding whitespace from raw strings bound to `str`/`HttpUrl` fields
    pub str_strip_whitespace: bool,
}

impl ValidationConfig {
    /// Create a new validation config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set extra field handling
    pub fn extra(mut self, extra: ExtraFields) -> Self {
        self.extra = extra;
        self
    }

    /// Forbid extra fields
    pub fn forbid_extra(self) -> Self {
        self.extra(ExtraFields::Forbid)
    }

    /// Allow extra fields
    pub fn allow_extra(self) -> Self {
        self.extra(ExtraFields::Allow)
    }

    /// Enable string whitespace stripping
    pub fn strip_whitespace(mut self, strip: bool) -> Self {
        self.str_strip_whitespace = strip;
        self
    }

    /// Process a raw string according to config
    pub fn process_string<'a>(&self, s: &'a str) -> Cow<'a, str> {
        if self.str_strip_whitespace {
            Cow::Borrowed(s.trim())
        } else {
            Cow::Borrowed(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config.extra, ExtraFields::Ignore);
        assert!(!config.str_strip_whitespace);
    }

    #[test]
    fn test_config_builder() {
        let config = ValidationConfig::new().forbid_extra().strip_whitespace(true);
        assert_eq!(config.extra, ExtraFields::Forbid);
        assert!(config.str_strip_whitespace);
        assert_eq!(ValidationConfig::new().allow_extra().extra, ExtraFields::Allow);
    }

    #[test]
    fn test_process_string() {
        let config = ValidationConfig::new().strip_whitespace(true);
        assert_eq!(config.process_string("  hello  "), "hello");
        assert_eq!(ValidationConfig::new().process_string(" a "), " a ");
    }

    #[test]
    fn test_extra_fields_from_str() {
        assert_eq!("forbid".parse::<ExtraFields>(), Ok(ExtraFields::Forbid));
        assert_eq!("Allow".parse::<ExtraFields>(), Ok(ExtraFields::Allow));
        assert!("strict".parse::<ExtraFields>().is_err());
    }
}

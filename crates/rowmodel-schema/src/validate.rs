//! Attribute validation against a [`Schema`].
//!
//! [`Validator`] is the seam a table validates through. [`SchemaValidator`]
//! casts every described field, fills defaults for absent ones and reports
//! structured failures.

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use regex::Regex;
use rowmodel_core::{Attributes, FieldValidationError, ValidationError, ValidationErrorKind};

use crate::schema::Schema;

/// Options controlling a validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Stop at the first failing field.
    pub abort_early: bool,
    /// Convert compatible input (numeric strings, `"true"`, date strings, ...).
    pub convert: bool,
    /// Pass attributes that are not in the schema through unchanged.
    pub allow_unknown: bool,
    /// Drop attributes that are not in the schema. Wins over `allow_unknown`.
    pub strip_unknown: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            abort_early: true,
            convert: true,
            allow_unknown: true,
            strip_unknown: false,
        }
    }
}

impl ValidationOptions {
    /// Set `abort_early`.
    pub fn abort_early(mut self, enabled: bool) -> Self {
        self.abort_early = enabled;
        self
    }

    /// Set `convert`.
    pub fn convert(mut self, enabled: bool) -> Self {
        self.convert = enabled;
        self
    }

    /// Set `allow_unknown`.
    pub fn allow_unknown(mut self, enabled: bool) -> Self {
        self.allow_unknown = enabled;
        self
    }

    /// Set `strip_unknown`.
    pub fn strip_unknown(mut self, enabled: bool) -> Self {
        self.strip_unknown = enabled;
        self
    }
}

/// Casts an attribute bag against a schema.
pub trait Validator: Send + Sync {
    /// Return the coerced bag, or every failure found.
    fn validate(
        &self,
        attrs: &Attributes,
        schema: &Schema,
        options: &ValidationOptions,
    ) -> Result<Attributes, ValidationError>;
}

/// The built-in validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl Validator for SchemaValidator {
    fn validate(
        &self,
        attrs: &Attributes,
        schema: &Schema,
        options: &ValidationOptions,
    ) -> Result<Attributes, ValidationError> {
        let mut output = Attributes::new();
        let mut failures = ValidationError::new();

        for (name, value) in attrs {
            let result = match schema.get(name) {
                Some(field) => field.cast(name, value, options).map(Some),
                None if options.strip_unknown => Ok(None),
                None if options.allow_unknown => Ok(Some(value.clone())),
                None => Err(FieldValidationError::new(
                    name.as_str(),
                    ValidationErrorKind::Unknown,
                    format!("\"{name}\" is not allowed"),
                )),
            };

            match result {
                Ok(Some(cast)) => {
                    output.insert(name.clone(), cast);
                }
                Ok(None) => {}
                Err(failure) => {
                    failures.push(failure);
                    if options.abort_early {
                        return Err(failures);
                    }
                }
            }
        }

        for (name, field) in schema.iter() {
            if attrs.contains_key(name) {
                continue;
            }
            if let Some(default) = &field.default {
                output.insert(name.to_string(), default.resolve());
            } else if field.required {
                failures.push(FieldValidationError::new(
                    name,
                    ValidationErrorKind::Required,
                    format!("\"{name}\" is required"),
                ));
                if options.abort_early {
                    return Err(failures);
                }
            }
        }

        if failures.is_empty() {
            Ok(output)
        } else {
            tracing::debug!(failures = failures.errors.len(), "Attribute validation failed");
            Err(failures)
        }
    }
}

/// Thread-safe regex cache for compiled patterns.
///
/// Patterns are compiled lazily on first use and cached for the lifetime
/// of the program.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        // Fast path: check if already cached
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        // Slow path: compile and cache
        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

/// Global regex cache singleton.
fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// Returns `false` if the pattern is invalid (logs a warning).
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

/// Returns an error message if the pattern is invalid, None if valid.
pub fn validate_pattern(pattern: &str) -> Option<String> {
    match Regex::new(pattern) {
        Ok(_) => None,
        Err(e) => Some(format!("invalid regex pattern: {e}")),
    }
}

//! Error types surfaced by rowmodel.
//!
//! Every failure carries a stable string code (see [`Error::code`]):
//!
//! - `NOT_FOUND` - a required lookup returned no row
//! - `DB_ERROR` - any other database failure (the default)
//! - `VALIDATION_ERROR` - attributes failed schema constraints
//! - `INVALID_ARGUMENT` - a programming misuse, e.g. a malformed attribute path

use std::fmt;

use serde_json::Value;

/// Code for a required lookup that found nothing.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Default code for database failures.
pub const DB_ERROR: &str = "DB_ERROR";
/// Code for schema validation failures.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Code for misuse of the API.
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for all rowmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Database-level failure, including `NOT_FOUND`.
    Db(DbError),
    /// Attribute validation failure from the schema validator.
    Validation(ValidationError),
    /// Misuse of the API (bad argument shape, malformed path, ...).
    InvalidArgument(String),
}

impl Error {
    /// Build a generic `DB_ERROR`.
    pub fn db(message: impl Into<String>) -> Self {
        Error::Db(DbError::new(message))
    }

    /// Build a `NOT_FOUND` error carrying the query that matched nothing.
    pub fn not_found(query: Value) -> Self {
        Error::Db(DbError::not_found(query))
    }

    /// Build an `INVALID_ARGUMENT` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// The stable error code.
    pub fn code(&self) -> &str {
        match self {
            Error::Db(e) => &e.code,
            Error::Validation(_) => VALIDATION_ERROR,
            Error::InvalidArgument(_) => INVALID_ARGUMENT,
        }
    }

    /// Whether this is a `NOT_FOUND` error.
    pub fn is_not_found(&self) -> bool {
        self.code() == NOT_FOUND
    }

    /// Diagnostic payload attached to database errors.
    pub fn results(&self) -> Option<&Value> {
        match self {
            Error::Db(e) => e.results.as_ref(),
            _ => None,
        }
    }

    /// The validation failure, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Db(e) => write!(f, "{e}"),
            Error::Validation(e) => write!(f, "{e}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Db(e) => Some(e),
            Error::Validation(e) => Some(e),
            Error::InvalidArgument(_) => None,
        }
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        Error::Db(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<FieldValidationError> for Error {
    fn from(err: FieldValidationError) -> Self {
        Error::Validation(ValidationError::from(err))
    }
}

/// A database error with a code, a message and optional diagnostic results.
#[derive(Debug, Clone, PartialEq)]
pub struct DbError {
    /// Error code, `DB_ERROR` unless the failure is more specific.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Extra diagnostic payload (for `NOT_FOUND`, the query).
    pub results: Option<Value>,
}

impl DbError {
    /// Create a `DB_ERROR`. An empty message falls back to a generic one.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: DB_ERROR.to_string(),
            message: if message.is_empty() {
                "a database error occurred".to_string()
            } else {
                message
            },
            results: None,
        }
    }

    /// Create a `NOT_FOUND` error for `query`.
    pub fn not_found(query: Value) -> Self {
        Self {
            code: NOT_FOUND.to_string(),
            message: format!("Nothing found from query: {query}"),
            results: Some(query),
        }
    }

    /// Override the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Attach diagnostic results.
    pub fn with_results(mut self, results: Value) -> Self {
        self.results = Some(results);
        self
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for DbError {}

/// Why a single field failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A required field was absent.
    Required,
    /// The value has the wrong type and could not be converted.
    Type {
        /// Name of the expected type.
        expected: &'static str,
    },
    /// The value is not one of the allowed values.
    NotAllowed,
    /// An empty string where one is not allowed.
    Empty,
    /// A string that does not match the field's pattern.
    Pattern,
    /// The field is not part of the schema and unknown keys are rejected.
    Unknown,
}

/// A validation failure for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidationError {
    /// Path of the offending field.
    pub path: String,
    /// What went wrong.
    pub kind: ValidationErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl FieldValidationError {
    /// Create a new field failure.
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Structured validation failure: one entry per failing field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationError {
    /// Failures in the order they were found.
    pub errors: Vec<FieldValidationError>,
}

impl ValidationError {
    /// Create an empty validation error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field failure.
    pub fn push(&mut self, error: FieldValidationError) {
        self.errors.push(error);
    }

    /// Whether no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First failure for `path`, if any.
    pub fn for_path(&self, path: &str) -> Option<&FieldValidationError> {
        self.errors.iter().find(|e| e.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "validation failed: {}", messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

impl From<FieldValidationError> for ValidationError {
    fn from(err: FieldValidationError) -> Self {
        Self { errors: vec![err] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_db_error_defaults() {
        let err = DbError::new("");
        assert_eq!(err.code, DB_ERROR);
        assert_eq!(err.message, "a database error occurred");
        assert!(err.results.is_none());
    }

    #[test]
    fn test_not_found_carries_query() {
        let err = Error::not_found(json!({"email": "missing@example.com"}));
        assert_eq!(err.code(), NOT_FOUND);
        assert!(err.is_not_found());
        assert!(err.to_string().contains(r#"{"email":"missing@example.com"}"#));
        assert_eq!(err.results(), Some(&json!({"email": "missing@example.com"})));
    }

    #[test]
    fn test_codes_per_variant() {
        assert_eq!(Error::db("boom").code(), DB_ERROR);
        assert_eq!(Error::invalid_argument("bad").code(), INVALID_ARGUMENT);
        let validation: Error = FieldValidationError::new(
            "email",
            ValidationErrorKind::Required,
            "\"email\" is required",
        )
        .into();
        assert_eq!(validation.code(), VALIDATION_ERROR);
        let details = validation.as_validation().unwrap();
        assert_eq!(details.errors.len(), 1);
        assert_eq!(details.for_path("email").unwrap().kind, ValidationErrorKind::Required);
        assert_eq!(validation.to_string(), "validation failed: \"email\" is required");
    }

    #[test]
    fn test_custom_db_code() {
        let err = Error::from(DbError::new("duplicate entry").with_code("ER_DUP_ENTRY"));
        assert_eq!(err.code(), "ER_DUP_ENTRY");
        assert_eq!(err.to_string(), "ER_DUP_ENTRY: duplicate entry");
    }

    #[test]
    fn test_validation_error_display_and_lookup() {
        let mut err = ValidationError::new();
        assert!(err.is_empty());
        err.push(FieldValidationError::new(
            "balance",
            ValidationErrorKind::Type { expected: "number" },
            "\"balance\" must be a number",
        ));
        assert_eq!(err.to_string(), "validation failed: \"balance\" must be a number");
        assert!(err.for_path("balance").is_some());
        assert!(err.for_path("email").is_none());
    }
}

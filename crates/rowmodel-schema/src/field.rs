//! Field descriptors.
//!
//! Descriptors are built fluently from a type constructor:
//!
//! ```
//! use rowmodel_schema::field::{self, TimestampEncoding};
//! use serde_json::json;
//!
//! let provider = field::string().required().valid([json!("google"), json!("facebook")]);
//! let created_at = field::date().timestamp(TimestampEncoding::Unix).nullable();
//! let activation_code = field::string().default_with("generates a uuid v4", field::uuid_v4);
//!
//! assert!(provider.required);
//! assert!(created_at.nullable);
//! assert!(activation_code.default.is_some());
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rowmodel_core::statement::values_equal;
use rowmodel_core::{FieldValidationError, ValidationErrorKind};
use serde_json::{Number, Value};

use crate::validate::{ValidationOptions, matches_pattern, validate_pattern};

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Any value, passed through unchanged.
    Any,
    /// A number (integer or float).
    Number,
    /// A whole number.
    Integer,
    /// A string.
    String,
    /// A boolean.
    Boolean,
    /// A point in time, stored as an RFC 3339 UTC string.
    Date,
    /// A UUID string.
    Uuid,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl FieldType {
    /// Name used in validation messages.
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Any => "any",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Uuid => "uuid",
            FieldType::Object => "object",
            FieldType::Array => "array",
        }
    }
}

/// How numeric input is interpreted by a date field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampEncoding {
    /// Milliseconds since the epoch.
    #[default]
    Javascript,
    /// Seconds since the epoch.
    Unix,
}

/// A default applied when the field is absent.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value.
    Value(Value),
    /// A zero-argument generator invoked on every validation.
    Generator {
        /// What the generator produces, for diagnostics.
        description: String,
        /// The generator.
        generate: Arc<dyn Fn() -> Value + Send + Sync>,
    },
}

impl DefaultValue {
    /// Produce the default.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Generator { generate, .. } => generate(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Generator { description, .. } => {
                f.debug_tuple("Generator").field(description).finish()
            }
        }
    }
}

/// Descriptor for one field.
#[derive(Debug, Clone)]
pub struct Field {
    /// Declared type.
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
    /// Whether `null` is accepted.
    pub nullable: bool,
    /// Values the field is restricted to, if any.
    pub allowed: Option<Vec<Value>>,
    /// Default applied when the field is absent.
    pub default: Option<DefaultValue>,
    /// Interpretation of numeric input for date fields.
    pub timestamp: TimestampEncoding,
    /// Regex a string value must match.
    pub pattern: Option<String>,
    /// Whether an empty string is accepted.
    pub allow_empty: bool,
}

impl Field {
    /// Create a descriptor of the given type with no constraints.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            nullable: false,
            allowed: None,
            default: None,
            timestamp: TimestampEncoding::default(),
            pattern: None,
            allow_empty: false,
        }
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Accept `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Restrict the field to the given values.
    pub fn valid<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.allowed
            .get_or_insert_with(Vec::new)
            .extend(values);
        self
    }

    /// Fixed default value.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    /// Default produced by `generate` on every validation.
    pub fn default_with<F>(mut self, description: impl Into<String>, generate: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator {
            description: description.into(),
            generate: Arc::new(generate),
        });
        self
    }

    /// Set the timestamp encoding for numeric date input.
    pub fn timestamp(mut self, encoding: TimestampEncoding) -> Self {
        self.timestamp = encoding;
        self
    }

    /// Require string values to match `pattern`.
    ///
    /// An invalid pattern is logged and then treated as matching nothing.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if let Some(problem) = validate_pattern(&pattern) {
            tracing::warn!(pattern = %pattern, problem = %problem, "Field pattern does not compile");
        }
        self.pattern = Some(pattern);
        self
    }

    /// Accept empty strings.
    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Cast `value` to this field's type.
    ///
    /// `name` is the field path used in error messages.
    pub fn cast(
        &self,
        name: &str,
        value: &Value,
        options: &ValidationOptions,
    ) -> Result<Value, FieldValidationError> {
        if value.is_null() {
            if self.nullable || self.field_type == FieldType::Any {
                return Ok(Value::Null);
            }
            return Err(self.type_error(name));
        }

        let cast = match self.field_type {
            FieldType::Any => Some(value.clone()),
            FieldType::Number => cast_number(value, options.convert),
            FieldType::Integer => cast_number(value, options.convert).and_then(to_integer),
            FieldType::String => value.as_str().map(|s| Value::String(s.to_string())),
            FieldType::Boolean => cast_boolean(value, options.convert),
            FieldType::Date => cast_date(value, self.timestamp, options.convert),
            FieldType::Uuid => cast_uuid(value, options.convert),
            FieldType::Object => cast_json(value, options.convert, Value::is_object),
            FieldType::Array => cast_json(value, options.convert, Value::is_array),
        };
        let Some(cast) = cast else {
            return Err(self.type_error(name));
        };

        if let Value::String(s) = &cast {
            if self.field_type == FieldType::String {
                if s.is_empty() && !self.allow_empty {
                    return Err(FieldValidationError::new(
                        name,
                        ValidationErrorKind::Empty,
                        format!("\"{name}\" is not allowed to be empty"),
                    ));
                }
                if let Some(pattern) = &self.pattern {
                    if !matches_pattern(s, pattern) {
                        return Err(FieldValidationError::new(
                            name,
                            ValidationErrorKind::Pattern,
                            format!("\"{name}\" fails to match the required pattern: {pattern}"),
                        ));
                    }
                }
            }
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|a| values_equal(a, &cast)) {
                let listed: Vec<String> = allowed.iter().map(render_allowed).collect();
                return Err(FieldValidationError::new(
                    name,
                    ValidationErrorKind::NotAllowed,
                    format!("\"{name}\" must be one of [{}]", listed.join(", ")),
                ));
            }
        }

        Ok(cast)
    }

    fn type_error(&self, name: &str) -> FieldValidationError {
        let expected = self.field_type.name();
        let article = if matches!(self.field_type, FieldType::Integer | FieldType::Object | FieldType::Array) {
            "an"
        } else {
            "a"
        };
        let message = if self.field_type == FieldType::Date {
            format!("\"{name}\" must be a valid date")
        } else {
            format!("\"{name}\" must be {article} {expected}")
        };
        FieldValidationError::new(name, ValidationErrorKind::Type { expected }, message)
    }
}

fn render_allowed(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build a JSON number, preferring an integer representation for whole values.
fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

fn cast_number(value: &Value, convert: bool) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) if convert => {
            let parsed = s.trim().parse::<f64>().ok()?;
            if parsed.is_finite() { number_value(parsed) } else { None }
        }
        _ => None,
    }
}

fn to_integer(value: Value) -> Option<Value> {
    let Value::Number(n) = &value else {
        return None;
    };
    if n.is_i64() || n.is_u64() {
        return Some(value);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 { number_value(f) } else { None }
}

fn cast_boolean(value: &Value, convert: bool) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) if convert => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if s.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Render a timestamp the way a JSON-serialized date looks.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse the textual date formats accepted by date fields.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn date_from_epoch(n: f64, encoding: TimestampEncoding) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }
    match encoding {
        TimestampEncoding::Javascript => DateTime::from_timestamp_millis(n.round() as i64),
        TimestampEncoding::Unix => {
            let secs = n.floor();
            let nanos = (((n - secs) * 1e9).round() as u32).min(999_999_999);
            DateTime::from_timestamp(secs as i64, nanos)
        }
    }
}

fn cast_date(value: &Value, encoding: TimestampEncoding, convert: bool) -> Option<Value> {
    let date = match value {
        Value::String(s) if !convert => {
            // strict mode only accepts already-normalized timestamps
            DateTime::parse_from_rfc3339(s).ok()?;
            return Some(value.clone());
        }
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => date_from_epoch(n, encoding)?,
            Err(_) => parse_date(s)?,
        },
        Value::Number(n) if convert => date_from_epoch(n.as_f64()?, encoding)?,
        _ => return None,
    };
    Some(Value::String(format_date(&date)))
}

fn cast_uuid(value: &Value, convert: bool) -> Option<Value> {
    let s = value.as_str()?;
    let parsed = ::uuid::Uuid::parse_str(s.trim()).ok()?;
    if convert {
        Some(Value::String(parsed.hyphenated().to_string()))
    } else {
        Some(value.clone())
    }
}

fn cast_json(value: &Value, convert: bool, is_kind: fn(&Value) -> bool) -> Option<Value> {
    if is_kind(value) {
        return Some(value.clone());
    }
    match value {
        Value::String(s) if convert => serde_json::from_str::<Value>(s)
            .ok()
            .filter(|parsed| is_kind(parsed)),
        _ => None,
    }
}

/// Field accepting any value.
pub fn any() -> Field {
    Field::new(FieldType::Any)
}

/// Number field.
pub fn number() -> Field {
    Field::new(FieldType::Number)
}

/// Whole-number field.
pub fn integer() -> Field {
    Field::new(FieldType::Integer)
}

/// String field.
pub fn string() -> Field {
    Field::new(FieldType::String)
}

/// Boolean field.
pub fn boolean() -> Field {
    Field::new(FieldType::Boolean)
}

/// Date field.
pub fn date() -> Field {
    Field::new(FieldType::Date)
}

/// UUID field.
pub fn uuid() -> Field {
    Field::new(FieldType::Uuid)
}

/// Object field.
pub fn object() -> Field {
    Field::new(FieldType::Object)
}

/// Array field.
pub fn array() -> Field {
    Field::new(FieldType::Array)
}

/// Default generator: a fresh random UUID string.
pub fn uuid_v4() -> Value {
    Value::String(::uuid::Uuid::new_v4().to_string())
}

/// Default generator: the current time as a date string.
pub fn now() -> Value {
    Value::String(format_date(&Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> ValidationOptions {
        ValidationOptions::default()
    }

    fn strict() -> ValidationOptions {
        ValidationOptions::default().convert(false)
    }

    #[test]
    fn test_number_cast_and_conversion() {
        let f = number();
        assert_eq!(f.cast("n", &json!(3), &opts()).unwrap(), json!(3));
        assert_eq!(f.cast("n", &json!(2.5), &opts()).unwrap(), json!(2.5));
        assert_eq!(f.cast("n", &json!(" 42 "), &opts()).unwrap(), json!(42));
        assert_eq!(f.cast("n", &json!("0.5"), &opts()).unwrap(), json!(0.5));

        let err = f.cast("n", &json!("forty"), &opts()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Type { expected: "number" });
        assert_eq!(err.message, "\"n\" must be a number");

        assert!(f.cast("n", &json!("42"), &strict()).is_err());
        assert!(f.cast("n", &json!(true), &opts()).is_err());
    }

    #[test]
    fn test_number_cast_at_i64_bounds() {
        let f = number();
        // 2^63 is not representable as i64 and must stay a float
        let big = f.cast("n", &json!("9223372036854775808"), &opts()).unwrap();
        assert!(big.is_f64());
        assert_ne!(big, json!(i64::MAX));
        assert_eq!(big.as_f64(), Some(9_223_372_036_854_775_808.0));

        let min = f.cast("n", &json!("-9223372036854775808"), &opts()).unwrap();
        assert_eq!(min, json!(i64::MIN));
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let f = integer();
        assert_eq!(f.cast("n", &json!(4.0), &opts()).unwrap(), json!(4));
        assert_eq!(f.cast("n", &json!("7"), &opts()).unwrap(), json!(7));
        let err = f.cast("n", &json!(4.5), &opts()).unwrap_err();
        assert_eq!(err.message, "\"n\" must be an integer");
    }

    #[test]
    fn test_string_rules() {
        let f = string();
        assert_eq!(f.cast("s", &json!("x"), &opts()).unwrap(), json!("x"));
        assert!(f.cast("s", &json!(5), &opts()).is_err());

        let empty = f.cast("s", &json!(""), &opts()).unwrap_err();
        assert_eq!(empty.kind, ValidationErrorKind::Empty);
        assert!(string().allow_empty().cast("s", &json!(""), &opts()).is_ok());
    }

    #[test]
    fn test_string_pattern() {
        let f = string().pattern(r"^[a-z]+@[a-z]+\.[a-z]{2,}$");
        assert!(f.cast("email", &json!("a@example.com"), &opts()).is_ok());
        let err = f.cast("email", &json!("nope"), &opts()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Pattern);
    }

    #[test]
    fn test_boolean_conversion() {
        let f = boolean();
        assert_eq!(f.cast("b", &json!(false), &opts()).unwrap(), json!(false));
        assert_eq!(f.cast("b", &json!("TRUE"), &opts()).unwrap(), json!(true));
        assert!(f.cast("b", &json!("yes"), &opts()).is_err());
        assert!(f.cast("b", &json!("true"), &strict()).is_err());
    }

    #[test]
    fn test_null_requires_nullable() {
        assert!(number().cast("n", &Value::Null, &opts()).is_err());
        assert_eq!(
            number().nullable().cast("n", &Value::Null, &opts()).unwrap(),
            Value::Null
        );
        assert_eq!(any().cast("n", &Value::Null, &opts()).unwrap(), Value::Null);
    }

    #[test]
    fn test_valid_values() {
        let f = string().valid([json!("google"), json!("facebook")]);
        assert!(f.cast("provider", &json!("google"), &opts()).is_ok());
        let err = f.cast("provider", &json!("github"), &opts()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NotAllowed);
        assert_eq!(err.message, "\"provider\" must be one of [google, facebook]");
    }

    #[test]
    fn test_date_formats() {
        let f = date();
        assert_eq!(
            f.cast("d", &json!("2024-03-01T10:20:30Z"), &opts()).unwrap(),
            json!("2024-03-01T10:20:30.000Z")
        );
        assert_eq!(
            f.cast("d", &json!("2024-03-01"), &opts()).unwrap(),
            json!("2024-03-01T00:00:00.000Z")
        );
        assert_eq!(
            f.cast("d", &json!("2024-03-01 10:20:30"), &opts()).unwrap(),
            json!("2024-03-01T10:20:30.000Z")
        );
        assert_eq!(
            f.cast("d", &json!(0), &opts()).unwrap(),
            json!("1970-01-01T00:00:00.000Z")
        );
        assert_eq!(
            f.cast("d", &json!(1500), &opts()).unwrap(),
            json!("1970-01-01T00:00:01.500Z")
        );
        assert_eq!(
            f.cast("d", &json!("not a date"), &opts()).unwrap_err().message,
            "\"d\" must be a valid date"
        );
    }

    #[test]
    fn test_unix_timestamp_encoding() {
        let f = date().timestamp(TimestampEncoding::Unix);
        assert_eq!(
            f.cast("d", &json!(86400), &opts()).unwrap(),
            json!("1970-01-02T00:00:00.000Z")
        );
        assert_eq!(
            f.cast("d", &json!("1.5"), &opts()).unwrap(),
            json!("1970-01-01T00:00:01.500Z")
        );
    }

    #[test]
    fn test_date_strict_mode() {
        let f = date();
        assert!(f.cast("d", &json!("2024-03-01T10:20:30Z"), &strict()).is_ok());
        assert!(f.cast("d", &json!("2024-03-01"), &strict()).is_err());
        assert!(f.cast("d", &json!(0), &strict()).is_err());
    }

    #[test]
    fn test_uuid_cast() {
        let f = uuid();
        assert_eq!(
            f.cast("u", &json!("550E8400-E29B-41D4-A716-446655440000"), &opts()).unwrap(),
            json!("550e8400-e29b-41d4-a716-446655440000")
        );
        assert!(f.cast("u", &json!("invalid-uuid"), &opts()).is_err());
    }

    #[test]
    fn test_object_and_array_cast() {
        assert_eq!(
            object().cast("o", &json!("{\"a\":1}"), &opts()).unwrap(),
            json!({"a": 1})
        );
        assert!(object().cast("o", &json!([1]), &opts()).is_err());
        assert_eq!(array().cast("a", &json!([1, 2]), &opts()).unwrap(), json!([1, 2]));
        assert!(array().cast("a", &json!("[1"), &opts()).is_err());
    }

    #[test]
    fn test_default_resolution() {
        let fixed = number().default_value(json!(0));
        assert_eq!(fixed.default.unwrap().resolve(), json!(0));

        let generated = string().default_with("generates a uuid v4", uuid_v4);
        let default = generated.default.unwrap();
        let a = default.resolve();
        let b = default.resolve();
        assert_ne!(a, b);
        assert!(::uuid::Uuid::parse_str(a.as_str().unwrap()).is_ok());
        assert!(format!("{default:?}").contains("generates a uuid v4"));
    }

    #[test]
    fn test_now_is_a_date_string() {
        let value = now();
        assert!(parse_date(value.as_str().unwrap()).is_some());
    }
}

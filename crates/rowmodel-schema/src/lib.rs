//! Field descriptors and attribute validation for rowmodel.
//!
//! A [`Schema`] maps field names to [`Field`] descriptors built with the
//! functions in [`field`]:
//!
//! ```
//! use rowmodel_schema::{Schema, field};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .field("id", field::number())
//!     .field("email", field::string().required())
//!     .field("balance", field::number().default_value(json!(0)));
//!
//! assert!(schema.contains("email"));
//! ```
//!
//! A [`Validator`] casts an attribute bag against a schema. [`SchemaValidator`]
//! is the built-in implementation; tables accept any other through the trait.

pub mod field;
pub mod schema;
pub mod validate;

pub use field::{DefaultValue, Field, FieldType, TimestampEncoding};
pub use schema::Schema;
pub use validate::{
    SchemaValidator, ValidationOptions, Validator, matches_pattern, validate_pattern,
};

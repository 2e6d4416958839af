//! Core types and traits for rowmodel.
//!
//! `rowmodel-core` is the **foundation layer** for the workspace. It defines the
//! data types and the collaborator contracts that the other crates build on.
//!
//! # Role In The Architecture
//!
//! - **Data model**: [`Attributes`] is the attribute bag carried by every record,
//!   with dotted-path addressing in [`attributes`].
//! - **Contract layer**: [`Engine`] is the Database Engine contract. Engines execute
//!   structured [`Statement`]s scoped by [`Criteria`].
//! - **Errors**: [`Error`] is the single error taxonomy surfaced to callers.
//! - **Configuration**: [`DbConfig`] holds the bootstrap connection settings.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so every
//!   async database operation is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `rowmodel-schema` validates [`Attributes`] and reports [`ValidationError`]s.
//! - `rowmodel-query` builds [`Statement`]s and runs them through an [`Engine`].
//! - `rowmodel-memory` implements [`Engine`] in process.
//! - `rowmodel` wires everything into tables, records and result sets.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod attributes;
pub mod config;
pub mod engine;
pub mod error;
pub mod statement;

pub use attributes::{Attributes, Value, get_path, merge, set_path, to_json};
pub use config::DbConfig;
pub use engine::Engine;
pub use error::{
    DB_ERROR, DbError, Error, FieldValidationError, INVALID_ARGUMENT, NOT_FOUND, Result,
    VALIDATION_ERROR, ValidationError, ValidationErrorKind,
};
pub use statement::{Condition, Criteria, Delete, Fields, Insert, Select, Statement, Update};

//! Tables, records and result sets with lifecycle hooks.
//!
//! `rowmodel` is the user-facing facade. It ties schema validation
//! (`rowmodel-schema`) to persistence through any [`Engine`] (`rowmodel-query`
//! builds the statements).
//!
//! # Role In The Architecture
//!
//! - **[`Table`]**: schema, hook registry and query sugar for one table.
//!   Built once through a [`TableBuilder`], immutable afterwards.
//! - **[`Record`]**: one row's attributes, with `cast`, `save`, `update`,
//!   `upsert`, `destroy` and `find_or_create`. Table-specific record types
//!   implement [`Entity`].
//! - **[`ResultSet`]**: the records of a multi-row query, with array-like
//!   search and identity-based `add` / `remove`.
//! - **[`Database`]**: engine + configuration + named tables.
//!
//! # Example
//!
//! ```ignore
//! use rowmodel::prelude::*;
//!
//! let users = Table::builder("users", engine)
//!     .field("id", field::number())
//!     .field("email", field::string().required())
//!     .field("balance", field::number().default_value(json!(0)))
//!     .insecure_keys(["password"])
//!     .build();
//!
//! let mut user = users.build(attrs);
//! user.save(&cx).await;                       // before-save hooks, cast, insert
//! let found = users.find_one(&cx, &query, true).await;
//! ```

pub mod database;
pub mod hooks;
pub mod record;
pub mod result_set;
pub mod table;

pub use database::Database;
pub use hooks::{HookContext, HookEvent, HookFuture, HookHandler, HookRegistry, Timing};
pub use record::{Entity, Record, RecordKey};
pub use result_set::{ResultSet, RowMatcher, Shape};
pub use table::{Table, TableBuilder};

pub use rowmodel_core::{
    Attributes, Criteria, Cx, DB_ERROR, DbConfig, DbError, Engine, Error, INVALID_ARGUMENT,
    NOT_FOUND, Outcome, Result, VALIDATION_ERROR, ValidationError, Value,
};
pub use rowmodel_query::{Dialect, QueryOptions, TableQuery};
pub use rowmodel_schema::{Field, FieldType, Schema, SchemaValidator, ValidationOptions, Validator};

/// Re-exports for typical use.
pub mod prelude {
    pub use crate::{
        Attributes, Cx, Database, DbConfig, Engine, Entity, Error, HookContext, HookEvent,
        Outcome, Record, RecordKey, ResultSet, Schema, Shape, Table, TableBuilder, Timing,
        ValidationOptions, Value,
    };
    pub use rowmodel_schema::field;
}

//! Table-scoped query builders for rowmodel.
//!
//! `rowmodel-query` is the **statement layer**. It turns knex-style builder
//! chains into structured [`Statement`](rowmodel_core::Statement)s and runs them
//! through an [`Engine`](rowmodel_core::Engine).
//!
//! # Role In The Architecture
//!
//! - **Builders**: [`TableQuery`] and its terminal builders ([`SelectQuery`],
//!   [`FirstQuery`], [`InsertQuery`], [`UpdateQuery`], [`DeleteQuery`]).
//! - **Rendering**: [`render`] produces dialect-specific SQL with placeholders;
//!   every executed statement is rendered into the log through
//!   [`log_statement`].
//!
//! Builders do no validation and run no hooks; that is the job of `rowmodel`'s
//! `Record`.

pub mod builder;
pub mod sql;

pub use builder::{
    DeleteQuery, FirstQuery, InsertQuery, QueryOptions, SelectQuery, TableQuery, UpdateQuery,
};
pub use sql::{Dialect, RenderedSql, log_statement, render};

//! Database Engine contract.
//!
//! An [`Engine`] executes structured statements against some storage. rowmodel
//! never talks to a database any other way: connection pooling, dialects and
//! transactions all live behind this trait.

// Allow `impl Future` return types in trait methods - intentional for async trait compat
#![allow(clippy::manual_async_fn)]

use std::future::Future;

use asupersync::{Cx, Outcome};
use serde_json::Value;

use crate::attributes::Attributes;
use crate::error::Error;
use crate::statement::{Delete, Insert, Select, Update};

/// Executes statements for every table built on top of it.
///
/// Implementations must be shareable across tasks; a single engine serves every
/// table of a [`DbConfig`](crate::DbConfig)-configured database.
pub trait Engine: Send + Sync {
    /// Run a filtered read and return the matching rows in storage order.
    fn select(
        &self,
        cx: &Cx,
        stmt: &Select,
    ) -> impl Future<Output = Outcome<Vec<Attributes>, Error>> + Send;

    /// Insert rows and return the generated id of each inserted row, in order.
    fn insert(
        &self,
        cx: &Cx,
        stmt: &Insert,
    ) -> impl Future<Output = Outcome<Vec<Value>, Error>> + Send;

    /// Update every row matching the criteria; returns rows affected.
    fn update(&self, cx: &Cx, stmt: &Update) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Delete every row matching the criteria; returns rows affected.
    fn delete(&self, cx: &Cx, stmt: &Delete) -> impl Future<Output = Outcome<u64, Error>> + Send;
}

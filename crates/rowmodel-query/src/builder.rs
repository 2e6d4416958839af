//! Table-scoped query builders.
//!
//! [`TableQuery`] is the entry point: it names a table, accumulates filter
//! criteria and converts into one of the terminal builders, each of which
//! runs exactly one statement through an [`Engine`].
//!
//! ```ignore
//! // First matching row, selected columns only
//! let row = TableQuery::new(&engine, "users")
//!     .where_eq("email", json!("a@example.com"))
//!     .first(["id", "email"])
//!     .execute(cx)
//!     .await;
//!
//! // Insert, returning the generated ids
//! let ids = TableQuery::new(&engine, "users").insert(attrs).execute(cx).await;
//! ```

use asupersync::{Cx, Outcome};
use rowmodel_core::{
    Attributes, Criteria, Delete, Engine, Error, Fields, Insert, Select, Statement, Update, Value,
};

use crate::sql::{Dialect, log_statement};

/// Settings shared by every builder created from one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Dialect used when rendering statements for the log.
    pub dialect: Dialect,
    /// Log rendered statements at `debug` instead of `trace`.
    pub debug: bool,
}

impl QueryOptions {
    /// Set the dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Enable or disable statement logging at `debug` level.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

/// Adds the filter methods to a builder with a `criteria` field.
macro_rules! impl_where {
    ($builder:ident) => {
        impl<'a, E: Engine> $builder<'a, E> {
            /// Add `column = value` (`IS NULL` for a null value).
            pub fn where_eq(mut self, column: impl Into<String>, value: Value) -> Self {
                self.criteria = self.criteria.eq(column, value);
                self
            }

            /// Add `column IN (values...)`.
            pub fn where_in(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
                self.criteria = self.criteria.is_in(column, values);
                self
            }

            /// Add one equality condition per key of `attrs`.
            pub fn where_attrs(mut self, attrs: &Attributes) -> Self {
                self.criteria.extend(Criteria::from_attributes(attrs));
                self
            }

            /// Add every condition of `criteria`.
            pub fn where_criteria(mut self, criteria: Criteria) -> Self {
                self.criteria.extend(criteria);
                self
            }

            /// The accumulated filter.
            pub fn criteria(&self) -> &Criteria {
                &self.criteria
            }
        }
    };
}

/// Query builder scoped to one table.
#[derive(Debug)]
pub struct TableQuery<'a, E: Engine> {
    engine: &'a E,
    table: String,
    criteria: Criteria,
    options: QueryOptions,
}

impl<'a, E: Engine> TableQuery<'a, E> {
    /// Start a query against `table`.
    pub fn new(engine: &'a E, table: impl Into<String>) -> Self {
        Self {
            engine,
            table: table.into(),
            criteria: Criteria::new(),
            options: QueryOptions::default(),
        }
    }

    /// Replace the builder options.
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Table this query targets.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every matching row.
    pub fn select(self) -> SelectQuery<'a, E> {
        SelectQuery {
            engine: self.engine,
            table: self.table,
            criteria: self.criteria,
            fields: Fields::All,
            limit: None,
            options: self.options,
        }
    }

    /// The first matching row, restricted to `fields` (all columns when empty).
    pub fn first<I, S>(self, fields: I) -> FirstQuery<'a, E>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = fields.into_iter().map(Into::into).collect();
        FirstQuery {
            engine: self.engine,
            table: self.table,
            criteria: self.criteria,
            fields: if columns.is_empty() {
                Fields::All
            } else {
                Fields::Columns(columns)
            },
            options: self.options,
        }
    }

    /// Insert one row. Filters do not apply to inserts.
    pub fn insert(self, row: Attributes) -> InsertQuery<'a, E> {
        self.insert_many(vec![row])
    }

    /// Insert several rows in one statement.
    pub fn insert_many(self, rows: Vec<Attributes>) -> InsertQuery<'a, E> {
        InsertQuery {
            engine: self.engine,
            table: self.table,
            rows,
            options: self.options,
        }
    }

    /// Update every matching row with `data`.
    pub fn update(self, data: Attributes) -> UpdateQuery<'a, E> {
        UpdateQuery {
            engine: self.engine,
            table: self.table,
            criteria: self.criteria,
            data,
            options: self.options,
        }
    }

    /// Delete every matching row.
    pub fn delete(self) -> DeleteQuery<'a, E> {
        DeleteQuery {
            engine: self.engine,
            table: self.table,
            criteria: self.criteria,
            options: self.options,
        }
    }
}

impl_where!(TableQuery);

/// Multi-row read.
#[derive(Debug)]
pub struct SelectQuery<'a, E: Engine> {
    engine: &'a E,
    table: String,
    criteria: Criteria,
    fields: Fields,
    limit: Option<usize>,
    options: QueryOptions,
}

impl<'a, E: Engine> SelectQuery<'a, E> {
    /// Restrict the returned columns.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Fields::columns(fields);
        self
    }

    /// Return at most `limit` rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The statement this builder executes.
    pub fn build(&self) -> Select {
        Select {
            table: self.table.clone(),
            criteria: self.criteria.clone(),
            fields: self.fields.clone(),
            limit: self.limit,
        }
    }

    /// Execute the read and return the matching rows.
    pub async fn execute(self, cx: &Cx) -> Outcome<Vec<Attributes>, Error> {
        let stmt = self.build();
        log_statement(
            &Statement::Select(stmt.clone()),
            self.options.dialect,
            self.options.debug,
        );
        self.engine.select(cx, &stmt).await
    }
}

impl_where!(SelectQuery);

/// Single-row read (`LIMIT 1`).
#[derive(Debug)]
pub struct FirstQuery<'a, E: Engine> {
    engine: &'a E,
    table: String,
    criteria: Criteria,
    fields: Fields,
    options: QueryOptions,
}

impl<'a, E: Engine> FirstQuery<'a, E> {
    /// The statement this builder executes.
    pub fn build(&self) -> Select {
        Select {
            table: self.table.clone(),
            criteria: self.criteria.clone(),
            fields: self.fields.clone(),
            limit: Some(1),
        }
    }

    /// Execute the read and return the first row, if any.
    pub async fn execute(self, cx: &Cx) -> Outcome<Option<Attributes>, Error> {
        let stmt = self.build();
        log_statement(
            &Statement::Select(stmt.clone()),
            self.options.dialect,
            self.options.debug,
        );
        match self.engine.select(cx, &stmt).await {
            Outcome::Ok(rows) => Outcome::Ok(rows.into_iter().next()),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

impl_where!(FirstQuery);

/// Row insert.
#[derive(Debug)]
pub struct InsertQuery<'a, E: Engine> {
    engine: &'a E,
    table: String,
    rows: Vec<Attributes>,
    options: QueryOptions,
}

impl<'a, E: Engine> InsertQuery<'a, E> {
    /// The statement this builder executes.
    pub fn build(&self) -> Insert {
        Insert {
            table: self.table.clone(),
            rows: self.rows.clone(),
        }
    }

    /// Execute the insert and return the generated id of each row, in order.
    pub async fn execute(self, cx: &Cx) -> Outcome<Vec<Value>, Error> {
        if self.rows.is_empty() {
            return Outcome::Ok(Vec::new());
        }
        let stmt = self.build();
        log_statement(
            &Statement::Insert(stmt.clone()),
            self.options.dialect,
            self.options.debug,
        );
        self.engine.insert(cx, &stmt).await
    }
}

/// Update of every matching row.
#[derive(Debug)]
pub struct UpdateQuery<'a, E: Engine> {
    engine: &'a E,
    table: String,
    criteria: Criteria,
    data: Attributes,
    options: QueryOptions,
}

impl<'a, E: Engine> UpdateQuery<'a, E> {
    /// Set one more column.
    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        self.data.insert(column.into(), value);
        self
    }

    /// The statement this builder executes.
    pub fn build(&self) -> Update {
        Update {
            table: self.table.clone(),
            criteria: self.criteria.clone(),
            data: self.data.clone(),
        }
    }

    /// Execute the update and return rows affected.
    pub async fn execute(self, cx: &Cx) -> Outcome<u64, Error> {
        if self.data.is_empty() {
            return Outcome::Ok(0);
        }
        let stmt = self.build();
        log_statement(
            &Statement::Update(stmt.clone()),
            self.options.dialect,
            self.options.debug,
        );
        self.engine.update(cx, &stmt).await
    }
}

impl_where!(UpdateQuery);

/// Delete of every matching row.
#[derive(Debug)]
pub struct DeleteQuery<'a, E: Engine> {
    engine: &'a E,
    table: String,
    criteria: Criteria,
    options: QueryOptions,
}

impl<'a, E: Engine> DeleteQuery<'a, E> {
    /// The statement this builder executes.
    pub fn build(&self) -> Delete {
        Delete {
            table: self.table.clone(),
            criteria: self.criteria.clone(),
        }
    }

    /// Execute the delete and return rows affected.
    pub async fn execute(self, cx: &Cx) -> Outcome<u64, Error> {
        let stmt = self.build();
        log_statement(
            &Statement::Delete(stmt.clone()),
            self.options.dialect,
            self.options.debug,
        );
        self.engine.delete(cx, &stmt).await
    }
}

impl_where!(DeleteQuery);

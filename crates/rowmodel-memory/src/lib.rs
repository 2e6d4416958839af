//! In-process storage engine for rowmodel.
//!
//! [`MemoryEngine`] implements the [`Engine`] contract over plain vectors of
//! rows. It assigns auto-increment ids, records every executed statement and
//! can be told to fail the next statement, which makes it the engine of choice
//! for tests and demos.
//!
//! ```ignore
//! let engine = Arc::new(MemoryEngine::new());
//! engine.seed("users", vec![row]);
//! let users = Table::builder("users", engine.clone()).build();
//! ```

// Allow `impl Future` return types in trait methods - intentional for async trait compat
#![allow(clippy::manual_async_fn)]

use std::collections::HashMap;
use std::future::Future;

use asupersync::{Cx, Outcome};
use parking_lot::Mutex;
use rowmodel_core::{
    Attributes, DbError, Delete, Engine, Error, Insert, Select, Statement, Update, Value,
};

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Attributes>>,
    statements: Vec<Statement>,
    fail_next: Option<String>,
}

impl MemoryState {
    /// Consume a pending injected failure, if any.
    fn take_failure(&mut self, stmt: &Statement) -> Option<Error> {
        let message = self.fail_next.take()?;
        tracing::debug!(
            table = stmt.table(),
            verb = stmt.verb(),
            "Injected failure for statement"
        );
        Some(Error::Db(DbError::new(message)))
    }
}

/// Thread-safe in-memory engine.
#[derive(Debug)]
pub struct MemoryEngine {
    primary_key: String,
    state: Mutex<MemoryState>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// An empty engine whose tables use `id` as primary key.
    pub fn new() -> Self {
        Self {
            primary_key: "id".to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Use `column` as the generated primary key of every table.
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Name of the generated primary key column.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Append rows to `table` as-is, without recording a statement.
    pub fn seed(&self, table: &str, rows: Vec<Attributes>) {
        let mut state = self.state.lock();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Snapshot of every row of `table`, in storage order.
    pub fn rows(&self, table: &str) -> Vec<Attributes> {
        let state = self.state.lock();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        let state = self.state.lock();
        state.tables.get(table).map_or(0, Vec::len)
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.state.lock().statements.clone()
    }

    /// Forget the recorded statements.
    pub fn clear_statements(&self) {
        self.state.lock().statements.clear();
    }

    /// Make the next statement fail with a `DB_ERROR` carrying `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    fn run_select(&self, stmt: &Select) -> Outcome<Vec<Attributes>, Error> {
        let mut state = self.state.lock();
        let recorded = Statement::Select(stmt.clone());
        if let Some(err) = state.take_failure(&recorded) {
            return Outcome::Err(err);
        }
        state.statements.push(recorded);

        let rows = state.tables.get(&stmt.table).map_or_else(Vec::new, |rows| {
            rows.iter()
                .filter(|row| stmt.criteria.matches(row))
                .take(stmt.limit.unwrap_or(usize::MAX))
                .map(|row| stmt.fields.project(row))
                .collect()
        });
        Outcome::Ok(rows)
    }

    fn run_insert(&self, stmt: &Insert) -> Outcome<Vec<Value>, Error> {
        let mut state = self.state.lock();
        let recorded = Statement::Insert(stmt.clone());
        if let Some(err) = state.take_failure(&recorded) {
            return Outcome::Err(err);
        }
        state.statements.push(recorded);

        let table = state.tables.entry(stmt.table.clone()).or_default();
        // Highest id handed out so far; the next generated one is this + 1.
        let mut last_id = table
            .iter()
            .filter_map(|row| row.get(&self.primary_key).and_then(Value::as_i64))
            .max()
            .unwrap_or(0);

        let mut rows = Vec::with_capacity(stmt.rows.len());
        let mut ids = Vec::with_capacity(stmt.rows.len());
        for row in &stmt.rows {
            let mut row = row.clone();
            let id = match row.get(&self.primary_key) {
                Some(id) if !id.is_null() => {
                    if let Some(n) = id.as_i64() {
                        last_id = last_id.max(n);
                    }
                    id.clone()
                }
                _ => {
                    let Some(next) = last_id.checked_add(1) else {
                        return Outcome::Err(Error::Db(DbError::new(format!(
                            "id space of `{}` exhausted",
                            stmt.table
                        ))));
                    };
                    last_id = next;
                    let id = Value::from(next);
                    row.insert(self.primary_key.clone(), id.clone());
                    id
                }
            };
            rows.push(row);
            ids.push(id);
        }
        table.extend(rows);
        Outcome::Ok(ids)
    }

    fn run_update(&self, stmt: &Update) -> Outcome<u64, Error> {
        let mut state = self.state.lock();
        let recorded = Statement::Update(stmt.clone());
        if let Some(err) = state.take_failure(&recorded) {
            return Outcome::Err(err);
        }
        state.statements.push(recorded);

        let mut affected = 0;
        if let Some(rows) = state.tables.get_mut(&stmt.table) {
            for row in rows.iter_mut().filter(|row| stmt.criteria.matches(row)) {
                for (column, value) in &stmt.data {
                    row.insert(column.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Outcome::Ok(affected)
    }

    fn run_delete(&self, stmt: &Delete) -> Outcome<u64, Error> {
        let mut state = self.state.lock();
        let recorded = Statement::Delete(stmt.clone());
        if let Some(err) = state.take_failure(&recorded) {
            return Outcome::Err(err);
        }
        state.statements.push(recorded);

        let mut affected = 0;
        if let Some(rows) = state.tables.get_mut(&stmt.table) {
            let before = rows.len();
            rows.retain(|row| !stmt.criteria.matches(row));
            affected = (before - rows.len()) as u64;
        }
        Outcome::Ok(affected)
    }
}

impl Engine for MemoryEngine {
    fn select(
        &self,
        _cx: &Cx,
        stmt: &Select,
    ) -> impl Future<Output = Outcome<Vec<Attributes>, Error>> + Send {
        let result = self.run_select(stmt);
        async move { result }
    }

    fn insert(
        &self,
        _cx: &Cx,
        stmt: &Insert,
    ) -> impl Future<Output = Outcome<Vec<Value>, Error>> + Send {
        let result = self.run_insert(stmt);
        async move { result }
    }

    fn update(&self, _cx: &Cx, stmt: &Update) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.run_update(stmt);
        async move { result }
    }

    fn delete(&self, _cx: &Cx, stmt: &Delete) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.run_delete(stmt);
        async move { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use rowmodel_core::{Criteria, Fields};
    use serde_json::json;

    fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => panic!("unexpected error: {e}"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    }

    fn row(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn insert(rows: Vec<Attributes>) -> Insert {
        Insert {
            table: "users".to_string(),
            rows,
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        engine.seed("users", vec![row(json!({"id": 4, "email": "x@example.com"}))]);

        rt.block_on(async {
            let ids = unwrap_outcome(
                engine
                    .insert(
                        &cx,
                        &insert(vec![
                            row(json!({"email": "a@example.com"})),
                            row(json!({"id": 10, "email": "b@example.com"})),
                            row(json!({"email": "c@example.com"})),
                        ]),
                    )
                    .await,
            );
            assert_eq!(ids, vec![json!(5), json!(10), json!(11)]);
        });
        assert_eq!(engine.row_count("users"), 4);
        assert_eq!(engine.rows("users")[1]["id"], json!(5));
    }

    #[test]
    fn test_insert_at_id_ceiling() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        engine.seed("users", vec![row(json!({"id": 1}))]);

        rt.block_on(async {
            // A supplied id at the ceiling is stored as given.
            let ids = unwrap_outcome(
                engine
                    .insert(&cx, &insert(vec![row(json!({"id": i64::MAX}))]))
                    .await,
            );
            assert_eq!(ids, vec![json!(i64::MAX)]);

            // Nothing is left to generate; the whole batch is rejected.
            match engine
                .insert(
                    &cx,
                    &insert(vec![row(json!({"id": 2})), row(json!({"email": "a@example.com"}))]),
                )
                .await
            {
                Outcome::Err(e) => {
                    assert_eq!(e.code(), rowmodel_core::DB_ERROR);
                    assert!(e.to_string().contains("exhausted"));
                }
                Outcome::Ok(ids) => panic!("expected id exhaustion, got {ids:?}"),
                Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
                Outcome::Panicked(p) => panic!("panicked: {p:?}"),
            }
        });
        assert_eq!(engine.row_count("users"), 2);
    }

    #[test]
    fn test_custom_primary_key() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new().with_primary_key("userId");

        rt.block_on(async {
            let ids = unwrap_outcome(engine.insert(&cx, &insert(vec![Attributes::new()])).await);
            assert_eq!(ids, vec![json!(1)]);
        });
        assert_eq!(engine.primary_key(), "userId");
        assert_eq!(engine.rows("users")[0], row(json!({"userId": 1})));
    }

    #[test]
    fn test_select_filters_limits_and_projects() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        engine.seed(
            "users",
            vec![
                row(json!({"id": 1, "balance": 0})),
                row(json!({"id": 2, "balance": 0})),
                row(json!({"id": 3, "balance": 9})),
            ],
        );

        rt.block_on(async {
            let stmt = Select {
                table: "users".to_string(),
                criteria: Criteria::new().eq("balance", json!(0)),
                fields: Fields::columns(["id"]),
                limit: Some(1),
            };
            let rows = unwrap_outcome(engine.select(&cx, &stmt).await);
            assert_eq!(rows, vec![row(json!({"id": 1}))]);

            let missing = Select {
                table: "nothing".to_string(),
                criteria: Criteria::new(),
                fields: Fields::All,
                limit: None,
            };
            assert!(unwrap_outcome(engine.select(&cx, &missing).await).is_empty());
        });
    }

    #[test]
    fn test_update_and_delete_report_affected_rows() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        engine.seed(
            "users",
            vec![
                row(json!({"id": 1, "balance": 0})),
                row(json!({"id": 2, "balance": 0})),
            ],
        );

        rt.block_on(async {
            let updated = unwrap_outcome(
                engine
                    .update(
                        &cx,
                        &Update {
                            table: "users".to_string(),
                            criteria: Criteria::new().eq("id", json!(2)),
                            data: row(json!({"balance": 7})),
                        },
                    )
                    .await,
            );
            assert_eq!(updated, 1);

            let deleted = unwrap_outcome(
                engine
                    .delete(
                        &cx,
                        &Delete {
                            table: "users".to_string(),
                            criteria: Criteria::new().eq("balance", json!(0)),
                        },
                    )
                    .await,
            );
            assert_eq!(deleted, 1);
        });
        assert_eq!(engine.rows("users"), vec![row(json!({"id": 2, "balance": 7}))]);
        assert_eq!(engine.statements().len(), 2);
    }

    #[test]
    fn test_fail_next_fails_once_and_is_not_recorded() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();
        let engine = MemoryEngine::new();
        engine.fail_next("");

        rt.block_on(async {
            match engine.insert(&cx, &insert(vec![Attributes::new()])).await {
                Outcome::Err(e) => {
                    assert_eq!(e.code(), rowmodel_core::DB_ERROR);
                    assert!(e.to_string().contains("a database error occurred"));
                }
                Outcome::Ok(_) => panic!("expected injected failure"),
                Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
                Outcome::Panicked(p) => panic!("panicked: {p:?}"),
            }
            unwrap_outcome(engine.insert(&cx, &insert(vec![Attributes::new()])).await);
        });
        assert_eq!(engine.row_count("users"), 1);
        assert_eq!(engine.statements().len(), 1);

        engine.clear_statements();
        assert!(engine.statements().is_empty());
    }
}

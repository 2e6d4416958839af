//! SQL rendering of structured statements.
//!
//! Engines that talk to a real server render [`Statement`]s here; the query
//! builders also render every statement they execute for the statement log.

use rowmodel_core::{Attributes, Condition, Criteria, Fields, Statement, Value};

/// SQL dialect used for placeholders and identifier quoting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// MySQL / MariaDB: `?` placeholders, backtick identifiers.
    #[default]
    MySql,
    /// PostgreSQL: `$n` placeholders, double-quoted identifiers.
    Postgres,
    /// SQLite: `?n` placeholders, double-quoted identifiers.
    Sqlite,
}

impl Dialect {
    /// Placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
        }
    }

    /// Quote an identifier, escaping embedded quote characters.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSql {
    /// Statement text with placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

struct Renderer {
    dialect: Dialect,
    params: Vec<Value>,
}

impl Renderer {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn where_clause(&mut self, criteria: &Criteria) -> String {
        if criteria.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = criteria
            .conditions()
            .iter()
            .map(|condition| self.condition(condition))
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Eq { column, value } if value.is_null() => {
                format!("{} IS NULL", self.ident(column))
            }
            Condition::Eq { column, value } => {
                let column = self.ident(column);
                let placeholder = self.bind(value.clone());
                format!("{column} = {placeholder}")
            }
            // An empty IN list matches nothing.
            Condition::In { values, .. } if values.is_empty() => "1 = 0".to_string(),
            Condition::In { column, values } => {
                let column = self.ident(column);
                let placeholders: Vec<String> =
                    values.iter().map(|v| self.bind(v.clone())).collect();
                format!("{column} IN ({})", placeholders.join(", "))
            }
        }
    }

    fn columns(&self, fields: &Fields) -> String {
        match fields {
            Fields::All => "*".to_string(),
            Fields::Columns(columns) if columns.is_empty() => "*".to_string(),
            Fields::Columns(columns) => columns
                .iter()
                .map(|c| self.ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn insert(&mut self, table: &str, rows: &[Attributes]) -> String {
        // Union of every row's keys, in first-seen order.
        let mut columns: Vec<&str> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }

        let table = self.ident(table);
        if columns.is_empty() {
            return match self.dialect {
                Dialect::MySql => format!("INSERT INTO {table} () VALUES ()"),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("INSERT INTO {table} DEFAULT VALUES")
                }
            };
        }

        let column_list = columns
            .iter()
            .map(|c| self.ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let values: Vec<String> = columns
                    .iter()
                    .map(|column| match row.get(*column) {
                        Some(value) => self.bind(value.clone()),
                        None => "DEFAULT".to_string(),
                    })
                    .collect();
                format!("({})", values.join(", "))
            })
            .collect();

        format!(
            "INSERT INTO {table} ({column_list}) VALUES {}",
            tuples.join(", ")
        )
    }
}

/// Render `stmt` for `dialect`.
pub fn render(stmt: &Statement, dialect: Dialect) -> RenderedSql {
    let mut r = Renderer::new(dialect);
    let sql = match stmt {
        Statement::Select(select) => {
            let mut sql = format!(
                "SELECT {} FROM {}",
                r.columns(&select.fields),
                r.ident(&select.table)
            );
            sql.push_str(&r.where_clause(&select.criteria));
            if let Some(limit) = select.limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }
            sql
        }
        Statement::Insert(insert) => r.insert(&insert.table, &insert.rows),
        Statement::Update(update) => {
            let assignments: Vec<String> = update
                .data
                .iter()
                .map(|(column, value)| {
                    let column = r.ident(column);
                    let placeholder = r.bind(value.clone());
                    format!("{column} = {placeholder}")
                })
                .collect();
            let mut sql = format!(
                "UPDATE {} SET {}",
                r.ident(&update.table),
                assignments.join(", ")
            );
            sql.push_str(&r.where_clause(&update.criteria));
            sql
        }
        Statement::Delete(delete) => {
            let mut sql = format!("DELETE FROM {}", r.ident(&delete.table));
            sql.push_str(&r.where_clause(&delete.criteria));
            sql
        }
    };
    RenderedSql {
        sql,
        params: r.params,
    }
}

/// Emit the rendered statement to the log: `debug` when statement logging is
/// enabled, `trace` otherwise.
pub fn log_statement(stmt: &Statement, dialect: Dialect, debug: bool) {
    let enabled = if debug {
        tracing::enabled!(tracing::Level::DEBUG)
    } else {
        tracing::enabled!(tracing::Level::TRACE)
    };
    if !enabled {
        return;
    }

    let rendered = render(stmt, dialect);
    let params = Value::Array(rendered.params);
    if debug {
        tracing::debug!(
            table = stmt.table(),
            verb = stmt.verb(),
            sql = %rendered.sql,
            params = %params,
            "Executing statement"
        );
    } else {
        tracing::trace!(
            table = stmt.table(),
            verb = stmt.verb(),
            sql = %rendered.sql,
            params = %params,
            "Executing statement"
        );
    }
}

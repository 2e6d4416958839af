//! Structured statements handed to an [`Engine`](crate::Engine).
//!
//! Statements are engine-agnostic: a SQL engine renders them (see
//! `rowmodel-query`'s `sql` module), an in-process engine interprets them
//! directly.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::attributes::Attributes;

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Condition {
    /// `column = value` (`column IS NULL` when `value` is null).
    Eq {
        /// Column name.
        column: String,
        /// Value to compare against.
        value: Value,
    },
    /// `column IN (values...)`.
    In {
        /// Column name.
        column: String,
        /// Candidate values.
        values: Vec<Value>,
    },
}

impl Condition {
    /// Column this condition applies to.
    pub fn column(&self) -> &str {
        match self {
            Condition::Eq { column, .. } | Condition::In { column, .. } => column,
        }
    }

    /// Evaluate the condition against one row.
    pub fn matches(&self, row: &Attributes) -> bool {
        let actual = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Condition::Eq { value, .. } => values_equal(actual, value),
            Condition::In { values, .. } => values.iter().any(|v| values_equal(actual, v)),
        }
    }
}

/// Compare two values the way a database compares column values: numbers by
/// numeric value regardless of integer/float representation.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Conjunction of conditions scoping a statement. Empty criteria match every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Criteria {
    conditions: Vec<Condition>,
}

impl Criteria {
    /// Criteria matching every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// One equality condition per key of `attrs`.
    pub fn from_attributes(attrs: &Attributes) -> Self {
        let mut criteria = Self::new();
        for (column, value) in attrs {
            criteria.push(Condition::Eq {
                column: column.clone(),
                value: value.clone(),
            });
        }
        criteria
    }

    /// Add an equality condition.
    pub fn eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.push(Condition::Eq {
            column: column.into(),
            value,
        });
        self
    }

    /// Add an `IN` condition.
    pub fn is_in(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.push(Condition::In {
            column: column.into(),
            values,
        });
        self
    }

    /// Append a condition.
    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Append every condition of `other`.
    pub fn extend(&mut self, other: Criteria) {
        self.conditions.extend(other.conditions);
    }

    /// The conditions in order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `row` satisfies every condition.
    pub fn matches(&self, row: &Attributes) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// JSON rendering used in diagnostics.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for condition in &self.conditions {
            match condition {
                Condition::Eq { column, value } => {
                    map.insert(column.clone(), value.clone());
                }
                Condition::In { column, values } => {
                    let mut inner = Map::new();
                    inner.insert("in".to_string(), Value::Array(values.clone()));
                    map.insert(column.clone(), Value::Object(inner));
                }
            }
        }
        Value::Object(map)
    }
}

/// Columns returned by a select.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fields {
    /// `*`
    #[default]
    All,
    /// An explicit column list.
    Columns(Vec<String>),
}

impl Fields {
    /// Select only the given columns.
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fields::Columns(columns.into_iter().map(Into::into).collect())
    }

    /// Keep only the selected columns of `row`.
    pub fn project(&self, row: &Attributes) -> Attributes {
        match self {
            Fields::All => row.clone(),
            Fields::Columns(columns) => columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
        }
    }
}

/// Filtered read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Select {
    /// Table name.
    pub table: String,
    /// Row filter.
    pub criteria: Criteria,
    /// Returned columns.
    pub fields: Fields,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

/// Insert of one or more rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insert {
    /// Table name.
    pub table: String,
    /// Rows to insert, in order.
    pub rows: Vec<Attributes>,
}

/// Update of every row matching the criteria.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    /// Table name.
    pub table: String,
    /// Row filter.
    pub criteria: Criteria,
    /// Column values to write.
    pub data: Attributes,
}

/// Delete of every row matching the criteria.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delete {
    /// Table name.
    pub table: String,
    /// Row filter.
    pub criteria: Criteria,
}

/// Any statement, used for logging and statement capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Statement {
    /// A read.
    Select(Select),
    /// An insert.
    Insert(Insert),
    /// An update.
    Update(Update),
    /// A delete.
    Delete(Delete),
}

impl Statement {
    /// Table the statement targets.
    pub fn table(&self) -> &str {
        match self {
            Statement::Select(s) => &s.table,
            Statement::Insert(s) => &s.table,
            Statement::Update(s) => &s.table,
            Statement::Delete(s) => &s.table,
        }
    }

    /// Whether the statement writes.
    pub fn is_write(&self) -> bool {
        !matches!(self, Statement::Select(_))
    }

    /// Short verb for logs.
    pub fn verb(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }
}

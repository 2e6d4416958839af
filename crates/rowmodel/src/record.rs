//! Records: one row's attributes plus its persistence lifecycle.
//!
//! A [`Record`] starts out either *new* (built from fresh data) or *persisted*
//! (built from a fetched row). `save`, `upsert` and `hydrate` move a new record
//! to persisted; nothing moves it back. `destroy` deletes the row but leaves
//! the record populated and usable.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use asupersync::{Cx, Outcome};
use rowmodel_core::{Attributes, Engine, Error, Result, Value, attributes};
use serde::{Serialize, Serializer};

use crate::hooks::{HookEvent, Timing};
use crate::table::{Table, TableCore};

/// Stable identity of one in-memory record.
///
/// Keys are unique for the lifetime of the process and never reused, so two
/// records holding identical attributes are still told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(u64);

impl RecordKey {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RecordKey(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw key value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A table-specific record type.
///
/// Tables build rows into any `Entity`; a newtype around [`Record`] adds its
/// own methods while keeping the shared persistence operations reachable
/// through [`Entity::record_mut`].
///
/// ```ignore
/// struct UserRecord(Record<MemoryEngine>);
///
/// impl Entity for UserRecord {
///     type Engine = MemoryEngine;
///     fn from_record(record: Record<MemoryEngine>) -> Self { UserRecord(record) }
///     fn record(&self) -> &Record<MemoryEngine> { &self.0 }
///     fn record_mut(&mut self) -> &mut Record<MemoryEngine> { &mut self.0 }
///     fn into_record(self) -> Record<MemoryEngine> { self.0 }
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    /// Engine of the table this entity belongs to.
    type Engine: Engine + 'static;

    /// Wrap a freshly built record.
    fn from_record(record: Record<Self::Engine>) -> Self;

    /// The wrapped record.
    fn record(&self) -> &Record<Self::Engine>;

    /// The wrapped record, mutably.
    fn record_mut(&mut self) -> &mut Record<Self::Engine>;

    /// Unwrap the record.
    fn into_record(self) -> Record<Self::Engine>;

    /// Identity of the wrapped record.
    fn key(&self) -> RecordKey {
        self.record().key()
    }

    /// Attributes of the wrapped record.
    fn attributes(&self) -> &Attributes {
        self.record().attributes()
    }
}

/// One row of a table.
pub struct Record<E: Engine> {
    table: Arc<TableCore<E>>,
    attributes: Attributes,
    is_new: bool,
    key: RecordKey,
}

impl<E: Engine + 'static> Entity for Record<E> {
    type Engine = E;

    fn from_record(record: Record<E>) -> Self {
        record
    }

    fn record(&self) -> &Record<E> {
        self
    }

    fn record_mut(&mut self) -> &mut Record<E> {
        self
    }

    fn into_record(self) -> Record<E> {
        self
    }
}

impl<E: Engine> fmt::Debug for Record<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.table.name)
            .field("key", &self.key)
            .field("is_new", &self.is_new)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl<E: Engine> Serialize for Record<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}

impl<E: Engine> Record<E> {
    pub(crate) fn new(table: Arc<TableCore<E>>, attributes: Attributes, is_new: bool) -> Self {
        Self {
            table,
            attributes,
            is_new,
            key: RecordKey::next(),
        }
    }

    /// Handle to the owning table.
    pub fn table(&self) -> Table<E> {
        Table::from_core(Arc::clone(&self.table))
    }

    /// Identity of this record.
    pub fn key(&self) -> RecordKey {
        self.key
    }

    /// Whether the record has not been persisted yet.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Name of the id attribute.
    pub fn id_attr(&self) -> &str {
        &self.table.id_attr
    }

    /// Value of the id attribute.
    pub fn id(&self) -> Option<&Value> {
        self.attributes.get(&self.table.id_attr)
    }

    /// `{id_attr: id}`, the filter scoping writes to this row.
    pub fn id_query(&self) -> Result<Attributes> {
        match self.id() {
            Some(id) if !id.is_null() => {
                let mut query = Attributes::new();
                query.insert(self.table.id_attr.clone(), id.clone());
                Ok(query)
            }
            _ => Err(Error::invalid_argument(format!(
                "record of `{}` has no `{}`",
                self.table.name, self.table.id_attr
            ))),
        }
    }

    /// The whole attribute bag.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The whole attribute bag.
    pub fn get(&self) -> &Attributes {
        &self.attributes
    }

    /// Value at a dotted path such as `profile.name` or `tags[0]`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        attributes::get_path(&self.attributes, path)
    }

    /// Value at `path`, or `default` when absent.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get_path(path).cloned().unwrap_or(default)
    }

    /// Set the value at `path`, creating intermediate objects and arrays.
    /// Falsy values (`0`, `false`, `""`, `null`) are stored as given.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        attributes::set_path(&mut self.attributes, path, value)
    }

    /// Shallow-merge `data` into the attributes.
    pub fn merge(&mut self, data: Attributes) {
        attributes::merge(&mut self.attributes, data);
    }

    /// Merge an untyped value: objects are shallow-merged, anything else is
    /// rejected.
    pub fn assign(&mut self, value: Value) -> Result<()> {
        match value {
            Value::Object(data) => {
                self.merge(data);
                Ok(())
            }
            other => Err(Error::invalid_argument(format!(
                "cannot assign a non-object value to a record: {other}"
            ))),
        }
    }

    /// Absorb `data` from the server and mark the record persisted.
    pub fn hydrate(&mut self, data: Attributes) {
        self.merge(data);
        self.is_new = false;
    }

    /// Validate the attributes against the schema without changing anything.
    pub fn validate(&self) -> Result<Attributes> {
        self.table.validate(&self.attributes)
    }

    /// Validate and coerce the attributes in place. On failure nothing is
    /// merged.
    pub fn cast(&mut self) -> Result<()> {
        let cast = self.table.validate(&self.attributes)?;
        self.merge(cast);
        Ok(())
    }

    /// Deep copy of the attributes.
    pub fn to_json(&self) -> Value {
        attributes::to_json(&self.attributes)
    }

    /// [`to_json`](Self::to_json) without the table's insecure keys.
    pub fn render_secure(&self) -> Value {
        let mut secure = self.attributes.clone();
        for key in &self.table.insecure_keys {
            secure.remove(key);
        }
        Value::Object(secure)
    }

    /// Insert a new record, or update a persisted one.
    ///
    /// For a new record: run the before-save hooks, merge their patches,
    /// cast, insert, then take the id from the first generated id.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(table = %self.table.name, key = %self.key, is_new = self.is_new)
    )]
    pub async fn save(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if !self.is_new {
            return self.update(cx, None).await;
        }

        let ctx = self
            .table
            .hook_context(Timing::Before, HookEvent::Save, self.is_new, &self.attributes);
        let patches = match self.table.run_hooks(Timing::Before, HookEvent::Save, &ctx).await {
            Outcome::Ok(patches) => patches,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        for patch in patches {
            self.merge(patch);
        }

        if let Err(e) = self.cast() {
            tracing::debug!(error = %e, "Cast failed, record not saved");
            return Outcome::Err(e);
        }

        let ids = match self
            .table
            .query()
            .insert(self.attributes.clone())
            .execute(cx)
            .await
        {
            Outcome::Ok(ids) => ids,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        self.is_new = false;
        if let Some(id) = ids.into_iter().next() {
            self.attributes.insert(self.table.id_attr.clone(), id);
        }
        tracing::info!(table = %self.table.name, id = ?self.id(), "Record inserted");
        Outcome::Ok(())
    }

    /// Merge `data` (if any), cast, and write the attributes to this row.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.table.name, key = %self.key))]
    pub async fn update(&mut self, cx: &Cx, data: Option<Attributes>) -> Outcome<(), Error> {
        if let Some(data) = data {
            self.merge(data);
        }
        if let Err(e) = self.cast() {
            return Outcome::Err(e);
        }
        let id_query = match self.id_query() {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };

        match self
            .table
            .query()
            .where_attrs(&id_query)
            .update(self.attributes.clone())
            .execute(cx)
            .await
        {
            Outcome::Ok(affected) => {
                tracing::debug!(affected, "Record updated");
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run the before-upsert hooks, upsert the attributes through the table
    /// (looking up by `query`, or by the attributes themselves), and hydrate
    /// the refreshed row.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.table.name, key = %self.key))]
    pub async fn upsert(&mut self, cx: &Cx, query: Option<&Attributes>) -> Outcome<(), Error> {
        let ctx = self.table.hook_context(
            Timing::Before,
            HookEvent::Upsert,
            self.is_new,
            &self.attributes,
        );
        let patches = match self
            .table
            .run_hooks(Timing::Before, HookEvent::Upsert, &ctx)
            .await
        {
            Outcome::Ok(patches) => patches,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        for patch in patches {
            self.merge(patch);
        }

        match self.table.upsert(cx, &self.attributes, query).await {
            Outcome::Ok(row) => {
                self.hydrate(row);
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Delete this row. A new record has no row: nothing is issued.
    ///
    /// The record keeps its attributes afterwards.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.table.name, key = %self.key))]
    pub async fn destroy(&mut self, cx: &Cx) -> Outcome<(), Error> {
        if self.is_new {
            return Outcome::Ok(());
        }
        let id_query = match self.id_query() {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };
        match self
            .table
            .query()
            .where_attrs(&id_query)
            .delete()
            .execute(cx)
            .await
        {
            Outcome::Ok(affected) => {
                tracing::debug!(affected, "Record destroyed");
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Hydrate from the first row matching `query` (default: the current
    /// attributes), or save when there is none.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.table.name, key = %self.key))]
    pub async fn find_or_create(
        &mut self,
        cx: &Cx,
        query: Option<&Attributes>,
    ) -> Outcome<(), Error> {
        let lookup = query.cloned().unwrap_or_else(|| self.attributes.clone());
        match self.table.first_row(cx, &lookup).await {
            Outcome::Ok(Some(row)) => {
                self.hydrate(row);
                Outcome::Ok(())
            }
            Outcome::Ok(None) => self.save(cx).await,
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmodel_memory::MemoryEngine;
    use rowmodel_schema::field;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn users() -> Table<MemoryEngine> {
        Table::builder("users", Arc::new(MemoryEngine::new()))
            .field("id", field::number())
            .field("email", field::string())
            .field("balance", field::number().default_value(json!(0)))
            .insecure_keys(["password", "salt"])
            .build()
    }

    #[test]
    fn test_record_keys_are_unique() {
        let table = users();
        let a = table.build(attrs(json!({"email": "a@example.com"})));
        let b = table.build(attrs(json!({"email": "a@example.com"})));
        assert_ne!(a.key(), b.key());
        assert_eq!(a.attributes(), b.attributes());
    }

    #[test]
    fn test_get_and_set_paths() {
        let table = users();
        let mut record = table.build(attrs(json!({"profile": {"name": "Ann"}})));
        assert_eq!(record.get_path("profile.name"), Some(&json!("Ann")));
        assert_eq!(record.get_or("profile.age", json!(30)), json!(30));

        record.set("profile.age", json!(0)).unwrap();
        record.set("tags[1]", json!(false)).unwrap();
        assert_eq!(record.get_path("profile.age"), Some(&json!(0)));
        assert_eq!(record.get()["tags"], json!([null, false]));

        let err = record.set("", json!(1)).unwrap_err();
        assert_eq!(err.code(), rowmodel_core::INVALID_ARGUMENT);
    }

    #[test]
    fn test_assign_merges_objects_only() {
        let table = users();
        let mut record = table.build(attrs(json!({"email": "a@example.com", "balance": 2})));
        record.assign(json!({"balance": 5, "extra": true})).unwrap();
        assert_eq!(
            record.to_json(),
            json!({"email": "a@example.com", "balance": 5, "extra": true})
        );

        let err = record.assign(json!(["balance", 5])).unwrap_err();
        assert_eq!(err.code(), rowmodel_core::INVALID_ARGUMENT);
        assert_eq!(record.get()["balance"], json!(5));
    }

    #[test]
    fn test_hydrate_marks_persisted() {
        let table = users();
        let mut record = table.build(attrs(json!({"email": "a@example.com"})));
        record.hydrate(attrs(json!({"id": 9})));
        assert!(!record.is_new());
        assert_eq!(record.id(), Some(&json!(9)));
        assert_eq!(record.id_query().unwrap(), attrs(json!({"id": 9})));
    }

    #[test]
    fn test_id_query_requires_an_id() {
        let table = users();
        let record = table.build(Attributes::new());
        assert_eq!(
            record.id_query().unwrap_err().code(),
            rowmodel_core::INVALID_ARGUMENT
        );
    }

    #[test]
    fn test_cast_merges_or_leaves_untouched() {
        let table = users();
        let mut record = table.build(attrs(json!({"email": "a@example.com", "nickname": "a"})));
        record.cast().unwrap();
        assert_eq!(
            record.to_json(),
            json!({"email": "a@example.com", "nickname": "a", "balance": 0})
        );

        let mut bad = table.build(attrs(json!({"email": "b@example.com", "id": "seven"})));
        let before = bad.to_json();
        assert!(bad.cast().is_err());
        assert_eq!(bad.to_json(), before);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_render_secure_omits_insecure_keys() {
        let table = users();
        let record = table.build(attrs(json!({
            "email": "a@example.com",
            "password": "hash"
        })));
        assert_eq!(record.render_secure(), json!({"email": "a@example.com"}));
        assert_eq!(record.to_json()["password"], json!("hash"));
    }

    #[test]
    fn test_serialize_and_debug() {
        let table = users();
        let record = table.build_persisted(attrs(json!({"id": 1})));
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({"id": 1}));
        let rendered = format!("{record:?}");
        assert!(rendered.contains("users"));
        assert!(rendered.contains("is_new: false"));
        assert_eq!(record.table().name(), "users");
    }
}

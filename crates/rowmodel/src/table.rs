//! Tables: schema, hooks and query sugar for one database table.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use asupersync::{Cx, Outcome};
use rowmodel_core::{Attributes, Criteria, Engine, Error, Result, Value};
use rowmodel_query::{
    DeleteQuery, Dialect, FirstQuery, InsertQuery, QueryOptions, TableQuery, UpdateQuery,
};
use rowmodel_schema::{Field, Schema, SchemaValidator, ValidationOptions, Validator};

use crate::hooks::{self, HookContext, HookEvent, HookFuture, HookRegistry, Timing};
use crate::record::{Entity, Record};
use crate::result_set::ResultSet;

/// State shared by a table handle and every record built from it.
pub(crate) struct TableCore<E> {
    pub(crate) name: String,
    pub(crate) id_attr: String,
    pub(crate) schema: Schema,
    pub(crate) insecure_keys: Vec<String>,
    pub(crate) hooks: HookRegistry,
    pub(crate) validator: Arc<dyn Validator>,
    pub(crate) validation_options: ValidationOptions,
    pub(crate) engine: Arc<E>,
    pub(crate) query_options: QueryOptions,
}

impl<E> fmt::Debug for TableCore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableCore")
            .field("name", &self.name)
            .field("id_attr", &self.id_attr)
            .field("fields", &self.schema.names())
            .field("insecure_keys", &self.insecure_keys)
            .field("hooks", &self.hooks)
            .field("validation_options", &self.validation_options)
            .field("query_options", &self.query_options)
            .finish_non_exhaustive()
    }
}

impl<E: Engine> TableCore<E> {
    pub(crate) fn query(&self) -> TableQuery<'_, E> {
        TableQuery::new(&*self.engine, self.name.as_str()).with_options(self.query_options)
    }

    pub(crate) fn validate(&self, attrs: &Attributes) -> Result<Attributes> {
        self.validator
            .validate(attrs, &self.schema, &self.validation_options)
            .map_err(Error::from)
    }

    pub(crate) fn hook_context(
        &self,
        timing: Timing,
        event: HookEvent,
        is_new: bool,
        attributes: &Attributes,
    ) -> HookContext {
        HookContext {
            table: self.name.clone(),
            event,
            timing,
            is_new,
            attributes: attributes.clone(),
        }
    }

    pub(crate) async fn run_hooks(
        &self,
        timing: Timing,
        event: HookEvent,
        ctx: &HookContext,
    ) -> Outcome<Vec<Attributes>, Error> {
        let pending = self.hooks.generate(timing, event, ctx);
        if pending.is_empty() {
            return Outcome::Ok(Vec::new());
        }
        tracing::debug!(
            table = %self.name,
            timing = %timing,
            event = %event,
            handlers = pending.len(),
            "Running hooks"
        );
        hooks::run_all(pending).await
    }

    pub(crate) async fn first_row(
        &self,
        cx: &Cx,
        query: &Attributes,
    ) -> Outcome<Option<Attributes>, Error> {
        self.query()
            .where_attrs(query)
            .first(Vec::<String>::new())
            .execute(cx)
            .await
    }

    /// Single-row re-read after a write; an empty result is a database error.
    async fn reread(&self, cx: &Cx, criteria: Criteria) -> Outcome<Attributes, Error> {
        let diagnostic = criteria.to_json();
        match self
            .query()
            .where_criteria(criteria)
            .first(Vec::<String>::new())
            .execute(cx)
            .await
        {
            Outcome::Ok(Some(row)) => Outcome::Ok(row),
            Outcome::Ok(None) => Outcome::Err(Error::Db(
                rowmodel_core::DbError::new(format!(
                    "written row of `{}` could not be re-read",
                    self.name
                ))
                .with_results(diagnostic),
            )),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    pub(crate) async fn upsert(
        &self,
        cx: &Cx,
        record: &Attributes,
        query: Option<&Attributes>,
    ) -> Outcome<Attributes, Error> {
        let lookup = query.unwrap_or(record);
        let existing = match self
            .query()
            .where_attrs(lookup)
            .first([self.id_attr.as_str()])
            .execute(cx)
            .await
        {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        if let Some(row) = existing {
            let id = row.get(&self.id_attr).cloned().unwrap_or(Value::Null);
            tracing::debug!(table = %self.name, id = %id, "Upsert matched an existing row");
            match self
                .query()
                .where_eq(self.id_attr.as_str(), id.clone())
                .update(record.clone())
                .execute(cx)
                .await
            {
                Outcome::Ok(_) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
            return self
                .reread(cx, Criteria::new().eq(self.id_attr.as_str(), id))
                .await;
        }

        tracing::debug!(table = %self.name, "Upsert found no row, inserting");
        let ids = match self.query().insert(record.clone()).execute(cx).await {
            Outcome::Ok(ids) => ids,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        self.reread(cx, Criteria::new().is_in(self.id_attr.as_str(), ids))
            .await
    }
}

/// Handle to one database table.
///
/// Cheap to clone: every clone and every record built from it share the same
/// schema, hooks and engine. `R` is the record type rows are built into.
pub struct Table<E: Engine, R = Record<E>> {
    core: Arc<TableCore<E>>,
    _entity: PhantomData<fn() -> R>,
}

impl<E: Engine, R> Clone for Table<E, R> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _entity: PhantomData,
        }
    }
}

impl<E: Engine, R> fmt::Debug for Table<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("core", &self.core)
            .field("entity", &std::any::type_name::<R>())
            .finish()
    }
}

impl<E: Engine> Table<E> {
    /// Start building a table named `name` on `engine`.
    pub fn builder(name: impl Into<String>, engine: Arc<E>) -> TableBuilder<E> {
        TableBuilder::new(name, engine)
    }
}

impl<E: Engine, R> Table<E, R> {
    pub(crate) fn from_core(core: Arc<TableCore<E>>) -> Self {
        Self {
            core,
            _entity: PhantomData,
        }
    }

    pub(crate) fn core(&self) -> &Arc<TableCore<E>> {
        &self.core
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Name of the id attribute.
    pub fn id_attr(&self) -> &str {
        &self.core.id_attr
    }

    /// Field descriptors.
    pub fn schema(&self) -> &Schema {
        &self.core.schema
    }

    /// Keys omitted from secure rendering.
    pub fn insecure_keys(&self) -> &[String] {
        &self.core.insecure_keys
    }

    /// Registered hooks.
    pub fn hooks(&self) -> &HookRegistry {
        &self.core.hooks
    }

    /// Options every validation pass uses.
    pub fn validation_options(&self) -> &ValidationOptions {
        &self.core.validation_options
    }

    /// The engine statements run through.
    pub fn engine(&self) -> &Arc<E> {
        &self.core.engine
    }

    /// The same table, building plain [`Record`]s.
    pub fn records(&self) -> Table<E> {
        Table::from_core(Arc::clone(&self.core))
    }

    /// Raw query builder scoped to this table.
    pub fn query(&self) -> TableQuery<'_, E> {
        self.core.query()
    }

    /// Raw single-row read of `fields` (every column when empty).
    pub fn first<I, S>(&self, fields: I) -> FirstQuery<'_, E>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query().first(fields)
    }

    /// Raw insert. No validation, no hooks.
    pub fn insert(&self, data: Attributes) -> InsertQuery<'_, E> {
        self.query().insert(data)
    }

    /// Raw update; scope it with `where_*` before executing.
    pub fn update(&self, data: Attributes) -> UpdateQuery<'_, E> {
        self.query().update(data)
    }

    /// Raw delete; scope it with `where_*` before executing.
    pub fn destroy(&self) -> DeleteQuery<'_, E> {
        self.query().delete()
    }

    /// Validate `attributes` against the schema without touching any record.
    pub fn validate(&self, attributes: &Attributes) -> Result<Attributes> {
        self.core.validate(attributes)
    }

    /// One pending operation per handler of `(timing, event)`, bound to `ctx`.
    pub fn generate_hooks(
        &self,
        timing: Timing,
        event: HookEvent,
        ctx: &HookContext,
    ) -> Vec<HookFuture> {
        self.core.hooks.generate(timing, event, ctx)
    }

    /// Run every handler of `(timing, event)` concurrently, failing fast.
    pub async fn run_hooks(
        &self,
        timing: Timing,
        event: HookEvent,
        ctx: &HookContext,
    ) -> Outcome<Vec<Attributes>, Error> {
        self.core.run_hooks(timing, event, ctx).await
    }

    /// Look up one row by `query` (or `record` itself), then update it by id or
    /// insert `record`, and return the row as re-read from the engine.
    ///
    /// The lookup and the write are separate statements: two concurrent
    /// upserts of the same key can both insert. Rely on a uniqueness
    /// constraint in the database when that matters.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.core.name))]
    pub async fn upsert(
        &self,
        cx: &Cx,
        record: &Attributes,
        query: Option<&Attributes>,
    ) -> Outcome<Attributes, Error> {
        self.core.upsert(cx, record, query).await
    }
}

impl<E: Engine, R: Entity<Engine = E>> Table<E, R> {
    /// Wrap `data` as a new, unsaved record.
    pub fn build(&self, data: Attributes) -> R {
        R::from_record(Record::new(Arc::clone(&self.core), data, true))
    }

    /// Wrap `data` as a record that already exists in the table.
    pub fn build_persisted(&self, data: Attributes) -> R {
        R::from_record(Record::new(Arc::clone(&self.core), data, false))
    }

    /// Every row matching `query`, as persisted records.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.core.name))]
    pub async fn find(&self, cx: &Cx, query: &Attributes) -> Outcome<ResultSet<R>, Error> {
        self.find_where(cx, Criteria::from_attributes(query)).await
    }

    /// Every row matching `criteria`, as persisted records.
    pub async fn find_where(&self, cx: &Cx, criteria: Criteria) -> Outcome<ResultSet<R>, Error> {
        match self.query().where_criteria(criteria).select().execute(cx).await {
            Outcome::Ok(rows) => {
                tracing::debug!(table = %self.core.name, rows = rows.len(), "Found rows");
                Outcome::Ok(ResultSet::new(
                    rows.into_iter().map(|row| self.build_persisted(row)).collect(),
                ))
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// The first row matching `query`.
    ///
    /// No match is `None`, or a `NOT_FOUND` error carrying the query when
    /// `throw_if_not_found` is set.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.core.name))]
    pub async fn find_one(
        &self,
        cx: &Cx,
        query: &Attributes,
        throw_if_not_found: bool,
    ) -> Outcome<Option<R>, Error> {
        match self.core.first_row(cx, query).await {
            Outcome::Ok(Some(row)) => Outcome::Ok(Some(self.build_persisted(row))),
            Outcome::Ok(None) if throw_if_not_found => {
                Outcome::Err(Error::not_found(Value::Object(query.clone())))
            }
            Outcome::Ok(None) => Outcome::Ok(None),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

/// Builder for a [`Table`]. Hooks can only be registered here.
pub struct TableBuilder<E: Engine, R = Record<E>> {
    name: String,
    id_attr: String,
    schema: Schema,
    insecure_keys: Vec<String>,
    hooks: HookRegistry,
    validator: Arc<dyn Validator>,
    validation_options: ValidationOptions,
    engine: Arc<E>,
    query_options: QueryOptions,
    _entity: PhantomData<fn() -> R>,
}

impl<E: Engine> TableBuilder<E> {
    /// A builder for table `name` with id attribute `id`, an empty schema and
    /// the built-in validator.
    pub fn new(name: impl Into<String>, engine: Arc<E>) -> Self {
        Self {
            name: name.into(),
            id_attr: "id".to_string(),
            schema: Schema::new(),
            insecure_keys: Vec::new(),
            hooks: HookRegistry::new(),
            validator: Arc::new(SchemaValidator),
            validation_options: ValidationOptions::default(),
            engine,
            query_options: QueryOptions::default(),
            _entity: PhantomData,
        }
    }
}

impl<E: Engine, R> TableBuilder<E, R> {
    /// Use `id_attr` as the id attribute.
    pub fn id_attr(mut self, id_attr: impl Into<String>) -> Self {
        self.id_attr = id_attr.into();
        self
    }

    /// Replace the whole schema.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Add (or replace) one field descriptor.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.schema.insert(name, field);
        self
    }

    /// Keys omitted from secure rendering.
    pub fn insecure_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insecure_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Use a custom validator instead of [`SchemaValidator`].
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Options every validation pass uses.
    pub fn validation_options(mut self, options: ValidationOptions) -> Self {
        self.validation_options = options;
        self
    }

    /// Dialect used to render logged statements.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.query_options = self.query_options.dialect(dialect);
        self
    }

    /// Log rendered statements at `debug` level.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.query_options = self.query_options.debug(enabled);
        self
    }

    /// Append a handler that runs before `event`.
    pub fn before<F, Fut>(mut self, event: HookEvent, f: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Outcome<Attributes, Error>> + Send + 'static,
    {
        self.hooks
            .register(Timing::Before, event, hooks::handler(f));
        self
    }

    /// Append a handler that runs after `event`.
    ///
    /// After-hooks are stored but no operation dispatches them.
    pub fn after<F, Fut>(mut self, event: HookEvent, f: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Outcome<Attributes, Error>> + Send + 'static,
    {
        self.hooks.register(Timing::After, event, hooks::handler(f));
        self
    }

    /// Build rows into `R2` instead.
    pub fn entity<R2>(self) -> TableBuilder<E, R2>
    where
        R2: Entity<Engine = E>,
    {
        TableBuilder {
            name: self.name,
            id_attr: self.id_attr,
            schema: self.schema,
            insecure_keys: self.insecure_keys,
            hooks: self.hooks,
            validator: self.validator,
            validation_options: self.validation_options,
            engine: self.engine,
            query_options: self.query_options,
            _entity: PhantomData,
        }
    }

    /// Freeze the descriptor and hooks into a table handle.
    pub fn build(self) -> Table<E, R> {
        tracing::debug!(
            table = %self.name,
            id_attr = %self.id_attr,
            fields = self.schema.len(),
            "Built table"
        );
        Table::from_core(Arc::new(TableCore {
            name: self.name,
            id_attr: self.id_attr,
            schema: self.schema,
            insecure_keys: self.insecure_keys,
            hooks: self.hooks,
            validator: self.validator,
            validation_options: self.validation_options,
            engine: self.engine,
            query_options: self.query_options,
        }))
    }
}

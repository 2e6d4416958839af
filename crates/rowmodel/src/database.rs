//! Explicit table registry over one shared engine.
//!
//! A [`Database`] replaces process-wide table singletons: it owns the engine
//! and the bootstrap configuration, hands out pre-wired [`TableBuilder`]s, and
//! keeps built tables addressable by name.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rowmodel_core::{DbConfig, Engine, Error, Result};

use crate::record::{Entity, Record};
use crate::table::{Table, TableBuilder, TableCore};

struct Registered<E> {
    core: Arc<TableCore<E>>,
    handle: Box<dyn Any + Send + Sync>,
}

/// Engine, configuration and named tables.
pub struct Database<E: Engine> {
    engine: Arc<E>,
    config: DbConfig,
    tables: RwLock<HashMap<String, Registered<E>>>,
}

impl<E: Engine + 'static> std::fmt::Debug for Database<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("tables", &self.table_names())
            .finish_non_exhaustive()
    }
}

impl<E: Engine + 'static> Database<E> {
    /// A database over `engine` with no tables.
    pub fn new(engine: Arc<E>, config: DbConfig) -> Self {
        tracing::info!(
            database = %config.database,
            addr = %config.socket_addr(),
            debug = config.debug,
            "Database initialized"
        );
        Self {
            engine,
            config,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// A database over `engine`, configured from the `MYSQL_*` environment.
    pub fn from_env(engine: Arc<E>) -> Self {
        Self::new(engine, DbConfig::from_env())
    }

    /// The shared engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The bootstrap configuration.
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// A builder for table `name` on this database's engine, logging
    /// statements at `debug` when the configuration asks for it.
    pub fn table(&self, name: impl Into<String>) -> TableBuilder<E> {
        Table::builder(name, Arc::clone(&self.engine)).debug(self.config.debug)
    }

    /// Make `table` addressable by name. Names are unique.
    pub fn register<R: Entity<Engine = E>>(&self, table: &Table<E, R>) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(table.name()) {
            return Err(Error::invalid_argument(format!(
                "table `{}` is already registered",
                table.name()
            )));
        }
        tables.insert(
            table.name().to_string(),
            Registered {
                core: Arc::clone(table.core()),
                handle: Box::new(table.clone()),
            },
        );
        tracing::debug!(table = table.name(), "Registered table");
        Ok(())
    }

    /// The table registered as `name`, building `R`. `None` when no such
    /// table exists or it was registered with another record type.
    pub fn get<R: Entity<Engine = E>>(&self, name: &str) -> Option<Table<E, R>> {
        let tables = self.tables.read();
        tables
            .get(name)?
            .handle
            .downcast_ref::<Table<E, R>>()
            .cloned()
    }

    /// The table registered as `name`, building plain [`Record`]s whatever
    /// record type it was registered with.
    pub fn records(&self, name: &str) -> Option<Table<E, Record<E>>> {
        let tables = self.tables.read();
        tables
            .get(name)
            .map(|registered| Table::from_core(Arc::clone(&registered.core)))
    }

    /// Registered table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmodel_memory::MemoryEngine;

    struct Identity(Record<MemoryEngine>);

    impl Entity for Identity {
        type Engine = MemoryEngine;

        fn from_record(record: Record<MemoryEngine>) -> Self {
            Identity(record)
        }

        fn record(&self) -> &Record<MemoryEngine> {
            &self.0
        }

        fn record_mut(&mut self) -> &mut Record<MemoryEngine> {
            &mut self.0
        }

        fn into_record(self) -> Record<MemoryEngine> {
            self.0
        }
    }

    fn database() -> Database<MemoryEngine> {
        Database::new(
            Arc::new(MemoryEngine::new()),
            DbConfig::new().database("test").debug(true),
        )
    }

    #[test]
    fn test_register_and_get() {
        let db = database();
        let users = db.table("users").build();
        db.register(&users).unwrap();

        let fetched: Table<MemoryEngine> = db.get("users").unwrap();
        assert_eq!(fetched.name(), "users");
        assert!(Arc::ptr_eq(fetched.engine(), db.engine()));
        assert!(db.get::<Record<MemoryEngine>>("missing").is_none());
        assert_eq!(db.config().database, "test");
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let db = database();
        db.register(&db.table("users").build()).unwrap();
        let err = db.register(&db.table("users").build()).unwrap_err();
        assert_eq!(err.code(), rowmodel_core::INVALID_ARGUMENT);
        assert_eq!(db.table_names(), vec!["users".to_string()]);
    }

    #[test]
    fn test_entity_type_is_checked() {
        let db = database();
        let identities = db.table("identities").entity::<Identity>().build();
        db.register(&identities).unwrap();
        db.register(&db.table("accounts").build()).unwrap();

        assert!(db.get::<Identity>("identities").is_some());
        assert!(db.get::<Record<MemoryEngine>>("identities").is_none());
        assert_eq!(db.records("identities").unwrap().name(), "identities");
        assert_eq!(
            db.table_names(),
            vec!["accounts".to_string(), "identities".to_string()]
        );
    }
}

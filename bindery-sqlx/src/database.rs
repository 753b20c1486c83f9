//! The database facade.
//!
//! [`Database`] is the single entry point callers hold: it owns the
//! configuration, the schema [`Metadata`], the [`ModelRegistry`], and the
//! engine connector cache, and hands out sessions and engines.

use std::collections::HashMap;
use std::sync::{Arc, Once, PoisonError, RwLock, RwLockReadGuard};

use bindery_core::config::{BindTarget, DatabaseConfig, EngineOptions};
use bindery_core::entity::Entity;
use bindery_core::model::{ModelDescriptor, ModelRegistry, RegisteredModel};
use bindery_core::schema::{Dialect, Metadata, Table};
use dashmap::DashMap;
use sqlx::AnyPool;

use crate::engine::EngineConnector;
use crate::error::DbResult;
use crate::session::Session;

static DRIVERS: Once = Once::new();

/// Register sqlx's compiled-in drivers with the Any driver, once per
/// process.
fn install_drivers() {
    DRIVERS.call_once(sqlx::any::install_default_drivers);
}

enum SchemaOp {
    Create,
    Drop,
}

struct DatabaseInner {
    config: RwLock<DatabaseConfig>,
    overrides: EngineOptions,
    metadata: RwLock<Metadata>,
    registry: RwLock<ModelRegistry>,
    connectors: DashMap<Option<String>, Arc<EngineConnector>>,
}

/// A multi-bind database facade over sqlx.
///
/// Cheap to clone; all clones share configuration, metadata, and the engine
/// cache.
///
/// ```ignore
/// let db = Database::new(
///     DatabaseConfig::new("sqlite::memory:").bind("analytics", "sqlite::memory:"),
/// )?;
/// db.register(
///     ModelDescriptor::new("Todo")
///         .table_name("todos")
///         .column(Column::new("id", SqlType::BigInt).primary_key()),
/// )?;
/// db.create_all().await?;
/// let session = db.session()?;
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Build a facade with the default registration pipeline.
    ///
    /// Fails fast when neither a default URL nor any named bind is
    /// configured.
    pub fn new(config: DatabaseConfig) -> DbResult<Self> {
        Database::builder(config).build()
    }

    pub fn builder(config: DatabaseConfig) -> DatabaseBuilder {
        DatabaseBuilder {
            config,
            overrides: EngineOptions::default(),
            auto_id: false,
        }
    }

    fn from_parts(
        config: DatabaseConfig,
        overrides: EngineOptions,
        registry: ModelRegistry,
    ) -> DbResult<Self> {
        config.validate()?;
        install_drivers();
        Ok(Database {
            inner: Arc::new(DatabaseInner {
                config: RwLock::new(config),
                overrides,
                metadata: RwLock::new(Metadata::new()),
                registry: RwLock::new(registry),
                connectors: DashMap::new(),
            }),
        })
    }

    fn read_config(&self) -> RwLockReadGuard<'_, DatabaseConfig> {
        self.inner.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> DatabaseConfig {
        self.read_config().clone()
    }

    /// Point a bind at a new URL (`None` is the default bind). The bind's
    /// cached engine is recreated on next use.
    pub fn set_bind_url(&self, bind: Option<&str>, url: impl Into<String>) {
        let mut config = self
            .inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match bind {
            None => config.url = Some(url.into()),
            Some(key) => {
                config.binds.insert(key.to_string(), url.into());
            }
        }
    }

    /// Toggle statement echoing. Every cached engine is recreated on next
    /// use.
    pub fn set_echo(&self, echo: bool) {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .echo = echo;
    }

    /// The engine for the default bind.
    pub fn engine(&self) -> DbResult<Arc<AnyPool>> {
        self.get_engine(None)
    }

    /// The engine for a bind key, built lazily and cached per
    /// `(url, echo)` signature.
    pub fn get_engine(&self, bind: Option<&str>) -> DbResult<Arc<AnyPool>> {
        let key = bind.map(str::to_string);
        let connector = self
            .inner
            .connectors
            .entry(key.clone())
            .or_insert_with(|| Arc::new(EngineConnector::new(key)))
            .clone();
        let config = self.read_config();
        connector.get_engine(&config, &self.inner.overrides)
    }

    /// Run a descriptor through the registration pipeline.
    pub fn register(&self, descriptor: ModelDescriptor) -> DbResult<RegisteredModel> {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut metadata = self
            .inner
            .metadata
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(registry.register(descriptor, &mut metadata)?.clone())
    }

    /// Register a statically-declared entity.
    pub fn register_entity<E: Entity>(&self) -> DbResult<RegisteredModel> {
        self.register(ModelDescriptor::from_entity::<E>())
    }

    /// Snapshot of the schema metadata.
    pub fn metadata(&self) -> Metadata {
        self.inner
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The effective table of a registered model, walking single-table
    /// inheritance chains.
    pub fn table_of(&self, model: &str) -> DbResult<Option<String>> {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(registry.table_of(model)?.map(str::to_string))
    }

    pub(crate) fn table_bind_key(&self, table: &str) -> Option<String> {
        self.inner
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .table(table)
            .and_then(|t| t.bind_key().map(str::to_string))
    }

    /// Tables routed to the given bind key.
    pub fn tables_for_bind(&self, bind: Option<&str>) -> Vec<Table> {
        self.inner
            .metadata
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tables_for_bind(bind)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The full `{table name → engine}` map across all configured binds,
    /// suitable for per-entity routing.
    pub fn get_binds(&self) -> DbResult<HashMap<String, Arc<AnyPool>>> {
        let bind_keys = self.read_config().bind_keys();
        let mut map = HashMap::new();
        for bind in bind_keys {
            let tables: Vec<String> = self
                .tables_for_bind(bind.as_deref())
                .into_iter()
                .map(|t| t.name().to_string())
                .collect();
            if tables.is_empty() {
                continue;
            }
            let engine = self.get_engine(bind.as_deref())?;
            for table in tables {
                map.insert(table, engine.clone());
            }
        }
        Ok(map)
    }

    /// Open a session: a unit-of-work carrying the per-table engine map.
    /// The default-bind engine is resolved lazily on first use.
    pub fn session(&self) -> DbResult<Session> {
        Session::new(self.clone())
    }

    /// Create all tables on every bind.
    pub async fn create_all(&self) -> DbResult<()> {
        self.execute_for_all_tables(&BindTarget::All, SchemaOp::Create)
            .await
    }

    /// Create all tables on the selected binds.
    pub async fn create_all_on(&self, target: BindTarget) -> DbResult<()> {
        self.execute_for_all_tables(&target, SchemaOp::Create).await
    }

    /// Drop all tables on every bind.
    pub async fn drop_all(&self) -> DbResult<()> {
        self.execute_for_all_tables(&BindTarget::All, SchemaOp::Drop)
            .await
    }

    /// Drop all tables on the selected binds.
    pub async fn drop_all_on(&self, target: BindTarget) -> DbResult<()> {
        self.execute_for_all_tables(&target, SchemaOp::Drop).await
    }

    async fn execute_for_all_tables(
        &self,
        target: &BindTarget,
        op: SchemaOp,
    ) -> DbResult<()> {
        let binds = target.resolve(&self.read_config());
        for bind in binds {
            // Snapshot the statements before touching the database so no
            // lock guard lives across an await point.
            let dialect = {
                let config = self.read_config();
                match config.bind_url(bind.as_deref()) {
                    Ok(url) => Dialect::from_url(url),
                    // A bind with no tables and no URL has nothing to do.
                    Err(_) if self.tables_for_bind(bind.as_deref()).is_empty() => continue,
                    Err(err) => return Err(err.into()),
                }
            };
            let statements: Vec<String> = self
                .tables_for_bind(bind.as_deref())
                .iter()
                .map(|table| match op {
                    SchemaOp::Create => table.create_sql(dialect),
                    SchemaOp::Drop => table.drop_sql(dialect),
                })
                .collect();
            if statements.is_empty() {
                continue;
            }

            let engine = self.get_engine(bind.as_deref())?;
            for sql in statements {
                sqlx::query(&sql).execute(&*engine).await?;
            }
            tracing::debug!(
                bind = bind.as_deref().unwrap_or("<default>"),
                op = match op {
                    SchemaOp::Create => "create_all",
                    SchemaOp::Drop => "drop_all",
                },
                "schema operation applied"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.read_config();
        f.debug_struct("Database")
            .field("url", &config.url)
            .field("binds", &config.binds.len())
            .field("echo", &config.echo)
            .finish()
    }
}

/// Builder for [`Database`], selecting facade-level engine options and
/// optional pipeline stages.
pub struct DatabaseBuilder {
    config: DatabaseConfig,
    overrides: EngineOptions,
    auto_id: bool,
}

impl DatabaseBuilder {
    /// Engine options taking ultimate priority over config and driver-hook
    /// defaults.
    pub fn engine_options(mut self, options: EngineOptions) -> Self {
        self.overrides = options;
        self
    }

    /// Inject a `BIGINT` `id` primary key into models that declare none.
    pub fn auto_id(mut self) -> Self {
        self.auto_id = true;
        self
    }

    pub fn build(self) -> DbResult<Database> {
        let registry = if self.auto_id {
            ModelRegistry::with_auto_id()
        } else {
            ModelRegistry::new()
        };
        Database::from_parts(self.config, self.overrides, registry)
    }
}

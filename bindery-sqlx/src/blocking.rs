//! Blocking mirror of the facade.
//!
//! Each blocking [`Database`] owns a current-thread tokio runtime and drives
//! the async facade to completion on it, so callers outside an async context
//! get the same behavior without touching tokio themselves. Pick one mode
//! per facade at construction; a blocking facade must not be used from
//! inside an async runtime.

use std::collections::HashMap;
use std::sync::Arc;

use bindery_core::config::{BindTarget, DatabaseConfig};
use bindery_core::entity::Entity;
use bindery_core::model::{ModelDescriptor, RegisteredModel};
use bindery_core::schema::{Metadata, Table};
use sqlx::any::{AnyQueryResult, AnyRow};
use sqlx::{Any, AnyPool};
use tokio::runtime::{Builder, Runtime};

use crate::error::{DbError, DbResult};

fn new_runtime() -> DbResult<Arc<Runtime>> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| DbError::Other(format!("failed to start blocking runtime: {err}")))?;
    Ok(Arc::new(runtime))
}

/// Blocking wrapper around [`crate::Database`].
#[derive(Clone)]
pub struct Database {
    inner: crate::database::Database,
    runtime: Arc<Runtime>,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> DbResult<Self> {
        Database::from_database(crate::database::Database::new(config)?)
    }

    /// Wrap an already-built async facade.
    pub fn from_database(inner: crate::database::Database) -> DbResult<Self> {
        Ok(Database {
            inner,
            runtime: new_runtime()?,
        })
    }

    /// The async facade this wraps.
    pub fn as_async(&self) -> &crate::database::Database {
        &self.inner
    }

    pub fn config(&self) -> DatabaseConfig {
        self.inner.config()
    }

    pub fn set_bind_url(&self, bind: Option<&str>, url: impl Into<String>) {
        self.inner.set_bind_url(bind, url)
    }

    pub fn set_echo(&self, echo: bool) {
        self.inner.set_echo(echo)
    }

    pub fn engine(&self) -> DbResult<Arc<AnyPool>> {
        self.inner.engine()
    }

    pub fn get_engine(&self, bind: Option<&str>) -> DbResult<Arc<AnyPool>> {
        self.inner.get_engine(bind)
    }

    pub fn register(&self, descriptor: ModelDescriptor) -> DbResult<RegisteredModel> {
        self.inner.register(descriptor)
    }

    pub fn register_entity<E: Entity>(&self) -> DbResult<RegisteredModel> {
        self.inner.register_entity::<E>()
    }

    pub fn metadata(&self) -> Metadata {
        self.inner.metadata()
    }

    pub fn table_of(&self, model: &str) -> DbResult<Option<String>> {
        self.inner.table_of(model)
    }

    pub fn tables_for_bind(&self, bind: Option<&str>) -> Vec<Table> {
        self.inner.tables_for_bind(bind)
    }

    pub fn get_binds(&self) -> DbResult<HashMap<String, Arc<AnyPool>>> {
        self.inner.get_binds()
    }

    pub fn create_all(&self) -> DbResult<()> {
        self.runtime.block_on(self.inner.create_all())
    }

    pub fn create_all_on(&self, target: BindTarget) -> DbResult<()> {
        self.runtime.block_on(self.inner.create_all_on(target))
    }

    pub fn drop_all(&self) -> DbResult<()> {
        self.runtime.block_on(self.inner.drop_all())
    }

    pub fn drop_all_on(&self, target: BindTarget) -> DbResult<()> {
        self.runtime.block_on(self.inner.drop_all_on(target))
    }

    pub fn session(&self) -> DbResult<Session> {
        Ok(Session {
            inner: self.inner.session()?,
            runtime: self.runtime.clone(),
        })
    }
}

/// Blocking wrapper around [`crate::Session`].
pub struct Session {
    inner: crate::session::Session,
    runtime: Arc<Runtime>,
}

impl Session {
    pub fn primary(&self) -> DbResult<Arc<AnyPool>> {
        self.inner.primary()
    }

    pub fn binds(&self) -> &HashMap<String, Arc<AnyPool>> {
        self.inner.binds()
    }

    pub fn get_bind(&self, table: Option<&str>) -> DbResult<Arc<AnyPool>> {
        self.inner.get_bind(table)
    }

    pub fn bind_for<E: Entity>(&self) -> DbResult<Arc<AnyPool>> {
        self.inner.bind_for::<E>()
    }

    pub fn execute(&self, sql: &str) -> DbResult<AnyQueryResult> {
        self.runtime.block_on(self.inner.execute(sql))
    }

    pub fn execute_on(&self, table: Option<&str>, sql: &str) -> DbResult<AnyQueryResult> {
        self.runtime.block_on(self.inner.execute_on(table, sql))
    }

    pub fn fetch_all(&self, sql: &str) -> DbResult<Vec<AnyRow>> {
        self.runtime.block_on(self.inner.fetch_all(sql))
    }

    pub fn fetch_all_on(&self, table: Option<&str>, sql: &str) -> DbResult<Vec<AnyRow>> {
        self.runtime.block_on(self.inner.fetch_all_on(table, sql))
    }

    pub fn fetch_one(&self, table: Option<&str>, sql: &str) -> DbResult<AnyRow> {
        self.runtime.block_on(self.inner.fetch_one(table, sql))
    }

    pub fn fetch_optional(&self, table: Option<&str>, sql: &str) -> DbResult<Option<AnyRow>> {
        self.runtime.block_on(self.inner.fetch_optional(table, sql))
    }

    pub fn begin(&self) -> DbResult<Transaction> {
        self.begin_on(None)
    }

    pub fn begin_on(&self, table: Option<&str>) -> DbResult<Transaction> {
        let tx = self.runtime.block_on(self.inner.begin_on(table))?;
        Ok(Transaction {
            tx,
            runtime: self.runtime.clone(),
        })
    }
}

/// Blocking wrapper around an sqlx transaction. Dropping without calling
/// [`Transaction::commit`] rolls back.
pub struct Transaction {
    tx: sqlx::Transaction<'static, Any>,
    runtime: Arc<Runtime>,
}

impl Transaction {
    pub fn execute(&mut self, sql: &str) -> DbResult<AnyQueryResult> {
        let runtime = self.runtime.clone();
        Ok(runtime.block_on(sqlx::query(sql).execute(&mut *self.tx))?)
    }

    pub fn fetch_all(&mut self, sql: &str) -> DbResult<Vec<AnyRow>> {
        let runtime = self.runtime.clone();
        Ok(runtime.block_on(sqlx::query(sql).fetch_all(&mut *self.tx))?)
    }

    pub fn commit(self) -> DbResult<()> {
        let runtime = self.runtime.clone();
        Ok(runtime.block_on(self.tx.commit())?)
    }

    pub fn rollback(self) -> DbResult<()> {
        let runtime = self.runtime.clone();
        Ok(runtime.block_on(self.tx.rollback())?)
    }
}

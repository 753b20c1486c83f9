//! Sessions: statement execution with per-table engine routing.

use std::collections::HashMap;
use std::sync::Arc;

use bindery_core::entity::Entity;
use sqlx::any::{AnyQueryResult, AnyRow};
use sqlx::{Any, AnyPool, Transaction};

use crate::database::Database;
use crate::error::DbResult;

/// A unit of work over one [`Database`].
///
/// Each statement is routed to the engine of the table it touches: tables
/// registered under a bind key go to that bind's engine, everything else to
/// the primary (default-bind) engine. The primary engine is resolved lazily
/// on first default-bind use, so a facade configured with named binds only
/// still opens sessions against the binds it actually uses. Routing follows
/// the live configuration, so a URL or echo change on the facade is picked
/// up by the next statement.
pub struct Session {
    db: Database,
    binds: HashMap<String, Arc<AnyPool>>,
}

impl Session {
    pub(crate) fn new(db: Database) -> DbResult<Session> {
        let binds = db.get_binds()?;
        Ok(Session { db, binds })
    }

    /// The engine statements go to when no table is named. Fails when no
    /// default bind URL is configured.
    pub fn primary(&self) -> DbResult<Arc<AnyPool>> {
        self.db.engine()
    }

    /// The `{table name → engine}` map captured when the session opened.
    pub fn binds(&self) -> &HashMap<String, Arc<AnyPool>> {
        &self.binds
    }

    /// Resolve the engine a statement against `table` should use.
    pub fn get_bind(&self, table: Option<&str>) -> DbResult<Arc<AnyPool>> {
        let Some(table) = table else {
            return self.primary();
        };
        if let Some(key) = self.db.table_bind_key(table) {
            return self.db.get_engine(Some(&key));
        }
        if let Some(engine) = self.binds.get(table) {
            return Ok(engine.clone());
        }
        self.primary()
    }

    /// Resolve the engine for an entity, walking inheritance to its
    /// effective table.
    pub fn bind_for<E: Entity>(&self) -> DbResult<Arc<AnyPool>> {
        match self.db.table_of(E::model_name())? {
            Some(table) => self.get_bind(Some(&table)),
            None => self.primary(),
        }
    }

    /// Execute a statement on the primary engine.
    pub async fn execute(&self, sql: &str) -> DbResult<AnyQueryResult> {
        self.execute_on(None, sql).await
    }

    /// Execute a statement on the engine of the given table.
    pub async fn execute_on(&self, table: Option<&str>, sql: &str) -> DbResult<AnyQueryResult> {
        let engine = self.get_bind(table)?;
        Ok(sqlx::query(sql).execute(&*engine).await?)
    }

    /// Fetch all rows from the primary engine.
    pub async fn fetch_all(&self, sql: &str) -> DbResult<Vec<AnyRow>> {
        self.fetch_all_on(None, sql).await
    }

    /// Fetch all rows from the engine of the given table.
    pub async fn fetch_all_on(&self, table: Option<&str>, sql: &str) -> DbResult<Vec<AnyRow>> {
        let engine = self.get_bind(table)?;
        Ok(sqlx::query(sql).fetch_all(&*engine).await?)
    }

    /// Fetch exactly one row from the engine of the given table.
    pub async fn fetch_one(&self, table: Option<&str>, sql: &str) -> DbResult<AnyRow> {
        let engine = self.get_bind(table)?;
        Ok(sqlx::query(sql).fetch_one(&*engine).await?)
    }

    /// Fetch at most one row from the engine of the given table.
    pub async fn fetch_optional(&self, table: Option<&str>, sql: &str) -> DbResult<Option<AnyRow>> {
        let engine = self.get_bind(table)?;
        Ok(sqlx::query(sql).fetch_optional(&*engine).await?)
    }

    /// Begin a transaction on the primary engine.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Any>> {
        self.begin_on(None).await
    }

    /// Begin a transaction on the engine of the given table.
    pub async fn begin_on(&self, table: Option<&str>) -> DbResult<Transaction<'static, Any>> {
        let engine = self.get_bind(table)?;
        Ok(engine.begin().await?)
    }
}

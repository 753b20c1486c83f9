//! # bindery-sqlx — sqlx backend for Bindery
//!
//! Everything that touches a database driver lives here:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`engine`] | Per-bind [`EngineConnector`] cache with driver hooks |
//! | [`database`] | The [`Database`] facade: config, registry, schema ops |
//! | [`session`] | [`Session`], routing statements to per-table engines |
//! | [`blocking`] | Blocking mirror driven by an owned tokio runtime |
//! | [`error`] | [`DbError`], bridging core and sqlx errors |
//!
//! Enable the `sqlite`, `postgres`, or `mysql` features to compile the
//! corresponding sqlx drivers in; connections always go through sqlx's
//! `Any` driver so one facade can serve several backends at once.

pub mod blocking;
pub mod database;
pub mod engine;
pub mod error;
pub mod session;

pub use database::{Database, DatabaseBuilder};
pub use engine::EngineConnector;
pub use error::{DbError, DbResult};
pub use session::Session;

pub mod prelude {
    //! Re-exports of the most commonly used backend types.
    pub use crate::{Database, DbError, DbResult, Session};
    pub use bindery_core::prelude::*;
}

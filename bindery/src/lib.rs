//! Bindery — a multi-bind SQL database facade over sqlx.
//!
//! This facade crate re-exports the Bindery sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use bindery::prelude::*;
//! ```
//!
//! One [`Database`] owns the configuration, the model registry, the schema
//! metadata, and a lazily-built engine per bind key. Models register through
//! an explicit pipeline that infers table names, resolves inheritance, and
//! stamps bind keys; sessions then route each statement to the engine of the
//! table it touches.
//!
//! ```ignore
//! let db = Database::new(
//!     DatabaseConfig::new("sqlite::memory:").bind("analytics", "postgres://analytics/app"),
//! )?;
//! db.register(
//!     ModelDescriptor::new("PageView")
//!         .bind_key("analytics")
//!         .column(Column::new("id", SqlType::BigInt).primary_key())
//!         .column(Column::new("path", SqlType::Text)),
//! )?;
//! db.create_all().await?;
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Crate                   |
//! |------------|---------|-------------------------|
//! | `sqlite`   | no      | `bindery-sqlx/sqlite`   |
//! | `postgres` | no      | `bindery-sqlx/postgres` |
//! | `mysql`    | no      | `bindery-sqlx/mysql`    |

pub extern crate bindery_core;
pub extern crate bindery_sqlx;

pub use bindery_core::*;
pub use bindery_sqlx::{blocking, Database, DatabaseBuilder, DbError, DbResult, Session};

/// Unified prelude — import everything with `use bindery::prelude::*`.
pub mod prelude {
    pub use bindery_core::prelude::*;
    pub use bindery_sqlx::prelude::*;
}

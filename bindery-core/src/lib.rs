//! # bindery-core — driver-independent layer for Bindery
//!
//! This crate holds everything that does not touch a database driver:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`DatabaseConfig`], [`EngineOptions`], [`BindTarget`] — the bind registry |
//! | [`naming`] | Camel-case → snake_case table-name inference |
//! | [`schema`] | [`Table`], [`Column`], [`Metadata`], per-dialect DDL |
//! | [`model`] | [`ModelDescriptor`] and the registration pipeline |
//! | [`entity`] | The [`Entity`] trait for statically-declared models |
//! | [`error`] | [`ConfigError`], [`SchemaError`] |
//!
//! Everything here is pure and synchronous; engine construction, sessions,
//! and statement execution live in `bindery-sqlx`.

pub mod config;
pub mod entity;
pub mod error;
pub mod model;
pub mod naming;
pub mod schema;

pub use config::{BindTarget, DatabaseConfig, EngineOptions};
pub use entity::Entity;
pub use error::{ConfigError, SchemaError};
pub use model::{
    AutoIdStage, BindStage, ModelDescriptor, ModelRegistry, NamingStage, RegisteredModel,
    RegistrationContext, RegistrationStage, TableName, TableStage,
};
pub use naming::camel_to_snake_case;
pub use schema::{Column, Dialect, Metadata, SqlType, Table};

pub mod prelude {
    //! Re-exports of the most commonly used core types.
    pub use crate::{
        BindTarget, Column, DatabaseConfig, Dialect, EngineOptions, Entity, Metadata,
        ModelDescriptor, ModelRegistry, SqlType, Table,
    };
}

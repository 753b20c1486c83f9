use crate::schema::Column;

/// Trait for statically-declared models.
///
/// A type implementing `Entity` describes one model: its camel-case name
/// (from which the table name is inferred), optional explicit table name,
/// prefix, bind key, and columns. Register it with
/// `Database::register_entity::<T>()` and route session operations with
/// `Session::bind_for::<T>()`.
///
/// # Example
///
/// ```
/// use bindery_core::entity::Entity;
/// use bindery_core::schema::{Column, SqlType};
///
/// struct Todo;
///
/// impl Entity for Todo {
///     fn model_name() -> &'static str { "Todo" }
///     fn table_name() -> Option<&'static str> { Some("todos") }
///     fn columns() -> Vec<Column> {
///         vec![
///             Column::new("id", SqlType::BigInt).primary_key(),
///             Column::new("title", SqlType::Varchar(80)),
///         ]
///     }
/// }
/// ```
pub trait Entity: Send + Sync + 'static {
    /// The camel-case model name, e.g. `MyHappyClass`.
    fn model_name() -> &'static str;

    /// Explicit table name, overriding inference.
    fn table_name() -> Option<&'static str> {
        None
    }

    /// Table-name prefix, prepended snake-cased with no separator.
    fn table_prefix() -> Option<&'static str> {
        None
    }

    /// Bind key selecting which configured database target this entity's
    /// storage maps to; `None` is the default bind.
    fn bind_key() -> Option<&'static str> {
        None
    }

    /// Column declarations.
    fn columns() -> Vec<Column>;
}

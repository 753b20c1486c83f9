use bindery_core::error::{ConfigError, SchemaError};

/// Errors surfaced by the sqlx-backed facade.
///
/// Everything except [`DbError::Sqlx`] is a configuration or programmer
/// error expected to be fixed, not retried.
#[derive(Debug)]
pub enum DbError {
    Config(ConfigError),
    Schema(SchemaError),
    Sqlx(sqlx::Error),
    Other(String),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Config(err) => write!(f, "Configuration error: {err}"),
            DbError::Schema(err) => write!(f, "Schema error: {err}"),
            DbError::Sqlx(err) => write!(f, "Database error: {err}"),
            DbError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Config(err) => Some(err),
            DbError::Schema(err) => Some(err),
            DbError::Sqlx(err) => Some(err),
            DbError::Other(_) => None,
        }
    }
}

impl From<ConfigError> for DbError {
    fn from(err: ConfigError) -> Self {
        DbError::Config(err)
    }
}

impl From<SchemaError> for DbError {
    fn from(err: SchemaError) -> Self {
        DbError::Schema(err)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

/// Convenience alias for facade results.
pub type DbResult<T> = Result<T, DbError>;

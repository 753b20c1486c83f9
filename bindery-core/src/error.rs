/// Errors raised while reading or validating database configuration.
///
/// Every variant is a configuration mistake that must be fixed by the
/// developer; nothing here is transient or retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a default URL nor any named bind is configured, or the
    /// default bind was requested while only named binds exist.
    MissingDatabaseUrl,
    /// A bind key was referenced that is not present in the bind map.
    UnknownBind(String),
    /// The configured pool sizing is unusable for the target database.
    InvalidPoolSize(String),
    /// The configuration document could not be parsed.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingDatabaseUrl => {
                write!(f, "Either a default database url or named binds must be set")
            }
            ConfigError::UnknownBind(key) => {
                write!(f, "Bind '{key}' is not specified. Add it to the binds map")
            }
            ConfigError::InvalidPoolSize(msg) => write!(f, "Invalid pool size: {msg}"),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors raised by the model registration pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A model with this name is already registered.
    DuplicateModel(String),
    /// The descriptor names a parent that was never registered.
    UnknownParent { model: String, parent: String },
    /// No model with this name is registered.
    UnknownModel(String),
    /// The model is not abstract but ended up with no table name and no
    /// ancestor table to fall back to.
    MissingTableName(String),
    /// The model declares no primary key and no ancestor owns a table it
    /// could share.
    MissingPrimaryKey(String),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::DuplicateModel(name) => {
                write!(f, "Model '{name}' is already registered")
            }
            SchemaError::UnknownParent { model, parent } => {
                write!(f, "Model '{model}' inherits from unregistered model '{parent}'")
            }
            SchemaError::UnknownModel(name) => write!(f, "Unknown model '{name}'"),
            SchemaError::MissingTableName(name) => {
                write!(f, "Model '{name}' has no table name and no inheritable table")
            }
            SchemaError::MissingPrimaryKey(name) => {
                write!(
                    f,
                    "Model '{name}' could not assemble a primary key: declare a \
                     primary key column or inherit from a model that owns a table"
                )
            }
        }
    }
}

impl std::error::Error for SchemaError {}

//! Database configuration and the bind registry.
//!
//! [`DatabaseConfig`] is set once at facade construction and read-only
//! afterwards, except for explicit mutation through the facade's setters.
//! The bind registry is a read view over it: [`DatabaseConfig::bind_url`]
//! maps a bind key to its connection URL, failing fast on unknown keys.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// Engine construction options, all optional.
///
/// Unset fields fall back to driver-hook defaults, then to the pool's own
/// defaults. Durations are plain seconds so the struct stays trivially
/// deserializable from YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
    pub test_before_acquire: Option<bool>,
}

impl EngineOptions {
    /// Overlay `other` on top of `self`: set fields of `other` win.
    pub fn overlay(mut self, other: &EngineOptions) -> EngineOptions {
        if other.max_connections.is_some() {
            self.max_connections = other.max_connections;
        }
        if other.min_connections.is_some() {
            self.min_connections = other.min_connections;
        }
        if other.acquire_timeout_secs.is_some() {
            self.acquire_timeout_secs = other.acquire_timeout_secs;
        }
        if other.idle_timeout_secs.is_some() {
            self.idle_timeout_secs = other.idle_timeout_secs;
        }
        if other.max_lifetime_secs.is_some() {
            self.max_lifetime_secs = other.max_lifetime_secs;
        }
        if other.test_before_acquire.is_some() {
            self.test_before_acquire = other.test_before_acquire;
        }
        self
    }
}

/// Configuration for a [`Database`](https://docs.rs/bindery) facade.
///
/// At least one of `url` (the default bind) or `binds` (named alternates)
/// must be set; [`DatabaseConfig::validate`] enforces this at construction.
///
/// ```ignore
/// let config = DatabaseConfig::new("sqlite::memory:")
///     .bind("analytics", "postgres://analytics-db/app")
///     .echo(true);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Default (unkeyed) bind URL.
    pub url: Option<String>,
    /// Named alternate binds. The empty key is not allowed; the default bind
    /// is addressed with `None`, not with a reserved string.
    pub binds: HashMap<String, String>,
    /// Log every statement at info level instead of sqlx's debug default.
    pub echo: bool,
    /// Engine construction options applied to every bind.
    pub engine: EngineOptions,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        DatabaseConfig {
            url: Some(url.into()),
            ..DatabaseConfig::default()
        }
    }

    /// Add a named bind.
    pub fn bind(mut self, key: impl Into<String>, url: impl Into<String>) -> Self {
        self.binds.insert(key.into(), url.into());
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn engine(mut self, options: EngineOptions) -> Self {
        self.engine = options;
        self
    }

    /// Parse a configuration document from YAML (useful for testing and for
    /// hosts that embed a `database:` section in their application config).
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check that the configuration can produce at least one engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_none() && self.binds.is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(())
    }

    /// Resolve a bind key to its connection URL.
    ///
    /// `None` is the default bind. Any other key must be present in the bind
    /// map; a missing key is a fatal configuration error, never retried.
    pub fn bind_url(&self, bind: Option<&str>) -> Result<&str, ConfigError> {
        match bind {
            None => self.url.as_deref().ok_or(ConfigError::MissingDatabaseUrl),
            Some(key) => self
                .binds
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| ConfigError::UnknownBind(key.to_string())),
        }
    }

    /// All configured bind keys: the default bind first, then the named
    /// binds in sorted order.
    pub fn bind_keys(&self) -> Vec<Option<String>> {
        let mut keys: Vec<Option<String>> = vec![None];
        let mut named: Vec<&String> = self.binds.keys().collect();
        named.sort();
        keys.extend(named.into_iter().map(|k| Some(k.clone())));
        keys
    }
}

/// Selector for operations that run against one or more binds, mirroring the
/// usual "all binds" default of `create_all` / `drop_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    /// The default bind plus every named bind.
    All,
    /// Only the default (unkeyed) bind.
    Default,
    /// A single named bind.
    Key(String),
    /// An explicit list of binds; `None` entries mean the default bind.
    Keys(Vec<Option<String>>),
}

impl BindTarget {
    /// Expand the selector into concrete bind keys for the given config.
    pub fn resolve(&self, config: &DatabaseConfig) -> Vec<Option<String>> {
        match self {
            BindTarget::All => config.bind_keys(),
            BindTarget::Default => vec![None],
            BindTarget::Key(key) => vec![Some(key.clone())],
            BindTarget::Keys(keys) => keys.clone(),
        }
    }
}

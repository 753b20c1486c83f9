//! Lazy, signature-cached engine construction.
//!
//! One [`EngineConnector`] exists per (database, bind key) pair. It caches
//! the pool it built keyed by the `(url, echo)` configuration signature and
//! rebuilds only when that signature changes. Each connector has its own
//! lock, so distinct bind keys never contend with each other.

use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bindery_core::config::{DatabaseConfig, EngineOptions};
use bindery_core::error::ConfigError;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions};

use crate::error::DbError;

/// The configuration identity an engine was built for. A change to either
/// field invalidates the cached pool.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EngineSignature {
    url: String,
    echo: bool,
}

struct ConnectedEngine {
    signature: EngineSignature,
    pool: Arc<AnyPool>,
}

/// Builds and caches one engine for one bind key.
pub struct EngineConnector {
    bind: Option<String>,
    state: Mutex<Option<ConnectedEngine>>,
}

impl EngineConnector {
    pub fn new(bind: Option<String>) -> Self {
        EngineConnector {
            bind,
            state: Mutex::new(None),
        }
    }

    pub fn bind(&self) -> Option<&str> {
        self.bind.as_deref()
    }

    /// Return the cached engine for the current configuration, building a
    /// new one when the `(url, echo)` signature changed.
    ///
    /// Idempotent per signature and safe under concurrent callers: at most
    /// one construction proceeds per bind key at a time.
    pub fn get_engine(
        &self,
        config: &DatabaseConfig,
        overrides: &EngineOptions,
    ) -> Result<Arc<AnyPool>, DbError> {
        let url = config.bind_url(self.bind.as_deref())?.to_string();
        let signature = EngineSignature {
            url,
            echo: config.echo,
        };

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = state.as_ref() {
            if engine.signature == signature {
                return Ok(engine.pool.clone());
            }
        }

        let pool = Arc::new(build_engine(&signature, &config.engine, overrides)?);
        tracing::debug!(
            bind = self.bind.as_deref().unwrap_or("<default>"),
            url = %signature.url,
            "created engine"
        );
        *state = Some(ConnectedEngine {
            signature,
            pool: pool.clone(),
        });
        Ok(pool)
    }
}

/// Database driver family, inferred from the URL scheme, used to pick
/// saner engine defaults per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverFamily {
    Sqlite,
    MySql,
    Other,
}

impl DriverFamily {
    fn from_url(url: &str) -> DriverFamily {
        let scheme = url.split(':').next().unwrap_or("");
        if scheme == "sqlite" {
            DriverFamily::Sqlite
        } else if scheme.starts_with("mysql") || scheme.starts_with("mariadb") {
            DriverFamily::MySql
        } else {
            DriverFamily::Other
        }
    }
}

/// Whether a SQLite URL targets a memory-resident database.
fn is_memory_sqlite(url: &str) -> bool {
    let rest = url.splitn(2, ':').nth(1).unwrap_or("");
    let rest = rest.trim_start_matches("//");
    let path = rest.split('?').next().unwrap_or("");
    path.is_empty() || path == ":memory:" || rest.contains("mode=memory")
}

/// Adjusted URL and option set for one engine build.
#[derive(Debug)]
struct EngineSetup {
    url: String,
    options: EngineOptions,
    /// The sole connection *is* the database: reaping it by idle timeout or
    /// lifetime would silently drop every table. When set, unset timeouts
    /// are forced off instead of falling back to the pool's defaults.
    pin_connection: bool,
}

/// Adjust the URL and option set before engine creation.
///
/// Precedence, lowest first: driver-family defaults, options from the
/// configuration, options supplied at facade construction.
fn apply_driver_defaults(
    url: &str,
    config_options: &EngineOptions,
    overrides: &EngineOptions,
) -> Result<EngineSetup, ConfigError> {
    let mut url = url.to_string();
    let mut defaults = EngineOptions::default();
    let mut pin_connection = false;
    let explicit_pool_size = overrides
        .max_connections
        .or(config_options.max_connections);

    match DriverFamily::from_url(&url) {
        DriverFamily::MySql => {
            if !url.contains("charset=") {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str("charset=utf8");
            }
            defaults.max_connections = Some(10);
            defaults.max_lifetime_secs = Some(7200);
        }
        DriverFamily::Sqlite => {
            if is_memory_sqlite(&url) {
                // An empty pool against a memory database would lose all
                // data between operations.
                if explicit_pool_size == Some(0) {
                    return Err(ConfigError::InvalidPoolSize(
                        "SQLite in-memory database with an empty pool is not \
                         possible due to data loss"
                            .to_string(),
                    ));
                }
                // One persistent shared connection holds the database alive,
                // and it must never be recycled.
                defaults.max_connections = Some(1);
                defaults.min_connections = Some(1);
                pin_connection = true;
            } else if explicit_pool_size.is_none() || explicit_pool_size == Some(0) {
                // File databases get a single connection and no persistent
                // idle pool unless sized explicitly.
                defaults.max_connections = Some(1);
                defaults.min_connections = Some(0);
            }
        }
        DriverFamily::Other => {}
    }

    let mut merged = defaults.overlay(config_options).overlay(overrides);
    if merged.max_connections == Some(0) {
        // A zero-sized pool collapses to one unpooled connection.
        merged.max_connections = Some(1);
    }
    Ok(EngineSetup {
        url,
        options: merged,
        pin_connection,
    })
}

/// Construct a lazily-connecting pool for the given signature.
fn build_engine(
    signature: &EngineSignature,
    config_options: &EngineOptions,
    overrides: &EngineOptions,
) -> Result<AnyPool, DbError> {
    let EngineSetup {
        url,
        options,
        pin_connection,
    } = apply_driver_defaults(&signature.url, config_options, overrides)?;

    let mut connect = AnyConnectOptions::from_str(&url)?;
    connect = if signature.echo {
        connect.log_statements(log::LevelFilter::Info)
    } else {
        connect.log_statements(log::LevelFilter::Debug)
    };

    let mut pool = AnyPoolOptions::new();
    if let Some(max) = options.max_connections {
        pool = pool.max_connections(max);
    }
    if let Some(min) = options.min_connections {
        pool = pool.min_connections(min);
    }
    if let Some(secs) = options.acquire_timeout_secs {
        pool = pool.acquire_timeout(Duration::from_secs(secs));
    }
    // A pinned connection must outlive the pool's own reaping defaults, so
    // unset timeouts are disabled rather than left to fall back.
    match options.idle_timeout_secs {
        Some(secs) => pool = pool.idle_timeout(Some(Duration::from_secs(secs))),
        None if pin_connection => pool = pool.idle_timeout(None),
        None => {}
    }
    match options.max_lifetime_secs {
        Some(secs) => pool = pool.max_lifetime(Some(Duration::from_secs(secs))),
        None if pin_connection => pool = pool.max_lifetime(None),
        None => {}
    }
    if let Some(test) = options.test_before_acquire {
        pool = pool.test_before_acquire(test);
    }

    Ok(pool.connect_lazy_with(connect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_family() {
        assert_eq!(DriverFamily::from_url("sqlite::memory:"), DriverFamily::Sqlite);
        assert_eq!(DriverFamily::from_url("mysql://host/db"), DriverFamily::MySql);
        assert_eq!(DriverFamily::from_url("mariadb://host/db"), DriverFamily::MySql);
        assert_eq!(DriverFamily::from_url("postgres://host/db"), DriverFamily::Other);
    }

    #[test]
    fn test_memory_detection() {
        assert!(is_memory_sqlite("sqlite::memory:"));
        assert!(is_memory_sqlite("sqlite://"));
        assert!(is_memory_sqlite("sqlite://:memory:"));
        assert!(is_memory_sqlite("sqlite:file:test?mode=memory&cache=shared"));
        assert!(!is_memory_sqlite("sqlite://todo.db"));
    }

    #[test]
    fn test_mysql_defaults() {
        let setup =
            apply_driver_defaults("mysql://host/db", &EngineOptions::default(), &EngineOptions::default())
                .unwrap();
        assert_eq!(setup.url, "mysql://host/db?charset=utf8");
        assert_eq!(setup.options.max_connections, Some(10));
        assert_eq!(setup.options.max_lifetime_secs, Some(7200));
    }

    #[test]
    fn test_mysql_charset_not_duplicated() {
        let setup = apply_driver_defaults(
            "mysql://host/db?charset=utf8mb4",
            &EngineOptions::default(),
            &EngineOptions::default(),
        )
        .unwrap();
        assert_eq!(setup.url, "mysql://host/db?charset=utf8mb4");
    }

    #[test]
    fn test_explicit_options_beat_driver_defaults() {
        let config = EngineOptions {
            max_connections: Some(3),
            ..EngineOptions::default()
        };
        let setup =
            apply_driver_defaults("mysql://host/db", &config, &EngineOptions::default()).unwrap();
        assert_eq!(setup.options.max_connections, Some(3));
        assert_eq!(setup.options.max_lifetime_secs, Some(7200));
    }

    #[test]
    fn test_facade_overrides_beat_config_options() {
        let config = EngineOptions {
            max_connections: Some(3),
            ..EngineOptions::default()
        };
        let overrides = EngineOptions {
            max_connections: Some(7),
            ..EngineOptions::default()
        };
        let setup = apply_driver_defaults("mysql://host/db", &config, &overrides).unwrap();
        assert_eq!(setup.options.max_connections, Some(7));
    }

    #[test]
    fn test_memory_sqlite_gets_shared_single_connection() {
        let setup = apply_driver_defaults(
            "sqlite::memory:",
            &EngineOptions::default(),
            &EngineOptions::default(),
        )
        .unwrap();
        assert_eq!(setup.options.max_connections, Some(1));
        assert_eq!(setup.options.min_connections, Some(1));
    }

    #[test]
    fn test_memory_sqlite_pins_its_connection() {
        // The connection is the database: with no explicit timeouts the
        // pool's reaping must be disabled entirely, not left at its
        // defaults, or every table vanishes when the connection recycles.
        let setup = apply_driver_defaults(
            "sqlite::memory:",
            &EngineOptions::default(),
            &EngineOptions::default(),
        )
        .unwrap();
        assert!(setup.pin_connection);
        assert_eq!(setup.options.idle_timeout_secs, None);
        assert_eq!(setup.options.max_lifetime_secs, None);

        let setup = apply_driver_defaults(
            "sqlite://todo.db",
            &EngineOptions::default(),
            &EngineOptions::default(),
        )
        .unwrap();
        assert!(!setup.pin_connection);
    }

    #[test]
    fn test_memory_sqlite_explicit_timeouts_still_win() {
        let config = EngineOptions {
            idle_timeout_secs: Some(300),
            max_lifetime_secs: Some(600),
            ..EngineOptions::default()
        };
        let setup = apply_driver_defaults("sqlite::memory:", &config, &EngineOptions::default())
            .unwrap();
        assert!(setup.pin_connection);
        assert_eq!(setup.options.idle_timeout_secs, Some(300));
        assert_eq!(setup.options.max_lifetime_secs, Some(600));
    }

    #[test]
    fn test_memory_sqlite_zero_pool_is_fatal() {
        let config = EngineOptions {
            max_connections: Some(0),
            ..EngineOptions::default()
        };
        let err = apply_driver_defaults("sqlite::memory:", &config, &EngineOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPoolSize(_)));
    }

    #[test]
    fn test_file_sqlite_zero_pool_collapses_to_one() {
        let config = EngineOptions {
            max_connections: Some(0),
            ..EngineOptions::default()
        };
        let setup =
            apply_driver_defaults("sqlite://todo.db", &config, &EngineOptions::default()).unwrap();
        assert_eq!(setup.options.max_connections, Some(1));
    }
}

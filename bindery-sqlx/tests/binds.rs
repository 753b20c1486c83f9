//! Engine caching and multi-bind routing, end to end against SQLite.

use std::sync::Arc;

use bindery_core::config::DatabaseConfig;
use bindery_core::error::ConfigError;
use bindery_core::model::ModelDescriptor;
use bindery_core::schema::{Column, SqlType};
use bindery_sqlx::{Database, DbError};
use sqlx::Row;

fn three_bind_db() -> Database {
    let db = Database::new(
        DatabaseConfig::new("sqlite::memory:")
            .bind("foo", "sqlite::memory:")
            .bind("bar", "sqlite::memory:"),
    )
    .unwrap();

    db.register(
        ModelDescriptor::new("Foo")
            .bind_key("foo")
            .column(Column::new("id", SqlType::Integer).primary_key()),
    )
    .unwrap();
    db.register(
        ModelDescriptor::new("Bar")
            .bind_key("bar")
            .column(Column::new("id", SqlType::Integer).primary_key()),
    )
    .unwrap();
    db.register(
        ModelDescriptor::new("Baz").column(Column::new("id", SqlType::Integer).primary_key()),
    )
    .unwrap();
    db
}

async fn user_tables(pool: &sqlx::AnyPool) -> Vec<String> {
    sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

#[tokio::test]
async fn test_engine_is_cached_per_bind() {
    let db = three_bind_db();

    let first = db.engine().unwrap();
    let second = db.engine().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let foo = db.get_engine(Some("foo")).unwrap();
    let foo_again = db.get_engine(Some("foo")).unwrap();
    assert!(Arc::ptr_eq(&foo, &foo_again));
    assert!(!Arc::ptr_eq(&first, &foo));
}

#[tokio::test]
async fn test_echo_change_rebuilds_engines() {
    let db = three_bind_db();

    let before = db.engine().unwrap();
    let foo_before = db.get_engine(Some("foo")).unwrap();

    db.set_echo(true);

    let after = db.engine().unwrap();
    let foo_after = db.get_engine(Some("foo")).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(!Arc::ptr_eq(&foo_before, &foo_after));

    // Stable again under the new configuration.
    assert!(Arc::ptr_eq(&after, &db.engine().unwrap()));
}

#[tokio::test]
async fn test_bind_url_change_rebuilds_only_that_engine() {
    let db = three_bind_db();

    let default_before = db.engine().unwrap();
    let foo_before = db.get_engine(Some("foo")).unwrap();

    db.set_bind_url(Some("foo"), "sqlite://foo.db?mode=memory");

    assert!(Arc::ptr_eq(&default_before, &db.engine().unwrap()));
    assert!(!Arc::ptr_eq(&foo_before, &db.get_engine(Some("foo")).unwrap()));
}

#[test]
fn test_unknown_bind_is_fatal() {
    let db = three_bind_db();
    let err = db.get_engine(Some("missing")).unwrap_err();
    assert!(matches!(
        err,
        DbError::Config(ConfigError::UnknownBind(key)) if key == "missing"
    ));
}

#[test]
fn test_empty_config_is_rejected() {
    let err = Database::new(DatabaseConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        DbError::Config(ConfigError::MissingDatabaseUrl)
    ));
}

#[tokio::test]
async fn test_create_all_routes_tables_to_their_binds() {
    let db = three_bind_db();
    db.create_all().await.unwrap();

    assert_eq!(user_tables(&db.engine().unwrap()).await, vec!["baz"]);
    assert_eq!(user_tables(&db.get_engine(Some("foo")).unwrap()).await, vec!["foo"]);
    assert_eq!(user_tables(&db.get_engine(Some("bar")).unwrap()).await, vec!["bar"]);

    db.drop_all().await.unwrap();
    assert!(user_tables(&db.engine().unwrap()).await.is_empty());
    assert!(user_tables(&db.get_engine(Some("foo")).unwrap()).await.is_empty());
}

#[tokio::test]
async fn test_create_all_on_single_bind() {
    let db = three_bind_db();
    db.create_all_on(bindery_core::config::BindTarget::Key("foo".into()))
        .await
        .unwrap();

    assert_eq!(user_tables(&db.get_engine(Some("foo")).unwrap()).await, vec!["foo"]);
    assert!(user_tables(&db.engine().unwrap()).await.is_empty());
    assert!(user_tables(&db.get_engine(Some("bar")).unwrap()).await.is_empty());
}

#[tokio::test]
async fn test_get_binds_maps_tables_to_engines() {
    let db = three_bind_db();
    let binds = db.get_binds().unwrap();

    assert_eq!(binds.len(), 3);
    assert!(Arc::ptr_eq(&binds["baz"], &db.engine().unwrap()));
    assert!(Arc::ptr_eq(&binds["foo"], &db.get_engine(Some("foo")).unwrap()));
    assert!(Arc::ptr_eq(&binds["bar"], &db.get_engine(Some("bar")).unwrap()));
}

#[tokio::test]
async fn test_session_routes_by_table() {
    let db = three_bind_db();
    let session = db.session().unwrap();

    let foo_engine = db.get_engine(Some("foo")).unwrap();
    let primary = session.primary().unwrap();
    assert!(Arc::ptr_eq(&session.get_bind(Some("foo")).unwrap(), &foo_engine));
    assert!(Arc::ptr_eq(&session.get_bind(Some("baz")).unwrap(), &primary));
    assert!(Arc::ptr_eq(&session.get_bind(None).unwrap(), &primary));
    // Tables nobody registered fall back to the primary engine.
    assert!(Arc::ptr_eq(&session.get_bind(Some("nonsense")).unwrap(), &primary));
}

#[tokio::test]
async fn test_binds_only_config_opens_sessions() {
    // No default URL at all: sessions still open and route to the named
    // binds; only default-bind use fails, and only when attempted.
    let db = Database::new(DatabaseConfig::default().bind("foo", "sqlite::memory:")).unwrap();
    db.register(
        ModelDescriptor::new("Foo")
            .bind_key("foo")
            .column(Column::new("id", SqlType::Integer).primary_key()),
    )
    .unwrap();
    db.create_all().await.unwrap();

    let session = db.session().unwrap();
    session
        .execute_on(Some("foo"), "INSERT INTO foo (id) VALUES (1)")
        .await
        .unwrap();
    assert_eq!(
        session
            .fetch_all_on(Some("foo"), "SELECT id FROM foo")
            .await
            .unwrap()
            .len(),
        1
    );

    assert!(matches!(
        session.primary().unwrap_err(),
        DbError::Config(ConfigError::MissingDatabaseUrl)
    ));
    assert!(session.execute("SELECT 1").await.is_err());
}

#[tokio::test]
async fn test_session_statements_land_on_the_right_bind() {
    let db = three_bind_db();
    db.create_all().await.unwrap();
    let session = db.session().unwrap();

    session
        .execute_on(Some("foo"), "INSERT INTO foo (id) VALUES (1)")
        .await
        .unwrap();
    session
        .execute_on(Some("baz"), "INSERT INTO baz (id) VALUES (2)")
        .await
        .unwrap();

    let rows = session
        .fetch_all_on(Some("foo"), "SELECT id FROM foo")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    // The foo table only exists on the foo bind.
    assert!(session.fetch_all("SELECT id FROM foo").await.is_err());
}

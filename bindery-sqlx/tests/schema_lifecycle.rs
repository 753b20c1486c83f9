//! Full lifecycle of a statically-declared entity: register, create the
//! schema, read and write rows, drop the schema.

use bindery_core::config::DatabaseConfig;
use bindery_core::entity::Entity;
use bindery_core::schema::{Column, SqlType};
use bindery_sqlx::{blocking, Database};
use sqlx::Row;

struct Todo;

impl Entity for Todo {
    fn model_name() -> &'static str {
        "Todo"
    }

    fn table_name() -> Option<&'static str> {
        Some("todos")
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", SqlType::BigInt).primary_key(),
            Column::new("title", SqlType::Varchar(80)),
            Column::new("text", SqlType::Text),
            Column::new("done", SqlType::Boolean),
            Column::new("pub_date", SqlType::Timestamp),
        ]
    }
}

async fn table_count(pool: &sqlx::AnyPool) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .fetch_one(pool)
        .await
        .unwrap()
        .get::<i64, _>("n")
}

#[tokio::test]
async fn test_todo_lifecycle() {
    let db = Database::new(DatabaseConfig::new("sqlite::memory:")).unwrap();
    let model = db.register_entity::<Todo>().unwrap();
    assert_eq!(model.table(), Some("todos"));

    db.create_all().await.unwrap();
    let engine = db.engine().unwrap();
    assert_eq!(table_count(&engine).await, 1);

    let session = db.session().unwrap();
    session
        .execute("INSERT INTO todos (id, title, text, done) VALUES (1, 'First', 'write docs', 0)")
        .await
        .unwrap();
    session
        .execute("INSERT INTO todos (id, title, text, done) VALUES (2, 'Second', 'ship it', 1)")
        .await
        .unwrap();

    let rows = session
        .fetch_all("SELECT title FROM todos WHERE done = 0")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String, _>("title"), "First");

    let row = session
        .fetch_optional(Some("todos"), "SELECT title FROM todos WHERE id = 2")
        .await
        .unwrap();
    assert_eq!(row.unwrap().get::<String, _>("title"), "Second");

    db.drop_all().await.unwrap();
    assert_eq!(table_count(&engine).await, 0);
}

#[tokio::test]
async fn test_create_all_is_idempotent() {
    let db = Database::new(DatabaseConfig::new("sqlite::memory:")).unwrap();
    db.register_entity::<Todo>().unwrap();

    db.create_all().await.unwrap();
    db.create_all().await.unwrap();
    assert_eq!(table_count(&db.engine().unwrap()).await, 1);
}

#[tokio::test]
async fn test_transaction_rollback() {
    let db = Database::new(DatabaseConfig::new("sqlite::memory:")).unwrap();
    db.register_entity::<Todo>().unwrap();
    db.create_all().await.unwrap();
    let session = db.session().unwrap();

    let mut tx = session.begin().await.unwrap();
    sqlx::query("INSERT INTO todos (id, title) VALUES (1, 'doomed')")
        .execute(&mut *tx)
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let rows = session.fetch_all("SELECT id FROM todos").await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_file_backed_database_persists_across_facades() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("app.db").display());

    let db = Database::new(DatabaseConfig::new(&url)).unwrap();
    db.register_entity::<Todo>().unwrap();
    db.create_all().await.unwrap();
    db.session()
        .unwrap()
        .execute("INSERT INTO todos (id, title) VALUES (1, 'persisted')")
        .await
        .unwrap();
    drop(db);

    let db = Database::new(DatabaseConfig::new(&url)).unwrap();
    let rows = db
        .session()
        .unwrap()
        .fetch_all("SELECT title FROM todos")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String, _>("title"), "persisted");
}

#[test]
fn test_blocking_lifecycle() {
    let db = blocking::Database::new(DatabaseConfig::new("sqlite::memory:")).unwrap();
    db.register_entity::<Todo>().unwrap();
    db.create_all().unwrap();

    let session = db.session().unwrap();
    session
        .execute("INSERT INTO todos (id, title, done) VALUES (1, 'blocking', 0)")
        .unwrap();

    let rows = session.fetch_all("SELECT title FROM todos").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String, _>("title"), "blocking");

    let mut tx = session.begin().unwrap();
    tx.execute("INSERT INTO todos (id, title) VALUES (2, 'committed')")
        .unwrap();
    tx.commit().unwrap();

    assert_eq!(session.fetch_all("SELECT id FROM todos").unwrap().len(), 2);

    db.drop_all().unwrap();
    assert!(db
        .session()
        .unwrap()
        .fetch_all("SELECT id FROM todos")
        .is_err());
}

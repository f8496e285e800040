//! Tests for the SQLite driver.

use super::*;
use crate::pool::Connector;

fn temp_db_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("dbkit-{}.db", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn test_execute_and_query() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.execute_batch("CREATE TABLE places (id INTEGER PRIMARY KEY, name TEXT, rating REAL)")
        .await
        .unwrap();

    let inserted = conn
        .execute(
            "INSERT INTO places (name, rating) VALUES (?, ?)",
            &[SqliteValue::Text("harbour".to_string()), SqliteValue::Real(4.5)],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let result = conn.query("SELECT * FROM places", &[]).await.unwrap();
    assert_eq!(result.columns, vec!["id", "name", "rating"]);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][1], SqliteValue::Text("harbour".to_string()));
    assert_eq!(result.rows_affected, 0);
}

#[tokio::test]
async fn test_null_and_blob_values() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER, name TEXT, data BLOB)")
        .await
        .unwrap();

    let blob = vec![0xDE, 0xAD, 0xBE, 0xEF];
    conn.execute(
        "INSERT INTO t (id, name, data) VALUES (?, ?, ?)",
        &[SqliteValue::Integer(1), SqliteValue::Null, SqliteValue::Blob(blob.clone())],
    )
    .await
    .unwrap();

    let result = conn.query("SELECT name, data FROM t", &[]).await.unwrap();
    assert!(result.rows[0][0].is_null());
    assert_eq!(result.rows[0][1], SqliteValue::Blob(blob));
}

#[tokio::test]
async fn test_upsert_reports_one_change_per_statement() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, a TEXT)")
        .await
        .unwrap();

    let sql = "INSERT INTO t (id, a) VALUES (?1, ?2) \
               ON CONFLICT (id) DO UPDATE SET id = excluded.id, a = excluded.a";
    for value in ["x", "x2"] {
        let changed = conn
            .execute(sql, &[SqliteValue::Integer(1), SqliteValue::Text(value.to_string())])
            .await
            .unwrap();
        assert_eq!(changed, 1);
    }

    let result = conn.query("SELECT id, a FROM t", &[]).await.unwrap();
    assert_eq!(
        result.rows,
        vec![vec![SqliteValue::Integer(1), SqliteValue::Text("x2".to_string())]]
    );
}

#[tokio::test]
async fn test_constraint_violation_surfaces_sqlite_error() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    conn.execute("INSERT INTO t (id) VALUES (1)", &[]).await.unwrap();

    let err = conn.execute("INSERT INTO t (id) VALUES (1)", &[]).await.unwrap_err();
    // SQLITE_CONSTRAINT_PRIMARYKEY
    assert_eq!(err.extended_code(), Some(1555));
}

#[tokio::test]
async fn test_file_database_persists_across_connections() {
    let path = temp_db_path();
    let path_str = path.to_string_lossy().to_string();

    let writer = SqliteConnection::open(&path_str).await.unwrap();
    writer
        .execute_batch("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (7);")
        .await
        .unwrap();

    let reader = SqliteConnection::open(&path_str).await.unwrap();
    let result = reader.query("SELECT id FROM t", &[]).await.unwrap();
    assert_eq!(result.rows[0][0], SqliteValue::Integer(7));

    drop(writer);
    drop(reader);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_shared_memory_database_between_connections() {
    let connector = SqliteConnector::from_pool_config(&crate::config::PoolConfig::new(
        "sqlite",
        "sqlite::memory:",
    ))
    .unwrap();

    let a = connector.connect().await.unwrap();
    let b = connector.connect().await.unwrap();
    a.execute_batch("CREATE TABLE shared (v TEXT)").await.unwrap();
    a.execute("INSERT INTO shared (v) VALUES ('seen')", &[])
        .await
        .unwrap();

    let result = b.query("SELECT v FROM shared", &[]).await.unwrap();
    assert_eq!(result.rows[0][0], SqliteValue::Text("seen".to_string()));
}

#[tokio::test]
async fn test_ping_and_close() {
    let connector = SqliteConnector::new(":memory:");
    let mut conn = connector.connect().await.unwrap();
    connector.ping(&mut conn).await.unwrap();

    conn.close().await.unwrap();
    assert!(connector.is_closed(&conn));
    assert!(matches!(
        conn.query("SELECT 1", &[]).await,
        Err(SqliteError::ConnectionClosed)
    ));
}

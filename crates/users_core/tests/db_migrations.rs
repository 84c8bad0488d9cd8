use std::time::Duration;
use users_core::db::migrations::latest_version;
use users_core::db::{open_db, open_db_in_memory, DbError};
use users_core::{Database, DatabaseConfig};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "users");
    assert_table_exists(&conn, "user_user_follows");
    assert_table_exists(&conn, "user_source_follows");
}

#[test]
fn users_table_enforces_unique_username_and_email() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO users (uuid, username, email, hashed_password, created_by_uuid, created_at)
                  VALUES (?1, ?2, ?3, 'h', ?1, 0);";

    conn.execute(insert, ["a", "ada", "ada@example.com"]).unwrap();
    assert!(conn.execute(insert, ["b", "ada", "other@example.com"]).is_err());
    assert!(conn.execute(insert, ["c", "other", "ada@example.com"]).is_err());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");

    let conn_first = open_db(&path, Duration::from_secs(1)).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path, Duration::from_secs(1)).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "users");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path, Duration::from_secs(1)).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn in_memory_handle_stays_connected_until_closed() {
    let database = Database::open_in_memory().unwrap();
    assert!(database.is_connected());

    let version: u32 = database
        .with_conn(|conn| {
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
                .map_err(DbError::from)
        })
        .unwrap();
    assert_eq!(version, latest_version());

    database.close().unwrap();
    assert!(!database.is_connected());
}

#[test]
fn database_handle_connects_closes_and_refuses_use_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::new(DatabaseConfig::file(dir.path().join("users.db")));

    let before: Result<(), DbError> = database.with_conn(|_| Ok(()));
    assert!(matches!(before, Err(DbError::NotConnected)));

    let close = database.connect().unwrap();
    assert!(database.is_connected());
    let version: u32 = database
        .with_conn(|conn| {
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
                .map_err(DbError::from)
        })
        .unwrap();
    assert_eq!(version, latest_version());

    close().unwrap();
    assert!(!database.is_connected());
    let after: Result<(), DbError> = database.with_conn(|_| Ok(()));
    assert!(matches!(after, Err(DbError::NotConnected)));

    // Closing again is harmless.
    database.close().unwrap();
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}

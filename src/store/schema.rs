use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StorageError;

pub const DB_SCHEMA_VERSION: &str = "1.0.0";

pub(super) const META_SCHEMA_VERSION: &str = "schema_version";
pub(super) const META_EMBEDDING_DESCRIPTOR: &str = "embedding_descriptor";

pub(super) fn ensure_schema(connection: &mut Connection) -> Result<(), StorageError> {
    let tx = connection.transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS faq_embeddings (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          question TEXT NOT NULL,
          answer TEXT NOT NULL,
          embedding BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS data_hash (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          file_hash TEXT UNIQUE
        );

        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sync_lock (
          name TEXT PRIMARY KEY,
          holder TEXT NOT NULL,
          acquired_at TEXT NOT NULL,
          expires_at INTEGER NOT NULL
        );
        ",
    )?;
    if get_metadata(&tx, META_SCHEMA_VERSION)?.as_deref() != Some(DB_SCHEMA_VERSION) {
        set_metadata(&tx, META_SCHEMA_VERSION, DB_SCHEMA_VERSION)?;
    }
    tx.commit()?;

    Ok(())
}

pub(super) fn set_metadata(
    connection: &Connection,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    connection.execute(
        "
        INSERT INTO metadata(key, value) VALUES(?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value=excluded.value
        ",
        params![key, value],
    )?;
    Ok(())
}

pub(super) fn get_metadata(
    connection: &Connection,
    key: &str,
) -> Result<Option<String>, StorageError> {
    let value = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

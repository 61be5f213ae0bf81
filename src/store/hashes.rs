use rusqlite::{Connection, OptionalExtension, params};

use super::RunLease;
use super::lock::renew_lease;
use crate::error::StorageError;
use crate::model::Fingerprint;

const CURRENT_HASH_ID: i64 = 1;

pub(super) fn hash_exists(
    connection: &Connection,
    fingerprint: &Fingerprint,
) -> Result<bool, StorageError> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM data_hash WHERE file_hash = ?1)",
        params![fingerprint.as_str()],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

pub(super) fn replace_current_hash(
    connection: &mut Connection,
    lease: &RunLease<'_>,
    fingerprint: &Fingerprint,
) -> Result<(), StorageError> {
    let tx = connection.transaction()?;
    renew_lease(&tx, &lease.name, &lease.holder, lease.ttl)?;
    tx.execute(
        "DELETE FROM data_hash WHERE id <> ?1",
        params![CURRENT_HASH_ID],
    )?;
    tx.execute(
        "
        INSERT INTO data_hash(id, file_hash) VALUES(?1, ?2)
        ON CONFLICT(id) DO UPDATE SET file_hash=excluded.file_hash
        ",
        params![CURRENT_HASH_ID, fingerprint.as_str()],
    )?;
    tx.commit()?;
    Ok(())
}

pub(super) fn current_hash(connection: &Connection) -> Result<Option<Fingerprint>, StorageError> {
    let value = connection
        .query_row(
            "SELECT file_hash FROM data_hash WHERE file_hash IS NOT NULL ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value.map(Fingerprint::from_hex))
}

pub(super) fn hash_record_count(connection: &Connection) -> Result<i64, StorageError> {
    let count = connection.query_row("SELECT COUNT(*) FROM data_hash", [], |row| row.get(0))?;
    Ok(count)
}

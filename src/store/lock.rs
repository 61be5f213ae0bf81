use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum LeaseAttempt {
    Acquired,
    HeldBy(String),
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

pub(super) fn try_acquire_lease(
    connection: &mut Connection,
    name: &str,
    holder: &str,
    ttl: Duration,
) -> Result<LeaseAttempt, StorageError> {
    let now = Utc::now();
    let now_epoch = now.timestamp();
    let expires_at = now_epoch.saturating_add(ttl_secs(ttl));

    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "DELETE FROM sync_lock WHERE name = ?1 AND (expires_at <= ?2 OR holder = ?3)",
        params![name, now_epoch, holder],
    )?;
    let inserted = tx.execute(
        "
        INSERT INTO sync_lock(name, holder, acquired_at, expires_at) VALUES(?1, ?2, ?3, ?4)
        ON CONFLICT(name) DO NOTHING
        ",
        params![name, holder, now, expires_at],
    )?;

    let attempt = if inserted == 1 {
        LeaseAttempt::Acquired
    } else {
        let current: String = tx.query_row(
            "SELECT holder FROM sync_lock WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        LeaseAttempt::HeldBy(current)
    };
    tx.commit()?;

    Ok(attempt)
}

pub(super) fn release_lease(
    connection: &Connection,
    name: &str,
    holder: &str,
) -> Result<bool, StorageError> {
    let deleted = connection.execute(
        "DELETE FROM sync_lock WHERE name = ?1 AND holder = ?2",
        params![name, holder],
    )?;
    Ok(deleted == 1)
}

/// Extends a live lease owned by `holder`. Run inside the write transaction
/// so the write commits only while the lease is still ours.
pub(super) fn renew_lease(
    connection: &Connection,
    name: &str,
    holder: &str,
    ttl: Duration,
) -> Result<(), StorageError> {
    let now_epoch = Utc::now().timestamp();
    let renewed = connection.execute(
        "
        UPDATE sync_lock SET expires_at = ?1
        WHERE name = ?2 AND holder = ?3 AND expires_at > ?4
        ",
        params![
            now_epoch.saturating_add(ttl_secs(ttl)),
            name,
            holder,
            now_epoch
        ],
    )?;
    if renewed == 1 {
        return Ok(());
    }

    let current = connection
        .query_row(
            "SELECT holder FROM sync_lock WHERE name = ?1 AND expires_at > ?2",
            params![name, now_epoch],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Err(StorageError::LeaseLost {
        name: name.to_string(),
        holder_was: holder.to_string(),
        holder: current,
    })
}

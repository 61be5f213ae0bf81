mod hashes;
mod lock;
mod pool;
mod rows;
mod schema;

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

pub use pool::{ConnectionPool, PoolConfig};
pub use schema::DB_SCHEMA_VERSION;

use crate::error::StorageError;
use crate::model::{EmbeddingDescriptor, FaqEntry, Fingerprint, StoredEmbeddingRow};
use lock::LeaseAttempt;

pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn open(db_path: &Path, config: PoolConfig) -> Self {
        Self::new(ConnectionPool::new(db_path, config))
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn ensure_schema(&self) -> Result<(), StorageError> {
        self.pool.with_conn(schema::ensure_schema)?;
        info!(path = %self.db_path().display(), "database tables created or verified");
        Ok(())
    }

    pub fn hash_exists(&self, fingerprint: &Fingerprint) -> Result<bool, StorageError> {
        self.pool
            .with_conn(|connection| hashes::hash_exists(connection, fingerprint))
    }

    pub fn replace_hash(
        &self,
        lease: &RunLease<'_>,
        fingerprint: &Fingerprint,
    ) -> Result<(), StorageError> {
        self.pool.with_conn(|connection| {
            hashes::replace_current_hash(connection, lease, fingerprint)
        })
    }

    pub fn current_hash(&self) -> Result<Option<Fingerprint>, StorageError> {
        self.pool.with_conn(|connection| hashes::current_hash(connection))
    }

    pub fn hash_record_count(&self) -> Result<i64, StorageError> {
        self.pool
            .with_conn(|connection| hashes::hash_record_count(connection))
    }

    pub fn replace_rows(
        &self,
        lease: &RunLease<'_>,
        entries: &[FaqEntry],
        embeddings: &[Vec<f32>],
        descriptor: &EmbeddingDescriptor,
    ) -> Result<usize, StorageError> {
        self.pool.with_conn(|connection| {
            rows::replace_rows(connection, lease, entries, embeddings, descriptor)
        })
    }

    pub fn row_count(&self) -> Result<i64, StorageError> {
        self.pool.with_conn(|connection| rows::row_count(connection))
    }

    pub fn embedding_descriptor(&self) -> Result<Option<EmbeddingDescriptor>, StorageError> {
        self.pool
            .with_conn(|connection| rows::embedding_descriptor(connection))
    }

    pub fn load_rows(&self, dimensions: usize) -> Result<Vec<StoredEmbeddingRow>, StorageError> {
        self.pool
            .with_conn(|connection| rows::load_rows(connection, dimensions))
    }

    pub fn schema_version(&self) -> Result<Option<String>, StorageError> {
        self.pool.with_conn(|connection| {
            schema::get_metadata(connection, schema::META_SCHEMA_VERSION)
        })
    }

    pub fn lease(
        &self,
        name: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<LeaseOutcome<'_>, StorageError> {
        let attempt = self
            .pool
            .with_conn(|connection| lock::try_acquire_lease(connection, name, holder, ttl))?;

        Ok(match attempt {
            LeaseAttempt::Acquired => LeaseOutcome::Acquired(RunLease {
                store: self,
                name: name.to_string(),
                holder: holder.to_string(),
                ttl,
            }),
            LeaseAttempt::HeldBy(current) => LeaseOutcome::Busy { holder: current },
        })
    }
}

pub enum LeaseOutcome<'store> {
    Acquired(RunLease<'store>),
    Busy { holder: String },
}

pub struct RunLease<'store> {
    store: &'store Store,
    name: String,
    holder: String,
    ttl: Duration,
}

impl RunLease<'_> {
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for RunLease<'_> {
    fn drop(&mut self) {
        let released = self
            .store
            .pool
            .with_conn(|connection| lock::release_lease(connection, &self.name, &self.holder));

        match released {
            Ok(true) => {}
            Ok(false) => {
                warn!(lease = %self.name, holder = %self.holder, "lease already gone at release")
            }
            Err(err) => warn!(lease = %self.name, error = %err, "failed to release lease"),
        }
    }
}

#[cfg(test)]
pub(crate) fn temp_db_path(label: &str) -> std::path::PathBuf {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|value| value.as_nanos())
        .unwrap_or(0);

    std::env::temp_dir().join(format!(
        "faqsync-{label}-{}-{nanos}-{seq}.sqlite",
        std::process::id()
    ))
}

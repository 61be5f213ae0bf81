
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cli::HashCheckPolicy;
use crate::dataset;
use crate::embedding::{EMBEDDING_ENCODING, EmbeddingProvider, validate_embeddings};
use crate::error::SyncError;
use crate::model::{EmbeddingDescriptor, FaqEntry, Fingerprint, Table};
use crate::store::{LeaseOutcome, RunLease, Store};

pub const REFRESH_LEASE_NAME: &str = "faq-refresh";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub hash_check_policy: HashCheckPolicy,
    pub lease_ttl: Duration,
    pub holder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Current {
        fingerprint: Fingerprint,
    },
    Refreshed {
        fingerprint: Fingerprint,
        rows_written: usize,
    },
}

impl SyncOutcome {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::Current { fingerprint } | Self::Refreshed { fingerprint, .. } => fingerprint,
        }
    }

    pub fn rows_written(&self) -> usize {
        match self {
            Self::Current { .. } => 0,
            Self::Refreshed { rows_written, .. } => *rows_written,
        }
    }
}

pub struct Synchronizer<'a, P: EmbeddingProvider + ?Sized> {
    store: &'a Store,
    provider: &'a P,
    options: SyncOptions,
}

impl<'a, P: EmbeddingProvider + ?Sized> Synchronizer<'a, P> {
    pub fn new(store: &'a Store, provider: &'a P, options: SyncOptions) -> Self {
        Self {
            store,
            provider,
            options,
        }
    }

    pub fn sync(&self, table: &Table) -> Result<SyncOutcome, SyncError> {
        let fingerprint = dataset::fingerprint(table)?;
        info!(fingerprint = %fingerprint, rows = table.rows.len(), "dataset hashed");

        let entries = table.faq_entries()?;
        if self.is_current(&fingerprint)? {
            info!(fingerprint = %fingerprint, "data is up to date");
            return Ok(SyncOutcome::Current { fingerprint });
        }

        // Another run may have finished between the check and the lease.
        let lease = self.acquire_lease()?;
        if self.is_current(&fingerprint)? {
            info!(fingerprint = %fingerprint, "data refreshed by another run");
            return Ok(SyncOutcome::Current { fingerprint });
        }

        info!(fingerprint = %fingerprint, "data hash mismatch, refreshing store");
        let rows_written = self.replace_all(&lease, &entries, &fingerprint)?;

        Ok(SyncOutcome::Refreshed {
            fingerprint,
            rows_written,
        })
    }

    pub fn is_current(&self, fingerprint: &Fingerprint) -> Result<bool, SyncError> {
        match self.store.hash_exists(fingerprint) {
            Ok(exists) => Ok(exists),
            Err(err) => match self.options.hash_check_policy {
                HashCheckPolicy::FailOpen => {
                    warn!(
                        fingerprint = %fingerprint,
                        error = %err,
                        "hash check failed, treating data as stale"
                    );
                    Ok(false)
                }
                HashCheckPolicy::FailClosed => Err(err.into()),
            },
        }
    }

    pub fn refresh(&self, table: &Table) -> Result<SyncOutcome, SyncError> {
        let fingerprint = dataset::fingerprint(table)?;
        let entries = table.faq_entries()?;
        let lease = self.acquire_lease()?;
        let rows_written = self.replace_all(&lease, &entries, &fingerprint)?;

        Ok(SyncOutcome::Refreshed {
            fingerprint,
            rows_written,
        })
    }

    fn replace_all(
        &self,
        lease: &RunLease<'_>,
        entries: &[FaqEntry],
        fingerprint: &Fingerprint,
    ) -> Result<usize, SyncError> {
        let questions = entries
            .iter()
            .map(|entry| entry.question.clone())
            .collect::<Vec<String>>();

        let embeddings = if questions.is_empty() {
            Vec::new()
        } else {
            self.provider.embed_batch(&questions)?
        };
        validate_embeddings(&embeddings, questions.len(), self.provider.dimensions())?;
        info!(
            provider = self.provider.name(),
            model_id = self.provider.model_id(),
            count = embeddings.len(),
            "embeddings received"
        );

        let descriptor = EmbeddingDescriptor {
            provider: self.provider.name().to_string(),
            model_id: self.provider.model_id().to_string(),
            dimensions: self.provider.dimensions(),
            encoding: EMBEDDING_ENCODING.to_string(),
        };
        let rows_written = self
            .store
            .replace_rows(lease, entries, &embeddings, &descriptor)?;
        info!(rows_written, "embedding rows replaced");

        self.store.replace_hash(lease, fingerprint)?;
        info!(fingerprint = %fingerprint, "data hash replaced");

        Ok(rows_written)
    }

    fn acquire_lease(&self) -> Result<RunLease<'a>, SyncError> {
        match self.store.lease(
            REFRESH_LEASE_NAME,
            &self.options.holder,
            self.options.lease_ttl,
        )? {
            LeaseOutcome::Acquired(lease) => {
                debug!(holder = lease.holder(), "refresh lease acquired");
                Ok(lease)
            }
            LeaseOutcome::Busy { holder } => Err(SyncError::Locked { holder }),
        }
    }
}

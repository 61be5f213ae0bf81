use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::config::StoreConfig;
use crate::store::Store;

pub fn run(args: StatusArgs) -> Result<()> {
    let config = StoreConfig::from_args(&args.store)?;

    info!(path = %config.db_path.display(), "status requested");

    if !config.db_path.exists() {
        warn!(path = %config.db_path.display(), "database file missing");
        return Ok(());
    }

    let store = Store::open(&config.db_path, config.pool);
    let schema_version = store.schema_version().context("failed to read schema version")?;
    let current_hash = store.current_hash().context("failed to read data hash")?;
    let hash_records = store.hash_record_count()?;
    let rows = store.row_count()?;
    let descriptor = store.embedding_descriptor()?;

    info!(
        schema_version = %schema_version.unwrap_or_default(),
        current_hash = %current_hash.map(|value| value.to_string()).unwrap_or_default(),
        hash_records,
        rows,
        "database status"
    );

    if hash_records > 1 {
        warn!(hash_records, "more than one data hash record present");
    }

    let Some(descriptor) = descriptor else {
        warn!("no embedding metadata recorded; store has not been refreshed yet");
        return Ok(());
    };

    info!(
        provider = %descriptor.provider,
        model_id = %descriptor.model_id,
        dimensions = descriptor.dimensions,
        encoding = %descriptor.encoding,
        "stored embedding metadata"
    );

    if args.verify_embeddings {
        let decoded = store
            .load_rows(descriptor.dimensions)
            .context("stored embeddings failed verification")?;
        let blank = decoded
            .iter()
            .filter(|row| row.question.trim().is_empty() || row.answer.trim().is_empty())
            .map(|row| row.id)
            .collect::<Vec<i64>>();
        let zero_vectors = decoded
            .iter()
            .filter(|row| row.embedding.iter().all(|value| *value == 0.0))
            .count();

        if !blank.is_empty() {
            warn!(count = blank.len(), first_id = blank[0], "rows with blank question or answer");
        }
        info!(
            rows = decoded.len(),
            zero_vectors,
            "all stored embeddings decode cleanly"
        );
    }

    Ok(())
}

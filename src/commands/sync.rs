use std::process;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::SyncArgs;
use crate::config::{StoreConfig, build_provider};
use crate::dataset::load_table;
use crate::model::{SyncRunReport, SyncStatus};
use crate::store::Store;
use crate::sync::{SyncOptions, SyncOutcome, Synchronizer};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: SyncArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let started = Instant::now();
    let run_id = format!("sync-{}", utc_compact_string(started_ts));

    let store_config = StoreConfig::from_args(&args.store)?;
    let provider = build_provider(&args.provider)?;

    let manifest_dir = args.store.cache_root.join("manifests");
    let report_path = args.report_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("sync_run_{}.json", utc_compact_string(started_ts)))
    });

    if let Some(parent) = store_config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    info!(
        run_id = %run_id,
        dataset = %args.dataset.display(),
        db_path = %store_config.db_path.display(),
        provider = provider.name(),
        model_id = provider.model_id(),
        pool_size = store_config.pool.max_size,
        force = args.force,
        "starting sync"
    );

    let store = Store::open(&store_config.db_path, store_config.pool.clone());
    store
        .ensure_schema()
        .with_context(|| format!("failed to set up {}", store_config.db_path.display()))?;

    let table = load_table(&args.dataset)?;
    let options = SyncOptions {
        hash_check_policy: args.hash_check_policy,
        lease_ttl: Duration::from_secs(args.lock_ttl_secs),
        holder: format!("{run_id}-pid{}", process::id()),
    };

    let synchronizer = Synchronizer::new(&store, &*provider, options);
    let outcome = if args.force {
        synchronizer.refresh(&table)
    } else {
        synchronizer.sync(&table)
    }
    .with_context(|| format!("sync of {} failed", args.dataset.display()))?;

    let report = SyncRunReport {
        manifest_version: 1,
        run_id,
        started_at,
        finished_at: now_utc_string(),
        dataset_path: args.dataset.display().to_string(),
        db_path: store_config.db_path.display().to_string(),
        fingerprint: outcome.fingerprint().clone(),
        status: match outcome {
            SyncOutcome::Current { .. } => SyncStatus::Current,
            SyncOutcome::Refreshed { .. } => SyncStatus::Refreshed,
        },
        row_count: table.rows.len(),
        rows_written: outcome.rows_written(),
        provider: provider.name().to_string(),
        model_id: provider.model_id().to_string(),
        dimensions: provider.dimensions(),
        hash_check_policy: args.hash_check_policy.as_str().to_string(),
        duration_ms: started.elapsed().as_millis(),
    };
    write_json_pretty(&report_path, &report)?;

    info!(
        path = %report_path.display(),
        fingerprint = %report.fingerprint,
        rows_written = report.rows_written,
        pooled_connections = store.pool().open_count(),
        "sync completed"
    );

    Ok(())
}

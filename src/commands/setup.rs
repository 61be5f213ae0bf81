use anyhow::{Context, Result};
use tracing::info;

use crate::cli::SetupArgs;
use crate::config::StoreConfig;
use crate::store::{DB_SCHEMA_VERSION, Store};
use crate::util::ensure_directory;

pub fn run(args: SetupArgs) -> Result<()> {
    let config = StoreConfig::from_args(&args.store)?;
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }

    let store = Store::open(&config.db_path, config.pool);
    store
        .ensure_schema()
        .with_context(|| format!("failed to set up {}", config.db_path.display()))?;

    info!(
        path = %config.db_path.display(),
        schema_version = DB_SCHEMA_VERSION,
        pool_size = store.pool().max_size(),
        "setup completed"
    );
    Ok(())
}

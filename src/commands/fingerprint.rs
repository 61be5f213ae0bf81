use anyhow::{Context, Result};
use tracing::info;

use crate::cli::FingerprintArgs;
use crate::dataset::{fingerprint, load_table};

pub fn run(args: FingerprintArgs) -> Result<()> {
    let table = load_table(&args.dataset)?;
    let fingerprint = fingerprint(&table)
        .with_context(|| format!("failed to fingerprint {}", args.dataset.display()))?;

    info!(
        path = %args.dataset.display(),
        columns = table.columns.len(),
        rows = table.rows.len(),
        "dataset fingerprinted"
    );
    println!("{fingerprint}");
    Ok(())
}

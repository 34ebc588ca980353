use anyhow::Result;
use clap::Parser;
use parquet_upsert::cli::Cli;
use parquet_upsert::logging::init_logging;
use parquet_upsert::{MemoryDocumentStore, run_update};
use tracing::info;

fn main() -> Result<()> {
    init_logging();
    let config = Cli::parse().into_config()?;

    let store = MemoryDocumentStore::new(&config.database, &config.collection);
    let summary = run_update(&config, &store)?;

    if let Some(output) = &config.output {
        let n = store.snapshot_jsonl(output)?;
        info!(stage = "snapshot", path = %output.display(), documents = n);
    }

    info!(stage = "finish job", failed_batches = summary.failed);
    Ok(())
}

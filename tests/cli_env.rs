// Environment variables are process-wide, so this file holds a single test.

use anyhow::Result;
use clap::Parser;
use parquet_upsert::cli::Cli;
use std::path::PathBuf;

fn set(key: &str, value: &str) {
    // SAFETY: the only test in this binary, nothing else reads the environment
    unsafe { std::env::set_var(key, value) };
}

fn unset(key: &str) {
    // SAFETY: see `set`
    unsafe { std::env::remove_var(key) };
}

#[test]
fn environment_layers_between_file_and_flags() -> Result<()> {
    set("BULK_UPDATE_SOURCE_PATH", "/data/env");
    set("BULK_UPDATE_READ_BATCH_SIZE", "5000");
    set("BULK_UPDATE_CONCURRENCY_LIMIT", "3");
    set("BULK_UPDATE_ORDERED_EXECUTION", "yes");
    set("BULK_UPDATE_COLLECTION", "features");
    set("BULK_UPDATE_TIMESTAMP_FIELD", "touched");
    set("BULK_UPDATE_OUTPUT", "/tmp/out.jsonl");
    set(
        "BULK_UPDATE_SCHEMA",
        r#"[{"name": "key", "data_type": "utf8", "nullable": false}, {"name": "x", "data_type": "int64"}]"#,
    );

    let config = Cli::try_parse_from(["bulk-update"])?.into_config()?;
    assert_eq!(config.source_path, PathBuf::from("/data/env"));
    assert_eq!(config.read_batch_size, 5_000);
    assert_eq!(config.concurrency_limit, 3);
    assert!(config.ordered_execution);
    assert_eq!(config.database, "bulk_update");
    assert_eq!(config.collection, "features");
    assert_eq!(config.timestamp_field, "touched");
    assert_eq!(config.output, Some(PathBuf::from("/tmp/out.jsonl")));
    assert_eq!(config.schema.id_field(), "key");

    // flags win over the environment
    let config = Cli::try_parse_from(["bulk-update", "-c", "7", "--ordered", "false"])?
        .into_config()?;
    assert_eq!(config.concurrency_limit, 7);
    assert!(!config.ordered_execution);

    set("BULK_UPDATE_ORDERED_EXECUTION", "maybe");
    assert!(Cli::try_parse_from(["bulk-update"]).is_err());
    unset("BULK_UPDATE_ORDERED_EXECUTION");

    set("BULK_UPDATE_READ_BATCH_SIZE", "10");
    assert!(Cli::try_parse_from(["bulk-update"]).is_err());
    unset("BULK_UPDATE_READ_BATCH_SIZE");

    let config = Cli::try_parse_from(["bulk-update"])?.into_config()?;
    assert!(!config.ordered_execution);
    assert_eq!(config.read_batch_size, 10_000);
    Ok(())
}

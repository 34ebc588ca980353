//! Dataset file discovery.
//!
//! A dataset location is either a single file, a directory (searched
//! recursively for files with the wanted extension), or a glob pattern such as
//! `data/year=2024/month=*/*.parquet`. Results are always sorted so batches
//! are read in a deterministic order.

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::{Path, PathBuf};

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Directories matched by the pattern are skipped. No match is not an error.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or an entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }

    result.sort();
    Ok(result)
}

/// Resolve a dataset location into the sorted list of files to read.
///
/// - an existing file resolves to itself,
/// - an existing directory resolves to every `*.{extension}` file below it,
/// - anything else is treated as a glob pattern.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or nothing matches.
pub fn resolve_files(location: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>> {
    let location = location.as_ref();
    let files = if location.is_file() {
        vec![location.to_path_buf()]
    } else if location.is_dir() {
        let pattern = location.join("**").join(format!("*.{extension}"));
        expand_glob(&pattern.to_string_lossy())?
    } else {
        expand_glob(&location.to_string_lossy())?
    };

    if files.is_empty() {
        bail!("no .{extension} files found at {}", location.display());
    }
    Ok(files)
}

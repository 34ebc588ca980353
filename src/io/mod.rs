//! File helpers: dataset discovery and JSON Lines snapshots.

pub mod glob;
pub mod jsonl;

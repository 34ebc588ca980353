//! In-memory document store with upsert semantics.
//!
//! Documents are addressed by their key filter: an instruction filtering on
//! `{"_id": "a"}` always targets the same document, so lookups stay O(log n)
//! regardless of the collection size. The store mimics the behaviour of a
//! document database for the operations this crate emits:
//!
//! - `$set` assigns fields, `$currentDate` stamps the server time,
//! - upserts insert `filter ∪ set ∪ timestamps` when nothing matches,
//! - changing a key field through `$set` is rejected per document,
//! - filters on values that cannot be keys (nulls, NaN, infinities) are
//!   rejected per document,
//! - ordered writes stop at the first rejection, unordered writes go on.

use crate::io::jsonl::write_jsonl_vec;
use crate::sink::traits::{BulkResult, BulkWriteError, BulkWriteResult, BulkWriteSink, WriteError};
use crate::update::UpdateInstruction;
use crate::value::Value;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// A stored document.
pub type Document = BTreeMap<String, Value>;

type DocumentStorage = Arc<Mutex<BTreeMap<String, Document>>>;

/// Thread-safe in-memory collection. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    database: String,
    collection: String,
    documents: DocumentStorage,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            documents: Arc::default(),
        }
    }

    /// Number of stored documents.
    ///
    /// # Panics
    ///
    /// Panics if the documents mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().expect("documents mutex poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the document whose key field `field` equals `key`.
    ///
    /// # Panics
    ///
    /// Panics if the documents mutex is poisoned.
    #[must_use]
    pub fn get(&self, field: &str, key: impl Into<Value>) -> Option<Document> {
        let filter = BTreeMap::from([(field.to_string(), key.into())]);
        let address = address_of(&filter).ok()?;
        self.documents
            .lock()
            .expect("documents mutex poisoned")
            .get(&address)
            .cloned()
    }

    /// All documents, ordered by key.
    ///
    /// # Panics
    ///
    /// Panics if the documents mutex is poisoned.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        self.documents
            .lock()
            .expect("documents mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Insert a document as-is, keyed by `field`. Used to seed a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no usable key in `field`.
    ///
    /// # Panics
    ///
    /// Panics if the documents mutex is poisoned.
    pub fn seed(&self, field: &str, document: Document) -> Result<()> {
        let key = document
            .get(field)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("document has no {field} field"))?;
        let filter = BTreeMap::from([(field.to_string(), key)]);
        let address = address_of(&filter).map_err(anyhow::Error::msg)?;
        self.documents
            .lock()
            .expect("documents mutex poisoned")
            .insert(address, document);
        Ok(())
    }

    /// Write every document to `path` as JSON Lines, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn snapshot_jsonl(&self, path: impl AsRef<Path>) -> Result<usize> {
        write_jsonl_vec(path, &self.documents())
    }
}

impl BulkWriteSink for MemoryDocumentStore {
    fn bulk_write(&self, instructions: &[UpdateInstruction], ordered: bool) -> BulkWriteResult {
        if instructions.is_empty() {
            return Err(BulkWriteError::invalid_input("no operations to execute"));
        }

        let now = now_millis();
        let mut counts = BulkResult::default();
        let mut write_errors = Vec::new();

        let mut documents = self
            .documents
            .lock()
            .map_err(|_| BulkWriteError::transport("documents mutex poisoned"))?;

        for (index, instruction) in instructions.iter().enumerate() {
            match apply(&mut documents, instruction, now) {
                Ok(applied) => counts += applied,
                Err(message) => {
                    write_errors.push(WriteError { index, message });
                    if ordered {
                        break;
                    }
                }
            }
        }
        drop(documents);

        debug!(
            namespace = %self.namespace(),
            operations = instructions.len(),
            rejected = write_errors.len(),
            "applied bulk write"
        );

        if write_errors.is_empty() {
            Ok(counts)
        } else {
            Err(BulkWriteError::Partial {
                counts,
                write_errors,
            })
        }
    }

    fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Stable address of the document a key filter designates.
fn address_of(filter: &BTreeMap<String, Value>) -> Result<String, String> {
    if filter.is_empty() {
        return Err("empty filter".to_string());
    }
    if let Some((field, value)) = filter.iter().find(|(_, v)| !v.is_key()) {
        return Err(format!("filter value {value} for {field} is not a valid key"));
    }
    serde_json::to_string(filter).map_err(|e| e.to_string())
}

/// Apply one instruction, returning the counters it contributes.
fn apply(
    documents: &mut BTreeMap<String, Document>,
    instruction: &UpdateInstruction,
    now: i64,
) -> Result<BulkResult, String> {
    let address = address_of(&instruction.filter)?;

    for (field, value) in &instruction.filter {
        if let Some(assigned) = instruction.set.get(field)
            && assigned != value
        {
            return Err(format!("performing an update on the path '{field}' would modify an immutable key"));
        }
    }

    if let Some(existing) = documents.get_mut(&address) {
        let before = existing.clone();
        for (field, value) in &instruction.set {
            existing.insert(field.clone(), value.clone());
        }
        for field in &instruction.current_date {
            existing.insert(field.clone(), Value::Timestamp(now));
        }
        let modified = u64::from(*existing != before);
        return Ok(BulkResult::new(1, modified, 0, 0));
    }

    if !instruction.upsert {
        return Ok(BulkResult::default());
    }

    let mut document = instruction.filter.clone();
    for (field, value) in &instruction.set {
        document.insert(field.clone(), value.clone());
    }
    for field in &instruction.current_date {
        document.insert(field.clone(), Value::Timestamp(now));
    }
    documents.insert(address, document);
    Ok(BulkResult::new(0, 0, 1, 0))
}

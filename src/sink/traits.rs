//! The bulk-write seam between the dispatch engine and a document store.
//!
//! The interface is synchronous: dispatch workers are plain threads, and an
//! implementation backed by an async driver blocks on it internally.

use crate::update::UpdateInstruction;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

// ============================================================================
// Result Counters
// ============================================================================

/// Counters reported for one bulk-write call, or summed over many.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BulkResult {
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
    pub inserted: u64,
}

impl BulkResult {
    #[must_use]
    pub const fn new(matched: u64, modified: u64, upserted: u64, inserted: u64) -> Self {
        Self {
            matched,
            modified,
            upserted,
            inserted,
        }
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.matched == 0 && self.modified == 0 && self.upserted == 0 && self.inserted == 0
    }
}

impl Add for BulkResult {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            matched: self.matched + rhs.matched,
            modified: self.modified + rhs.modified,
            upserted: self.upserted + rhs.upserted,
            inserted: self.inserted + rhs.inserted,
        }
    }
}

impl AddAssign for BulkResult {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for BulkResult {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Self> for BulkResult {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A rejected operation inside an otherwise executed bulk write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WriteError {
    /// Position of the operation in the submitted list.
    pub index: usize,
    pub message: String,
}

/// Failure of a bulk-write call.
#[derive(Clone, Debug, PartialEq)]
pub enum BulkWriteError {
    /// Some operations were rejected; `counts` covers the applied ones.
    Partial {
        counts: BulkResult,
        write_errors: Vec<WriteError>,
    },
    /// The call did not reach the store, or failed as a whole.
    Transport { message: String },
    /// The call was malformed (e.g. an empty operation list).
    InvalidInput { message: String },
}

impl BulkWriteError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Counters of the applied operations, when the failure was partial.
    #[must_use]
    pub const fn partial_counts(&self) -> Option<BulkResult> {
        match self {
            Self::Partial { counts, .. } => Some(*counts),
            _ => None,
        }
    }
}

impl fmt::Display for BulkWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial { write_errors, .. } => {
                write!(f, "bulk write rejected {} operation(s)", write_errors.len())?;
                if let Some(first) = write_errors.first() {
                    write!(f, ", first at #{}: {}", first.index, first.message)?;
                }
                Ok(())
            }
            Self::Transport { message } => write!(f, "transport failure: {message}"),
            Self::InvalidInput { message } => write!(f, "invalid bulk write: {message}"),
        }
    }
}

impl Error for BulkWriteError {}

pub type BulkWriteResult = Result<BulkResult, BulkWriteError>;

// ============================================================================
// Sink Trait
// ============================================================================

/// A document store accepting bulk lists of update operations.
pub trait BulkWriteSink: Send + Sync {
    /// Execute `instructions` as one bulk write.
    ///
    /// With `ordered`, execution stops at the first rejected operation;
    /// otherwise every operation is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`BulkWriteError::Partial`] when some operations were rejected,
    /// [`BulkWriteError::InvalidInput`] for an empty list, and
    /// [`BulkWriteError::Transport`] when the call failed as a whole.
    fn bulk_write(&self, instructions: &[UpdateInstruction], ordered: bool) -> BulkWriteResult;

    /// Human-readable target name for logs, e.g. `database.collection`.
    fn namespace(&self) -> String {
        String::from("unknown")
    }
}

impl<S: BulkWriteSink + ?Sized> BulkWriteSink for std::sync::Arc<S> {
    fn bulk_write(&self, instructions: &[UpdateInstruction], ordered: bool) -> BulkWriteResult {
        (**self).bulk_write(instructions, ordered)
    }

    fn namespace(&self) -> String {
        (**self).namespace()
    }
}

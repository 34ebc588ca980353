//! Instrumented sinks for exercising the dispatch engine.

use crate::sink::{BulkResult, BulkWriteError, BulkWriteResult, BulkWriteSink, WriteError};
use crate::update::UpdateInstruction;
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Wraps a sink and records how it is called.
///
/// Tracks the number of calls, the number of instructions received, and the
/// highest number of calls running at the same time. An optional delay keeps
/// each call open long enough for concurrent calls to overlap.
pub struct RecordingSink<S> {
    inner: S,
    delay: Option<Duration>,
    calls: AtomicUsize,
    instructions: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl<S: BulkWriteSink> RecordingSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            delay: None,
            calls: AtomicUsize::new(0),
            instructions: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` inside every call before forwarding it.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total instructions received over all calls.
    #[must_use]
    pub fn instructions(&self) -> usize {
        self.instructions.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: BulkWriteSink> BulkWriteSink for RecordingSink<S> {
    fn bulk_write(&self, instructions: &[UpdateInstruction], ordered: bool) -> BulkWriteResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.instructions
            .fetch_add(instructions.len(), Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let result = self.inner.bulk_write(instructions, ordered);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn namespace(&self) -> String {
        self.inner.namespace()
    }
}

/// The kind of fault [`FailingSink`] injects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Fail the whole call with a transport error.
    Transport,
    /// Panic inside the call.
    Panic,
    /// Reject the matching operations and apply the others.
    Reject,
}

/// Wraps a sink and fails the calls that touch a given document key.
///
/// Faults are keyed on content rather than call order, so the failing batch
/// is deterministic even when calls run concurrently.
pub struct FailingSink<S> {
    inner: S,
    field: String,
    key: Value,
    fault: Fault,
}

impl<S: BulkWriteSink> FailingSink<S> {
    /// Inject `fault` into every call carrying an instruction whose filter has
    /// `field == key`.
    pub fn new(inner: S, field: impl Into<String>, key: impl Into<Value>, fault: Fault) -> Self {
        Self {
            inner,
            field: field.into(),
            key: key.into(),
            fault,
        }
    }

    fn matches(&self, instruction: &UpdateInstruction) -> bool {
        instruction.filter_value(&self.field) == Some(&self.key)
    }
}

impl<S: BulkWriteSink> BulkWriteSink for FailingSink<S> {
    fn bulk_write(&self, instructions: &[UpdateInstruction], ordered: bool) -> BulkWriteResult {
        if !instructions.iter().any(|i| self.matches(i)) {
            return self.inner.bulk_write(instructions, ordered);
        }

        match self.fault {
            Fault::Transport => Err(BulkWriteError::transport(format!(
                "connection reset while writing {}={}",
                self.field, self.key
            ))),
            Fault::Panic => panic!("sink panicked on {}={}", self.field, self.key),
            Fault::Reject => {
                let mut write_errors = Vec::new();
                let mut accepted = Vec::new();
                for (index, instruction) in instructions.iter().enumerate() {
                    if self.matches(instruction) {
                        write_errors.push(WriteError {
                            index,
                            message: format!("document {}={} rejected", self.field, self.key),
                        });
                        if ordered {
                            break;
                        }
                    } else {
                        accepted.push(instruction.clone());
                    }
                }
                let counts = if accepted.is_empty() {
                    BulkResult::default()
                } else {
                    self.inner.bulk_write(&accepted, ordered)?
                };
                Err(BulkWriteError::Partial {
                    counts,
                    write_errors,
                })
            }
        }
    }

    fn namespace(&self) -> String {
        self.inner.namespace()
    }
}

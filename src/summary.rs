//! Job-level aggregation of dispatch outcomes.

use crate::dispatch::TaskOutcome;
use crate::sink::BulkResult;
use serde::Serialize;
use std::time::Duration;

/// Totals of a job run.
///
/// `totals` only sums tasks that wrote something (fully or partially); failed
/// and skipped tasks are counted on their own.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct JobSummary {
    pub totals: BulkResult,
    pub slices: usize,
    pub batches: usize,
    pub written: usize,
    pub partial: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Wall-clock duration of the job.
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl JobSummary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the outcomes of one slice into the summary.
    pub fn record(&mut self, outcomes: &[TaskOutcome]) {
        self.slices += 1;
        self.batches += outcomes.len();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Written(counts) => {
                    self.written += 1;
                    self.totals += *counts;
                }
                TaskOutcome::Partial(counts) => {
                    self.partial += 1;
                    self.totals += *counts;
                }
                TaskOutcome::Skipped => self.skipped += 1,
                TaskOutcome::Failed(_) => self.failed += 1,
            }
        }
    }

    /// Whether every dispatched batch was fully written.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed == 0 && self.partial == 0
    }
}

/// Sum the counters of every outcome that carries some.
#[must_use]
pub fn consolidate<'a, I>(outcomes: I) -> BulkResult
where
    I: IntoIterator<Item = &'a TaskOutcome>,
{
    outcomes.into_iter().filter_map(TaskOutcome::counters).sum()
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((d.as_secs_f64() * 10.0).round() / 10.0)
}

//! Grouping of a batch stream into fixed-size slices.
//!
//! The slice size is the job's concurrency limit: every batch of a slice is
//! dispatched at the same time, and the next slice is only pulled from the
//! source once the previous one has completed. [`Slices`] therefore stays
//! lazy and holds at most one slice worth of batches.

use std::iter::FusedIterator;

/// A group of consecutive items taken from the source, in source order.
pub type Slice<T> = Vec<T>;

/// Iterator adapter yielding consecutive groups of `size` items.
///
/// The last group may be shorter. A `size` of zero yields nothing.
#[derive(Debug, Clone)]
pub struct Slices<I> {
    inner: Option<I>,
    size: usize,
}

impl<I: Iterator> Iterator for Slices<I> {
    type Item = Slice<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.size == 0 {
            return None;
        }
        let inner = self.inner.as_mut()?;
        let slice: Vec<_> = inner.by_ref().take(self.size).collect();
        if slice.is_empty() {
            // fuse once the source is drained
            self.inner = None;
            return None;
        }
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(inner) if self.size > 0 => {
                let (lo, hi) = inner.size_hint();
                (lo.div_ceil(self.size), hi.map(|h| h.div_ceil(self.size)))
            }
            _ => (0, Some(0)),
        }
    }
}

impl<I: Iterator> FusedIterator for Slices<I> {}

/// Slice `items` into groups of `size`.
///
/// An absent source is an empty one: `group(source.into_iter().flatten(), n)`.
///
/// # Example
/// ```
/// use parquet_upsert::slicing::group;
///
/// let slices: Vec<Vec<u32>> = group(1..=5, 2).collect();
/// assert_eq!(slices, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// assert_eq!(group(1..=5, 0).count(), 0);
/// ```
pub fn group<I: IntoIterator>(items: I, size: usize) -> Slices<I::IntoIter> {
    Slices {
        inner: Some(items.into_iter()),
        size,
    }
}

/// `.slices(n)` on any iterator.
pub trait SliceExt: Iterator + Sized {
    fn slices(self, size: usize) -> Slices<Self> {
        group(self, size)
    }
}

impl<I: Iterator> SliceExt for I {}

/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Concurrent bags of work items.
//!
//! A worklist promises no global ordering: only that every pushed item is
//! eventually returned by some [`pop`](Worklist::pop). Termination detection
//! is left to the loop using the worklist, since a worker holding an item it
//! is processing may still push new ones.

mod chunked;
pub use chunked::*;

/// A concurrent multiset of work items shared by a fixed set of workers.
pub trait Worklist<T>: Sync {
    /// Returns the number of workers the worklist was built for.
    fn num_workers(&self) -> usize;

    /// Makes `item` eligible for popping; `worker` is the index of the
    /// calling worker.
    fn push(&self, worker: usize, item: T);

    /// Returns some item, or `None` if no item could be found.
    ///
    /// `None` does not imply that the worklist is empty for good: other
    /// workers may be pushing concurrently.
    fn pop(&self, worker: usize) -> Option<T>;

    /// Adds initial items before any worker starts.
    fn push_initial(&self, items: impl IntoIterator<Item = T>);
}

/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::context::Phase;
use super::{det, Operator, Schedule, UserContext};
use crate::stats::StatSink;
use crate::worklists::{ChunkedFifo, Worklist};
use crossbeam_utils::Backoff;
use dsi_progress_logger::ProgressLog;
use rayon::ThreadPool;
use std::collections::VecDeque;
use std::ops::{AddAssign, Range};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Owner of the elements acquired by a serial loop.
const SERIAL_OWNER: usize = usize::MAX;

/// Consecutive aborts of an item after which its retries yield the thread
/// instead of spinning.
const SPIN_LIMIT: u32 = 6;

/// Counters of a loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// Operator applications, including aborted ones.
    pub iterations: u64,
    /// Applications that committed.
    pub commits: u64,
    /// Applications that were aborted (or deferred) because of a conflict.
    pub conflicts: u64,
    /// Items pushed by committed applications.
    pub pushes: u64,
    /// Rounds, for deterministic schedules; zero otherwise.
    pub rounds: u64,
}

impl AddAssign for LoopStats {
    fn add_assign(&mut self, rhs: Self) {
        self.iterations += rhs.iterations;
        self.commits += rhs.commits;
        self.conflicts += rhs.conflicts;
        self.pushes += rhs.pushes;
        self.rounds += rhs.rounds;
    }
}

impl LoopStats {
    /// Reports the counters to `sink` using `name` as region.
    pub fn report(&self, name: &str, sink: &dyn StatSink) {
        sink.report_stat(name, "Iterations", self.iterations);
        sink.report_stat(name, "Commits", self.commits);
        sink.report_stat(name, "Conflicts", self.conflicts);
        sink.report_stat(name, "Pushes", self.pushes);
        if self.rounds > 0 {
            sink.report_stat(name, "Rounds", self.rounds);
        }
    }
}

/// Applies `op` to `items`, and to the items it pushes, until no work is
/// left.
///
/// With [`Schedule::NonDet`] the workers of `thread_pool` pop items from a
/// [`ChunkedFifo`] with chunks of `chunk_size` items and apply the operator
/// speculatively: an aborted item releases everything it acquired and goes
/// back to the private chunk of its worker. Every item carries the number of
/// its consecutive aborts, and the worker backs off exponentially in that
/// number before retrying it. The deterministic schedules proceed by rounds, and their
/// result does not depend on the number of threads; `chunk_size` is ignored.
///
/// The progress logger is updated with the number of committed
/// applications.
pub fn for_each<T, O>(
    items: impl IntoIterator<Item = T>,
    op: &O,
    schedule: Schedule,
    chunk_size: usize,
    thread_pool: &ThreadPool,
    pl: &mut impl ProgressLog,
) -> LoopStats
where
    T: Copy + Send + Sync,
    O: Operator<T>,
{
    match schedule {
        Schedule::NonDet => for_each_nondet(items, op, chunk_size, thread_pool, pl),
        _ => det::for_each_det(items, op, schedule, thread_pool, pl),
    }
}

fn for_each_nondet<T, O>(
    items: impl IntoIterator<Item = T>,
    op: &O,
    chunk_size: usize,
    thread_pool: &ThreadPool,
    pl: &mut impl ProgressLog,
) -> LoopStats
where
    T: Copy + Send + Sync,
    O: Operator<T>,
{
    let items = items.into_iter().collect::<Vec<_>>();
    pl.item_name("iteration");
    pl.expected_updates(if op.capabilities().needs_parallel_push {
        None
    } else {
        Some(items.len())
    });
    pl.start("Running non-deterministic loop...");

    let worklist = ChunkedFifo::new(thread_pool.current_num_threads(), chunk_size);
    // Items pushed and not yet committed
    let pending = AtomicUsize::new(items.len());
    worklist.push_initial(items.into_iter().map(|item| (item, 0)));

    let mut stats = LoopStats::default();
    for worker_stats in thread_pool.broadcast(|c| nondet_worker(c.index(), op, &worklist, &pending))
    {
        stats += worker_stats;
    }

    pl.done_with_count(stats.commits as usize);
    stats
}

fn nondet_worker<T, O, W>(worker: usize, op: &O, worklist: &W, pending: &AtomicUsize) -> LoopStats
where
    T: Copy + Send,
    O: Operator<T>,
    W: Worklist<(T, u32)>,
{
    let owner = worker + 1;
    let mut ctx = UserContext::new(Phase::Speculative, owner, op.capabilities());
    let mut stats = LoopStats::default();
    let idle = Backoff::new();

    loop {
        let Some((item, aborts)) = worklist.pop(worker) else {
            if pending.load(Ordering::Acquire) == 0 {
                break;
            }
            idle.snooze();
            continue;
        };
        idle.reset();
        ctx.reset(Phase::Speculative, owner);
        stats.iterations += 1;

        match op.apply(item, &mut ctx) {
            Ok(()) => {
                ctx.release_all();
                let num_pushes = ctx.num_pushes();
                if num_pushes > 0 {
                    pending.fetch_add(num_pushes, Ordering::AcqRel);
                    for new_item in ctx.drain_pushes() {
                        worklist.push(worker, (new_item, 0));
                    }
                }
                stats.commits += 1;
                stats.pushes += num_pushes as u64;
                pending.fetch_sub(1, Ordering::AcqRel);
            }
            Err(abort) => {
                log::trace!("Worker {} aborted: {}", worker, abort);
                ctx.release_all();
                stats.conflicts += 1;
                back_off(aborts);
                worklist.push(worker, (item, aborts.saturating_add(1)));
            }
        }
    }

    stats
}

/// Returns the number of spins before retrying an item aborted `aborts`
/// times in a row, or `None` if the thread should yield instead.
fn spins(aborts: u32) -> Option<u32> {
    (aborts <= SPIN_LIMIT).then(|| 1 << aborts)
}

fn back_off(aborts: u32) {
    match spins(aborts) {
        Some(n) => (0..n).for_each(|_| std::hint::spin_loop()),
        None => std::thread::yield_now(),
    }
}

/// Applies `op` to `items`, and to the items it pushes, on the current
/// thread, in FIFO order.
///
/// Acquisitions are recorded as in parallel loops, but they cannot conflict
/// unless another loop is running on the same graph.
pub fn for_each_serial<T, O>(
    items: impl IntoIterator<Item = T>,
    op: &O,
    pl: &mut impl ProgressLog,
) -> LoopStats
where
    T: Copy,
    O: Operator<T>,
{
    let mut queue = items.into_iter().collect::<VecDeque<_>>();
    let capabilities = op.capabilities();
    pl.item_name("iteration");
    pl.expected_updates(if capabilities.needs_parallel_push {
        None
    } else {
        Some(queue.len())
    });
    pl.start("Running serial loop...");

    let mut ctx = UserContext::new(Phase::Serial, SERIAL_OWNER, capabilities);
    let mut stats = LoopStats::default();
    let retry = Backoff::new();

    while let Some(item) = queue.pop_front() {
        ctx.reset(Phase::Serial, SERIAL_OWNER);
        stats.iterations += 1;
        match op.apply(item, &mut ctx) {
            Ok(()) => {
                ctx.release_all();
                stats.pushes += ctx.num_pushes() as u64;
                queue.extend(ctx.drain_pushes());
                stats.commits += 1;
                pl.light_update();
                retry.reset();
            }
            Err(abort) => {
                log::warn!("Serial iteration aborted ({}); is another loop running?", abort);
                ctx.release_all();
                stats.conflicts += 1;
                queue.push_back(item);
                retry.snooze();
            }
        }
    }

    pl.done();
    stats
}

/// Applies `f` to every node of `range`, in parallel and without conflict
/// detection.
///
/// Workers grab tasks of `granularity` consecutive nodes from a shared
/// cursor. The function must be safe to call concurrently, typically
/// because it uses atomic fields only.
pub fn do_all(
    range: Range<usize>,
    granularity: usize,
    f: impl Fn(usize) + Sync,
    thread_pool: &ThreadPool,
) {
    let granularity = granularity.max(1);
    let cursor = AtomicUsize::new(range.start);
    thread_pool.broadcast(|_| loop {
        let start = cursor.fetch_add(granularity, Ordering::Relaxed);
        if start >= range.end {
            break;
        }
        for node in start..range.end.min(start + granularity) {
            f(node);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Abort, NodeLock};
    use dsi_progress_logger::no_logging;
    use std::sync::atomic::AtomicU64;

    /// Counts down from each item, pushing its predecessor.
    struct Countdown {
        locks: Vec<NodeLock>,
        visits: Vec<AtomicU64>,
    }

    impl Operator<usize> for Countdown {
        type LocalState = ();

        fn apply<'g>(
            &'g self,
            item: usize,
            ctx: &mut UserContext<'g, usize>,
        ) -> Result<(), Abort> {
            ctx.acquire(item, &self.locks[item], crate::runtime::MethodFlag::All)?;
            self.visits[item].fetch_add(1, Ordering::Relaxed);
            if item > 0 {
                ctx.push(item - 1);
            }
            Ok(())
        }
    }

    fn countdown(n: usize) -> Countdown {
        Countdown {
            locks: (0..n).map(|_| NodeLock::new()).collect(),
            visits: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[test]
    fn test_serial() {
        let op = countdown(10);
        let stats = for_each_serial([9], &op, no_logging![]);
        assert_eq!(stats.commits, 10);
        assert_eq!(stats.pushes, 9);
        assert!(op.visits.iter().all(|v| v.load(Ordering::Relaxed) == 1));
    }

    #[test]
    fn test_nondet() {
        let op = countdown(100);
        let thread_pool = crate::thread_pool![4];
        let stats = for_each(
            [99, 49],
            &op,
            Schedule::NonDet,
            4,
            &thread_pool,
            no_logging![],
        );
        assert_eq!(stats.commits, 150);
        assert_eq!(stats.iterations, stats.commits + stats.conflicts);
        for i in 0..100 {
            let expected = if i < 50 { 2 } else { 1 };
            assert_eq!(op.visits[i].load(Ordering::Relaxed), expected);
        }
        assert!(op.locks.iter().all(|l| l.owner() == crate::runtime::FREE));
    }

    /// Aborts each item a fixed number of times before committing it.
    struct Stubborn {
        aborts_left: Vec<AtomicU64>,
    }

    impl Operator<usize> for Stubborn {
        type LocalState = ();

        fn apply<'g>(
            &'g self,
            item: usize,
            _ctx: &mut UserContext<'g, usize>,
        ) -> Result<(), Abort> {
            let left = &self.aborts_left[item];
            if left.load(Ordering::Relaxed) > 0 {
                left.fetch_sub(1, Ordering::Relaxed);
                return Err(Abort::Conflict(item));
            }
            Ok(())
        }
    }

    #[test]
    fn test_repeated_aborts() {
        assert_eq!(spins(0), Some(1));
        assert_eq!(spins(3), Some(8));
        assert_eq!(spins(SPIN_LIMIT), Some(1 << SPIN_LIMIT));
        assert_eq!(spins(SPIN_LIMIT + 1), None);

        let op = Stubborn {
            aborts_left: (0..4).map(|i| AtomicU64::new(5 * i)).collect(),
        };
        let stats = for_each(
            0..4,
            &op,
            Schedule::NonDet,
            1,
            &crate::thread_pool![2],
            no_logging![],
        );
        assert_eq!(stats.commits, 4);
        assert_eq!(stats.conflicts, 30);
    }

    #[test]
    fn test_do_all() {
        let thread_pool = crate::thread_pool![3];
        let sum = AtomicU64::new(0);
        do_all(
            10..1000,
            7,
            |x| {
                sum.fetch_add(x as u64, Ordering::Relaxed);
            },
            &thread_pool,
        );
        assert_eq!(sum.load(Ordering::Relaxed), (10..1000).sum::<u64>());
    }
}

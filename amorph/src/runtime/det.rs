/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Deterministic rounds.
//!
//! Every round assigns to its items consecutive identifiers, starting from
//! one, in the order of the round. The round then has three phases, each one
//! separated from the next by a barrier:
//!
//! 1. *Inspection*: every item runs (a prefix of) the operator up to its
//!    fail-safe point, claiming every element it acquires. A claim replaces
//!    the current owner if it has a larger identifier, so at the end of the
//!    phase every element belongs to the smallest item that touched it,
//!    independently of the order of the claims.
//! 2. *Commit*: every item owning all the elements it claimed runs the full
//!    operator; the others are deferred to the next round. Committing items
//!    have disjoint neighborhoods, so the outcome does not depend on the
//!    interleaving.
//! 3. *Release*: all claims are released.
//!
//! The next round is formed by the deferred items followed by the items
//! pushed by committed ones, both in the order of the current round. Since
//! the smallest item of a round always commits, every round makes progress.

use super::context::Phase;
use super::{LoopStats, NodeLock, Operator, Schedule, UserContext};
use dsi_progress_logger::ProgressLog;
use rayon::{prelude::*, ThreadPool};

/// The state of an item during a round.
struct Record<'g, T, S> {
    item: T,
    owner: usize,
    log: Vec<&'g NodeLock>,
    state: S,
    pushes: Vec<T>,
    committed: bool,
}

pub(crate) fn for_each_det<'g, T, O>(
    items: impl IntoIterator<Item = T>,
    op: &'g O,
    schedule: Schedule,
    thread_pool: &ThreadPool,
    pl: &mut impl ProgressLog,
) -> LoopStats
where
    T: Copy + Send + Sync,
    O: Operator<T>,
{
    debug_assert!(schedule.is_deterministic());
    let capabilities = op.capabilities();
    let mut round = items.into_iter().collect::<Vec<_>>();
    let mut stats = LoopStats::default();

    pl.item_name("iteration");
    pl.expected_updates(if capabilities.needs_parallel_push {
        None
    } else {
        Some(round.len())
    });
    pl.start(&format!("Running deterministic loop ({:?})...", schedule));

    while !round.is_empty() {
        let mut records = round
            .drain(..)
            .enumerate()
            .map(|(pos, item)| Record {
                item,
                owner: pos + 1,
                log: Vec::new(),
                state: O::LocalState::default(),
                pushes: Vec::new(),
                committed: false,
            })
            .collect::<Vec<_>>();

        thread_pool.install(|| {
            records.par_iter_mut().for_each_init(
                || UserContext::new(Phase::Inspect, 1, capabilities),
                |ctx, record| inspect(op, schedule, ctx, record),
            );
            records.par_iter_mut().for_each_init(
                || UserContext::new(Phase::Commit, 1, capabilities),
                |ctx, record| commit(op, schedule, ctx, record),
            );
            records.par_iter_mut().for_each(|record| {
                for lock in record.log.iter().rev() {
                    lock.release(record.owner);
                }
            });
        });

        let num_items = records.len() as u64;
        let mut pushed = Vec::new();
        let mut committed = 0;
        for record in records {
            if record.committed {
                committed += 1;
                pushed.extend(record.pushes);
            } else {
                round.push(record.item);
            }
        }
        assert!(
            committed > 0,
            "No item committed in a deterministic round: the operator acquired elements after its fail-safe point"
        );

        stats.rounds += 1;
        stats.iterations += num_items;
        stats.commits += committed;
        stats.conflicts += num_items - committed;
        stats.pushes += pushed.len() as u64;
        log::debug!(
            "Round {}: {} items, {} committed, {} pushed",
            stats.rounds,
            num_items,
            committed,
            pushed.len()
        );
        pl.update_with_count(committed as usize);
        round.extend(pushed);
    }

    pl.done();
    pl.info(format_args!("Rounds: {}", stats.rounds));
    stats
}

fn inspect<'g, T, O>(
    op: &'g O,
    schedule: Schedule,
    ctx: &mut UserContext<'g, T, O::LocalState>,
    record: &mut Record<'g, T, O::LocalState>,
) where
    T: Copy,
    O: Operator<T>,
{
    ctx.reset(Phase::Inspect, record.owner);
    let result = match schedule {
        Schedule::DetPrefix => op.apply_prefix(record.item, ctx),
        _ => op.apply(record.item, ctx),
    };
    debug_assert!(matches!(result, Ok(()) | Err(super::Abort::Failsafe)));
    record.log = ctx.take_log();
    if schedule == Schedule::DetDisjoint {
        record.state = ctx.take_local_state();
    }
}

fn commit<'g, T, O>(
    op: &'g O,
    schedule: Schedule,
    ctx: &mut UserContext<'g, T, O::LocalState>,
    record: &mut Record<'g, T, O::LocalState>,
) where
    T: Copy,
    O: Operator<T>,
{
    if !record.log.iter().all(|lock| lock.is_held_by(record.owner)) {
        return;
    }
    ctx.reset(Phase::Commit, record.owner);
    if schedule == Schedule::DetDisjoint {
        ctx.set_local_state(std::mem::take(&mut record.state));
    }
    match op.apply(record.item, ctx) {
        Ok(()) => {
            record.committed = true;
            record.pushes = ctx.take_pushes();
        }
        Err(abort) => log::trace!("Item {} deferred: {}", record.owner, abort),
    }
    record.log.extend(ctx.take_log());
}

/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{Abort, UserContext};

/// Features of an operator that the executor inspects at loop entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The operator pushes new work items while running.
    ///
    /// When false, the push path is disabled and the loop terminates when the
    /// initial items have been processed.
    pub needs_parallel_push: bool,
    /// The operator uses the scratch buffers of its context.
    pub needs_per_iter_alloc: bool,
}

impl core::default::Default for Capabilities {
    fn default() -> Self {
        Self {
            needs_parallel_push: true,
            needs_per_iter_alloc: false,
        }
    }
}

/// An operator applied by a loop to work items of type `T`.
///
/// The same method is used by all schedules: the context decides what an
/// acquisition means (a speculative lock, a deterministic claim, or nothing
/// beyond bookkeeping in serial loops). Operators must be idempotent under
/// retry of a single iteration, and must not mutate user data before their
/// fail-safe point, that is, before the first [`Write`](super::MethodFlag::Write)
/// acquisition or the first mutating access.
pub trait Operator<T>: Sync {
    /// The state carried from the inspection to the commit phase of a
    /// [`DetDisjoint`](super::Schedule::DetDisjoint) round.
    type LocalState: Default + Send;

    /// Returns the capabilities of the operator.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Applies the operator to `item`.
    fn apply<'g>(
        &'g self,
        item: T,
        ctx: &mut UserContext<'g, T, Self::LocalState>,
    ) -> Result<(), Abort>;

    /// Applies the read-only prefix of the operator to `item`.
    ///
    /// [`DetPrefix`](super::Schedule::DetPrefix) rounds call this method in
    /// their first phase to build the set of elements the item will need.
    /// The default implementation calls [`apply`](Self::apply), which stops at
    /// the fail-safe point anyway.
    fn apply_prefix<'g>(
        &'g self,
        item: T,
        ctx: &mut UserContext<'g, T, Self::LocalState>,
    ) -> Result<(), Abort> {
        self.apply(item, ctx)
    }
}

/// The schedule of a [`for_each`](super::for_each) loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Schedule {
    /// Workers pop items independently and execute them speculatively.
    #[default]
    NonDet,
    /// Deterministic rounds; both phases run the full operator.
    DetBase,
    /// Deterministic rounds; the first phase runs only the read-only prefix
    /// of the operator.
    DetPrefix,
    /// Deterministic rounds; the first phase saves a local state that the
    /// second phase reuses.
    DetDisjoint,
}

impl Schedule {
    /// Returns whether the schedule is deterministic.
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, Schedule::NonDet)
    }
}

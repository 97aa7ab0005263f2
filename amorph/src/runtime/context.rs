/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{Capabilities, MethodFlag, NodeLock};

/// Reasons for which an iteration stops before completing.
///
/// Aborts are internal to the executor: they are never returned by a loop.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    /// The element with the given index is held by another iteration.
    #[error("Conflict on element {0}")]
    Conflict(usize),
    /// The iteration reached its fail-safe point during the inspection phase
    /// of a deterministic round.
    #[error("Fail-safe point reached during inspection")]
    Failsafe,
}

/// The phase in which a context is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Single-threaded execution.
    Serial,
    /// Speculative execution: conflicts abort the iteration.
    Speculative,
    /// First phase of a deterministic round: claims elements, never mutates.
    Inspect,
    /// Second phase of a deterministic round: all elements are already held.
    Commit,
}

/// The per-iteration context of an operator.
///
/// A context is owned by exactly one worker for the duration of one operator
/// application. It contains the log of acquired elements, which are released
/// in reverse order on commit or abort, a buffer of new work items, a pool of
/// scratch buffers that is recycled across iterations, and a local-state slot
/// that survives the boundary between the two phases of a
/// [`DetDisjoint`](super::Schedule::DetDisjoint) round.
///
/// The lifetime `'g` is the lifetime of the graph whose elements are
/// acquired.
pub struct UserContext<'g, T, S = ()> {
    phase: Phase,
    owner: usize,
    log: Vec<&'g NodeLock>,
    pushes: Vec<T>,
    push_enabled: bool,
    scratch: Vec<Vec<usize>>,
    scratch_enabled: bool,
    local_state: S,
    used: bool,
    aborted: Option<Abort>,
}

impl<'g, T, S: Default> UserContext<'g, T, S> {
    pub(crate) fn new(phase: Phase, owner: usize, capabilities: Capabilities) -> Self {
        Self {
            phase,
            owner,
            log: Vec::new(),
            pushes: Vec::new(),
            push_enabled: capabilities.needs_parallel_push,
            scratch: Vec::new(),
            scratch_enabled: capabilities.needs_per_iter_alloc,
            local_state: S::default(),
            used: false,
            aborted: None,
        }
    }

    /// Prepares the context for a new iteration.
    ///
    /// The log must have been released or taken.
    pub(crate) fn reset(&mut self, phase: Phase, owner: usize) {
        debug_assert!(self.log.is_empty());
        self.phase = phase;
        self.owner = owner;
        self.pushes.clear();
        self.local_state = S::default();
        self.used = false;
        self.aborted = None;
    }
}

impl<'g, T, S> UserContext<'g, T, S> {
    /// Acquires `lock`, which protects the element `node`, according to
    /// `flag`.
    pub fn acquire(
        &mut self,
        node: usize,
        lock: &'g NodeLock,
        flag: MethodFlag,
    ) -> Result<(), Abort> {
        if let Some(abort) = self.aborted {
            return Err(abort);
        }
        let result = match (self.phase, flag) {
            (Phase::Inspect, MethodFlag::None) => Ok(()),
            (Phase::Inspect, MethodFlag::Write) => Err(Abort::Failsafe),
            (Phase::Inspect, MethodFlag::All) => {
                if lock.claim(self.owner) {
                    self.log.push(lock);
                }
                Ok(())
            }
            (_, MethodFlag::None) => {
                if lock.is_held_by(self.owner) {
                    Ok(())
                } else {
                    Err(Abort::Conflict(node))
                }
            }
            (_, MethodFlag::All | MethodFlag::Write) => {
                if lock.is_held_by(self.owner) {
                    Ok(())
                } else if lock.try_acquire(self.owner) {
                    self.log.push(lock);
                    Ok(())
                } else {
                    Err(Abort::Conflict(node))
                }
            }
        };
        if let Err(abort) = result {
            self.aborted = Some(abort);
        }
        result
    }

    /// Checks that the current phase allows mutating user data.
    ///
    /// Inspection never mutates: a mutation attempt ends it as a fail-safe
    /// point would.
    #[inline(always)]
    pub(crate) fn check_mutation(&mut self) -> Result<(), Abort> {
        if self.phase == Phase::Inspect {
            self.aborted = Some(Abort::Failsafe);
            return Err(Abort::Failsafe);
        }
        Ok(())
    }

    /// Adds a new work item to the loop.
    ///
    /// Items are made visible only if the iteration commits.
    ///
    /// # Panics
    ///
    /// If the operator declared that it does not need parallel push.
    pub fn push(&mut self, item: T) {
        assert!(
            self.push_enabled,
            "The operator declared that it does not push new work"
        );
        self.pushes.push(item);
    }

    /// Returns the local state of the current item and whether it has
    /// already been used by a previous phase of the same item.
    pub fn local_state(&mut self) -> (&mut S, bool) {
        (&mut self.local_state, self.used)
    }

    /// Returns a cleared scratch buffer.
    ///
    /// Buffers returned with [`recycle`](Self::recycle) are reused by later
    /// iterations of the same worker.
    ///
    /// # Panics
    ///
    /// If the operator declared that it does not need per-iteration
    /// allocation.
    pub fn scratch(&mut self) -> Vec<usize> {
        assert!(
            self.scratch_enabled,
            "The operator declared that it does not allocate per iteration"
        );
        let mut buffer = self.scratch.pop().unwrap_or_default();
        buffer.clear();
        buffer
    }

    /// Gives back a scratch buffer to the context.
    pub fn recycle(&mut self, buffer: Vec<usize>) {
        self.scratch.push(buffer);
    }

    /// Returns whether the current iteration has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Returns whether the context is running a single-threaded loop.
    pub fn is_serial(&self) -> bool {
        self.phase == Phase::Serial
    }

    pub(crate) fn set_local_state(&mut self, state: S) {
        self.local_state = state;
        self.used = true;
    }

    pub(crate) fn take_local_state(&mut self) -> S
    where
        S: Default,
    {
        std::mem::take(&mut self.local_state)
    }

    pub(crate) fn take_log(&mut self) -> Vec<&'g NodeLock> {
        std::mem::take(&mut self.log)
    }

    pub(crate) fn num_pushes(&self) -> usize {
        self.pushes.len()
    }

    pub(crate) fn drain_pushes(&mut self) -> std::vec::Drain<'_, T> {
        self.pushes.drain(..)
    }

    pub(crate) fn take_pushes(&mut self) -> Vec<T> {
        std::mem::take(&mut self.pushes)
    }

    /// Releases all acquired elements, in reverse order of acquisition.
    pub(crate) fn release_all(&mut self) {
        while let Some(lock) = self.log.pop() {
            lock.release(self.owner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> Capabilities {
        Capabilities {
            needs_parallel_push: true,
            needs_per_iter_alloc: true,
        }
    }

    #[test]
    fn test_speculative_conflict() {
        let locks = [NodeLock::new(), NodeLock::new()];
        let mut a = UserContext::<usize>::new(Phase::Speculative, 1, caps());
        let mut b = UserContext::<usize>::new(Phase::Speculative, 2, caps());
        assert!(a.acquire(0, &locks[0], MethodFlag::All).is_ok());
        assert!(a.acquire(0, &locks[0], MethodFlag::Write).is_ok());
        assert_eq!(
            b.acquire(0, &locks[0], MethodFlag::All),
            Err(Abort::Conflict(0))
        );
        assert!(b.is_aborted());
        // Once aborted, everything fails
        assert_eq!(
            b.acquire(1, &locks[1], MethodFlag::All),
            Err(Abort::Conflict(0))
        );
        assert_eq!(
            a.acquire(1, &locks[1], MethodFlag::None),
            Err(Abort::Conflict(1))
        );
        a.release_all();
        assert_eq!(locks[0].owner(), crate::runtime::FREE);
    }

    #[test]
    fn test_inspect() {
        let lock = NodeLock::new();
        let mut a = UserContext::<usize>::new(Phase::Inspect, 5, caps());
        let mut b = UserContext::<usize>::new(Phase::Inspect, 3, caps());
        assert!(a.acquire(0, &lock, MethodFlag::All).is_ok());
        assert!(b.acquire(0, &lock, MethodFlag::All).is_ok());
        assert!(lock.is_held_by(3));
        assert_eq!(a.check_mutation(), Err(Abort::Failsafe));
        assert_eq!(
            b.acquire(0, &lock, MethodFlag::Write),
            Err(Abort::Failsafe)
        );
        assert_eq!(a.take_log().len(), 1);
        assert_eq!(b.take_log().len(), 1);
    }

    #[test]
    fn test_scratch_and_state() {
        let mut ctx = UserContext::<usize, u32>::new(Phase::Serial, 1, caps());
        let mut buffer = ctx.scratch();
        buffer.extend([1, 2, 3]);
        ctx.recycle(buffer);
        assert!(ctx.scratch().is_empty());
        *ctx.local_state().0 = 7;
        assert!(!ctx.local_state().1);
        let state = ctx.take_local_state();
        ctx.set_local_state(state);
        assert_eq!(ctx.local_state(), (&mut 7, true));
    }
}

/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::sync::atomic::{AtomicUsize, Ordering};

/// Owner value of a free lock.
pub const FREE: usize = 0;

/// Per-access acquisition policy of a graph element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodFlag {
    /// Acquire the element, recording it in the iteration log; abort the
    /// iteration on conflict.
    All,
    /// Fail-safe point: from now on the iteration only mutates state it
    /// already holds. The element is acquired if it is not already held.
    Write,
    /// No acquisition. In parallel phases the element must already be held
    /// by the current iteration.
    None,
}

/// A logical lock on a graph element.
///
/// The lock is just an owner field that can be compared-and-swapped: zero
/// means free, any other value identifies the iteration holding the element.
/// Speculative loops use [`try_acquire`](Self::try_acquire); deterministic
/// loops use [`claim`](Self::claim), which lets the iteration with the
/// smallest identifier win regardless of the order of the claims.
#[derive(Debug, Default)]
pub struct NodeLock(AtomicUsize);

impl NodeLock {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(FREE))
    }

    /// Returns the current owner, or [`FREE`].
    #[inline(always)]
    pub fn owner(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Returns whether the lock is held by `owner`.
    #[inline(always)]
    pub fn is_held_by(&self, owner: usize) -> bool {
        self.owner() == owner
    }

    /// Tries to acquire the lock for `owner`.
    ///
    /// Returns true if the lock is now held by `owner`, including the case in
    /// which it was already.
    #[inline(always)]
    pub fn try_acquire(&self, owner: usize) -> bool {
        debug_assert_ne!(owner, FREE);
        match self
            .0
            .compare_exchange(FREE, owner, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => true,
            Err(current) => current == owner,
        }
    }

    /// Claims the lock for `owner` if it is free or held by a larger owner.
    ///
    /// Returns true if the lock was not already held by `owner`.
    #[inline(always)]
    pub fn claim(&self, owner: usize) -> bool {
        debug_assert_ne!(owner, FREE);
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            if current == owner {
                return false;
            }
            if current != FREE && current < owner {
                return true;
            }
            match self.0.compare_exchange_weak(
                current,
                owner,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Releases the lock if it is held by `owner`.
    #[inline(always)]
    pub fn release(&self, owner: usize) {
        let _ = self
            .0
            .compare_exchange(owner, FREE, Ordering::Release, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release() {
        let lock = NodeLock::new();
        assert!(lock.try_acquire(3));
        assert!(lock.try_acquire(3));
        assert!(!lock.try_acquire(4));
        lock.release(4);
        assert!(lock.is_held_by(3));
        lock.release(3);
        assert_eq!(lock.owner(), FREE);
    }

    #[test]
    fn test_claim_min() {
        let lock = NodeLock::new();
        assert!(lock.claim(7));
        assert!(!lock.claim(7));
        assert!(lock.claim(9));
        assert!(lock.is_held_by(7));
        assert!(lock.claim(2));
        assert!(lock.is_held_by(2));
        lock.release(7);
        assert!(lock.is_held_by(2));
    }
}

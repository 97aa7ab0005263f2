/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Atomic fields supporting a lock-free minimum.
///
/// The minimum is implemented as a compare-and-swap loop that gives up as
/// soon as the current value is not larger than the proposed one, so
/// contention on already-converged values costs a single load.
pub trait AtomicMin {
    /// The underlying value type.
    type Value: Copy + Ord;

    /// Stores `value` if it is smaller than the current value, returning the
    /// previous value.
    fn atomic_min(&self, value: Self::Value) -> Self::Value;
}

macro_rules! impl_atomic_min {
    ($($atomic:ty => $ty:ty),*) => {$(
        impl AtomicMin for $atomic {
            type Value = $ty;

            #[inline(always)]
            fn atomic_min(&self, value: $ty) -> $ty {
                let mut current = self.load(Ordering::Relaxed);
                while value < current {
                    match self.compare_exchange_weak(
                        current,
                        value,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(old) => return old,
                        Err(actual) => current = actual,
                    }
                }
                current
            }
        }
    )*};
}

impl_atomic_min!(AtomicU32 => u32, AtomicU64 => u64, AtomicUsize => usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_min() {
        let x = AtomicU32::new(10);
        assert_eq!(x.atomic_min(12), 10);
        assert_eq!(x.load(Ordering::Relaxed), 10);
        assert_eq!(x.atomic_min(3), 10);
        assert_eq!(x.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_concurrent_min() {
        let x = AtomicUsize::new(usize::MAX);
        std::thread::scope(|s| {
            for t in 0..8 {
                let x = &x;
                s.spawn(move || {
                    for i in (t * 1000..(t + 1) * 1000).rev() {
                        x.atomic_min(i + 5);
                    }
                });
            }
        });
        assert_eq!(x.load(Ordering::Relaxed), 5);
    }
}

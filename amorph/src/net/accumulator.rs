/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{NetError, Network};
use std::sync::atomic::{AtomicI64, Ordering};

/// An integer counter summed across hosts.
///
/// Workers add to the local value concurrently; [`reduce`](Self::reduce)
/// performs an all-reduce with sum, and thus acts as a barrier. It must be
/// called only between parallel phases. Distributed loops use it for
/// termination detection, continuing while the reduced value is positive.
#[derive(Debug, Default)]
pub struct DistAccumulator {
    value: AtomicI64,
}

impl DistAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the local counter.
    #[inline(always)]
    pub fn add(&self, value: i64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    /// Returns the local counter.
    pub fn local(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Sets the local counter to zero.
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }

    /// Returns the sum of the local counters of all hosts.
    pub fn reduce(&self, net: &impl Network) -> Result<i64, NetError> {
        net.all_reduce_sum(self.local())
    }
}

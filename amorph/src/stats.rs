/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Sinks for named counters and timers.
//!
//! Loops and synchronization phases report what they did to a [`StatSink`].
//! [`LogStats`] forwards everything to the [`log`] facade as it arrives;
//! [`MemStats`] keeps the values in memory, so that tests can inspect them
//! and drivers can flush them at the end of a run.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A receiver of statistics.
pub trait StatSink: Send + Sync {
    /// Adds `value` to the counter `name` of `region`.
    fn report_stat(&self, region: &str, name: &str, value: u64);

    /// Adds `elapsed` to the timer `name`.
    fn report_timer(&self, name: &str, elapsed: Duration);
}

/// A [`StatSink`] that logs every value at the `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStats;

impl StatSink for LogStats {
    fn report_stat(&self, region: &str, name: &str, value: u64) {
        log::info!("{}: {} = {}", region, name, value);
    }

    fn report_timer(&self, name: &str, elapsed: Duration) {
        log::info!("{}: {:?}", name, elapsed);
    }
}

/// A [`StatSink`] that accumulates values in ordered maps.
#[derive(Debug, Default)]
pub struct MemStats {
    stats: Mutex<BTreeMap<(String, String), u64>>,
    timers: Mutex<BTreeMap<String, Duration>>,
}

impl MemStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a counter, if it was ever reported.
    pub fn get(&self, region: &str, name: &str) -> Option<u64> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(region.to_owned(), name.to_owned()))
            .copied()
    }

    /// Returns the value of a timer, if it was ever reported.
    pub fn timer(&self, name: &str) -> Option<Duration> {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Returns the regions with at least one counter.
    pub fn regions(&self) -> Vec<String> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let mut regions = stats.keys().map(|(r, _)| r.clone()).collect::<Vec<_>>();
        regions.dedup();
        regions
    }

    /// Logs all values, in order, and clears the sink.
    pub fn flush(&self) {
        let stats = std::mem::take(&mut *self.stats.lock().unwrap_or_else(PoisonError::into_inner));
        for ((region, name), value) in stats {
            log::info!("STAT {}, {}, {}", region, name, value);
        }
        let timers =
            std::mem::take(&mut *self.timers.lock().unwrap_or_else(PoisonError::into_inner));
        for (name, elapsed) in timers {
            log::info!("TIMER {}, {}", name, elapsed.as_millis());
        }
    }
}

impl StatSink for MemStats {
    fn report_stat(&self, region: &str, name: &str, value: u64) {
        *self
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((region.to_owned(), name.to_owned()))
            .or_default() += value;
    }

    fn report_timer(&self, name: &str, elapsed: Duration) {
        *self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_owned())
            .or_default() += elapsed;
    }
}

impl<S: StatSink + ?Sized> StatSink for std::sync::Arc<S> {
    fn report_stat(&self, region: &str, name: &str, value: u64) {
        (**self).report_stat(region, name, value)
    }

    fn report_timer(&self, name: &str, elapsed: Duration) {
        (**self).report_timer(name, elapsed)
    }
}

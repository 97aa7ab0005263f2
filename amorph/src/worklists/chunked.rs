/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::Worklist;
use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::CachePadded;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The private chunks of a worker.
#[derive(Debug)]
struct Local<T> {
    /// Items are popped from here.
    head: VecDeque<T>,
    /// Items are pushed here; when full, the chunk is donated to the global
    /// queue.
    tail: Vec<T>,
}

/// A chunked, per-worker FIFO worklist.
///
/// Each worker owns a head chunk, from which it pops, and a tail chunk, to
/// which it pushes. A tail reaching the chunk capacity is donated to a global
/// FIFO of chunks. A worker with an empty head refills it, in order, from its
/// own tail, from the global FIFO, or by stealing the tail of another worker.
///
/// Private chunks are protected by cache-padded mutexes that are contended
/// only while stealing.
#[derive(Debug)]
pub struct ChunkedFifo<T> {
    locals: Box<[CachePadded<Mutex<Local<T>>>]>,
    global_tx: Sender<Vec<T>>,
    global_rx: Receiver<Vec<T>>,
    chunk_size: usize,
}

impl<T> ChunkedFifo<T> {
    /// Creates a worklist for `num_workers` workers with chunks of
    /// `chunk_size` items.
    pub fn new(num_workers: usize, chunk_size: usize) -> Self {
        assert!(num_workers > 0, "The number of workers must be positive");
        assert!(chunk_size > 0, "The chunk size must be positive");
        let (global_tx, global_rx) = crossbeam_channel::unbounded();
        Self {
            locals: (0..num_workers)
                .map(|_| {
                    CachePadded::new(Mutex::new(Local {
                        head: VecDeque::with_capacity(chunk_size),
                        tail: Vec::with_capacity(chunk_size),
                    }))
                })
                .collect(),
            global_tx,
            global_rx,
            chunk_size,
        }
    }

    /// Returns the chunk capacity.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the number of chunks waiting in the global FIFO.
    pub fn num_global_chunks(&self) -> usize {
        self.global_rx.len()
    }

    fn local(&self, worker: usize) -> MutexGuard<'_, Local<T>> {
        self.locals[worker]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn donate(&self, chunk: Vec<T>) {
        // The receiver lives as long as self, so sending cannot fail
        let _ = self.global_tx.send(chunk);
    }

    fn steal(&self, worker: usize) -> Option<Vec<T>> {
        let n = self.locals.len();
        for i in 1..n {
            let victim = (worker + i) % n;
            if let Ok(mut local) = self.locals[victim].try_lock() {
                if !local.tail.is_empty() {
                    return Some(std::mem::replace(
                        &mut local.tail,
                        Vec::with_capacity(self.chunk_size),
                    ));
                }
            }
        }
        None
    }
}

impl<T: Send> Worklist<T> for ChunkedFifo<T> {
    fn num_workers(&self) -> usize {
        self.locals.len()
    }

    fn push(&self, worker: usize, item: T) {
        let mut local = self.local(worker);
        local.tail.push(item);
        if local.tail.len() >= self.chunk_size {
            let chunk = std::mem::replace(&mut local.tail, Vec::with_capacity(self.chunk_size));
            drop(local);
            self.donate(chunk);
        }
    }

    fn pop(&self, worker: usize) -> Option<T> {
        let mut local = self.local(worker);
        if let Some(item) = local.head.pop_front() {
            return Some(item);
        }
        if !local.tail.is_empty() {
            let Local { head, tail } = &mut *local;
            head.extend(tail.drain(..));
            return local.head.pop_front();
        }
        drop(local);

        let chunk = self
            .global_rx
            .try_recv()
            .ok()
            .or_else(|| self.steal(worker))?;
        let mut local = self.local(worker);
        local.head.extend(chunk);
        local.head.pop_front()
    }

    fn push_initial(&self, items: impl IntoIterator<Item = T>) {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        for item in items {
            chunk.push(item);
            if chunk.len() == self.chunk_size {
                self.donate(std::mem::replace(
                    &mut chunk,
                    Vec::with_capacity(self.chunk_size),
                ));
            }
        }
        if !chunk.is_empty() {
            self.donate(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_single_worker() {
        let wl = ChunkedFifo::new(1, 4);
        wl.push_initial(0..10);
        assert_eq!(wl.num_global_chunks(), 3);
        let mut seen = vec![];
        while let Some(x) = wl.pop(0) {
            seen.push(x);
            if x == 3 {
                wl.push(0, 100);
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 100, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_tail_donation() {
        let wl = ChunkedFifo::new(2, 2);
        wl.push(0, 1);
        assert_eq!(wl.num_global_chunks(), 0);
        wl.push(0, 2);
        assert_eq!(wl.num_global_chunks(), 1);
        wl.push(0, 3);
        // Worker 1 gets the donated chunk, then steals the tail of worker 0
        assert_eq!(wl.pop(1), Some(1));
        assert_eq!(wl.pop(1), Some(2));
        assert_eq!(wl.pop(1), Some(3));
        assert_eq!(wl.pop(0), None);
        assert_eq!(wl.pop(1), None);
    }

    #[test]
    fn test_concurrent() {
        let wl = ChunkedFifo::new(4, 8);
        wl.push_initial(0..1000_usize);
        let sum = AtomicUsize::new(0);
        let count = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for w in 0..4 {
                let (wl, sum, count) = (&wl, &sum, &count);
                s.spawn(move || {
                    while let Some(x) = wl.pop(w) {
                        sum.fetch_add(x, Ordering::Relaxed);
                        count.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(count.load(Ordering::Relaxed), 1000);
        assert_eq!(sum.load(Ordering::Relaxed), 999 * 1000 / 2);
    }
}

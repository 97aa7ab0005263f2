/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{NetError, Network, ReduceOp, Tag, COLLECTIVE_TAG};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// How long a receive waits before looking again at stashed messages.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Value of the failure flag while all hosts are healthy.
const NO_FAILURE: usize = usize::MAX;

#[derive(Debug)]
struct Message {
    from: usize,
    tag: Tag,
    payload: Vec<u8>,
}

/// A network whose hosts are threads of the current process.
///
/// Every host owns an unbounded channel on which all hosts, including
/// itself, can send.
///
/// The endpoints share a failure flag recording the first host that failed.
/// Once it is set, a receive that finds no message fails with
/// [`NetError::Disconnected`] instead of waiting, so that the surviving
/// hosts do not wait forever for a host that will never send.
#[derive(Debug, Clone, Copy)]
pub struct LocalCluster;

impl LocalCluster {
    /// Returns `num_hosts` connected endpoints; endpoint `i` has
    /// identifier `i`.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(num_hosts: usize) -> Vec<LocalEndpoint> {
        assert!(num_hosts > 0, "The number of hosts must be positive");
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..num_hosts).map(|_| crossbeam_channel::unbounded()).unzip();
        let failed = Arc::new(AtomicUsize::new(NO_FAILURE));
        receivers
            .into_iter()
            .enumerate()
            .map(|(id, receiver)| LocalEndpoint {
                id,
                senders: senders.clone(),
                receiver,
                stash: Mutex::new(VecDeque::new()),
                collectives: AtomicU64::new(0),
                bytes_sent: AtomicU64::new(0),
                failed: failed.clone(),
            })
            .collect()
    }

    /// Runs `f` on `num_hosts` threads, one per endpoint, and returns the
    /// results in host order.
    ///
    /// A panic on one of the hosts marks the cluster as failed, and it is
    /// propagated once all hosts have returned.
    pub fn run<R: Send>(num_hosts: usize, f: impl Fn(LocalEndpoint) -> R + Sync) -> Vec<R> {
        Self::spawn(num_hosts, |endpoint| f(endpoint))
    }

    /// Like [`run`](Self::run), but a host returning an error also marks
    /// the cluster as failed, so that the other hosts stop at their next
    /// receive.
    pub fn try_run<R: Send, E: Send>(
        num_hosts: usize,
        f: impl Fn(LocalEndpoint) -> Result<R, E> + Sync,
    ) -> Vec<Result<R, E>> {
        Self::spawn(num_hosts, |endpoint| {
            let id = endpoint.id;
            let failed = endpoint.failed.clone();
            let result = f(endpoint);
            if result.is_err() {
                mark_failed(&failed, id);
            }
            result
        })
    }

    fn spawn<R: Send>(num_hosts: usize, f: impl Fn(LocalEndpoint) -> R + Sync) -> Vec<R> {
        let f = &f;
        std::thread::scope(|s| {
            let handles = Self::new(num_hosts)
                .into_iter()
                .map(|endpoint| {
                    std::thread::Builder::new()
                        .name(format!("host-{}", endpoint.id))
                        .spawn_scoped(s, move || f(endpoint))
                        .unwrap_or_else(|e| panic!("Cannot spawn host thread: {}", e))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }
}

/// An endpoint of a [`LocalCluster`].
#[derive(Debug)]
pub struct LocalEndpoint {
    id: usize,
    senders: Vec<Sender<Message>>,
    receiver: Receiver<Message>,
    stash: Mutex<VecDeque<Message>>,
    collectives: AtomicU64,
    bytes_sent: AtomicU64,
    failed: Arc<AtomicUsize>,
}

fn mark_failed(failed: &AtomicUsize, host: usize) {
    let _ = failed.compare_exchange(NO_FAILURE, host, Ordering::AcqRel, Ordering::Acquire);
}

impl LocalEndpoint {
    /// Returns the number of payload bytes sent by this endpoint.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Returns the first host that failed, if any.
    pub fn failed_host(&self) -> Option<usize> {
        match self.failed.load(Ordering::Acquire) {
            NO_FAILURE => None,
            host => Some(host),
        }
    }

    fn post(&self, to: usize, tag: Tag, payload: Vec<u8>) -> Result<(), NetError> {
        let sender = self.senders.get(to).ok_or(NetError::HostOutOfRange {
            host: to,
            num: self.senders.len(),
        })?;
        self.bytes_sent
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        sender
            .send(Message {
                from: self.id,
                tag,
                payload,
            })
            .map_err(|_| NetError::Disconnected(to))
    }

    fn take_stashed(&self, tag: Tag) -> Option<Message> {
        let mut stash = self.stash.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = stash.iter().position(|m| m.tag == tag)?;
        stash.remove(pos)
    }

    fn take(&self, tag: Tag) -> Result<Message, NetError> {
        loop {
            if let Some(message) = self.take_stashed(tag) {
                return Ok(message);
            }
            match self.receiver.recv_timeout(POLL_INTERVAL) {
                Ok(message) if message.tag == tag => return Ok(message),
                Ok(message) => self
                    .stash
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push_back(message),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(host) = self.failed_host() {
                        return Err(NetError::Disconnected(host));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(NetError::Disconnected(self.id));
                }
            }
        }
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        if std::thread::panicking() {
            mark_failed(&self.failed, self.id);
        }
    }
}

impl Network for LocalEndpoint {
    fn id(&self) -> usize {
        self.id
    }

    fn num(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, to: usize, tag: Tag, buffer: Vec<u8>) -> Result<(), NetError> {
        if tag & COLLECTIVE_TAG != 0 {
            return Err(NetError::ReservedTag(tag));
        }
        self.post(to, tag, buffer)
    }

    fn recv(&self, tag: Tag) -> Result<(usize, Vec<u8>), NetError> {
        if tag & COLLECTIVE_TAG != 0 {
            return Err(NetError::ReservedTag(tag));
        }
        let message = self.take(tag)?;
        Ok((message.from, message.payload))
    }

    fn all_reduce(&self, value: i64, op: ReduceOp) -> Result<i64, NetError> {
        let tag = COLLECTIVE_TAG | self.collectives.fetch_add(1, Ordering::Relaxed);
        for to in (0..self.num()).filter(|&h| h != self.id) {
            self.post(to, tag, value.to_le_bytes().to_vec())?;
        }
        let mut result = value;
        for _ in 1..self.num() {
            let message = self.take(tag)?;
            let bytes: [u8; 8] =
                message
                    .payload
                    .as_slice()
                    .try_into()
                    .map_err(|_| NetError::Malformed {
                        from: message.from,
                        tag,
                        reason: format!("expected 8 bytes, got {}", message.payload.len()),
                    })?;
            result = op.apply(result, i64::from_le_bytes(bytes));
        }
        Ok(result)
    }
}

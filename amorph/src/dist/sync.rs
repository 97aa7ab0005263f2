/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::DistGraph;
use crate::net::{NetError, Network, Tag};
use common_traits::{AsBytes, FromBytes, ToBytes};
use std::time::Instant;

/// Values that can be shipped by synchronization phases.
///
/// Values are encoded in little-endian order, with a fixed size.
pub trait SyncValue: Copy + Send + Sync + 'static {
    /// Appends the encoding of the value to `buffer`.
    fn encode(&self, buffer: &mut Vec<u8>);

    /// Decodes a value from exactly [`size_of::<Self>()`] bytes.
    fn decode(bytes: &[u8]) -> Option<Self>;
}

impl<V> SyncValue for V
where
    V: ToBytes + FromBytes + Copy + Send + Sync + 'static,
    <V as AsBytes>::Bytes: for<'a> TryFrom<&'a [u8]>,
{
    #[inline(always)]
    fn encode(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.to_le_bytes().as_ref());
    }

    #[inline(always)]
    fn decode(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(V::from_le_bytes)
    }
}

/// A field synchronized by [`sync_push`](DistGraph::sync_push).
///
/// Mirrors send their value to the master, which combines it with its own
/// using [`reduce`](Self::reduce); the mirror is then reset to the identity
/// of the reduction. The reduction must be commutative and associative.
///
/// Batch methods are optional: they return false if they are not
/// implemented, in which case the scalar methods are used.
pub trait SyncReduce<D> {
    /// The wire type.
    type Val: SyncValue;

    /// Returns the value to send for local node `node`.
    fn extract(node: usize, data: &D) -> Self::Val;

    /// Combines `value` with the field of local node `node`.
    fn reduce(node: usize, data: &D, value: Self::Val);

    /// Sets the field of local node `node` to the identity of the reduction.
    fn reset(node: usize, data: &D);

    /// Extracts and resets the fields of `nodes`, which are going to `host`,
    /// appending the values to `out`.
    fn extract_reset_batch(
        _host: usize,
        _nodes: &[usize],
        _data: &[D],
        _out: &mut Vec<Self::Val>,
    ) -> bool {
        false
    }

    /// Combines `values`, received from `host`, with the fields of `nodes`.
    fn reduce_batch(_host: usize, _nodes: &[usize], _data: &[D], _values: &[Self::Val]) -> bool {
        false
    }
}

/// A field synchronized by [`sync_pull`](DistGraph::sync_pull).
///
/// Masters send their value to all mirrors, which store it with
/// [`set_val`](Self::set_val).
///
/// Batch methods are optional: they return false if they are not
/// implemented, in which case the scalar methods are used.
pub trait SyncBroadcast<D> {
    /// The wire type.
    type Val: SyncValue;

    /// Returns the value to send for local node `node`.
    fn extract(node: usize, data: &D) -> Self::Val;

    /// Stores `value` in the field of local node `node`.
    fn set_val(node: usize, data: &D, value: Self::Val);

    /// Extracts the fields of `nodes`, which are going to `host`, appending
    /// the values to `out`.
    fn extract_batch(_host: usize, _nodes: &[usize], _data: &[D], _out: &mut Vec<Self::Val>) -> bool {
        false
    }

    /// Stores `values`, received from `host`, in the fields of `nodes`.
    fn set_val_batch(_host: usize, _nodes: &[usize], _data: &[D], _values: &[Self::Val]) -> bool {
        false
    }
}

fn encode<V: SyncValue>(values: &[V]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(std::mem::size_of_val(values));
    for value in values {
        value.encode(&mut buffer);
    }
    buffer
}

fn decode<V: SyncValue>(
    from: usize,
    tag: Tag,
    buffer: &[u8],
    expected: usize,
) -> Result<Vec<V>, NetError> {
    let size = std::mem::size_of::<V>();
    if buffer.len() != expected * size {
        return Err(NetError::Malformed {
            from,
            tag,
            reason: format!(
                "expected {} values of {} bytes, got {} bytes",
                expected,
                size,
                buffer.len()
            ),
        });
    }
    buffer
        .chunks_exact(size)
        .map(|chunk| {
            V::decode(chunk).ok_or_else(|| NetError::Malformed {
                from,
                tag,
                reason: "undecodable value".to_owned(),
            })
        })
        .collect()
}

impl<D: Sync, N: Network> DistGraph<D, N> {
    /// Combines the values of mirrors into their masters, and resets the
    /// mirrors to the identity of the reduction.
    ///
    /// This is a collective operation: all hosts must call it, with the same
    /// synchronizer and in the same order with respect to other collective
    /// operations. When it returns, the masters of this host have received
    /// the contributions of all mirrors.
    pub fn sync_push<S: SyncReduce<D>>(&self, tag: &str) -> Result<(), NetError> {
        let start = Instant::now();
        let wire_tag = self.next_tag();
        let mut values = Vec::new();
        let mut sent = 0;

        for host in (0..self.num_hosts()).filter(|&h| h != self.host_id()) {
            let nodes = self.mirror_nodes(host);
            if nodes.is_empty() {
                continue;
            }
            values.clear();
            if !S::extract_reset_batch(host, nodes, self.all_data(), &mut values) {
                values.extend(nodes.iter().map(|&node| {
                    let data = self.data(node);
                    let value = S::extract(node, data);
                    S::reset(node, data);
                    value
                }));
            }
            sent += values.len();
            self.net().send(host, wire_tag, encode(&values))?;
        }

        let senders = (0..self.num_hosts())
            .filter(|&h| h != self.host_id() && !self.master_nodes(h).is_empty())
            .count();
        let mut received = 0;
        for _ in 0..senders {
            let (host, buffer) = self.net().recv(wire_tag)?;
            let nodes = self.master_nodes(host);
            let values = decode::<S::Val>(host, wire_tag, &buffer, nodes.len())?;
            if !S::reduce_batch(host, nodes, self.all_data(), &values) {
                for (&node, &value) in nodes.iter().zip(&values) {
                    S::reduce(node, self.data(node), value);
                }
            }
            received += values.len();
        }

        self.report_sync("SYNC_PUSH", tag, sent, received, start);
        Ok(())
    }

    /// Copies the values of masters into all their mirrors.
    ///
    /// This is a collective operation: all hosts must call it, with the same
    /// synchronizer and in the same order with respect to other collective
    /// operations. When it returns, every mirror of this host has the value
    /// of its master.
    pub fn sync_pull<S: SyncBroadcast<D>>(&self, tag: &str) -> Result<(), NetError> {
        let start = Instant::now();
        let wire_tag = self.next_tag();
        let mut values = Vec::new();
        let mut sent = 0;

        for host in (0..self.num_hosts()).filter(|&h| h != self.host_id()) {
            let nodes = self.master_nodes(host);
            if nodes.is_empty() {
                continue;
            }
            values.clear();
            if !S::extract_batch(host, nodes, self.all_data(), &mut values) {
                values.extend(nodes.iter().map(|&node| S::extract(node, self.data(node))));
            }
            sent += values.len();
            self.net().send(host, wire_tag, encode(&values))?;
        }

        let senders = (0..self.num_hosts())
            .filter(|&h| h != self.host_id() && !self.mirror_nodes(h).is_empty())
            .count();
        let mut received = 0;
        for _ in 0..senders {
            let (host, buffer) = self.net().recv(wire_tag)?;
            let nodes = self.mirror_nodes(host);
            let values = decode::<S::Val>(host, wire_tag, &buffer, nodes.len())?;
            if !S::set_val_batch(host, nodes, self.all_data(), &values) {
                for (&node, &value) in nodes.iter().zip(&values) {
                    S::set_val(node, self.data(node), value);
                }
            }
            received += values.len();
        }

        self.report_sync("SYNC_PULL", tag, sent, received, start);
        Ok(())
    }

    fn report_sync(&self, kind: &str, tag: &str, sent: usize, received: usize, start: Instant) {
        let region = format!("{}_{}_{}_{}", kind, tag, self.num_run(), self.num_iter());
        self.stats().report_stat(&region, "SentValues", sent as u64);
        self.stats().report_stat(&region, "ReceivedValues", received as u64);
        self.stats().report_timer(&region, start.elapsed());
    }
}

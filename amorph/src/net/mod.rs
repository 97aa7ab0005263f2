/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Communication between hosts.
//!
//! The [`Network`] trait is the narrow interface used by partitioned graphs
//! and accumulators: tagged point-to-point messages, a barrier, and an
//! all-reduce over integers. [`LocalCluster`] implements it for hosts that
//! are threads of the same process.

mod accumulator;
pub use accumulator::*;

mod local;
pub use local::*;

/// The tag of a message.
pub type Tag = u64;

/// Tags with this bit set are reserved for collective operations.
pub const COLLECTIVE_TAG: Tag = 1 << 63;

/// Transport failures.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// A host is no longer reachable.
    #[error("Host {0} is disconnected")]
    Disconnected(usize),
    /// A message could not be decoded.
    #[error("Malformed message from host {from} with tag {tag:#x}: {reason}")]
    Malformed {
        from: usize,
        tag: Tag,
        reason: String,
    },
    /// A message was addressed to a nonexistent host.
    #[error("Host {host} is out of range (the network has {num} hosts)")]
    HostOutOfRange { host: usize, num: usize },
    /// A point-to-point message used a reserved tag.
    #[error("Tag {0:#x} is reserved for collective operations")]
    ReservedTag(Tag),
}

/// The reduction of an all-reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    /// Combines two values.
    pub fn apply(&self, a: i64, b: i64) -> i64 {
        match self {
            ReduceOp::Sum => a.wrapping_add(b),
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// An endpoint of a network of hosts.
///
/// Collective operations ([`barrier`](Network::barrier) and
/// [`all_reduce`](Network::all_reduce)) must be called by all hosts in the
/// same order.
pub trait Network: Send + Sync {
    /// Returns the identifier of this host.
    fn id(&self) -> usize;

    /// Returns the number of hosts.
    fn num(&self) -> usize;

    /// Sends `buffer` to host `to` with the given tag.
    ///
    /// Sending does not block.
    fn send(&self, to: usize, tag: Tag, buffer: Vec<u8>) -> Result<(), NetError>;

    /// Receives a message with the given tag from any host, blocking until
    /// one is available.
    ///
    /// Returns the sender and the payload. Messages with a different tag
    /// received in the meantime are kept for later calls.
    fn recv(&self, tag: Tag) -> Result<(usize, Vec<u8>), NetError>;

    /// Blocks until all hosts have called this method.
    fn barrier(&self) -> Result<(), NetError> {
        self.all_reduce(0, ReduceOp::Sum).map(|_| ())
    }

    /// Combines `value` with the values of all other hosts, returning the
    /// result to everybody.
    fn all_reduce(&self, value: i64, op: ReduceOp) -> Result<i64, NetError>;

    /// Shorthand for an all-reduce with [`ReduceOp::Sum`].
    fn all_reduce_sum(&self, value: i64) -> Result<i64, NetError> {
        self.all_reduce(value, ReduceOp::Sum)
    }
}

impl<N: Network + ?Sized> Network for &N {
    fn id(&self) -> usize {
        (**self).id()
    }

    fn num(&self) -> usize {
        (**self).num()
    }

    fn send(&self, to: usize, tag: Tag, buffer: Vec<u8>) -> Result<(), NetError> {
        (**self).send(to, tag, buffer)
    }

    fn recv(&self, tag: Tag) -> Result<(usize, Vec<u8>), NetError> {
        (**self).recv(tag)
    }

    fn barrier(&self) -> Result<(), NetError> {
        (**self).barrier()
    }

    fn all_reduce(&self, value: i64, op: ReduceOp) -> Result<i64, NetError> {
        (**self).all_reduce(value, op)
    }
}

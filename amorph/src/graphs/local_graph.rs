/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::graphs::csr_graph::CsrGraph;
use crate::runtime::{Abort, MethodFlag, NodeLock, UserContext};
use crate::traits::Topology;
use std::cell::UnsafeCell;
use std::ops::Range;

/// A shared-memory graph with lockable user data on its nodes.
///
/// User data can be accessed only through a [`UserContext`], which checks
/// the [`MethodFlag`] of every access against the lock of the node:
/// speculative and serial iterations must hold the lock, and inspection
/// phases of deterministic rounds can only read. After a loop, the data can
/// be accessed directly through a mutable reference to the graph.
///
/// Loops on the same graph must not overlap in time.
pub struct LocalGraph<D> {
    topology: CsrGraph,
    data: Box<[UnsafeCell<D>]>,
    locks: Box<[NodeLock]>,
}

// SAFETY: mutable access to the data of a node requires holding its lock,
// and the only accesses without a lock are reads during inspection phases,
// in which no mutation is allowed.
unsafe impl<D: Send + Sync> Sync for LocalGraph<D> {}

impl<D: Default> LocalGraph<D> {
    /// Creates a graph with the given topology and default user data.
    pub fn new(topology: CsrGraph) -> Self {
        Self::from_fn(topology, |_| D::default())
    }
}

impl<D> LocalGraph<D> {
    /// Creates a graph with the given topology and user data computed by
    /// `init` from the node index.
    pub fn from_fn(topology: CsrGraph, init: impl FnMut(usize) -> D) -> Self {
        let num_nodes = topology.num_nodes();
        Self {
            data: (0..num_nodes).map(init).map(UnsafeCell::new).collect(),
            locks: (0..num_nodes).map(|_| NodeLock::new()).collect(),
            topology,
        }
    }

    /// Returns the topology of the graph.
    pub fn topology(&self) -> &CsrGraph {
        &self.topology
    }

    /// Returns the lock of `node`.
    pub fn lock(&self, node: usize) -> &NodeLock {
        &self.locks[node]
    }

    /// Acquires `node` according to `flag`, without accessing its data.
    #[inline(always)]
    pub fn acquire<'g, T, S>(
        &'g self,
        node: usize,
        flag: MethodFlag,
        ctx: &mut UserContext<'g, T, S>,
    ) -> Result<(), Abort> {
        ctx.acquire(node, &self.locks[node], flag)
    }

    /// Returns a copy of the data of `node`.
    #[inline(always)]
    pub fn get<'g, T, S>(
        &'g self,
        node: usize,
        flag: MethodFlag,
        ctx: &mut UserContext<'g, T, S>,
    ) -> Result<D, Abort>
    where
        D: Copy,
    {
        self.with(node, flag, ctx, |d| *d)
    }

    /// Applies `f` to a shared reference to the data of `node`.
    #[inline(always)]
    pub fn with<'g, T, S, R>(
        &'g self,
        node: usize,
        flag: MethodFlag,
        ctx: &mut UserContext<'g, T, S>,
        f: impl FnOnce(&D) -> R,
    ) -> Result<R, Abort> {
        ctx.acquire(node, &self.locks[node], flag)?;
        // SAFETY: the context checked that either we hold the lock, or we are
        // inspecting and nobody is writing.
        Ok(f(unsafe { &*self.data[node].get() }))
    }

    /// Applies `f` to a mutable reference to the data of `node`.
    ///
    /// Mutation during the inspection phase of a deterministic round ends
    /// the inspection, as a fail-safe point.
    #[inline(always)]
    pub fn update<'g, T, S, R>(
        &'g self,
        node: usize,
        flag: MethodFlag,
        ctx: &mut UserContext<'g, T, S>,
        f: impl FnOnce(&mut D) -> R,
    ) -> Result<R, Abort> {
        ctx.acquire(node, &self.locks[node], flag)?;
        ctx.check_mutation()?;
        // SAFETY: outside inspection phases the context checked that we hold
        // the lock, so the access is exclusive.
        Ok(f(unsafe { &mut *self.data[node].get() }))
    }

    /// Returns a mutable reference to the data of `node`.
    pub fn data_mut(&mut self, node: usize) -> &mut D {
        self.data[node].get_mut()
    }

    /// Returns an iterator over the data of all nodes.
    pub fn iter_data(&mut self) -> impl Iterator<Item = &D> + '_ {
        self.data.iter_mut().map(|cell| &*cell.get_mut())
    }

    /// Consumes the graph, returning its topology and data.
    pub fn into_parts(self) -> (CsrGraph, Vec<D>) {
        (
            self.topology,
            self.data
                .into_vec()
                .into_iter()
                .map(UnsafeCell::into_inner)
                .collect(),
        )
    }
}

impl<D> Topology for LocalGraph<D> {
    #[inline(always)]
    fn num_nodes(&self) -> usize {
        self.topology.num_nodes()
    }

    #[inline(always)]
    fn num_arcs(&self) -> u64 {
        self.topology.num_arcs()
    }

    #[inline(always)]
    fn edges(&self, node: usize) -> Range<usize> {
        self.topology.edges(node)
    }

    #[inline(always)]
    fn edge_dst(&self, edge: usize) -> usize {
        self.topology.edge_dst(edge)
    }

    #[inline(always)]
    fn successors(&self, node: usize) -> &[usize] {
        self.topology.successors(node)
    }
}

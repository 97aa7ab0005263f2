/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/*!

Read-only access to the topology of a graph.

Topology is fixed after loading, so it can be shared freely among threads
without any form of locking: all the graphs in this crate expose it through
the [`Topology`] trait, which mimics the classical compressed-sparse-row
interface (`edge_begin`, `edge_end`, `getEdgeDst`) but also provides the
more idiomatic [`successors`](Topology::successors) slice.

Edges are enumerated in CSR order: the edges of node `x` are the
half-open range [`edges(x)`](Topology::edges), and the destination of an
edge is returned by [`edge_dst`](Topology::edge_dst).

*/

use std::ops::Range;

/// A graph whose topology can be accessed in random-access fashion.
pub trait Topology {
    /// Returns the number of nodes of the graph.
    fn num_nodes(&self) -> usize;

    /// Returns the number of arcs of the graph.
    fn num_arcs(&self) -> u64;

    /// Returns the range of edge indices of `node`, in CSR order.
    fn edges(&self, node: usize) -> Range<usize>;

    /// Returns the destination of the edge with index `edge`.
    fn edge_dst(&self, edge: usize) -> usize;

    /// Returns the successors of `node`.
    fn successors(&self, node: usize) -> &[usize];

    /// Returns the first edge of `node`.
    #[inline(always)]
    fn edge_begin(&self, node: usize) -> usize {
        self.edges(node).start
    }

    /// Returns the edge following the last edge of `node`.
    #[inline(always)]
    fn edge_end(&self, node: usize) -> usize {
        self.edges(node).end
    }

    /// Returns the outdegree of `node`.
    #[inline(always)]
    fn outdegree(&self, node: usize) -> usize {
        self.edges(node).len()
    }
}

impl<T: Topology + ?Sized> Topology for &T {
    #[inline(always)]
    fn num_nodes(&self) -> usize {
        (**self).num_nodes()
    }

    #[inline(always)]
    fn num_arcs(&self) -> u64 {
        (**self).num_arcs()
    }

    #[inline(always)]
    fn edges(&self, node: usize) -> Range<usize> {
        (**self).edges(node)
    }

    #[inline(always)]
    fn edge_dst(&self, edge: usize) -> usize {
        (**self).edge_dst(edge)
    }

    #[inline(always)]
    fn successors(&self, node: usize) -> &[usize] {
        (**self).successors(node)
    }
}

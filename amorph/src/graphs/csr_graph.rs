/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 * SPDX-FileCopyrightText: 2025 Tommaso Fontana
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::traits::*;
use std::ops::Range;

/// A compressed sparse-row graph.
///
/// It is a graph representation that stores the degree-cumulative function
/// (DCF) and the successors in two boxed slices. The DCF is a sequence of
/// offsets that indicates the start of the neighbors for each node in the
/// graph, so the edges of `x` are the indices `dcf[x]..dcf[x + 1]` of the
/// successor slice.
///
/// The topology is immutable once built: it is shared without locks by all
/// the workers of a loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrGraph {
    dcf: Box<[usize]>,
    successors: Box<[usize]>,
}

impl core::default::Default for CsrGraph {
    fn default() -> Self {
        Self {
            dcf: vec![0].into(),
            successors: vec![].into(),
        }
    }
}

impl CsrGraph {
    /// Creates an empty CSR graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new CSR graph from the given degree-cumulative function and
    /// successors.
    ///
    /// # Safety
    /// The degree-cumulative function must be monotone, start from zero, end
    /// at the number of successors, and all successors must be smaller than
    /// the number of nodes.
    pub unsafe fn from_parts(dcf: Box<[usize]>, successors: Box<[usize]>) -> Self {
        Self { dcf, successors }
    }

    /// Creates a new CSR graph from a list of arcs.
    ///
    /// The number of nodes is the maximum between `num_nodes` and one plus
    /// the largest node appearing in an arc. Successors of each node are
    /// sorted; duplicate arcs are kept.
    pub fn from_arcs(num_nodes: usize, arcs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let arcs = arcs.into_iter().collect::<Vec<_>>();
        let num_nodes = arcs
            .iter()
            .fold(num_nodes, |n, &(x, y)| n.max(x + 1).max(y + 1));

        // Counting sort by source
        let mut dcf = vec![0; num_nodes + 1];
        for &(x, _) in &arcs {
            dcf[x + 1] += 1;
        }
        for x in 0..num_nodes {
            dcf[x + 1] += dcf[x];
        }
        let mut next = dcf.clone();
        let mut successors = vec![0; arcs.len()];
        for (x, y) in arcs {
            successors[next[x]] = y;
            next[x] += 1;
        }
        for x in 0..num_nodes {
            successors[dcf[x]..dcf[x + 1]].sort_unstable();
        }

        Self {
            dcf: dcf.into(),
            successors: successors.into(),
        }
    }

    /// Returns the symmetric closure of this graph without loops and
    /// duplicate arcs.
    pub fn symmetrize(&self) -> Self {
        let mut arcs = Vec::with_capacity(self.successors.len() * 2);
        for (x, y) in self.arcs() {
            if x != y {
                arcs.push((x, y));
                arcs.push((y, x));
            }
        }
        arcs.sort_unstable();
        arcs.dedup();
        Self::from_arcs(self.num_nodes(), arcs)
    }

    /// Returns an iterator over the arcs of the graph, in CSR order.
    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.num_nodes())
            .flat_map(move |x| self.successors(x).iter().map(move |&y| (x, y)))
    }

    /// Returns the degree-cumulative function.
    pub fn dcf(&self) -> &[usize] {
        &self.dcf
    }

    /// Returns the concatenation of all successor lists.
    pub fn dsts(&self) -> &[usize] {
        &self.successors
    }

    pub fn into_inner(self) -> (Box<[usize]>, Box<[usize]>) {
        (self.dcf, self.successors)
    }
}

impl Topology for CsrGraph {
    #[inline(always)]
    fn num_nodes(&self) -> usize {
        self.dcf.len() - 1
    }

    #[inline(always)]
    fn num_arcs(&self) -> u64 {
        self.successors.len() as u64
    }

    #[inline(always)]
    fn edges(&self, node: usize) -> Range<usize> {
        self.dcf[node]..self.dcf[node + 1]
    }

    #[inline(always)]
    fn edge_dst(&self, edge: usize) -> usize {
        self.successors[edge]
    }

    #[inline(always)]
    fn successors(&self, node: usize) -> &[usize] {
        &self.successors[self.edges(node)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_arcs() {
        let g = CsrGraph::from_arcs(0, [(2, 0), (0, 1), (0, 2), (1, 2), (2, 1)]);
        assert_eq!(g.num_nodes(), 3);
        assert_eq!(g.num_arcs(), 5);
        assert_eq!(g.successors(0), &[1, 2]);
        assert_eq!(g.successors(2), &[0, 1]);
        assert_eq!(g.edge_begin(1), 2);
        assert_eq!(g.edge_end(1), 3);
        assert_eq!(g.edge_dst(2), 2);
        assert_eq!(g.outdegree(2), 2);
    }

    #[test]
    fn test_isolated_tail() {
        let g = CsrGraph::from_arcs(5, [(0, 1)]);
        assert_eq!(g.num_nodes(), 5);
        assert_eq!(g.outdegree(4), 0);
        assert!(CsrGraph::new().arcs().next().is_none());
    }

    #[test]
    fn test_symmetrize() {
        let g = CsrGraph::from_arcs(0, [(0, 1), (1, 0), (1, 1), (1, 2)]).symmetrize();
        assert_eq!(g.arcs().collect::<Vec<_>>(), vec![(0, 1), (1, 0), (1, 2), (2, 1)]);
    }
}

/*
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::graphs::csr_graph::CsrGraph;

/// Erdös-Rényi random graphs.
///
/// The Erdös-Rényi random graph model is a simple model for generating random
/// graphs. It is parameterized by the number of nodes `n` and the probability
/// `p` of an arc between any two nodes. In this implementation, loops are never
/// included.
///
/// The arcs are a deterministic function of the seed, so the same generator
/// yields the same graph on every run and on every host. Generation is
/// quadratic in `n`.
#[derive(Debug, Clone)]
pub struct ErdosRenyi {
    n: usize,
    p: f64,
    seed: u64,
}

impl ErdosRenyi {
    /// Creates a new Erdös-Rényi random graph, given the number of
    /// nodes, the probability of an edge between any two nodes, and a
    /// seed for the [pseudorandom number generator](SmallRng).
    pub fn new(n: usize, p: f64, seed: u64) -> Self {
        assert!((0.0..=1.0).contains(&p), "p must be in [0..1]");
        Self { n, p, seed }
    }

    /// Returns the number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.n
    }

    /// Returns an iterator over the arcs, in lexicographical order.
    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let (n, p) = (self.n, self.p);
        (0..n).flat_map(move |x| {
            (0..n)
                .filter(|&y| y != x && rng.random_bool(p))
                .map(|y| (x, y))
                .collect::<Vec<_>>()
        })
    }

    /// Materializes the graph as a [`CsrGraph`].
    pub fn to_csr(&self) -> CsrGraph {
        CsrGraph::from_arcs(self.n, self.arcs())
    }

    /// Materializes the symmetric closure of the graph as a [`CsrGraph`].
    pub fn to_symmetric_csr(&self) -> CsrGraph {
        self.to_csr().symmetrize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Topology;

    #[test]
    fn test_er() {
        let g = ErdosRenyi::new(10, 0.3, 0);
        let a = g.arcs().collect::<Vec<_>>();
        let b = g.arcs().collect::<Vec<_>>();
        assert_eq!(a, b);
        assert!(a.iter().all(|&(x, y)| x != y && x < 10 && y < 10));
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_symmetric() {
        let g = ErdosRenyi::new(50, 0.1, 1).to_symmetric_csr();
        assert_eq!(g.num_nodes(), 50);
        for x in 0..g.num_nodes() {
            for &y in g.successors(x) {
                assert!(g.successors(y).contains(&x));
            }
        }
    }
}

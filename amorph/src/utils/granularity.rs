/*
 * SPDX-FileCopyrightText: 2025 Inria
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/// Granularity of the tasks of an unordered parallel loop, specified by
/// nodes or by arcs.
///
/// [`do_all`](crate::runtime::do_all) splits a node range into tasks that
/// workers grab from a shared cursor. Some loops have a cost proportional to
/// the number of nodes, others to the number of arcs they scan: this enum
/// lets the caller specify the task size in either unit, and
/// [`node_granularity`](Self::node_granularity) converts it using the
/// average outdegree of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Each task is formed by the specified number of nodes.
    Nodes(usize),
    /// Each task is formed by a number of nodes whose sum of outdegrees is,
    /// tentatively, the specified number of arcs.
    Arcs(u64),
}

impl core::default::Default for Granularity {
    /// Returns a default granularity of 1024 nodes.
    fn default() -> Self {
        Self::Nodes(1024)
    }
}

impl Granularity {
    /// Returns the number of nodes per task for a graph with the given number
    /// of nodes and arcs.
    ///
    /// The result is always at least one.
    pub fn node_granularity(&self, num_nodes: usize, num_arcs: u64) -> usize {
        match self {
            Self::Nodes(n) => (*n).max(1),
            Self::Arcs(n) => {
                let average_degree = num_arcs as f64 / num_nodes.max(1) as f64;
                if average_degree == 0.0 {
                    return num_nodes.max(1);
                }
                (*n as f64 / average_degree)
                    .min(usize::MAX as f64)
                    .ceil()
                    .max(1.) as usize
            }
        }
    }

    /// Returns the number of arcs per task for a graph with the given number
    /// of nodes and arcs.
    pub fn arc_granularity(&self, num_nodes: usize, num_arcs: u64) -> u64 {
        match self {
            Self::Nodes(n) => {
                let average_degree = num_arcs as f64 / num_nodes.max(1) as f64;
                (*n as f64 * average_degree).ceil().max(1.) as u64
            }
            Self::Arcs(n) => (*n).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Granularity::Nodes(10).node_granularity(100, 1000), 10);
        assert_eq!(Granularity::Arcs(100).node_granularity(100, 1000), 10);
        assert_eq!(Granularity::Nodes(10).arc_granularity(100, 1000), 100);
        assert_eq!(Granularity::Arcs(0).arc_granularity(100, 1000), 1);
        // No arcs at all: a single task
        assert_eq!(Granularity::Arcs(100).node_granularity(100, 0), 100);
    }
}

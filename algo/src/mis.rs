/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Maximal independent sets.
//!
//! The greedy algorithm visits the nodes and adds to the set every node that
//! has no neighbor in the set yet; the neighbors of a newly added node are
//! marked so that they are skipped later. The same operator drives a
//! [serial loop](amorph::runtime::for_each_serial) and all the schedules of
//! [`for_each`](amorph::runtime::for_each): with a deterministic schedule the
//! resulting set depends only on the graph, not on the number of threads.
//!
//! The input graph must be symmetric.
//!
//! # Examples
//! ```
//! use amorph::prelude::*;
//! use amorph_algo::mis::*;
//! use dsi_progress_logger::no_logging;
//!
//! let graph = CsrGraph::from_arcs(5, [(0, 1), (1, 2), (2, 3), (3, 4)]).symmetrize();
//! let mis = mis(graph, Algorithm::Serial, 256, &amorph::thread_pool![1], no_logging![]);
//! assert_eq!(mis.cardinality(), 3);
//! mis.verify().unwrap();
//! ```

use amorph::prelude::*;
use dsi_progress_logger::ProgressLog;
use rayon::{ThreadPool, prelude::*};

/// The state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchFlag {
    /// The node has not been decided yet.
    #[default]
    Unmatched,
    /// A neighbor of the node is in the set.
    OtherMatched,
    /// The node is in the set.
    Matched,
}

/// The user data of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Node {
    pub id: usize,
    pub flag: MatchFlag,
    /// Staging slot for two-phase variants; the greedy operator writes
    /// [`flag`](Self::flag) directly.
    pub pending_flag: MatchFlag,
}

/// The way the set is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// A single-threaded loop visiting nodes in increasing order.
    Serial,
    /// A parallel loop with the given schedule.
    Parallel(Schedule),
}

/// Verification failures.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisError {
    #[error("Double match: node {node} and its neighbor {neighbor} are both in the set")]
    DoubleMatch { node: usize, neighbor: usize },
    #[error("Not maximal: node {node} and all its neighbors are unmatched")]
    NotMaximal { node: usize },
}

/// Local state carried between the two phases of a
/// [`DetDisjoint`](Schedule::DetDisjoint) round.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decision {
    /// The node can be added to the set.
    modified: bool,
}

/// The greedy operator.
///
/// The shape of the operator depends on the schedule it is used with:
/// - [`DetPrefix`](Schedule::DetPrefix) uses the read-only
///   [`build`](Self::build) phase as its prefix;
/// - [`DetDisjoint`](Schedule::DetDisjoint) saves the outcome of the build
///   phase and, in the commit phase, only performs the modification.
pub struct Process<'a> {
    graph: &'a LocalGraph<Node>,
    schedule: Schedule,
}

impl<'a> Process<'a> {
    pub fn new(graph: &'a LocalGraph<Node>, schedule: Schedule) -> Self {
        Self { graph, schedule }
    }

    /// Acquires `src` and its neighbors, and returns whether `src` can be
    /// added to the set.
    fn build<'g>(
        &'g self,
        src: usize,
        ctx: &mut UserContext<'g, usize, Decision>,
    ) -> Result<bool, Abort> {
        if self.graph.with(src, MethodFlag::All, ctx, |me| me.flag)? != MatchFlag::Unmatched {
            return Ok(false);
        }
        for &dst in self.graph.successors(src) {
            if self.graph.with(dst, MethodFlag::All, ctx, |data| data.flag)? == MatchFlag::Matched
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Adds `src` to the set; all the involved nodes must have been
    /// acquired by [`build`](Self::build).
    fn modify<'g>(
        &'g self,
        src: usize,
        ctx: &mut UserContext<'g, usize, Decision>,
    ) -> Result<(), Abort> {
        for &dst in self.graph.successors(src) {
            self.graph.update(dst, MethodFlag::None, ctx, |data| {
                data.flag = MatchFlag::OtherMatched
            })?;
        }
        self.graph
            .update(src, MethodFlag::None, ctx, |me| me.flag = MatchFlag::Matched)
    }
}

impl Operator<usize> for Process<'_> {
    type LocalState = Decision;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            needs_parallel_push: false,
            needs_per_iter_alloc: false,
        }
    }

    fn apply<'g>(
        &'g self,
        src: usize,
        ctx: &mut UserContext<'g, usize, Decision>,
    ) -> Result<(), Abort> {
        if self.schedule == Schedule::DetDisjoint {
            let (decision, used) = ctx.local_state();
            if used {
                let modified = decision.modified;
                return if modified { self.modify(src, ctx) } else { Ok(()) };
            }
        }

        let modified = self.build(src, ctx)?;
        ctx.local_state().0.modified = modified;
        // Fail-safe point
        self.graph.acquire(src, MethodFlag::Write, ctx)?;
        if modified {
            self.modify(src, ctx)?;
        }
        Ok(())
    }

    fn apply_prefix<'g>(
        &'g self,
        src: usize,
        ctx: &mut UserContext<'g, usize, Decision>,
    ) -> Result<(), Abort> {
        self.build(src, ctx).map(|_| ())
    }
}

/// The outcome of [`mis`].
pub struct MaximalIndependentSet {
    topology: CsrGraph,
    nodes: Box<[Node]>,
    stats: LoopStats,
}

impl MaximalIndependentSet {
    /// Returns the number of nodes in the set.
    pub fn cardinality(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.flag == MatchFlag::Matched)
            .count()
    }

    /// Returns the flag of every node.
    pub fn flags(&self) -> Vec<MatchFlag> {
        self.nodes.iter().map(|node| node.flag).collect()
    }

    /// Returns the statistics of the loop that computed the set.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn topology(&self) -> &CsrGraph {
        &self.topology
    }

    /// Returns the user data of every node.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Checks that no two neighbors are in the set, and that every unmatched
    /// node has a neighbor that is not unmatched.
    pub fn verify(&self) -> Result<(), MisError> {
        let data = &self.nodes;
        let topology = &self.topology;
        (0..topology.num_nodes())
            .into_par_iter()
            .try_for_each(|node| match data[node].flag {
                MatchFlag::Matched => {
                    match topology
                        .successors(node)
                        .iter()
                        .find(|&&dst| dst != node && data[dst].flag == MatchFlag::Matched)
                    {
                        Some(&neighbor) => Err(MisError::DoubleMatch { node, neighbor }),
                        None => Ok(()),
                    }
                }
                MatchFlag::Unmatched => {
                    if topology
                        .successors(node)
                        .iter()
                        .any(|&dst| data[dst].flag != MatchFlag::Unmatched)
                    {
                        Ok(())
                    } else {
                        Err(MisError::NotMaximal { node })
                    }
                }
                MatchFlag::OtherMatched => Ok(()),
            })
    }
}

/// Computes a maximal independent set of a symmetric graph.
///
/// Nodes are visited starting from the node of index zero; parallel loops
/// use chunks of `chunk_size` nodes.
pub fn mis(
    graph: CsrGraph,
    algorithm: Algorithm,
    chunk_size: usize,
    thread_pool: &ThreadPool,
    pl: &mut impl ProgressLog,
) -> MaximalIndependentSet {
    let num_nodes = graph.num_nodes();
    let local = LocalGraph::from_fn(graph, |id| Node {
        id,
        ..Node::default()
    });

    let stats = match algorithm {
        Algorithm::Serial => {
            for_each_serial(0..num_nodes, &Process::new(&local, Schedule::DetBase), pl)
        }
        Algorithm::Parallel(schedule) => for_each(
            0..num_nodes,
            &Process::new(&local, schedule),
            schedule,
            chunk_size,
            thread_pool,
            pl,
        ),
    };

    log::debug!("{:?}", stats);
    let (topology, nodes) = local.into_parts();
    MaximalIndependentSet {
        topology,
        nodes: nodes.into_boxed_slice(),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(topology: CsrGraph, flags: &[MatchFlag]) -> MaximalIndependentSet {
        MaximalIndependentSet {
            topology,
            nodes: flags
                .iter()
                .enumerate()
                .map(|(id, &flag)| Node {
                    id,
                    flag,
                    pending_flag: MatchFlag::Unmatched,
                })
                .collect(),
            stats: LoopStats::default(),
        }
    }

    #[test]
    fn test_verify() {
        use MatchFlag::*;
        let path = CsrGraph::from_arcs(3, [(0, 1), (1, 2)]).symmetrize();
        assert!(set(path.clone(), &[Matched, OtherMatched, Matched]).verify().is_ok());
        assert!(matches!(
            set(path.clone(), &[Matched, Matched, OtherMatched]).verify(),
            Err(MisError::DoubleMatch { .. })
        ));
        assert!(matches!(
            set(path.clone(), &[Unmatched, Unmatched, Unmatched]).verify(),
            Err(MisError::NotMaximal { .. })
        ));
        // Unmatched nodes are accepted if a neighbor is decided
        assert!(set(path, &[Unmatched, OtherMatched, Matched]).verify().is_ok());
        // Loops are not double matches
        let looped = CsrGraph::from_arcs(2, [(0, 0), (0, 1), (1, 0)]);
        assert!(set(looped, &[Matched, OtherMatched]).verify().is_ok());
        let isolated = CsrGraph::from_arcs(1, Vec::<(usize, usize)>::new());
        assert_eq!(
            set(isolated, &[Unmatched]).verify(),
            Err(MisError::NotMaximal { node: 0 })
        );
    }
}

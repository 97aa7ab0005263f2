/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Distributed breadth-first search.
//!
//! Every node carries its current distance from the source, which is
//! lowered by atomic minima, and the distance it had when it was last
//! expanded. The computation proceeds by rounds, each made of two
//! [`do_all`] loops on the nodes of the host and two synchronization phases:
//!
//! 1. *Snapshot*: the nodes whose current distance is smaller than the old
//!    one become the frontier, and their old distance is updated.
//! 2. *Relax*: the frontier lowers the current distance of its successors.
//! 3. [`sync_push`](DistGraph::sync_push) combines the distances of mirrors
//!    into their masters, and [`sync_pull`](DistGraph::sync_pull) sends them
//!    back to the mirrors.
//!
//! A [`DistAccumulator`] counts the size of the frontier across hosts; the
//! computation ends after a round with an empty frontier, or when the
//! maximum number of rounds is reached. Since relaxations use the distance
//! of the snapshot, round *k* discovers exactly the nodes at distance *k*
//! from the source, independently of the number of threads.
//!
//! Unreachable nodes keep distance [`INFINITY`].

use amorph::prelude::*;
use dsi_progress_logger::ProgressLog;
use rayon::ThreadPool;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use sync_cell_slice::SyncCell;

/// The distance of unreachable nodes.
///
/// It is small enough that adding one to it does not overflow.
pub const INFINITY: u32 = u32::MAX / 4;

/// The user data of a node.
#[derive(Debug)]
pub struct NodeData {
    pub dist_current: AtomicU32,
    pub dist_old: AtomicU32,
}

impl Default for NodeData {
    fn default() -> Self {
        Self {
            dist_current: AtomicU32::new(INFINITY),
            dist_old: AtomicU32::new(INFINITY),
        }
    }
}

/// Minimum reduction of `dist_current`, resetting mirrors to [`INFINITY`].
pub struct ReduceMinDistCurrent;

impl SyncReduce<NodeData> for ReduceMinDistCurrent {
    type Val = u32;

    #[inline(always)]
    fn extract(_node: usize, data: &NodeData) -> u32 {
        data.dist_current.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn reduce(_node: usize, data: &NodeData, value: u32) {
        data.dist_current.atomic_min(value);
    }

    #[inline(always)]
    fn reset(_node: usize, data: &NodeData) {
        data.dist_current.store(INFINITY, Ordering::Relaxed);
    }

    fn extract_reset_batch(
        _host: usize,
        nodes: &[usize],
        data: &[NodeData],
        out: &mut Vec<u32>,
    ) -> bool {
        out.extend(
            nodes
                .iter()
                .map(|&node| data[node].dist_current.swap(INFINITY, Ordering::Relaxed)),
        );
        true
    }
}

/// Broadcast of `dist_current` from masters to mirrors.
pub struct BroadcastDistCurrent;

impl SyncBroadcast<NodeData> for BroadcastDistCurrent {
    type Val = u32;

    #[inline(always)]
    fn extract(_node: usize, data: &NodeData) -> u32 {
        data.dist_current.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn set_val(_node: usize, data: &NodeData, value: u32) {
        data.dist_current.store(value, Ordering::Relaxed);
    }
}

/// Parameters of [`bfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfsParams {
    /// The global identifier of the source.
    pub source: usize,
    /// The maximum number of rounds after the first one.
    pub max_iterations: usize,
    /// The size of the tasks of the parallel loops.
    pub granularity: Granularity,
}

impl Default for BfsParams {
    fn default() -> Self {
        Self {
            source: 0,
            max_iterations: 10000,
            granularity: Granularity::default(),
        }
    }
}

/// The outcome of [`bfs`] on a host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BfsOutcome {
    /// The size of the frontier, summed across hosts, of every round after
    /// the first one; the last value is zero unless the computation was
    /// capped.
    pub work_per_round: Vec<i64>,
    /// Whether the computation stopped because of the maximum number of
    /// rounds.
    pub capped: bool,
}

impl BfsOutcome {
    /// Returns the number of rounds after the first one.
    pub fn rounds(&self) -> usize {
        self.work_per_round.len()
    }
}

/// Verification failures.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BfsError {
    #[error("Wrong distance for node {node}: expected {expected}, found {actual}")]
    WrongDistance {
        node: usize,
        expected: u32,
        actual: u32,
    },
}

/// Sets the distances of all local nodes: zero for the source and
/// [`INFINITY`] for all other nodes.
pub fn initialize_graph<N: Network>(
    graph: &DistGraph<NodeData, N>,
    source: usize,
    granularity: usize,
    thread_pool: &ThreadPool,
) -> Result<(), NetError> {
    do_all(
        0..graph.num_local_nodes(),
        granularity,
        |node| {
            let dist = if graph.gid(node) == source { 0 } else { INFINITY };
            let data = graph.data(node);
            data.dist_current.store(dist, Ordering::Relaxed);
            data.dist_old.store(dist, Ordering::Relaxed);
        },
        thread_pool,
    );
    graph.sync_pull::<BroadcastDistCurrent>("InitializeGraph")
}

/// Moves the nodes whose distance decreased to the frontier, adding its size
/// to `accum`.
fn snapshot<N: Network>(
    graph: &DistGraph<NodeData, N>,
    frontier: &[AtomicBool],
    accum: &DistAccumulator,
    granularity: usize,
    thread_pool: &ThreadPool,
) {
    do_all(
        graph.work_nodes(),
        granularity,
        |node| {
            let data = graph.data(node);
            let current = data.dist_current.load(Ordering::Relaxed);
            let active = data.dist_old.load(Ordering::Relaxed) > current;
            if active {
                data.dist_old.store(current, Ordering::Relaxed);
                accum.add(1);
            }
            frontier[node].store(active, Ordering::Relaxed);
        },
        thread_pool,
    );
}

/// Lowers the distances of the successors of the frontier.
fn relax<N: Network>(
    graph: &DistGraph<NodeData, N>,
    frontier: &[AtomicBool],
    granularity: usize,
    thread_pool: &ThreadPool,
) {
    do_all(
        graph.work_nodes(),
        granularity,
        |node| {
            if !frontier[node].load(Ordering::Relaxed) {
                return;
            }
            let new_dist = 1 + graph.data(node).dist_old.load(Ordering::Relaxed);
            for &dst in graph.successors(node) {
                graph.data(dst).dist_current.atomic_min(new_dist);
            }
        },
        thread_pool,
    );
}

fn sync<N: Network>(graph: &DistGraph<NodeData, N>, tag: &str) -> Result<(), NetError> {
    graph.sync_push::<ReduceMinDistCurrent>(tag)?;
    graph.sync_pull::<BroadcastDistCurrent>(tag)
}

/// The first round: every node expands, whatever its distance.
pub fn first_itr<N: Network>(
    graph: &DistGraph<NodeData, N>,
    granularity: usize,
    thread_pool: &ThreadPool,
) -> Result<(), NetError> {
    let frontier = (0..graph.num_local_nodes())
        .map(|_| AtomicBool::new(true))
        .collect::<Vec<_>>();
    do_all(
        graph.work_nodes(),
        granularity,
        |node| {
            let data = graph.data(node);
            data.dist_old
                .store(data.dist_current.load(Ordering::Relaxed), Ordering::Relaxed);
        },
        thread_pool,
    );
    relax(graph, &frontier, granularity, thread_pool);
    sync(graph, "FirstItr_BFS")
}

/// Computes the distances from `params.source` on the partition of this
/// host.
///
/// This is a collective operation: all hosts must call it with the same
/// parameters. Statistics of the synchronization phases are scoped by the
/// current run of the graph, which the caller sets with
/// [`reset_num_iter`](DistGraph::reset_num_iter).
pub fn bfs<N: Network>(
    graph: &DistGraph<NodeData, N>,
    params: &BfsParams,
    thread_pool: &ThreadPool,
    pl: &mut impl ProgressLog,
) -> Result<BfsOutcome, NetError> {
    let granularity = params
        .granularity
        .node_granularity(graph.num_local_nodes(), graph.num_arcs());

    pl.item_name("round");
    pl.expected_updates(None);
    pl.start(format!(
        "Computing distances from node {} on host {} of {}...",
        params.source,
        graph.host_id(),
        graph.num_hosts()
    ));

    graph.set_num_iter(0);
    initialize_graph(graph, params.source, granularity, thread_pool)?;
    first_itr(graph, granularity, thread_pool)?;
    pl.update();

    let frontier = (0..graph.num_local_nodes())
        .map(|_| AtomicBool::new(false))
        .collect::<Vec<_>>();
    let accum = DistAccumulator::new();
    let mut outcome = BfsOutcome::default();

    loop {
        if outcome.rounds() >= params.max_iterations {
            outcome.capped = true;
            pl.info(format_args!(
                "Stopping after {} rounds",
                params.max_iterations
            ));
            break;
        }
        graph.set_num_iter(outcome.rounds() + 1);
        accum.reset();
        snapshot(graph, &frontier, &accum, granularity, thread_pool);
        relax(graph, &frontier, granularity, thread_pool);
        sync(graph, "BFS")?;

        let work = accum.reduce(graph.net())?;
        outcome.work_per_round.push(work);
        pl.update();
        log::debug!(
            "Host {}: round {} expanded {} nodes",
            graph.host_id(),
            outcome.rounds(),
            work
        );
        if work == 0 {
            break;
        }
    }

    pl.done();
    let region = format!("BFS_{}", graph.num_run());
    graph
        .stats()
        .report_stat(&region, "Rounds", outcome.rounds() as u64);
    graph
        .stats()
        .report_stat(&region, "Capped", outcome.capped as u64);
    Ok(outcome)
}

/// Returns the global identifier and distance of every master of this
/// host, in increasing order of global identifier.
pub fn master_distances<N: Network>(graph: &DistGraph<NodeData, N>) -> Vec<(usize, u32)> {
    graph
        .masters()
        .map(|node| {
            (
                graph.gid(node),
                graph.data(node).dist_current.load(Ordering::Relaxed),
            )
        })
        .collect()
}

/// Stores the distances of the masters of this host in `dists`, indexed by
/// global identifier.
///
/// # Safety
///
/// No other thread may access the cells of the masters of this host
/// concurrently. Hosts of the same cluster own disjoint sets of masters, so
/// they can share `dists`.
pub unsafe fn store_distances<N: Network>(
    graph: &DistGraph<NodeData, N>,
    dists: &[SyncCell<u32>],
) {
    for node in graph.masters() {
        // SAFETY: the cell of a master is written only by its host.
        unsafe {
            dists[graph.gid(node)].set(graph.data(node).dist_current.load(Ordering::Relaxed))
        };
    }
}

/// Computes the distances from `source` with a sequential visit.
pub fn seq_distances(graph: &impl Topology, source: usize) -> Vec<u32> {
    let mut dists = vec![INFINITY; graph.num_nodes()];
    if source >= dists.len() {
        return dists;
    }
    let mut queue = VecDeque::new();
    dists[source] = 0;
    queue.push_back(source);
    while let Some(node) = queue.pop_front() {
        for &succ in graph.successors(node) {
            if dists[succ] == INFINITY {
                dists[succ] = dists[node] + 1;
                queue.push_back(succ);
            }
        }
    }
    dists
}

/// Checks `actual` against the distances of a sequential visit from
/// `source`.
pub fn verify(graph: &impl Topology, source: usize, actual: &[u32]) -> Result<(), BfsError> {
    let expected = seq_distances(graph, source);
    match expected
        .iter()
        .zip(actual)
        .position(|(expected, actual)| expected != actual)
    {
        Some(node) => Err(BfsError::WrongDistance {
            node,
            expected: expected[node],
            actual: actual[node],
        }),
        None => Ok(()),
    }
}

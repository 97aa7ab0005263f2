/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Partitioned graphs.
//!
//! Every host of a [`Network`] owns a [`DistGraph`]: a local CSR graph whose
//! nodes are the *masters* of the host (a contiguous block of global
//! identifiers) followed by its *mirrors*, that is, the remote nodes touched
//! by local arcs. Local identifiers of masters are smaller than those of
//! mirrors, and both are in increasing order of global identifier.
//!
//! At construction, hosts exchange their mirror lists, so that every host
//! knows, for every other host, which of its masters are mirrored there and
//! in which order. The synchronization phases
//! [`sync_push`](DistGraph::sync_push) and
//! [`sync_pull`](DistGraph::sync_pull) ship values in that order, without
//! identifiers.

mod partition;
pub use partition::*;

mod sync;
pub use sync::*;

use crate::graphs::arc_list::{read_arcs, ArcListFormat};
use crate::graphs::csr_graph::CsrGraph;
use crate::net::{NetError, Network, Tag};
use crate::stats::{LogStats, StatSink};
use crate::traits::Topology;
use anyhow::{ensure, Context, Result};
use dsi_progress_logger::no_logging;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// The partition of a graph held by one host.
///
/// User data is accessed through shared references: fields that are
/// modified concurrently, or by synchronization phases, must use interior
/// mutability (typically atomics).
pub struct DistGraph<D, N: Network> {
    net: N,
    policy: Policy,
    topology: CsrGraph,
    data: Box<[D]>,
    num_masters: usize,
    num_global_nodes: usize,
    local_to_global: Box<[usize]>,
    global_to_local: HashMap<usize, usize>,
    blocks: Box<[Range<usize>]>,
    /// For each host, the local identifiers of our mirrors mastered there.
    mirror_nodes: Box<[Box<[usize]>]>,
    /// For each host, the local identifiers of our masters mirrored there,
    /// in the order of its mirror list.
    master_nodes: Box<[Box<[usize]>]>,
    /// Tag of the next synchronization; all hosts follow the same sequence.
    next_tag: AtomicU64,
    num_run: AtomicUsize,
    num_iter: AtomicUsize,
    stats: Arc<dyn StatSink>,
}

impl<D: Default, N: Network> DistGraph<D, N> {
    /// Builds an edge-cut partition of `graph`: this host masters its block
    /// of nodes and holds all their out-arcs.
    ///
    /// Every host must call this method with the same graph and scale
    /// vector.
    pub fn edge_cut(net: N, graph: &CsrGraph, scale: Option<&[usize]>) -> Result<Self> {
        let num_nodes = graph.num_nodes();
        let blocks = master_blocks(num_nodes, net.num(), scale)?;
        let arcs = blocks[net.id()]
            .clone()
            .flat_map(|x| graph.successors(x).iter().map(move |&y| (x, y)))
            .collect();
        Self::build(net, Policy::EdgeCut, num_nodes, arcs, blocks)
    }

    /// Builds a vertex-cut partition from the arcs assigned to this host.
    ///
    /// Each node is mastered by the host whose block contains it; every other
    /// host with arcs touching the node holds a mirror.
    pub fn vertex_cut(
        net: N,
        num_nodes: usize,
        arcs: Vec<(usize, usize)>,
        scale: Option<&[usize]>,
    ) -> Result<Self> {
        let blocks = master_blocks(num_nodes, net.num(), scale)?;
        Self::build(net, Policy::VertexCut, num_nodes, arcs, blocks)
    }

    /// Builds a vertex-cut partition reading the arcs of this host from
    /// `<folder>/part-<host>-of-<num>.arcs`.
    pub fn from_part_folder(
        net: N,
        folder: impl AsRef<Path>,
        num_nodes: usize,
        scale: Option<&[usize]>,
    ) -> Result<Self> {
        let path = part_file(folder, net.id(), net.num());
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Could not open partition file {}", path.display()))?;
        let (_, arcs) = read_arcs(
            std::io::BufReader::new(file),
            &ArcListFormat::default(),
            no_logging![],
        )
        .with_context(|| format!("Could not read partition file {}", path.display()))?;
        Self::vertex_cut(net, num_nodes, arcs, scale)
    }

    fn build(
        net: N,
        policy: Policy,
        num_nodes: usize,
        arcs: Vec<(usize, usize)>,
        blocks: Vec<Range<usize>>,
    ) -> Result<Self> {
        let me = net.id();
        let num_hosts = net.num();
        let masters = blocks[me].clone();

        let mut mirrors = Vec::new();
        for &(x, y) in &arcs {
            for gid in [x, y] {
                if gid >= num_nodes {
                    return Err(PartitionError::NodeOutOfRange { gid, num_nodes }.into());
                }
                if !masters.contains(&gid) {
                    mirrors.push(gid);
                }
            }
        }
        mirrors.sort_unstable();
        mirrors.dedup();

        let num_masters = masters.len();
        let local_to_global = masters.chain(mirrors).collect::<Box<[_]>>();
        let global_to_local = local_to_global
            .iter()
            .enumerate()
            .map(|(local, &gid)| (gid, local))
            .collect::<HashMap<_, _>>();
        let topology = CsrGraph::from_arcs(
            local_to_global.len(),
            arcs.into_iter()
                .map(|(x, y)| (global_to_local[&x], global_to_local[&y])),
        );

        let mut mirror_nodes = vec![vec![]; num_hosts];
        for local in num_masters..local_to_global.len() {
            mirror_nodes[block_of(&blocks, local_to_global[local])].push(local);
        }

        let mut graph = Self {
            net,
            policy,
            data: (0..local_to_global.len()).map(|_| D::default()).collect(),
            topology,
            num_masters,
            num_global_nodes: num_nodes,
            local_to_global,
            global_to_local,
            blocks: blocks.into(),
            mirror_nodes: mirror_nodes.into_iter().map(Vec::into_boxed_slice).collect(),
            master_nodes: vec![Box::default(); num_hosts].into(),
            next_tag: AtomicU64::new(0),
            num_run: AtomicUsize::new(0),
            num_iter: AtomicUsize::new(0),
            stats: Arc::new(LogStats),
        };
        graph.master_nodes = graph.exchange_mirrors()?;

        log::info!(
            "Host {}/{}: {} masters, {} mirrors, {} arcs ({:?})",
            me,
            num_hosts,
            graph.num_masters,
            graph.num_mirrors(),
            graph.topology.num_arcs(),
            policy
        );
        Ok(graph)
    }
}

impl<D, N: Network> DistGraph<D, N> {
    /// Sends to every host the global identifiers of our mirrors it masters,
    /// and returns, for every host, the local identifiers of the masters it
    /// mirrors.
    fn exchange_mirrors(&self) -> Result<Box<[Box<[usize]>]>> {
        let me = self.host_id();
        let tag = self.next_tag();
        for host in (0..self.num_hosts()).filter(|&h| h != me) {
            let mut buffer = Vec::with_capacity(self.mirror_nodes[host].len() * 8);
            for &local in self.mirror_nodes[host].iter() {
                buffer.extend_from_slice(&(self.local_to_global[local] as u64).to_le_bytes());
            }
            self.net.send(host, tag, buffer)?;
        }

        let mut master_nodes = vec![Box::<[usize]>::default(); self.num_hosts()];
        for _ in 1..self.num_hosts() {
            let (host, buffer) = self.net.recv(tag)?;
            ensure!(
                buffer.len() % 8 == 0,
                NetError::Malformed {
                    from: host,
                    tag,
                    reason: format!("{} bytes is not a list of identifiers", buffer.len()),
                }
            );
            master_nodes[host] = buffer
                .chunks_exact(8)
                .map(|chunk| {
                    let mut bytes = [0; 8];
                    bytes.copy_from_slice(chunk);
                    let gid = u64::from_le_bytes(bytes) as usize;
                    match self.local_id(gid) {
                        Some(local) if self.is_master(local) => Ok(local),
                        _ => Err(PartitionError::NotAMaster { host, gid, me }),
                    }
                })
                .collect::<Result<_, _>>()?;
        }
        Ok(master_nodes.into())
    }

    /// Replaces the statistics sink (by default, [`LogStats`]).
    pub fn with_stats(mut self, stats: Arc<dyn StatSink>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &dyn StatSink {
        &*self.stats
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn host_id(&self) -> usize {
        self.net.id()
    }

    pub fn num_hosts(&self) -> usize {
        self.net.num()
    }

    /// Returns the local topology.
    pub fn topology(&self) -> &CsrGraph {
        &self.topology
    }

    /// Returns the data of local node `node`.
    #[inline(always)]
    pub fn data(&self, node: usize) -> &D {
        &self.data[node]
    }

    /// Returns the data of all local nodes.
    pub fn all_data(&self) -> &[D] {
        &self.data
    }

    /// Returns the global identifier of local node `node`.
    #[inline(always)]
    pub fn gid(&self, node: usize) -> usize {
        self.local_to_global[node]
    }

    /// Returns the local identifier of the node with global identifier
    /// `gid`, if it is present on this host.
    #[inline(always)]
    pub fn local_id(&self, gid: usize) -> Option<usize> {
        self.global_to_local.get(&gid).copied()
    }

    /// Returns whether the node with global identifier `gid` is a master of
    /// this host.
    pub fn is_owned(&self, gid: usize) -> bool {
        self.blocks[self.host_id()].contains(&gid)
    }

    /// Returns whether local node `node` is a master.
    #[inline(always)]
    pub fn is_master(&self, node: usize) -> bool {
        node < self.num_masters
    }

    /// Returns the host mastering the node with global identifier `gid`.
    pub fn master_host(&self, gid: usize) -> usize {
        block_of(&self.blocks, gid)
    }

    /// Returns the range of local identifiers of masters.
    pub fn masters(&self) -> Range<usize> {
        0..self.num_masters
    }

    /// Returns the range of local identifiers of mirrors.
    pub fn mirrors(&self) -> Range<usize> {
        self.num_masters..self.local_to_global.len()
    }

    /// Returns the range of local nodes whose arcs must be scanned by
    /// operators relaxing local arcs.
    ///
    /// For edge cuts only masters have arcs; for vertex cuts a mirror may
    /// hold some arcs of its master, so all local nodes are returned.
    pub fn work_nodes(&self) -> Range<usize> {
        match self.policy {
            Policy::EdgeCut => self.masters(),
            Policy::VertexCut => 0..self.num_local_nodes(),
        }
    }

    pub fn num_masters(&self) -> usize {
        self.num_masters
    }

    pub fn num_mirrors(&self) -> usize {
        self.local_to_global.len() - self.num_masters
    }

    pub fn num_local_nodes(&self) -> usize {
        self.local_to_global.len()
    }

    pub fn num_global_nodes(&self) -> usize {
        self.num_global_nodes
    }

    /// Returns the local identifiers of our mirrors mastered by `host`.
    pub fn mirror_nodes(&self, host: usize) -> &[usize] {
        &self.mirror_nodes[host]
    }

    /// Returns the local identifiers of our masters mirrored by `host`.
    pub fn master_nodes(&self, host: usize) -> &[usize] {
        &self.master_nodes[host]
    }

    /// Starts a new run: the iteration counter is reset to zero.
    pub fn reset_num_iter(&self, run: usize) {
        self.num_run.store(run, Ordering::Relaxed);
        self.num_iter.store(0, Ordering::Relaxed);
    }

    /// Sets the iteration counter used to scope statistics.
    pub fn set_num_iter(&self, iteration: usize) {
        self.num_iter.store(iteration, Ordering::Relaxed);
    }

    pub fn num_run(&self) -> usize {
        self.num_run.load(Ordering::Relaxed)
    }

    pub fn num_iter(&self) -> usize {
        self.num_iter.load(Ordering::Relaxed)
    }

    fn next_tag(&self) -> Tag {
        self.next_tag.fetch_add(1, Ordering::Relaxed)
    }
}

impl<D, N: Network> Topology for DistGraph<D, N> {
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

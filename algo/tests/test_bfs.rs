/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use amorph::prelude::*;
use amorph::thread_pool;
use amorph_algo::bfs::*;
use anyhow::Result;
use dsi_progress_logger::prelude::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use sync_cell_slice::SyncSlice;

/// Runs BFS on an edge-cut partition of `graph` and returns the distances,
/// indexed by global identifier, and the outcome of every host.
fn edge_cut_bfs(
    graph: &CsrGraph,
    num_hosts: usize,
    scale: Option<&[usize]>,
    params: BfsParams,
) -> Result<(Vec<u32>, Vec<BfsOutcome>)> {
    let mut dists = vec![INFINITY; graph.num_nodes()];
    let cells = dists.as_sync_slice();
    let outcomes = LocalCluster::run(num_hosts, |net| -> Result<BfsOutcome> {
        let g = DistGraph::<NodeData, _>::edge_cut(net, graph, scale)?;
        let outcome = bfs(&g, &params, &thread_pool![2], no_logging![])?;
        unsafe { store_distances(&g, cells) };
        Ok(outcome)
    })
    .into_iter()
    .collect::<Result<Vec<_>>>()?;
    Ok((dists, outcomes))
}

#[test]
fn test_line() -> Result<()> {
    let graph = CsrGraph::from_arcs(6, (0..5).map(|x| (x, x + 1)));
    for num_hosts in [1, 2, 3] {
        let (dists, outcomes) = edge_cut_bfs(&graph, num_hosts, None, BfsParams::default())?;
        assert_eq!(dists, vec![0, 1, 2, 3, 4, 5]);
        for outcome in outcomes {
            assert_eq!(outcome.work_per_round, vec![1, 1, 1, 1, 1, 0]);
            assert!(!outcome.capped);
        }
    }
    Ok(())
}

#[test]
fn test_disconnected() -> Result<()> {
    let graph = CsrGraph::from_arcs(4, [(0, 1), (2, 3)]).symmetrize();
    let (dists, _) = edge_cut_bfs(&graph, 2, None, BfsParams::default())?;
    assert_eq!(dists, vec![0, 1, INFINITY, INFINITY]);

    let params = BfsParams {
        source: 3,
        ..BfsParams::default()
    };
    let (dists, _) = edge_cut_bfs(&graph, 1, None, params)?;
    assert_eq!(dists, vec![INFINITY, INFINITY, 1, 0]);
    Ok(())
}

#[test]
fn test_capped() -> Result<()> {
    let graph = CsrGraph::from_arcs(6, (0..5).map(|x| (x, x + 1)));
    let params = BfsParams {
        max_iterations: 2,
        ..BfsParams::default()
    };
    let (dists, outcomes) = edge_cut_bfs(&graph, 2, None, params)?;
    assert_eq!(dists, vec![0, 1, 2, 3, INFINITY, INFINITY]);
    for outcome in outcomes {
        assert!(outcome.capped);
        assert_eq!(outcome.work_per_round, vec![1, 1]);
    }
    Ok(())
}

#[test]
fn test_random_edge_cut() -> Result<()> {
    for seed in 0..3 {
        let graph = ErdosRenyi::new(300, 0.01, seed).to_csr();
        for source in [0, 17, 299] {
            let params = BfsParams {
                source,
                granularity: Granularity::Nodes(8),
                ..BfsParams::default()
            };
            let (dists, outcomes) = edge_cut_bfs(&graph, 4, Some(&[1, 2, 3, 4]), params)?;
            verify(&graph, source, &dists)?;
            // Rounds are identical on all hosts
            assert!(outcomes.windows(2).all(|w| w[0] == w[1]));
            // One round per level, plus a final empty one
            let max_dist = dists.iter().filter(|&&d| d != INFINITY).max().copied();
            assert_eq!(Some(outcomes[0].rounds() as u32), max_dist.map(|d| d + 1));
        }
    }
    Ok(())
}

#[test]
fn test_vertex_cut() -> Result<()> {
    let graph = ErdosRenyi::new(200, 0.02, 7).to_symmetric_csr();
    let dir = tempfile::tempdir()?;
    let num_hosts = 3;
    write_vertex_cut(dir.path(), &graph, num_hosts)?;

    let mut dists = vec![INFINITY; graph.num_nodes()];
    let cells = dists.as_sync_slice();
    LocalCluster::run(num_hosts, |net| -> Result<()> {
        let g = DistGraph::<NodeData, _>::from_part_folder(net, dir.path(), 200, None)?;
        assert_eq!(g.policy(), Policy::VertexCut);
        let outcome = bfs(&g, &BfsParams::default(), &thread_pool![3], no_logging![])?;
        assert!(!outcome.capped);
        unsafe { store_distances(&g, cells) };
        // Mirrors agree with their masters
        let reference = seq_distances(&graph, 0);
        for node in g.work_nodes() {
            let dist = g.data(node).dist_current.load(Ordering::Relaxed);
            assert_eq!(dist, reference[g.gid(node)], "node {}", g.gid(node));
        }
        Ok(())
    })
    .into_iter()
    .collect::<Result<Vec<_>>>()?;

    verify(&graph, 0, &dists)?;
    Ok(())
}

#[test]
fn test_runs_and_stats() -> Result<()> {
    let graph = CsrGraph::from_arcs(4, [(0, 1), (1, 2), (2, 3)]);
    let stats = Arc::new(MemStats::new());
    LocalCluster::run(1, |net| -> Result<()> {
        let g = DistGraph::<NodeData, _>::edge_cut(net, &graph, None)?.with_stats(stats.clone());
        let thread_pool = thread_pool![2];
        for run in 0..2 {
            g.reset_num_iter(run);
            let outcome = bfs(&g, &BfsParams::default(), &thread_pool, no_logging![])?;
            assert_eq!(outcome.work_per_round, vec![1, 1, 1, 0]);
            assert_eq!(
                master_distances(&g),
                vec![(0, 0), (1, 1), (2, 2), (3, 3)]
            );
        }
        Ok(())
    })
    .into_iter()
    .collect::<Result<Vec<_>>>()?;

    for run in 0..2 {
        assert_eq!(stats.get(&format!("BFS_{}", run), "Rounds"), Some(4));
        assert_eq!(stats.get(&format!("BFS_{}", run), "Capped"), Some(0));
        // A single host sends nothing
        assert_eq!(
            stats.get(&format!("SYNC_PUSH_BFS_{}_1", run), "SentValues"),
            Some(0)
        );
    }
    Ok(())
}

#[test]
fn test_seq_distances() {
    let graph = CsrGraph::from_arcs(5, [(0, 1), (0, 2), (2, 3), (3, 0)]);
    assert_eq!(seq_distances(&graph, 0), vec![0, 1, 1, 2, INFINITY]);
    assert_eq!(seq_distances(&graph, 3), vec![1, 2, 2, 0, INFINITY]);
    assert_eq!(seq_distances(&graph, 7), vec![INFINITY; 5]);
    assert_eq!(
        verify(&graph, 0, &[0, 1, 2, 2, INFINITY]),
        Err(BfsError::WrongDistance {
            node: 2,
            expected: 1,
            actual: 2
        })
    );
}

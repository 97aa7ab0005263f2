/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use amorph::prelude::*;
use amorph::thread_pool;
use dsi_progress_logger::no_logging;

/// Greedy coloring: an uncolored node gets one plus the largest color of
/// its neighbors. The outcome depends on the order of application.
struct Coloring<'a> {
    graph: &'a LocalGraph<u64>,
}

impl Operator<usize> for Coloring<'_> {
    type LocalState = Option<u64>;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            needs_parallel_push: false,
            needs_per_iter_alloc: true,
        }
    }

    fn apply<'g>(
        &'g self,
        v: usize,
        ctx: &mut UserContext<'g, usize, Option<u64>>,
    ) -> Result<(), Abort> {
        let color = if ctx.local_state().1 {
            match *ctx.local_state().0 {
                Some(color) => color,
                None => return Ok(()),
            }
        } else {
            if self.graph.get(v, MethodFlag::All, ctx)? != 0 {
                return Ok(());
            }
            let mut colors = ctx.scratch();
            for &u in self.graph.successors(v) {
                colors.push(self.graph.get(u, MethodFlag::All, ctx)? as usize);
            }
            let color = colors.iter().max().map_or(1, |&c| c as u64 + 1);
            ctx.recycle(colors);
            *ctx.local_state().0 = Some(color);
            color
        };
        self.graph.acquire(v, MethodFlag::Write, ctx)?;
        self.graph.update(v, MethodFlag::None, ctx, |c| *c = color)
    }
}

fn color(graph: &CsrGraph, schedule: Schedule, num_threads: usize) -> (Vec<u64>, LoopStats) {
    let mut local = LocalGraph::<u64>::new(graph.clone());
    let stats = for_each(
        0..graph.num_nodes(),
        &Coloring { graph: &local },
        schedule,
        16,
        &thread_pool![num_threads],
        no_logging![],
    );
    for v in 0..graph.num_nodes() {
        assert_eq!(local.lock(v).owner(), FREE);
    }
    (local.iter_data().copied().collect(), stats)
}

fn check_coloring(graph: &CsrGraph, colors: &[u64]) {
    for (x, y) in graph.arcs() {
        assert_ne!(colors[x], 0);
        assert_ne!(colors[x], colors[y], "arc ({}, {})", x, y);
    }
}

#[test]
fn test_serial_coloring() {
    let graph = CsrGraph::from_arcs(5, [(0, 1), (1, 2), (2, 3), (3, 4)]).symmetrize();
    let mut local = LocalGraph::<u64>::new(graph.clone());
    let stats = for_each_serial(0..5, &Coloring { graph: &local }, no_logging![]);
    assert_eq!(stats.commits, 5);
    assert_eq!(stats.conflicts, 0);
    assert_eq!(
        local.iter_data().copied().collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
}

#[test]
fn test_nondet_coloring() {
    let graph = ErdosRenyi::new(500, 0.02, 0).to_symmetric_csr();
    let (colors, stats) = color(&graph, Schedule::NonDet, 8);
    check_coloring(&graph, &colors);
    assert_eq!(stats.commits, 500);
    assert_eq!(stats.iterations, stats.commits + stats.conflicts);
}

#[test]
fn test_deterministic_coloring() {
    let graph = ErdosRenyi::new(500, 0.02, 1).to_symmetric_csr();
    let (reference, _) = color(&graph, Schedule::DetBase, 1);
    check_coloring(&graph, &reference);
    for schedule in [Schedule::DetBase, Schedule::DetPrefix, Schedule::DetDisjoint] {
        for num_threads in [1, 3, 16] {
            let (colors, stats) = color(&graph, schedule, num_threads);
            assert_eq!(colors, reference, "{:?} with {} threads", schedule, num_threads);
            assert_eq!(stats.commits, 500);
            assert!(stats.rounds > 0);
        }
    }
}

/// Visits nodes along arcs, pushing successors.
struct Reach<'a> {
    graph: &'a LocalGraph<bool>,
}

impl Operator<usize> for Reach<'_> {
    type LocalState = ();

    fn apply<'g>(&'g self, v: usize, ctx: &mut UserContext<'g, usize>) -> Result<(), Abort> {
        if self.graph.get(v, MethodFlag::All, ctx)? {
            return Ok(());
        }
        self.graph.acquire(v, MethodFlag::Write, ctx)?;
        self.graph.update(v, MethodFlag::None, ctx, |seen| *seen = true)?;
        for &u in self.graph.successors(v) {
            ctx.push(u);
        }
        Ok(())
    }
}

#[test]
fn test_push() {
    // Two components: 0 -> 1 -> 2 -> 0 and 3 -> 4
    let graph = CsrGraph::from_arcs(5, [(0, 1), (1, 2), (2, 0), (3, 4)]);
    for schedule in [
        Schedule::NonDet,
        Schedule::DetBase,
        Schedule::DetPrefix,
        Schedule::DetDisjoint,
    ] {
        let mut local = LocalGraph::<bool>::new(graph.clone());
        let stats = for_each(
            [0],
            &Reach { graph: &local },
            schedule,
            2,
            &thread_pool![4],
            no_logging![],
        );
        assert_eq!(stats.pushes, 3, "{:?}", schedule);
        assert_eq!(
            local.iter_data().copied().collect::<Vec<_>>(),
            vec![true, true, true, false, false]
        );
    }
}

#[test]
fn test_stats_report() {
    let stats = LoopStats {
        iterations: 5,
        commits: 4,
        conflicts: 1,
        pushes: 0,
        rounds: 2,
    };
    let sink = MemStats::new();
    stats.report("Loop", &sink);
    assert_eq!(sink.get("Loop", "Commits"), Some(4));
    assert_eq!(sink.get("Loop", "Rounds"), Some(2));
}

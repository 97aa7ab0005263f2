/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{GlobalArgs, GranularityArgs, NumThreadsArg, get_thread_pool, load_graph};
use amorph::prelude::*;
use amorph_algo::bfs::*;
use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use dsi_progress_logger::prelude::*;
use itertools::Itertools;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use sync_cell_slice::SyncSlice;

#[derive(Parser, Debug)]
#[command(about = "Computes breadth-first distances from a source on a graph partitioned among simulated hosts.", long_about = None)]
pub struct CliArgs {
    /// The file containing the arcs of the graph.
    pub input: PathBuf,

    #[arg(long = "hosts", default_value_t = 1)]
    /// The number of hosts of the in-process cluster.
    pub num_hosts: usize,

    #[arg(long)]
    /// The personality of each host, one character per host: "c" (CPU), "g"
    /// (CUDA) or "o" (OpenCL). Only CPU hosts are available.
    pub pset: Option<String>,

    #[arg(long, value_delimiter = ',')]
    /// Comma-separated relative sizes of the blocks of masters of the hosts.
    pub scale: Vec<usize>,

    #[arg(long, default_value_t = 1)]
    /// The number of times the computation is repeated.
    pub runs: usize,

    #[arg(long = "maxIterations", default_value_t = 10000)]
    /// The maximum number of rounds.
    pub max_iterations: usize,

    #[arg(long = "srcNodeId", default_value_t = 0)]
    /// The global identifier of the source.
    pub src_node_id: usize,

    #[arg(long = "partFolder")]
    /// A folder containing a vertex-cut partition, with one file of arcs
    /// named part-<host>-of-<hosts>.arcs per host; if missing, the graph is
    /// partitioned by an edge cut.
    pub part_folder: Option<PathBuf>,

    #[arg(long)]
    /// Prints the distance of every node and checks them against a
    /// sequential visit.
    pub verify: bool,

    #[arg(long)]
    /// Adds the reverse of every arc, and removes loops.
    pub symmetrize: bool,

    #[clap(flatten)]
    pub arcs_args: crate::ArcsArgs,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,

    #[clap(flatten)]
    pub granularity: GranularityArgs,
}

/// Checks that all hosts of a personality string are CPU hosts.
pub fn check_personalities(pset: &str, num_hosts: usize) -> Result<()> {
    ensure!(
        pset.chars().count() == num_hosts,
        "The personality string {:?} does not have one character for each of the {} hosts",
        pset,
        num_hosts
    );
    for (host, personality) in pset.chars().enumerate() {
        match personality {
            'c' => {}
            'g' | 'o' => bail!(
                "Host {} has personality {:?}, but accelerators are not available",
                host,
                personality
            ),
            _ => bail!("Unknown personality {:?} for host {}", personality, host),
        }
    }
    Ok(())
}

/// Returns the outcomes of all hosts, or the error that caused the failure
/// of the cluster.
///
/// When a host fails, the other hosts report it as disconnected; the error
/// of the host that actually failed is preferred.
fn collect_outcomes(results: Vec<Result<BfsOutcome>>) -> Result<Vec<BfsOutcome>> {
    let mut outcomes = Vec::with_capacity(results.len());
    let mut error = None;
    for (host, result) in results.into_iter().enumerate() {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                log::error!("Host {}: {:#}", host, e);
                let disconnected = matches!(
                    e.root_cause().downcast_ref::<NetError>(),
                    Some(NetError::Disconnected(_))
                );
                let replace = match &error {
                    None => true,
                    Some((was_disconnected, _)) => *was_disconnected && !disconnected,
                };
                if replace {
                    error = Some((disconnected, e));
                }
            }
        }
    }
    match error {
        Some((_, e)) => Err(e),
        None => Ok(outcomes),
    }
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(args.num_hosts > 0, "The number of hosts must be positive");
    ensure!(args.runs > 0, "The number of runs must be positive");
    if let Some(pset) = &args.pset {
        check_personalities(pset, args.num_hosts)?;
    }
    let scale = (!args.scale.is_empty()).then_some(args.scale.as_slice());
    if let Some(scale) = scale {
        log::info!("Scale factors: {}", scale.iter().join(","));
    }

    let graph = load_graph(&args.input, &args.arcs_args, args.symmetrize, &global_args)?;
    let num_nodes = graph.num_nodes();
    ensure!(
        args.src_node_id < num_nodes,
        "Source node {} does not exist (the graph has {} nodes)",
        args.src_node_id,
        num_nodes
    );

    let params = BfsParams {
        source: args.src_node_id,
        max_iterations: args.max_iterations,
        granularity: args.granularity.into_granularity(),
    };
    let stats = Arc::new(MemStats::new());
    let mut dists = vec![INFINITY; num_nodes];
    let cells = dists.as_sync_slice();
    let start = std::time::Instant::now();

    let results = LocalCluster::try_run(args.num_hosts, |net| -> Result<BfsOutcome> {
        let host = net.id();
        let dist_graph = match &args.part_folder {
            Some(folder) => {
                DistGraph::<NodeData, _>::from_part_folder(net, folder, num_nodes, scale)
            }
            None => DistGraph::<NodeData, _>::edge_cut(net, &graph, scale),
        }
        .with_context(|| format!("Could not partition the graph on host {}", host))?
        .with_stats(stats.clone());
        log::info!(
            "Host {} has {} masters and {} mirrors",
            host,
            dist_graph.num_masters(),
            dist_graph.num_mirrors()
        );

        let thread_pool = get_thread_pool(args.num_threads.num_threads)?;
        let mut outcome = BfsOutcome::default();
        for run in 0..args.runs {
            dist_graph.reset_num_iter(run);
            outcome = if host == 0 {
                let mut pl = progress_logger![];
                if let Some(duration) = global_args.log_interval {
                    pl.log_interval(duration);
                }
                bfs(&dist_graph, &params, &thread_pool, &mut pl)
            } else {
                bfs(&dist_graph, &params, &thread_pool, no_logging![])
            }
            .with_context(|| format!("BFS failed on host {}", host))?;
        }

        // SAFETY: hosts store the distances of disjoint sets of masters.
        unsafe { store_distances(&dist_graph, cells) };
        Ok(outcome)
    });

    stats.report_timer("TIMER_TOTAL", start.elapsed());
    stats.report_stat("(NULL)", "Max Iterations", args.max_iterations as u64);
    stats.report_stat("(NULL)", "Source Node ID", args.src_node_id as u64);
    stats.flush();
    let outcomes = collect_outcomes(results)?;

    let outcome = &outcomes[0];
    log::info!(
        "Completed {} rounds{}",
        outcome.rounds(),
        if outcome.capped {
            " (stopped at the maximum number of rounds)"
        } else {
            ""
        }
    );
    log::info!(
        "Reached {} nodes",
        dists.iter().filter(|&&dist| dist != INFINITY).count()
    );

    if args.verify {
        let mut stdout = BufWriter::new(std::io::stdout().lock());
        for (gid, dist) in dists.iter().enumerate() {
            writeln!(stdout, "{} {}", gid, dist)?;
        }
        stdout.flush()?;
        verify(&graph, args.src_node_id, &dists).context("Verification failed")?;
        log::info!("Verification succeeded");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_personalities() {
        assert!(check_personalities("ccc", 3).is_ok());
        assert!(check_personalities("cc", 3).is_err());
        assert!(check_personalities("cg", 2).is_err());
        assert!(check_personalities("co", 2).is_err());
        assert!(check_personalities("cx", 2).is_err());
    }

    #[test]
    fn test_collect_outcomes() {
        let disconnected =
            || Err(anyhow::Error::from(NetError::Disconnected(1)).context("BFS failed on host 0"));
        let results = vec![disconnected(), Err(anyhow::anyhow!("Bad partition")), disconnected()];
        let error = collect_outcomes(results).unwrap_err();
        assert_eq!(error.to_string(), "Bad partition");

        let results = vec![Ok(BfsOutcome::default()), Ok(BfsOutcome::default())];
        assert_eq!(collect_outcomes(results).unwrap().len(), 2);
    }
}

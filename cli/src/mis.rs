/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{GlobalArgs, NumThreadsArg, get_thread_pool, load_graph};
use amorph::prelude::*;
use amorph_algo::mis::{Algorithm, mis};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dsi_progress_logger::prelude::*;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
/// How to run the greedy algorithm.
pub enum MisAlgo {
    /// A single-threaded loop.
    Serial,
    /// A parallel loop with the schedule given by --detAlgo.
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
/// The schedule of parallel loops.
pub enum DetAlgo {
    /// Non-deterministic speculative execution.
    #[value(name = "nondet")]
    NonDet,
    /// Deterministic rounds re-running the whole operator.
    #[value(name = "detBase")]
    DetBase,
    /// Deterministic rounds running a read-only prefix first.
    #[value(name = "detPrefix")]
    DetPrefix,
    /// Deterministic rounds carrying local state between phases.
    #[value(name = "detDisjoint")]
    DetDisjoint,
}

impl From<DetAlgo> for Schedule {
    fn from(value: DetAlgo) -> Self {
        match value {
            DetAlgo::NonDet => Schedule::NonDet,
            DetAlgo::DetBase => Schedule::DetBase,
            DetAlgo::DetPrefix => Schedule::DetPrefix,
            DetAlgo::DetDisjoint => Schedule::DetDisjoint,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Computes a maximal (not maximum) independent set of the nodes of a graph.", long_about = None)]
pub struct CliArgs {
    /// The file containing the arcs of the graph.
    pub input: PathBuf,

    #[arg(long, value_enum, default_value_t = MisAlgo::Parallel)]
    /// The algorithm.
    pub algo: MisAlgo,

    #[arg(long = "detAlgo", value_enum, default_value_t = DetAlgo::NonDet)]
    /// The schedule of the parallel algorithm.
    pub det_algo: DetAlgo,

    #[arg(long, default_value_t = 256)]
    /// The number of nodes in a chunk of the worklist.
    pub chunk_size: usize,

    #[arg(long)]
    /// Adds the reverse of every arc, and removes loops.
    pub symmetrize: bool,

    #[arg(long)]
    /// Does not check that the result is a maximal independent set.
    pub skip_verify: bool,

    #[clap(flatten)]
    pub arcs_args: crate::ArcsArgs,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let graph = load_graph(&args.input, &args.arcs_args, args.symmetrize, &global_args)?;
    let thread_pool = get_thread_pool(args.num_threads.num_threads)?;

    let algorithm = match args.algo {
        MisAlgo::Serial => Algorithm::Serial,
        MisAlgo::Parallel => Algorithm::Parallel(args.det_algo.into()),
    };
    log::info!("Running {:?}", algorithm);

    let mut pl = progress_logger![];
    if let Some(duration) = global_args.log_interval {
        pl.log_interval(duration);
    }

    let stats = MemStats::new();
    let start = std::time::Instant::now();
    let mis = mis(graph, algorithm, args.chunk_size, &thread_pool, &mut pl);
    stats.report_timer("MIS", start.elapsed());
    mis.stats().report("MIS", &stats);
    stats.flush();

    println!(
        "Cardinality of maximal independent set: {}",
        mis.cardinality()
    );

    if !args.skip_verify {
        mis.verify().context("Verification failed")?;
        log::info!("Verification succeeded");
    }
    Ok(())
}

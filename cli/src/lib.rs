/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]
#![allow(clippy::type_complexity)]

use amorph::prelude::*;
use anyhow::{Context, Result, bail, ensure};
use clap::{Args, Parser, Subcommand};
use dsi_progress_logger::prelude::*;
use jiff::SpanRound;
use jiff::fmt::friendly::{Designator, Spacing, SpanPrinter};
use std::ffi::OsString;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Duration;
use std::time::SystemTime;

pub mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    pub fn version_string() -> String {
        format!(
            "{}
git info: {} {} {}
build info: {} build for {} with {}",
            PKG_VERSION,
            GIT_VERSION.unwrap_or(""),
            GIT_COMMIT_HASH.unwrap_or(""),
            match GIT_DIRTY {
                None => "",
                Some(true) => "(dirty)",
                Some(false) => "(clean)",
            },
            PROFILE,
            TARGET,
            RUSTC_VERSION
        )
    }
}

#[derive(Args, Debug)]
/// Shared CLI arguments for reading files containing arcs.
pub struct ArcsArgs {
    #[arg(long, default_value_t = '#')]
    /// Ignore lines that start with this symbol.
    pub line_comment_symbol: char,

    #[arg(long, default_value_t = 0)]
    /// How many lines to skip, ignoring comment lines.
    pub lines_to_skip: usize,

    #[arg(long, default_value_t = '\t')]
    /// The column separator; a space matches any run of whitespace.
    pub separator: char,

    #[arg(long, default_value_t = 0)]
    /// The index of the column containing the source node of an arc.
    pub source_column: usize,

    #[arg(long, default_value_t = 1)]
    /// The index of the column containing the target node of an arc.
    pub target_column: usize,
}

impl From<&ArcsArgs> for ArcListFormat {
    fn from(args: &ArcsArgs) -> Self {
        ArcListFormat {
            separator: args.separator,
            line_comment_symbol: args.line_comment_symbol,
            lines_to_skip: args.lines_to_skip,
            source_column: args.source_column,
            target_column: args.target_column,
        }
    }
}

/// Parses the number of threads from a string.
///
/// This function is meant to be used with `#[arg(...,  value_parser =
/// num_threads_parser)]`.
pub fn num_threads_parser(arg: &str) -> Result<usize> {
    let num_threads = arg.parse::<usize>()?;
    ensure!(num_threads > 0, "Number of threads must be greater than 0");
    Ok(num_threads)
}

/// Shared CLI arguments for commands that specify a number of threads.
#[derive(Args, Debug)]
pub struct NumThreadsArg {
    #[arg(short = 't', long = "threads", default_value_t = rayon::current_num_threads().max(1), value_parser = num_threads_parser)]
    /// The number of threads to use (per host, for distributed commands).
    pub num_threads: usize,
}

/// Shared CLI arguments for commands that specify a granularity.
#[derive(Args, Debug)]
pub struct GranularityArgs {
    #[arg(long, conflicts_with("node_granularity"))]
    /// The tentative number of arcs used to define the size of a parallel job
    /// (advanced option).
    pub arc_granularity: Option<u64>,

    #[arg(long, conflicts_with("arc_granularity"))]
    /// The tentative number of nodes used to define the size of a parallel job
    /// (advanced option).
    pub node_granularity: Option<usize>,
}

impl GranularityArgs {
    pub fn into_granularity(&self) -> Granularity {
        match (self.arc_granularity, self.node_granularity) {
            (Some(_), Some(_)) => unreachable!(),
            (Some(arc_granularity), None) => Granularity::Arcs(arc_granularity),
            (None, Some(node_granularity)) => Granularity::Nodes(node_granularity),
            (None, None) => Granularity::default(),
        }
    }
}

/// Creates a [`ThreadPool`](rayon::ThreadPool) with the given number of threads.
pub fn get_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .with_context(|| format!("Failed to create a thread pool with {} threads", num_threads))?;
    log::info!("Using {} threads", thread_pool.current_num_threads());
    Ok(thread_pool)
}

/// Loads a graph from a file of arcs.
///
/// If `symmetrize` is true, the graph is replaced by its symmetric closure
/// without loops.
pub fn load_graph(
    path: impl AsRef<Path>,
    arcs_args: &ArcsArgs,
    symmetrize: bool,
    global_args: &GlobalArgs,
) -> Result<CsrGraph> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not open graph file {}", path.display()))?;

    let mut pl = progress_logger![display_memory = true];
    if let Some(duration) = global_args.log_interval {
        pl.log_interval(duration);
    }
    let (num_nodes, arcs) = read_arcs(BufReader::new(file), &arcs_args.into(), &mut pl)
        .with_context(|| format!("Could not read arcs from {}", path.display()))?;

    let graph = CsrGraph::from_arcs(num_nodes, arcs);
    log::info!(
        "Loaded a graph with {} nodes and {} arcs",
        graph.num_nodes(),
        graph.num_arcs()
    );
    if symmetrize {
        let graph = graph.symmetrize();
        log::info!("Symmetrized graph has {} arcs", graph.num_arcs());
        Ok(graph)
    } else {
        Ok(graph)
    }
}

/// Parses a duration such as `1d2h3m4s567`.
///
/// Every amount is followed by its unit (`d`, `h`, `m` or `s`), except
/// possibly the last one, which is then in milliseconds. Whitespace is
/// ignored.
fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.split_whitespace().collect::<String>();
    ensure!(
        !value.is_empty(),
        "Empty duration (use 0 to log at every update)"
    );
    let mut millis = 0_u64;
    let mut rest = value.as_str();
    while !rest.is_empty() {
        let len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let amount = rest[..len]
            .parse::<u64>()
            .with_context(|| format!("Missing amount in duration {:?}", value))?;
        let mut chars = rest[len..].chars();
        let unit = match chars.next() {
            None => 1,
            Some('s') => 1_000,
            Some('m') => 60_000,
            Some('h') => 3_600_000,
            Some('d') => 86_400_000,
            Some(c) => bail!("Unknown unit {:?} in duration {:?}", c, value),
        };
        millis = amount
            .checked_mul(unit)
            .and_then(|x| x.checked_add(millis))
            .with_context(|| format!("Duration {:?} is too long", value))?;
        rest = chars.as_str();
    }
    Ok(Duration::from_millis(millis))
}

/// Formats a duration compactly, as in `1h2m5s`, with millisecond
/// precision.
fn format_elapsed(elapsed: Duration) -> Result<String, jiff::Error> {
    let span = jiff::Span::new()
        .seconds(elapsed.as_secs() as i64)
        .milliseconds(elapsed.subsec_millis() as i64)
        .round(
            SpanRound::new()
                .largest(jiff::Unit::Day)
                .smallest(jiff::Unit::Millisecond)
                .days_are_24_hours(),
        )?;
    Ok(SpanPrinter::new()
        .spacing(Spacing::None)
        .designator(Designator::Compact)
        .span_to_string(&span))
}

/// Installs an `env_logger` logger (default level `info`) whose lines start
/// with a timestamp and the time elapsed since installation.
pub fn init_env_logger() -> Result<()> {
    let start = std::time::Instant::now();
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(move |buf, record| {
        let now = jiff::Timestamp::try_from(SystemTime::now()).map_err(std::io::Error::other)?;
        let elapsed = format_elapsed(start.elapsed()).map_err(std::io::Error::other)?;
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "{} {} {style}{}{style:#} [{}] {} - {}",
            now.strftime("%F %T%.3f"),
            elapsed,
            record.level(),
            std::thread::current().name().unwrap_or("main"),
            record.target(),
            record.args()
        )
    });
    builder.try_init()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_duration, global=true, display_order = 1000)]
    /// How often to log progress. Default is 10s. You can use the suffixes "s"
    /// for seconds, "m" for minutes, "h" for hours, and "d" for days. If no
    /// suffix is provided it is assumed to be in milliseconds.
    /// Example: "1d2h3m4s567" is parsed as 1 day + 2 hours + 3 minutes + 4
    /// seconds + 567 milliseconds = 93784567 milliseconds.
    pub log_interval: Option<Duration>,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    Mis(mis::CliArgs),
    Bfs(bfs::CliArgs),
}

#[derive(Parser, Debug)]
#[command(name = "amorph", version=build_info::version_string())]
/// Irregular graph algorithms on a speculative parallel runtime.
///
/// Noteworthy environment variables:
///
/// - RUST_MIN_STACK: minimum thread stack size (in bytes).
///
/// - RUST_LOG: configuration for env_logger
///   <https://docs.rs/env_logger/latest/env_logger/>
pub struct Cli {
    #[command(subcommand)]
    pub command: SubCommands,
    #[clap(flatten)]
    pub args: GlobalArgs,
}

pub mod bfs;
pub mod mis;

/// Long options that may also be written with a single dash.
const SINGLE_DASH_OPTIONS: &[&str] = &[
    "algo",
    "detAlgo",
    "chunk-size",
    "symmetrize",
    "skip-verify",
    "verify",
    "maxIterations",
    "srcNodeId",
    "partFolder",
    "runs",
    "hosts",
    "pset",
    "scale",
];

/// Rewrites single-dash long options, such as `-detAlgo=detBase` or
/// `-maxIterations 10`, in their double-dash form.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let Some(option) = arg.to_str().and_then(|s| s.strip_prefix('-')) else {
                return arg;
            };
            let name = option.split('=').next().unwrap_or(option);
            if SINGLE_DASH_OPTIONS.contains(&name) {
                format!("-{}", arg.to_string_lossy()).into()
            } else {
                arg
            }
        })
        .collect()
}

/// The entry point of the command-line interface.
pub fn cli_main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let start = std::time::Instant::now();
    let cli = Cli::parse_from(normalize_args(args));
    match cli.command {
        SubCommands::Mis(args) => {
            mis::main(cli.args, args)?;
        }
        SubCommands::Bfs(args) => {
            bfs::main(cli.args, args)?;
        }
    }

    log::info!("The command took {}", format_elapsed(start.elapsed())?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_args() {
        let args = normalize_args([
            "amorph",
            "bfs",
            "graph.arcs",
            "-maxIterations",
            "10",
            "-srcNodeId=3",
            "-verify",
            "-t",
            "4",
            "--hosts",
            "2",
            "-",
        ]);
        assert_eq!(
            args,
            [
                "amorph",
                "bfs",
                "graph.arcs",
                "--maxIterations",
                "10",
                "--srcNodeId=3",
                "--verify",
                "-t",
                "4",
                "--hosts",
                "2",
                "-",
            ]
            .map(OsString::from)
        );
    }

    #[test]
    fn test_parse_duration() -> Result<()> {
        assert_eq!(parse_duration("1s")?, Duration::from_secs(1));
        assert_eq!(parse_duration("2m500")?, Duration::from_millis(120_500));
        assert_eq!(
            parse_duration("1d2h3m4s567")?,
            Duration::from_millis(93_784_567)
        );
        assert!(parse_duration("").is_err());
        assert!(parse_duration("3x").is_err());
        assert!(parse_duration("s").is_err());
        assert_eq!(parse_duration(" 1m 30s ")?, Duration::from_secs(90));
        Ok(())
    }

    #[test]
    fn test_format_elapsed() -> Result<()> {
        assert_eq!(format_elapsed(Duration::from_millis(1500))?, "1s500ms");
        assert_eq!(format_elapsed(Duration::from_secs(3725))?, "1h2m5s");
        Ok(())
    }

    #[test]
    fn test_granularity_args() {
        let args = GranularityArgs {
            arc_granularity: None,
            node_granularity: Some(64),
        };
        assert_eq!(args.into_granularity(), Granularity::Nodes(64));
    }
}

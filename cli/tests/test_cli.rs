/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use amorph::prelude::*;
use amorph_cli::cli_main;
use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes a tab-separated arc list to `dir`.
fn write_arc_file(dir: &Path, name: &str, arcs: &[(usize, usize)]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path)?;
    writeln!(file, "# test graph")?;
    for (x, y) in arcs {
        writeln!(file, "{}\t{}", x, y)?;
    }
    Ok(path)
}

fn run(args: &[&str]) -> Result<()> {
    cli_main(std::iter::once("amorph").chain(args.iter().copied()))
}

const GRID: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (3, 4),
    (4, 5),
    (6, 7),
    (7, 8),
    (0, 3),
    (3, 6),
    (1, 4),
    (4, 7),
    (2, 5),
    (5, 8),
];

#[test]
fn test_mis() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_arc_file(dir.path(), "grid.arcs", &GRID)?;
    let path = path.to_string_lossy().into_owned();

    run(&["mis", &path, "-symmetrize", "-algo", "serial"])?;
    for det_algo in ["nondet", "detBase", "detPrefix", "detDisjoint"] {
        run(&[
            "mis",
            &path,
            "-symmetrize",
            "-detAlgo",
            det_algo,
            "-chunk-size",
            "2",
            "-t",
            "3",
        ])?;
    }
    Ok(())
}

#[test]
fn test_bfs_edge_cut() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_arc_file(dir.path(), "grid.arcs", &GRID)?;
    let path = path.to_string_lossy().into_owned();

    run(&["bfs", &path, "-verify"])?;
    run(&[
        "bfs",
        &path,
        "-hosts",
        "3",
        "-scale",
        "1,2,1",
        "-srcNodeId",
        "4",
        "-runs",
        "2",
        "-pset",
        "ccc",
        "-verify",
    ])?;
    Ok(())
}

#[test]
fn test_bfs_vertex_cut() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_arc_file(dir.path(), "grid.arcs", &GRID)?;
    let graph = CsrGraph::from_arcs(9, GRID);
    let parts = dir.path().join("parts");
    write_vertex_cut(&parts, &graph, 2)?;

    run(&[
        "bfs",
        &path.to_string_lossy(),
        "-hosts",
        "2",
        "-partFolder",
        &parts.to_string_lossy(),
        "-verify",
    ])?;
    // A single malformed partition file makes the whole run fail
    std::fs::write(part_file(&parts, 1, 2), "1\t999\n")?;
    assert!(
        run(&[
            "bfs",
            &path.to_string_lossy(),
            "-hosts",
            "2",
            "-partFolder",
            &parts.to_string_lossy(),
        ])
        .is_err()
    );
    // No partition files for three hosts
    assert!(
        run(&[
            "bfs",
            &path.to_string_lossy(),
            "-hosts",
            "3",
            "-partFolder",
            &parts.to_string_lossy(),
        ])
        .is_err()
    );
    Ok(())
}

#[test]
fn test_bfs_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_arc_file(dir.path(), "grid.arcs", &GRID)?;
    let path = path.to_string_lossy().into_owned();

    // Accelerators are not available
    assert!(run(&["bfs", &path, "-hosts", "2", "-pset", "cg"]).is_err());
    // One personality per host
    assert!(run(&["bfs", &path, "-hosts", "2", "-pset", "c"]).is_err());
    // The source must exist
    assert!(run(&["bfs", &path, "-srcNodeId", "9"]).is_err());
    // One scale factor per host
    assert!(run(&["bfs", &path, "-hosts", "2", "-scale", "1,2,3"]).is_err());
    // Missing input
    assert!(run(&["bfs", &dir.path().join("missing").to_string_lossy()]).is_err());
    Ok(())
}

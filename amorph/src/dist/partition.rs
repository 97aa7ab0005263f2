/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::graphs::arc_list::write_arcs;
use crate::graphs::csr_graph::CsrGraph;
use anyhow::{Context, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Errors in the description of a partition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("The scale vector has {len} entries, but there are {num_hosts} hosts")]
    ScaleLength { len: usize, num_hosts: usize },
    #[error("The scale vector sums to zero")]
    ZeroScale,
    #[error("Node {gid} is out of range (the graph has {num_nodes} nodes)")]
    NodeOutOfRange { gid: usize, num_nodes: usize },
    #[error("Host {host} mirrors node {gid}, which is not a master of host {me}")]
    NotAMaster { host: usize, gid: usize, me: usize },
}

/// How arcs are assigned to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Every host holds all the out-arcs of its masters.
    EdgeCut,
    /// Arcs are assigned arbitrarily; a host may hold arcs of its mirrors.
    VertexCut,
}

/// Returns the blocks of global identifiers mastered by each host.
///
/// Blocks are contiguous and sized proportionally to the entries of `scale`
/// (uniformly if `scale` is `None`).
pub fn master_blocks(
    num_nodes: usize,
    num_hosts: usize,
    scale: Option<&[usize]>,
) -> Result<Vec<Range<usize>>, PartitionError> {
    let uniform = vec![1; num_hosts];
    let scale = scale.unwrap_or(&uniform);
    if scale.len() != num_hosts {
        return Err(PartitionError::ScaleLength {
            len: scale.len(),
            num_hosts,
        });
    }
    let total = scale.iter().map(|&w| w as u128).sum::<u128>();
    if total == 0 {
        return Err(PartitionError::ZeroScale);
    }

    let mut blocks = Vec::with_capacity(num_hosts);
    let mut cumulative = 0_u128;
    let mut start = 0;
    for &w in scale {
        cumulative += w as u128;
        let end = (num_nodes as u128 * cumulative / total) as usize;
        blocks.push(start..end);
        start = end;
    }
    Ok(blocks)
}

/// Returns the host whose block contains `gid`.
pub fn block_of(blocks: &[Range<usize>], gid: usize) -> usize {
    blocks.partition_point(|block| block.end <= gid)
}

/// Returns the name of the arc file of `host` in a partition folder.
pub fn part_file(folder: impl AsRef<Path>, host: usize, num_hosts: usize) -> PathBuf {
    folder
        .as_ref()
        .join(format!("part-{}-of-{}.arcs", host, num_hosts))
}

/// Writes a vertex-cut partition of `graph` to `folder`, assigning arcs to
/// hosts in round-robin fashion.
pub fn write_vertex_cut(
    folder: impl AsRef<Path>,
    graph: &CsrGraph,
    num_hosts: usize,
) -> Result<()> {
    let folder = folder.as_ref();
    std::fs::create_dir_all(folder)
        .with_context(|| format!("Could not create partition folder {}", folder.display()))?;
    for host in 0..num_hosts {
        let path = part_file(folder, host, num_hosts);
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        write_arcs(
            std::io::BufWriter::new(file),
            graph
                .arcs()
                .enumerate()
                .filter(|(i, _)| i % num_hosts == host)
                .map(|(_, arc)| arc),
        )
        .with_context(|| format!("Could not write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_blocks() -> Result<()> {
        let blocks = master_blocks(10, 3, None)?;
        assert_eq!(blocks, vec![0..3, 3..6, 6..10]);
        assert_eq!(block_of(&blocks, 0), 0);
        assert_eq!(block_of(&blocks, 3), 1);
        assert_eq!(block_of(&blocks, 9), 2);
        Ok(())
    }

    #[test]
    fn test_scaled_blocks() -> Result<()> {
        let blocks = master_blocks(12, 3, Some(&[1, 2, 1]))?;
        assert_eq!(blocks, vec![0..3, 3..9, 9..12]);
        // A zero weight yields an empty block
        let blocks = master_blocks(4, 2, Some(&[0, 1]))?;
        assert_eq!(blocks, vec![0..0, 0..4]);
        assert_eq!(block_of(&blocks, 0), 1);
        Ok(())
    }

    #[test]
    fn test_bad_scale() {
        assert_eq!(
            master_blocks(4, 2, Some(&[1])),
            Err(PartitionError::ScaleLength {
                len: 1,
                num_hosts: 2
            })
        );
        assert_eq!(
            master_blocks(4, 2, Some(&[0, 0])),
            Err(PartitionError::ZeroScale)
        );
    }

    #[test]
    fn test_part_file() {
        assert_eq!(
            part_file("parts", 1, 4),
            Path::new("parts").join("part-1-of-4.arcs")
        );
    }
}

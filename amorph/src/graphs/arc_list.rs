/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Text lists of arcs.
//!
//! Every line contains a source and a target node, given as numerical
//! identifiers in two columns separated by a configurable character. Lines
//! starting with the comment symbol are skipped, as are lines without enough
//! columns (with a warning).

use anyhow::{bail, Context, Result};
use dsi_progress_logger::ProgressLog;
use std::io::{BufRead, Write};

/// The layout of a text arc list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcListFormat {
    /// Column separator.
    pub separator: char,
    /// Lines starting with this symbol are skipped.
    pub line_comment_symbol: char,
    /// Number of initial lines to skip.
    pub lines_to_skip: usize,
    /// Index of the source column.
    pub source_column: usize,
    /// Index of the target column.
    pub target_column: usize,
}

impl core::default::Default for ArcListFormat {
    fn default() -> Self {
        Self {
            separator: '\t',
            line_comment_symbol: '#',
            lines_to_skip: 0,
            source_column: 0,
            target_column: 1,
        }
    }
}

/// Reads a list of arcs, returning the number of nodes (one plus the largest
/// identifier) and the arcs in appearance order.
///
/// Spaces around identifiers are ignored. A separator that is a space also
/// accepts tabs, and runs of whitespace count as a single separator.
pub fn read_arcs(
    reader: impl BufRead,
    format: &ArcListFormat,
    pl: &mut impl ProgressLog,
) -> Result<(usize, Vec<(usize, usize)>)> {
    pl.item_name("arc");
    pl.expected_updates(None);
    pl.start("Reading arcs...");

    let biggest_idx = format.source_column.max(format.target_column);
    let mut num_nodes = 0;
    let mut arcs = Vec::new();
    for (line_num, line) in reader.lines().enumerate().skip(format.lines_to_skip) {
        let line = line.with_context(|| format!("Could not read line {}", line_num + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(format.line_comment_symbol) {
            continue;
        }

        let vals = if format.separator == ' ' {
            trimmed.split_whitespace().collect::<Vec<_>>()
        } else {
            trimmed.split(format.separator).collect::<Vec<_>>()
        };
        if vals.len() <= biggest_idx {
            log::warn!(
                "Line {}: {:?} does not have enough columns: got {} columns but expected at least {} columns separated by {:?}",
                line_num + 1,
                line,
                vals.len(),
                biggest_idx + 1,
                format.separator,
            );
            continue;
        }

        let parse = |s: &str, what: &str| -> Result<usize> {
            match s.trim().parse::<usize>() {
                Ok(x) => Ok(x),
                Err(err) => bail!(
                    "Error parsing as integer {} column value {:?} at line {}: {}",
                    what,
                    s,
                    line_num + 1,
                    err
                ),
            }
        };
        let src = parse(vals[format.source_column], "source")?;
        let dst = parse(vals[format.target_column], "target")?;
        let Some(end) = src.max(dst).checked_add(1) else {
            bail!(
                "Node identifier {} at line {} is too large",
                src.max(dst),
                line_num + 1
            );
        };
        num_nodes = num_nodes.max(end);
        arcs.push((src, dst));
        pl.light_update();
    }
    pl.done();

    Ok((num_nodes, arcs))
}

/// Writes a list of arcs, one per line, with a tab as separator.
pub fn write_arcs(
    mut writer: impl Write,
    arcs: impl IntoIterator<Item = (usize, usize)>,
) -> Result<()> {
    for (src, dst) in arcs {
        writeln!(writer, "{}\t{}", src, dst).context("Could not write arc")?;
    }
    writer.flush().context("Could not flush arc list")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsi_progress_logger::no_logging;

    #[test]
    fn test_read_arcs() -> Result<()> {
        let text = "# a comment\n0\t1\n\n2\t0\nbad\n1\t2\n";
        let (n, arcs) = read_arcs(text.as_bytes(), &ArcListFormat::default(), no_logging![])?;
        assert_eq!(n, 3);
        assert_eq!(arcs, vec![(0, 1), (2, 0), (1, 2)]);
        Ok(())
    }

    #[test]
    fn test_whitespace_separator() -> Result<()> {
        let format = ArcListFormat {
            separator: ' ',
            ..Default::default()
        };
        let (n, arcs) = read_arcs("0  4\n3\t1\n".as_bytes(), &format, no_logging![])?;
        assert_eq!(n, 5);
        assert_eq!(arcs, vec![(0, 4), (3, 1)]);
        Ok(())
    }

    #[test]
    fn test_parse_error() {
        let result = read_arcs("0\tx\n".as_bytes(), &ArcListFormat::default(), no_logging![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_huge_identifier() {
        let text = format!("0\t1\n{}\t0\n", usize::MAX);
        let result = read_arcs(text.as_bytes(), &ArcListFormat::default(), no_logging![]);
        assert!(result.is_err_and(|e| e.to_string().contains("line 2")));
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut buffer = Vec::new();
        write_arcs(&mut buffer, [(1, 2), (0, 0)])?;
        let (_, arcs) = read_arcs(buffer.as_slice(), &ArcListFormat::default(), no_logging![])?;
        assert_eq!(arcs, vec![(1, 2), (0, 0)]);
        Ok(())
    }
}

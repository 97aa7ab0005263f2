/*
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
#![deny(unreachable_patterns)]
#![deny(unused_doc_comments)]

pub mod bfs;
pub mod mis;

pub mod prelude {
    pub use crate::bfs::{BfsOutcome, BfsParams, bfs};
    pub use crate::mis::{Algorithm, MaximalIndependentSet, mis};
}

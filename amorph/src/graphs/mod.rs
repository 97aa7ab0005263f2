/*
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Implementations of graphs.
//!
//! [`CsrGraph`](csr_graph::CsrGraph) is the immutable topology shared by all
//! other graphs; [`LocalGraph`](local_graph::LocalGraph) attaches lockable
//! user data to it for shared-memory loops. The partitioned form lives in
//! [`dist`](crate::dist).

pub mod arc_list;
pub mod csr_graph;
pub mod local_graph;
pub mod random;

pub mod prelude {
    pub use super::arc_list::{read_arcs, write_arcs, ArcListFormat};
    pub use super::csr_graph::CsrGraph;
    pub use super::local_graph::LocalGraph;
    pub use super::random::ErdosRenyi;
}

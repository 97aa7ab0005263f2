/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The parallel loop engine.
//!
//! An [`Operator`] is applied to work items by [`for_each`] following a
//! [`Schedule`]. Every application receives a [`UserContext`] through which
//! the operator acquires graph elements (each one protected by a
//! [`NodeLock`]) with a [`MethodFlag`], and pushes new work. Conflicts abort
//! the application, which is retried later; they never reach the caller.
//!
//! Unordered loops without conflict detection, such as the phases of
//! distributed computations, use [`do_all`].

mod context;
pub use context::*;

mod det;

mod executor;
pub use executor::*;

mod lock;
pub use lock::*;

mod operator;
pub use operator::*;

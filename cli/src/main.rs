/*
 * SPDX-FileCopyrightText: 2025 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use amorph_cli::{cli_main, init_env_logger};
use anyhow::Result;

pub fn main() -> Result<()> {
    init_env_logger()?;
    cli_main(std::env::args_os())
}

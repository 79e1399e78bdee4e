// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use env_logger::{Logger, Target};
use log::{LevelFilter, SetLoggerError};
use std::io::Write;

/// Builds the command line logger: timestamped lines on stderr so command
/// output on stdout stays machine readable. `RUST_LOG` still refines the
/// configured level per module.
pub fn build_logger(level: LevelFilter) -> Logger {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .build()
}

pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = build_logger(level);
    let max_level = logger.filter();
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    Ok(())
}

// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use crate::config::{CONFIG_FILE_NAME, DEFAULT_STORE_FILE};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Throwaway site root for tests. Lives under `target/test-fixtures` and is
/// removed again on drop.
#[derive(Debug)]
pub struct TestFixtureRoot {
    path: PathBuf,
}

impl TestFixtureRoot {
    /// A fresh root named `<prefix>-<uuid>`, so parallel tests never share files.
    pub fn new_unique(prefix: &str) -> io::Result<Self> {
        let path = fixtures_dir().join(format!("{}-{}", prefix, Uuid::new_v4()));
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// A fresh root with `pagetree.yaml` already in place.
    pub fn with_config(prefix: &str, yaml: &str) -> io::Result<Self> {
        let fixture = Self::new_unique(prefix)?;
        fixture.write_config(yaml)?;
        Ok(fixture)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_file(&self) -> PathBuf {
        self.path.join(CONFIG_FILE_NAME)
    }

    /// Where the page store lands when the config keeps the default file name.
    pub fn store_file(&self) -> PathBuf {
        self.data_file(DEFAULT_STORE_FILE)
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn write_config(&self, yaml: &str) -> io::Result<()> {
        fs::write(self.config_file(), yaml)
    }
}

impl Drop for TestFixtureRoot {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path)
            && err.kind() != io::ErrorKind::NotFound
        {
            log::debug!("Leaving fixture {} behind: {}", self.path.display(), err);
        }
    }
}

fn fixtures_dir() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(&manifest_dir)
        .join("target")
        .join("test-fixtures")
}

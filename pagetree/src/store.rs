// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::errors::{PageError, PageResult};
use crate::lookup;
use crate::tree::PageTree;
use crate::yaml_store::{read_yaml_file, write_yaml_file};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

const STORE_LABEL: &str = "pages";

/// Holds the page tree and serializes every mutation through one writer lock.
#[derive(Debug)]
pub struct PageStore {
    file: Option<PathBuf>,
    state: RwLock<PageTree>,
    writer: Mutex<()>,
}

impl PageStore {
    pub fn in_memory() -> Self {
        Self::with_tree(PageTree::new())
    }

    pub fn with_tree(tree: PageTree) -> Self {
        Self {
            file: None,
            state: RwLock::new(tree),
            writer: Mutex::new(()),
        }
    }

    /// Loads the tree from `path`, or starts empty when the file does not exist yet.
    pub fn open(path: &Path) -> PageResult<Self> {
        let mut tree: PageTree = read_yaml_file(path, STORE_LABEL)?.unwrap_or_default();
        let mismatches = lookup::verify(&tree);
        if !mismatches.is_empty() {
            warn!(
                "Page store {} has {} stale routes; rebuilding lookup",
                path.display(),
                mismatches.len()
            );
            lookup::rebuild_all(&mut tree)?;
        }
        info!("Loaded {} pages from {}", tree.len(), path.display());
        Ok(Self {
            file: Some(path.to_path_buf()),
            state: RwLock::new(tree),
            writer: Mutex::new(()),
        })
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn snapshot(&self) -> PageResult<PageTree> {
        self.read(|tree| tree.clone())
    }

    pub fn read<R>(&self, f: impl FnOnce(&PageTree) -> R) -> PageResult<R> {
        let state = self
            .state
            .read()
            .map_err(|_| PageError::internal("Page store lock poisoned"))?;
        Ok(f(&state))
    }

    /// Runs `f` against a working copy of the tree. On `Ok` the copy is
    /// persisted and becomes the current state; on `Err` it is dropped.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut PageTree) -> PageResult<T>) -> PageResult<T> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| PageError::internal("Page store writer lock poisoned"))?;
        let mut working = self.snapshot()?;
        let value = f(&mut working)?;

        if let Some(path) = &self.file {
            write_yaml_file(path, STORE_LABEL, &working).map_err(|err| {
                log::error!("🚨 Failed to persist page store: {}", err);
                PageError::from(err)
            })?;
        }
        let mut state = self
            .state
            .write()
            .map_err(|_| PageError::internal("Page store lock poisoned"))?;
        *state = working;
        Ok(value)
    }
}

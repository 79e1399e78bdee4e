// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Subsystems the page tree talks to but does not own: typed entries,
//! comments and navigation links.

use crate::errors::{PageError, PageResult};
use crate::page::{EntryRef, PageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Module name under which page comments are filed.
pub const COMMENTS_MODULE: &str = "pages";

pub trait EntryStore: Send + Sync {
    /// Copies an entry into a new record and returns the reference to the copy.
    fn clone_entry(&self, entry: &EntryRef) -> PageResult<EntryRef>;
    fn delete_entry(&self, entry: &EntryRef) -> PageResult<()>;
    fn update_ordering(&self, entry: &EntryRef, order: i64) -> PageResult<()>;
}

pub trait CommentStore: Send + Sync {
    /// Removes every comment filed under `module` for `entry_id`; returns how many went.
    fn delete_where(&self, module: &str, entry_id: u64) -> PageResult<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationLinkRequest {
    pub title: String,
    pub page_id: PageId,
    pub group_id: u64,
}

pub trait NavigationLinks: Send + Sync {
    fn create_link(&self, link: &NavigationLinkRequest) -> PageResult<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    pub entry_type: String,
    pub ordering_count: Option<i64>,
}

#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    inner: Mutex<MemoryEntries>,
}

#[derive(Debug, Default)]
struct MemoryEntries {
    next_id: u64,
    entries: BTreeMap<u64, MemoryEntry>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, entry_type: &str) -> PageResult<EntryRef> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let entry_id = inner.next_id;
        inner.entries.insert(
            entry_id,
            MemoryEntry {
                entry_type: entry_type.to_string(),
                ordering_count: None,
            },
        );
        Ok(EntryRef {
            entry_type: entry_type.to_string(),
            entry_id,
        })
    }

    pub fn get(&self, entry_id: u64) -> Option<MemoryEntry> {
        self.lock().ok()?.entries.get(&entry_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> PageResult<std::sync::MutexGuard<'_, MemoryEntries>> {
        self.inner
            .lock()
            .map_err(|_| PageError::internal("Entry store lock poisoned"))
    }
}

impl EntryStore for MemoryEntryStore {
    fn clone_entry(&self, entry: &EntryRef) -> PageResult<EntryRef> {
        let mut inner = self.lock()?;
        let source = inner.entries.get(&entry.entry_id).cloned().ok_or_else(|| {
            PageError::collaborator(format!("Entry {} does not exist", entry))
        })?;
        inner.next_id += 1;
        let entry_id = inner.next_id;
        inner.entries.insert(entry_id, source);
        Ok(EntryRef {
            entry_type: entry.entry_type.clone(),
            entry_id,
        })
    }

    fn delete_entry(&self, entry: &EntryRef) -> PageResult<()> {
        self.lock()?.entries.remove(&entry.entry_id);
        Ok(())
    }

    fn update_ordering(&self, entry: &EntryRef, order: i64) -> PageResult<()> {
        let mut inner = self.lock()?;
        let record = inner.entries.get_mut(&entry.entry_id).ok_or_else(|| {
            PageError::collaborator(format!("Entry {} does not exist", entry))
        })?;
        record.ordering_count = Some(order);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryComment {
    pub module: String,
    pub entry_id: u64,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    comments: Mutex<Vec<MemoryComment>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, module: &str, entry_id: u64, body: &str) -> PageResult<()> {
        self.lock()?.push(MemoryComment {
            module: module.to_string(),
            entry_id,
            body: body.to_string(),
        });
        Ok(())
    }

    pub fn count_for(&self, module: &str, entry_id: u64) -> usize {
        self.lock()
            .map(|comments| {
                comments
                    .iter()
                    .filter(|comment| comment.module == module && comment.entry_id == entry_id)
                    .count()
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> PageResult<std::sync::MutexGuard<'_, Vec<MemoryComment>>> {
        self.comments
            .lock()
            .map_err(|_| PageError::internal("Comment store lock poisoned"))
    }
}

impl CommentStore for MemoryCommentStore {
    fn delete_where(&self, module: &str, entry_id: u64) -> PageResult<usize> {
        let mut comments = self.lock()?;
        let before = comments.len();
        comments.retain(|comment| !(comment.module == module && comment.entry_id == entry_id));
        Ok(before - comments.len())
    }
}

#[derive(Debug, Default)]
pub struct MemoryNavigationLinks {
    links: Mutex<Vec<(u64, NavigationLinkRequest)>>,
}

impl MemoryNavigationLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&self) -> Vec<(u64, NavigationLinkRequest)> {
        self.links
            .lock()
            .map(|links| links.clone())
            .unwrap_or_default()
    }
}

impl NavigationLinks for MemoryNavigationLinks {
    fn create_link(&self, link: &NavigationLinkRequest) -> PageResult<u64> {
        let mut links = self
            .links
            .lock()
            .map_err(|_| PageError::internal("Navigation link lock poisoned"))?;
        let id = links.len() as u64 + 1;
        links.push((id, link.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloned_entry_is_independent() {
        let store = MemoryEntryStore::new();
        let original = store.create("pages.default").unwrap();
        let copy = store.clone_entry(&original).unwrap();
        assert_ne!(copy.entry_id, original.entry_id);
        assert_eq!(copy.entry_type, "pages.default");

        store.delete_entry(&original).unwrap();
        assert!(store.get(original.entry_id).is_none());
        assert!(store.get(copy.entry_id).is_some());
    }

    #[test]
    fn clone_of_missing_entry_fails() {
        let store = MemoryEntryStore::new();
        let missing = EntryRef {
            entry_type: "pages.default".to_string(),
            entry_id: 99,
        };
        assert!(store.clone_entry(&missing).is_err());
    }

    #[test]
    fn comments_deleted_by_module_and_entry() {
        let store = MemoryCommentStore::new();
        store.add(COMMENTS_MODULE, 2, "first").unwrap();
        store.add(COMMENTS_MODULE, 2, "second").unwrap();
        store.add("blog", 2, "other module").unwrap();
        assert_eq!(store.delete_where(COMMENTS_MODULE, 2).unwrap(), 2);
        assert_eq!(store.count_for("blog", 2), 1);
    }
}

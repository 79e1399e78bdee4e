// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! File-backed collaborators used by the command line tool. Each collection
//! lives in its own YAML file next to the page store and is rewritten on
//! every change.

use crate::collab::{CommentStore, EntryStore, NavigationLinkRequest, NavigationLinks};
use crate::errors::{PageError, PageResult};
use crate::page::{EntryRef, PageId};
use crate::yaml_store::{read_yaml_file, write_yaml_file};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const ENTRIES_FILE: &str = "entries.yaml";
pub const COMMENTS_FILE: &str = "comments.yaml";
pub const NAVIGATION_FILE: &str = "navigation.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Collection<T> {
    #[serde(default)]
    next_id: u64,
    #[serde(default = "BTreeMap::new")]
    items: BTreeMap<u64, T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            items: BTreeMap::new(),
        }
    }
}

/// Id-keyed records persisted as one YAML document.
#[derive(Debug)]
pub struct YamlCollection<T> {
    file: PathBuf,
    label: &'static str,
    state: Mutex<Collection<T>>,
}

impl<T> YamlCollection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn open(file: &Path, label: &'static str) -> PageResult<Self> {
        let state: Collection<T> = read_yaml_file(file, label)?.unwrap_or_default();
        Ok(Self {
            file: file.to_path_buf(),
            label,
            state: Mutex::new(state),
        })
    }

    pub fn get(&self, id: u64) -> PageResult<Option<T>> {
        Ok(self.lock()?.items.get(&id).cloned())
    }

    pub fn all(&self) -> PageResult<Vec<(u64, T)>> {
        Ok(self
            .lock()?
            .items
            .iter()
            .map(|(id, item)| (*id, item.clone()))
            .collect())
    }

    pub fn insert(&self, item: T) -> PageResult<u64> {
        self.modify(|collection| {
            let highest = collection.items.keys().next_back().copied().unwrap_or(0);
            collection.next_id = collection.next_id.max(highest) + 1;
            let id = collection.next_id;
            collection.items.insert(id, item);
            Ok(id)
        })
    }

    /// Applies `f` to a copy of the collection and writes it out; the
    /// in-memory state only changes once the file write succeeded.
    fn modify<R>(&self, f: impl FnOnce(&mut Collection<T>) -> PageResult<R>) -> PageResult<R> {
        let mut state = self.lock()?;
        let mut working = state.clone();
        let result = f(&mut working)?;
        write_yaml_file(&self.file, self.label, &working)?;
        *state = working;
        Ok(result)
    }

    fn lock(&self) -> PageResult<MutexGuard<'_, Collection<T>>> {
        self.state
            .lock()
            .map_err(|_| PageError::internal(format!("{} store lock poisoned", self.label)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub entry_type: String,
    #[serde(default)]
    pub ordering_count: Option<i64>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

pub struct YamlEntryStore {
    records: YamlCollection<EntryRecord>,
}

impl YamlEntryStore {
    pub fn open(file: &Path) -> PageResult<Self> {
        Ok(Self {
            records: YamlCollection::open(file, "entries")?,
        })
    }

    pub fn create(&self, entry_type: &str, fields: BTreeMap<String, String>) -> PageResult<EntryRef> {
        let entry_id = self.records.insert(EntryRecord {
            entry_type: entry_type.to_string(),
            ordering_count: None,
            fields,
        })?;
        Ok(EntryRef {
            entry_type: entry_type.to_string(),
            entry_id,
        })
    }

    pub fn get(&self, entry: &EntryRef) -> PageResult<Option<EntryRecord>> {
        self.records.get(entry.entry_id)
    }
}

impl EntryStore for YamlEntryStore {
    fn clone_entry(&self, entry: &EntryRef) -> PageResult<EntryRef> {
        let record = self
            .records
            .get(entry.entry_id)?
            .ok_or_else(|| PageError::collaborator(format!("Entry {} does not exist", entry)))?;
        let entry_id = self.records.insert(EntryRecord {
            ordering_count: None,
            ..record
        })?;
        Ok(EntryRef {
            entry_type: entry.entry_type.clone(),
            entry_id,
        })
    }

    fn delete_entry(&self, entry: &EntryRef) -> PageResult<()> {
        self.records.modify(|collection| {
            collection.items.remove(&entry.entry_id);
            Ok(())
        })
    }

    fn update_ordering(&self, entry: &EntryRef, order: i64) -> PageResult<()> {
        self.records.modify(|collection| {
            let record = collection.items.get_mut(&entry.entry_id).ok_or_else(|| {
                PageError::collaborator(format!("Entry {} does not exist", entry))
            })?;
            record.ordering_count = Some(order);
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub module: String,
    pub entry_id: u64,
    #[serde(default)]
    pub author: String,
    pub body: String,
}

pub struct YamlCommentStore {
    records: YamlCollection<CommentRecord>,
}

impl YamlCommentStore {
    pub fn open(file: &Path) -> PageResult<Self> {
        Ok(Self {
            records: YamlCollection::open(file, "comments")?,
        })
    }

    pub fn add(&self, comment: CommentRecord) -> PageResult<u64> {
        self.records.insert(comment)
    }

    pub fn all(&self) -> PageResult<Vec<(u64, CommentRecord)>> {
        self.records.all()
    }
}

impl CommentStore for YamlCommentStore {
    fn delete_where(&self, module: &str, entry_id: u64) -> PageResult<usize> {
        self.records.modify(|collection| {
            let before = collection.items.len();
            collection
                .items
                .retain(|_, comment| !(comment.module == module && comment.entry_id == entry_id));
            Ok(before - collection.items.len())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub title: String,
    pub link_type: String,
    pub page_id: PageId,
    pub navigation_group_id: u64,
}

pub struct YamlNavigationLinks {
    records: YamlCollection<LinkRecord>,
}

impl YamlNavigationLinks {
    pub fn open(file: &Path) -> PageResult<Self> {
        Ok(Self {
            records: YamlCollection::open(file, "navigation")?,
        })
    }

    pub fn all(&self) -> PageResult<Vec<(u64, LinkRecord)>> {
        self.records.all()
    }
}

impl NavigationLinks for YamlNavigationLinks {
    fn create_link(&self, link: &NavigationLinkRequest) -> PageResult<u64> {
        self.records.insert(LinkRecord {
            title: link.title.clone(),
            link_type: "page".to_string(),
            page_id: link.page_id,
            navigation_group_id: link.group_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::COMMENTS_MODULE;
    use crate::util::test_fixtures::TestFixtureRoot;

    #[test]
    fn entries_clone_and_persist() {
        let fixture = TestFixtureRoot::new_unique("records-entries").unwrap();
        let file = fixture.data_file(ENTRIES_FILE);
        let store = YamlEntryStore::open(&file).unwrap();
        let fields = BTreeMap::from([("body".to_string(), "Hello".to_string())]);
        let original = store.create("pages.default", fields.clone()).unwrap();
        store.update_ordering(&original, 3).unwrap();
        let copy = store.clone_entry(&original).unwrap();
        assert_ne!(copy.entry_id, original.entry_id);

        let reopened = YamlEntryStore::open(&file).unwrap();
        let record = reopened.get(&copy).unwrap().unwrap();
        assert_eq!(record.fields, fields);
        assert_eq!(record.ordering_count, None);
        assert_eq!(reopened.get(&original).unwrap().unwrap().ordering_count, Some(3));
    }

    #[test]
    fn comments_are_removed_per_page() {
        let fixture = TestFixtureRoot::new_unique("records-comments").unwrap();
        let store = YamlCommentStore::open(&fixture.data_file(COMMENTS_FILE)).unwrap();
        for entry_id in [2, 2, 3] {
            store
                .add(CommentRecord {
                    module: COMMENTS_MODULE.to_string(),
                    entry_id,
                    author: "guest".to_string(),
                    body: "Nice page".to_string(),
                })
                .unwrap();
        }
        assert_eq!(store.delete_where(COMMENTS_MODULE, 2).unwrap(), 2);
        assert_eq!(store.all().unwrap().len(), 1);
    }

    #[test]
    fn navigation_links_get_sequential_ids() {
        let fixture = TestFixtureRoot::new_unique("records-navigation").unwrap();
        let links = YamlNavigationLinks::open(&fixture.data_file(NAVIGATION_FILE)).unwrap();
        let request = NavigationLinkRequest {
            title: "About".to_string(),
            page_id: PageId(2),
            group_id: 1,
        };
        assert_eq!(links.create_link(&request).unwrap(), 1);
        assert_eq!(links.create_link(&request).unwrap(), 2);
        assert_eq!(links.all().unwrap()[1].1.link_type, "page");
    }
}

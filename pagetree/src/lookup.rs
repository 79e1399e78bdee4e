// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Route lookup records (`full uri -> page id`) and the builders that keep them
//! in step with the tree.
//!
//! Every operation that changes a slug or a parent must rebuild the lookup for
//! the page and all of its descendants. The batch builder computes every new
//! URI from the settled structure before touching the table, so readers never
//! observe a half-updated subtree.

use crate::errors::{PageError, PageResult};
use crate::page::PageId;
use crate::tree::PageTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const URI_SEPARATOR: &str = "/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupTable {
    records: BTreeMap<String, PageId>,
}

impl LookupTable {
    pub fn resolve(&self, uri: &str) -> Option<PageId> {
        self.records.get(uri.trim_matches('/')).copied()
    }

    pub fn uri_of(&self, id: PageId) -> Option<&str> {
        self.records
            .iter()
            .find(|(_, page_id)| **page_id == id)
            .map(|(uri, _)| uri.as_str())
    }

    /// True when `uri` routes to a page other than `exclude`.
    pub fn is_taken(&self, uri: &str, exclude: Option<PageId>) -> bool {
        match self.records.get(uri) {
            Some(id) => Some(*id) != exclude,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PageId)> {
        self.records.iter().map(|(uri, id)| (uri.as_str(), *id))
    }

    pub(crate) fn insert(&mut self, id: PageId, uri: String) -> PageResult<()> {
        if let Some(existing) = self.records.get(&uri)
            && *existing != id
        {
            return Err(PageError::validation(format!(
                "URI '{}' is already routed to page {}",
                uri, existing
            ))
            .with_page(id));
        }
        self.remove_page(id);
        self.records.insert(uri, id);
        Ok(())
    }

    pub(crate) fn remove_page(&mut self, id: PageId) {
        self.records.retain(|_, page_id| *page_id != id);
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}

/// Joins the slugs of `id` and all of its ancestors, root first.
pub fn full_uri_for(tree: &PageTree, id: PageId) -> PageResult<String> {
    let mut segments = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(id);
    while let Some(page_id) = current {
        if !visited.insert(page_id) {
            return Err(PageError::validation("Page hierarchy contains a cycle").with_page(id));
        }
        let page = tree.get(page_id).ok_or_else(|| PageError::not_found(page_id))?;
        segments.push(page.slug.as_str());
        current = page.parent_id;
    }
    segments.reverse();
    Ok(segments.join(URI_SEPARATOR))
}

pub fn child_uri(parent_uri: &str, slug: &str) -> String {
    if parent_uri.is_empty() {
        slug.to_string()
    } else {
        format!("{}{}{}", parent_uri, URI_SEPARATOR, slug)
    }
}

/// Refreshes the lookup record of a single page; descendants are left alone.
pub fn build_lookup(tree: &mut PageTree, id: PageId) -> PageResult<String> {
    let uri = full_uri_for(tree, id)?;
    tree.lookup_mut().insert(id, uri.clone())?;
    tree.require_mut(id)?.uri = uri.clone();
    Ok(uri)
}

/// Refreshes `id` and every descendant.
pub fn rebuild_subtree(tree: &mut PageTree, id: PageId) -> PageResult<usize> {
    rebuild_batch(tree, &[id])
}

/// Refreshes every listed page plus all of their descendants in one pass.
///
/// Returns the number of pages whose records were rewritten. Unknown ids are ignored.
pub fn rebuild_batch(tree: &mut PageTree, ids: &[PageId]) -> PageResult<usize> {
    let mut affected = BTreeSet::new();
    for id in ids {
        if !tree.contains(*id) {
            continue;
        }
        affected.insert(*id);
        affected.extend(tree.descendants(*id));
    }

    let mut planned = Vec::with_capacity(affected.len());
    for id in &affected {
        planned.push((*id, full_uri_for(tree, *id)?));
    }

    for (id, _) in &planned {
        tree.lookup_mut().remove_page(*id);
    }
    for (id, uri) in planned.iter() {
        tree.lookup_mut().insert(*id, uri.clone())?;
        tree.require_mut(*id)?.uri = uri.clone();
    }

    log::trace!("Rebuilt {} lookup records", planned.len());
    Ok(planned.len())
}

pub fn rebuild_all(tree: &mut PageTree) -> PageResult<usize> {
    tree.lookup_mut().clear();
    let ids = tree.ids();
    rebuild_batch(tree, &ids)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMismatch {
    Unresolvable {
        page_id: PageId,
        reason: String,
    },
    StaleUri {
        page_id: PageId,
        stored: String,
        expected: String,
    },
    MissingRecord {
        page_id: PageId,
        expected: String,
    },
    WrongRecord {
        page_id: PageId,
        recorded: String,
        expected: String,
    },
    OrphanRecord {
        uri: String,
        page_id: PageId,
    },
}

/// Compares the stored URIs and lookup records against the ancestor chains.
pub fn verify(tree: &PageTree) -> Vec<LookupMismatch> {
    let mut mismatches = Vec::new();
    for page in tree.pages() {
        let expected = match full_uri_for(tree, page.id) {
            Ok(uri) => uri,
            Err(err) => {
                mismatches.push(LookupMismatch::Unresolvable {
                    page_id: page.id,
                    reason: err.message().to_string(),
                });
                continue;
            }
        };
        if page.uri != expected {
            mismatches.push(LookupMismatch::StaleUri {
                page_id: page.id,
                stored: page.uri.clone(),
                expected: expected.clone(),
            });
        }
        match tree.lookup().uri_of(page.id) {
            None => mismatches.push(LookupMismatch::MissingRecord {
                page_id: page.id,
                expected,
            }),
            Some(recorded) if recorded != expected => {
                mismatches.push(LookupMismatch::WrongRecord {
                    page_id: page.id,
                    recorded: recorded.to_string(),
                    expected,
                })
            }
            Some(_) => {}
        }
    }
    for (uri, id) in tree.lookup().iter() {
        if !tree.contains(id) {
            mismatches.push(LookupMismatch::OrphanRecord {
                uri: uri.to_string(),
                page_id: id,
            });
        }
    }
    mismatches
}

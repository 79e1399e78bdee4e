// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::errors::{PageError, PageResult};
use crate::lookup::LookupTable;
use crate::page::{Page, PageId, PageStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Nested view of the tree used by the page index screen.
#[derive(Debug, Clone, Serialize)]
pub struct PageNode {
    pub id: PageId,
    pub title: String,
    pub slug: String,
    pub uri: String,
    pub status: PageStatus,
    pub is_home: bool,
    pub children: Vec<PageNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageTree {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    pages: BTreeMap<PageId, Page>,
    #[serde(default)]
    lookup: LookupTable,
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(&id)
    }

    pub(crate) fn require_mut(&mut self, id: PageId) -> PageResult<&mut Page> {
        self.pages.get_mut(&id).ok_or_else(|| PageError::not_found(id))
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.pages.contains_key(&id)
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn ids(&self) -> Vec<PageId> {
        self.pages.keys().copied().collect()
    }

    pub fn lookup(&self) -> &LookupTable {
        &self.lookup
    }

    pub(crate) fn lookup_mut(&mut self) -> &mut LookupTable {
        &mut self.lookup
    }

    pub(crate) fn allocate_id(&mut self) -> PageId {
        let highest = self.pages.keys().next_back().map(|id| id.0).unwrap_or(0);
        let next = self.next_id.max(highest).saturating_add(1);
        self.next_id = next;
        PageId(next)
    }

    pub(crate) fn insert(&mut self, page: Page) {
        self.pages.insert(page.id, page);
    }

    pub(crate) fn remove(&mut self, id: PageId) -> Option<Page> {
        let page = self.pages.remove(&id)?;
        self.lookup.remove_page(id);
        Some(page)
    }

    /// Children of `parent` (or the top-level pages for `None`) in display order.
    pub fn children(&self, parent: Option<PageId>) -> Vec<&Page> {
        let mut children: Vec<&Page> = self
            .pages
            .values()
            .filter(|page| page.parent_id == parent)
            .collect();
        children.sort_by(|left, right| left.order.cmp(&right.order).then(left.id.cmp(&right.id)));
        children
    }

    pub fn child_ids(&self, parent: Option<PageId>) -> Vec<PageId> {
        self.children(parent).into_iter().map(|page| page.id).collect()
    }

    pub fn has_children(&self, id: PageId) -> bool {
        self.pages.values().any(|page| page.parent_id == Some(id))
    }

    /// Every descendant of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: PageId) -> Vec<PageId> {
        let mut result = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut stack: Vec<PageId> = self.child_ids(Some(id)).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if !visited.insert(next) {
                continue;
            }
            result.push(next);
            stack.extend(self.child_ids(Some(next)).into_iter().rev());
        }
        result
    }

    pub fn sibling_slug_taken(
        &self,
        parent: Option<PageId>,
        slug: &str,
        exclude: Option<PageId>,
    ) -> bool {
        self.pages.values().any(|page| {
            page.parent_id == parent && Some(page.id) != exclude && page.slug == slug
        })
    }

    /// Order value that places a new page after every existing sibling.
    pub fn next_sibling_order(&self, parent: Option<PageId>) -> i64 {
        self.pages
            .values()
            .filter(|page| page.parent_id == parent)
            .map(|page| page.order.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    pub fn home(&self) -> Option<&Page> {
        self.pages.values().find(|page| page.is_home)
    }

    /// Resolves a request path through the lookup table; the empty path is the home page.
    pub fn resolve_route(&self, path: &str) -> Option<&Page> {
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return self.home();
        }
        let id = self.lookup.resolve(trimmed)?;
        self.pages.get(&id)
    }

    pub fn forest(&self) -> Vec<PageNode> {
        let mut visited = HashSet::new();
        self.child_ids(None)
            .into_iter()
            .filter_map(|id| self.build_node(id, &mut visited))
            .collect()
    }

    fn build_node(&self, id: PageId, visited: &mut HashSet<PageId>) -> Option<PageNode> {
        if !visited.insert(id) {
            log::warn!("Page {} reached twice while building the page tree", id);
            return None;
        }
        let page = self.pages.get(&id)?;
        Some(PageNode {
            id: page.id,
            title: page.title.clone(),
            slug: page.slug.clone(),
            uri: page.uri.clone(),
            status: page.status,
            is_home: page.is_home,
            children: self
                .child_ids(Some(id))
                .into_iter()
                .filter_map(|child| self.build_node(child, visited))
                .collect(),
        })
    }
}

// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Recursive subtree duplication, split into a pure planning step and an
//! apply step so entry clones can happen in between.

use crate::effects::{CacheNamespace, Effect, Outcome, PageEvent};
use crate::errors::{PageError, PageResult};
use crate::lookup::{self, child_uri};
use crate::page::{EntryRef, Page, PageId, PageStatus};
use crate::slug::{allocate_incremented, next_title};
use crate::tree::PageTree;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedParent {
    /// A page already in the tree, or top level.
    Existing(Option<PageId>),
    /// An earlier page of the same plan, by index.
    Planned(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPage {
    pub source_id: PageId,
    pub parent: PlannedParent,
    pub title: String,
    pub slug: String,
    pub uri: String,
    pub order: i64,
    pub status: PageStatus,
    pub clone_entry: Option<EntryRef>,
}

/// Pages to create, outermost first, children following their parent in pre-order.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicatePlan {
    pub source_id: PageId,
    pub pages: Vec<PlannedPage>,
}

impl DuplicatePlan {
    /// Entries that must be cloned before the plan is applied, keyed by plan index.
    pub fn entry_clones(&self) -> Vec<(usize, &EntryRef)> {
        self.pages
            .iter()
            .enumerate()
            .filter_map(|(index, page)| page.clone_entry.as_ref().map(|entry| (index, entry)))
            .collect()
    }

    /// Whether applying the plan creates any live page, at any depth.
    pub fn creates_live(&self) -> bool {
        self.pages.iter().any(|page| page.status == PageStatus::Live)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    pub source: PageId,
    pub top: PageId,
    pub created: Vec<PageId>,
}

struct Planner<'a> {
    tree: &'a PageTree,
    max_attempts: u32,
    pages: Vec<PlannedPage>,
    visited: HashSet<PageId>,
}

impl Planner<'_> {
    fn slug_taken(&self, parent: PlannedParent, slug: &str, parent_uri: &str) -> bool {
        let planned_sibling = self
            .pages
            .iter()
            .any(|page| page.parent == parent && page.slug == slug);
        if planned_sibling {
            return true;
        }
        if let PlannedParent::Existing(existing) = parent
            && self.tree.sibling_slug_taken(existing, slug, None)
        {
            return true;
        }
        let uri = child_uri(parent_uri, slug);
        self.tree.lookup().is_taken(&uri, None) || self.pages.iter().any(|page| page.uri == uri)
    }

    fn plan(&mut self, source_id: PageId, parent: PlannedParent, parent_uri: &str) -> PageResult<()> {
        if !self.visited.insert(source_id) {
            return Err(PageError::validation("Page hierarchy contains a cycle").with_page(source_id));
        }
        let tree = self.tree;
        let source = tree
            .get(source_id)
            .ok_or_else(|| PageError::not_found(source_id))?;

        let slug = {
            let check = |candidate: &str| self.slug_taken(parent, candidate, parent_uri);
            allocate_incremented(&source.slug, self.max_attempts, &check)?
        };
        let uri = child_uri(parent_uri, &slug);
        debug!("Planned duplicate of page {} as '{}'", source_id, uri);

        let index = self.pages.len();
        self.pages.push(PlannedPage {
            source_id,
            parent,
            title: next_title(&source.title),
            slug,
            uri: uri.clone(),
            order: source.order,
            status: source.status,
            clone_entry: source.entry.clone(),
        });

        for child in tree.child_ids(Some(source_id)) {
            self.plan(child, PlannedParent::Planned(index), &uri)?;
        }
        Ok(())
    }
}

/// Plans a copy of `id` and its whole subtree. Returns `None` for unknown ids.
pub fn plan_duplicate(
    tree: &PageTree,
    id: PageId,
    max_attempts: u32,
) -> PageResult<Option<DuplicatePlan>> {
    let Some(source) = tree.get(id) else {
        return Ok(None);
    };
    let parent_uri = match source.parent_id {
        Some(parent) => lookup::full_uri_for(tree, parent)?,
        None => String::new(),
    };
    let mut planner = Planner {
        tree,
        max_attempts,
        pages: Vec::new(),
        visited: HashSet::new(),
    };
    planner.plan(id, PlannedParent::Existing(source.parent_id), &parent_uri)?;
    Ok(Some(DuplicatePlan {
        source_id: id,
        pages: planner.pages,
    }))
}

/// Inserts the planned pages. `cloned_entries` maps plan indexes to the
/// entry copies made for them; a planned clone without a copy is an error.
pub fn apply_plan(
    tree: &mut PageTree,
    plan: &DuplicatePlan,
    cloned_entries: &BTreeMap<usize, EntryRef>,
    now: DateTime<Utc>,
) -> PageResult<Outcome<DuplicateReport>> {
    let mut created: Vec<PageId> = Vec::with_capacity(plan.pages.len());

    for (index, planned) in plan.pages.iter().enumerate() {
        let source = tree
            .get(planned.source_id)
            .cloned()
            .ok_or_else(|| PageError::not_found(planned.source_id))?;
        let parent_id = match planned.parent {
            PlannedParent::Existing(parent) => parent,
            PlannedParent::Planned(parent_index) => {
                Some(*created.get(parent_index).ok_or_else(|| {
                    PageError::internal(format!(
                        "Duplicate plan refers to page {} before it exists",
                        parent_index
                    ))
                })?)
            }
        };
        let entry = match &planned.clone_entry {
            Some(original) => Some(cloned_entries.get(&index).cloned().ok_or_else(|| {
                PageError::internal(format!("No copy was made of entry {}", original))
                    .with_page(planned.source_id)
            })?),
            None => None,
        };

        let id = tree.allocate_id();
        tree.insert(Page {
            id,
            parent_id,
            title: planned.title.clone(),
            slug: planned.slug.clone(),
            uri: planned.uri.clone(),
            order: planned.order,
            status: planned.status,
            entry,
            is_home: false,
            created_on: now,
            updated_on: None,
            ..source
        });
        let uri = lookup::build_lookup(tree, id)?;
        if uri != planned.uri {
            return Err(PageError::internal(format!(
                "Duplicate routed to '{}' instead of planned '{}'",
                uri, planned.uri
            ))
            .with_page(id));
        }
        created.push(id);
    }

    let top = *created
        .first()
        .ok_or_else(|| PageError::internal("Duplicate plan is empty"))?;
    info!(
        "Duplicated page {} as {} ({} pages)",
        plan.source_id,
        top,
        created.len()
    );

    Ok(Outcome::new(DuplicateReport {
        source: plan.source_id,
        top,
        created: created.clone(),
    })
    .with_effect(Effect::Invalidate(CacheNamespace::Pages))
    .with_effect(Effect::Invalidate(CacheNamespace::Navigation))
    .with_effect(Effect::Emit(PageEvent::PageDuplicated {
        source: plan.source_id,
        created,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PageErrorKind;
    use crate::tree::test_support::tree_of;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> PageTree {
        tree_of(&[
            (1, None, "home", 0),
            (2, None, "about", 1),
            (3, Some(2), "team", 0),
            (4, Some(2), "history", 1),
        ])
    }

    #[test]
    fn duplicates_parent_with_children() {
        let mut tree = sample();
        let plan = plan_duplicate(&tree, PageId(2), 10).unwrap().unwrap();
        assert_eq!(plan.pages.len(), 3);
        let outcome = apply_plan(&mut tree, &plan, &BTreeMap::new(), now()).unwrap();
        let report = outcome.value;

        assert_eq!(report.created.len(), 3);
        assert_eq!(tree.len(), 7);
        let top = tree.get(report.top).unwrap();
        assert_eq!(top.title, "about 2");
        assert_eq!(top.slug, "about-2");
        assert_eq!(top.parent_id, None);

        let children = tree.children(Some(report.top));
        let slugs: Vec<_> = children.iter().map(|page| page.slug.as_str()).collect();
        assert_eq!(slugs, vec!["team-2", "history-2"]);
        assert_eq!(children[0].uri, "about-2/team-2");
        assert!(lookup::verify(&tree).is_empty());
    }

    #[test]
    fn plan_reports_live_pages_below_a_draft() {
        let mut tree = sample();
        assert!(!plan_duplicate(&tree, PageId(2), 10).unwrap().unwrap().creates_live());

        tree.require_mut(PageId(3)).unwrap().status = PageStatus::Live;
        let plan = plan_duplicate(&tree, PageId(2), 10).unwrap().unwrap();
        assert_eq!(plan.pages[0].status, PageStatus::Draft);
        assert!(plan.creates_live());
        let report = apply_plan(&mut tree, &plan, &BTreeMap::new(), now()).unwrap().value;
        assert_eq!(tree.get(report.created[1]).unwrap().status, PageStatus::Live);
    }

    #[test]
    fn slug_skips_taken_increments() {
        let mut tree = tree_of(&[
            (1, None, "home", 0),
            (2, None, "about", 1),
            (3, None, "about-2", 2),
        ]);
        let plan = plan_duplicate(&tree, PageId(2), 10).unwrap().unwrap();
        assert_eq!(plan.pages[0].slug, "about-3");
        apply_plan(&mut tree, &plan, &BTreeMap::new(), now()).unwrap();

        let plan = plan_duplicate(&tree, PageId(2), 10).unwrap().unwrap();
        assert_eq!(plan.pages[0].slug, "about-4");
    }

    #[test]
    fn nested_duplicate_stays_under_source_parent() {
        let mut tree = sample();
        let plan = plan_duplicate(&tree, PageId(3), 10).unwrap().unwrap();
        let report = apply_plan(&mut tree, &plan, &BTreeMap::new(), now())
            .unwrap()
            .value;
        let copy = tree.get(report.top).unwrap();
        assert_eq!(copy.parent_id, Some(PageId(2)));
        assert_eq!(copy.uri, "about/team-2");
    }

    #[test]
    fn home_flag_is_not_copied_and_entries_use_clones() {
        let mut tree = sample();
        {
            let page = tree.get_mut(PageId(2)).unwrap();
            page.is_home = true;
            page.entry = Some(EntryRef {
                entry_type: "pages.default".to_string(),
                entry_id: 5,
            });
        }
        let plan = plan_duplicate(&tree, PageId(2), 10).unwrap().unwrap();
        assert_eq!(plan.entry_clones().len(), 1);

        let missing = apply_plan(&mut tree.clone(), &plan, &BTreeMap::new(), now()).unwrap_err();
        assert_eq!(missing.kind(), PageErrorKind::Internal);

        let clone = EntryRef {
            entry_type: "pages.default".to_string(),
            entry_id: 6,
        };
        let clones = BTreeMap::from([(0, clone.clone())]);
        let report = apply_plan(&mut tree, &plan, &clones, now()).unwrap().value;
        let copy = tree.get(report.top).unwrap();
        assert!(!copy.is_home);
        assert_eq!(copy.entry, Some(clone));
        assert_eq!(tree.home().map(|page| page.id), Some(PageId(2)));
    }

    #[test]
    fn unknown_source_plans_nothing() {
        let tree = sample();
        assert!(plan_duplicate(&tree, PageId(99), 10).unwrap().is_none());
    }

    #[test]
    fn exhausted_suffixes_fail() {
        let tree = tree_of(&[
            (1, None, "about", 0),
            (2, None, "about-2", 1),
            (3, None, "about-3", 2),
        ]);
        let err = plan_duplicate(&tree, PageId(1), 2).unwrap_err();
        assert_eq!(err.kind(), PageErrorKind::SlugExhausted);
    }

    #[test]
    fn only_one_event_for_the_whole_subtree() {
        let mut tree = sample();
        let plan = plan_duplicate(&tree, PageId(2), 10).unwrap().unwrap();
        let outcome = apply_plan(&mut tree, &plan, &BTreeMap::new(), now()).unwrap();
        let events: Vec<_> = outcome.events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "page_duplicated");
    }
}

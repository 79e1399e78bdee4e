// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::collab::COMMENTS_MODULE;
use crate::effects::{CacheNamespace, Effect, Notice, Outcome, PageEvent};
use crate::errors::PageResult;
use crate::lookup;
use crate::page::{Page, PageId, ROOT_PAGE_ID};
use crate::slug::allocate_unique;
use crate::tree::PageTree;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// What happens to the children of a deleted page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildPolicy {
    /// The whole subtree goes with the page.
    #[default]
    Cascade,
    /// Children move up to the deleted page's parent.
    Reparent,
    /// Pages that still have children are left alone.
    Reject,
}

impl ChildPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildPolicy::Cascade => "cascade",
            ChildPolicy::Reparent => "reparent",
            ChildPolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for ChildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChildPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(ChildPolicy::Cascade),
            "reparent" => Ok(ChildPolicy::Reparent),
            "reject" => Ok(ChildPolicy::Reject),
            other => Err(format!("Unknown child policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Requested ids that were removed.
    pub deleted: Vec<PageId>,
    /// Descendants removed along with a requested page.
    pub cascaded: Vec<PageId>,
    /// Children moved to a new parent.
    pub reparented: Vec<PageId>,
    /// Requested ids that did not exist.
    pub skipped: Vec<PageId>,
    /// Requested ids refused because they are, or contain, the root page.
    pub protected: Vec<PageId>,
    /// Requested ids refused because they still have children.
    pub rejected: Vec<PageId>,
}

impl DeleteReport {
    pub fn removed_count(&self) -> usize {
        self.deleted.len() + self.cascaded.len()
    }
}

/// Deletes a batch of pages. Unknown ids are skipped and the root page is
/// never removed; the batch produces one aggregate `page_deleted` event.
pub fn delete_pages(
    tree: &mut PageTree,
    ids: &[PageId],
    policy: ChildPolicy,
    max_attempts: u32,
) -> PageResult<Outcome<DeleteReport>> {
    let mut report = DeleteReport::default();
    let mut outcome = Outcome::new(());
    let mut seen = HashSet::new();

    for id in ids.iter().copied() {
        if !seen.insert(id) || report.cascaded.contains(&id) {
            continue;
        }
        if id == ROOT_PAGE_ID {
            warn!("Refusing to delete root page {}", id);
            report.protected.push(id);
            outcome.push_notice(Notice::RootProtected { page_id: id });
            continue;
        }
        if !tree.contains(id) {
            debug!("Skipping delete of unknown page {}", id);
            report.skipped.push(id);
            continue;
        }

        let descendants = tree.descendants(id);
        if !descendants.is_empty() {
            match policy {
                ChildPolicy::Reject => {
                    warn!("Page {} has {} descendants; not deleted", id, descendants.len());
                    report.rejected.push(id);
                    outcome.push_notice(Notice::HasChildren { page_id: id });
                    continue;
                }
                ChildPolicy::Cascade => {
                    if descendants.contains(&ROOT_PAGE_ID) {
                        warn!("Page {} contains the root page; not deleted", id);
                        report.protected.push(id);
                        outcome.push_notice(Notice::ContainsRoot { page_id: id });
                        continue;
                    }
                    for descendant in descendants.iter().rev() {
                        if let Some(page) = tree.remove(*descendant) {
                            push_cleanup(&mut outcome, &page);
                            report.cascaded.push(page.id);
                        }
                    }
                }
                ChildPolicy::Reparent => {
                    reparent_children(tree, id, max_attempts, &mut report, &mut outcome)?;
                }
            }
        }

        if let Some(page) = tree.remove(id) {
            push_cleanup(&mut outcome, &page);
            report.deleted.push(page.id);
        }
    }

    if !report.reparented.is_empty() {
        lookup::rebuild_batch(tree, &report.reparented)?;
    }

    if let Some(first) = report.deleted.first().copied() {
        outcome.push_effect(Effect::Invalidate(CacheNamespace::Pages));
        outcome.push_effect(Effect::Invalidate(CacheNamespace::Navigation));
        outcome.push_effect(Effect::Emit(PageEvent::PageDeleted {
            ids: report.deleted.clone(),
            cascaded: report.cascaded.clone(),
        }));
        outcome.push_notice(Notice::Deleted {
            count: report.removed_count(),
            first,
        });
        info!(
            "Deleted pages {:?} ({} descendants removed, {} moved up)",
            report.deleted,
            report.cascaded.len(),
            report.reparented.len()
        );
    } else {
        outcome.push_notice(Notice::NothingDeleted);
    }

    Ok(outcome.map(|_| report))
}

fn push_cleanup(outcome: &mut Outcome<()>, page: &Page) {
    outcome.push_effect(Effect::DeleteComments {
        module: COMMENTS_MODULE.to_string(),
        page_id: page.id,
    });
    if let Some(entry) = &page.entry {
        outcome.push_effect(Effect::DeleteEntry(entry.clone()));
    }
}

fn reparent_children(
    tree: &mut PageTree,
    id: PageId,
    max_attempts: u32,
    report: &mut DeleteReport,
    outcome: &mut Outcome<()>,
) -> PageResult<()> {
    let new_parent = tree.get(id).and_then(|page| page.parent_id);
    let mut next_order = tree.next_sibling_order(new_parent);

    for child in tree.child_ids(Some(id)) {
        let current = match tree.get(child) {
            Some(page) => page.slug.clone(),
            None => continue,
        };
        let slug = {
            let view: &PageTree = tree;
            let check = |candidate: &str| {
                view.pages().any(|page| {
                    page.parent_id == new_parent
                        && page.id != child
                        && page.id != id
                        && page.slug == candidate
                })
            };
            allocate_unique(&current, max_attempts, &check)?
        };

        let page = tree.require_mut(child)?;
        page.parent_id = new_parent;
        page.order = next_order;
        next_order += 1;
        if slug != current {
            page.slug = slug.clone();
            outcome.push_notice(Notice::SlugRenamed {
                page_id: child,
                from: current,
                to: slug,
            });
        }
        report.reparented.push(child);
    }
    Ok(())
}

// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::effects::{CacheNamespace, Effect, Notice, Outcome, PageEvent};
use crate::errors::{PageError, PageResult};
use crate::lookup;
use crate::page::PageId;
use crate::slug::allocate_unique;
use crate::tree::PageTree;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One node of the drag-and-drop order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNode {
    pub id: PageId,
    #[serde(default)]
    pub children: Vec<OrderNode>,
}

impl OrderNode {
    pub fn leaf(id: PageId) -> Self {
        Self {
            id,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderReport {
    /// Every id mentioned by the payload, in payload pre-order.
    pub placed: Vec<PageId>,
    /// Pages whose parent changed.
    pub reparented: Vec<PageId>,
    /// Pages whose slug was changed to stay unique among new siblings.
    pub renamed: Vec<PageId>,
    /// Number of lookup records rewritten.
    pub rebuilt: usize,
}

/// Parses the JSON forest sent by the page index screen.
pub fn parse_order_payload(json: &str) -> PageResult<Vec<OrderNode>> {
    serde_json::from_str(json)
        .map_err(|err| PageError::validation(format!("Invalid order payload: {}", err)))
}

struct Placement {
    id: PageId,
    parent: Option<PageId>,
    position: i64,
}

fn flatten(
    nodes: &[OrderNode],
    parent: Option<PageId>,
    seen: &mut HashSet<PageId>,
    out: &mut Vec<Placement>,
) -> PageResult<()> {
    for (position, node) in nodes.iter().enumerate() {
        if !seen.insert(node.id) {
            return Err(PageError::validation(format!(
                "Page {} appears more than once in the order payload",
                node.id
            ))
            .with_page(node.id));
        }
        out.push(Placement {
            id: node.id,
            parent,
            position: position as i64,
        });
        flatten(&node.children, Some(node.id), seen, out)?;
    }
    Ok(())
}

/// Applies a forest payload: every mentioned page takes the parent and
/// position the payload gives it, then the lookup is rebuilt once for the
/// whole moved set.
pub fn reorder(
    tree: &mut PageTree,
    batch: &[OrderNode],
    max_attempts: u32,
) -> PageResult<Outcome<ReorderReport>> {
    if batch.is_empty() {
        return Err(PageError::validation("Order payload is empty"));
    }

    let mut placements = Vec::new();
    flatten(batch, None, &mut HashSet::new(), &mut placements)?;
    for placement in &placements {
        if !tree.contains(placement.id) {
            return Err(PageError::not_found(placement.id));
        }
    }

    let mentioned: BTreeSet<PageId> = placements.iter().map(|placement| placement.id).collect();
    let mut previous_parents = BTreeMap::new();
    for placement in &placements {
        let page = tree.require_mut(placement.id)?;
        previous_parents.insert(placement.id, page.parent_id);
        page.parent_id = None;
    }

    let mut groups: BTreeMap<Option<PageId>, i64> = BTreeMap::new();
    for placement in &placements {
        let page = tree.require_mut(placement.id)?;
        page.parent_id = placement.parent;
        page.order = placement.position;
        let count = groups.entry(placement.parent).or_insert(0);
        *count = (*count).max(placement.position + 1);
    }

    // Pages the payload left out keep their relative order behind the placed ones.
    for (parent, placed_count) in &groups {
        let unmentioned: Vec<PageId> = tree
            .child_ids(*parent)
            .into_iter()
            .filter(|id| !mentioned.contains(id))
            .collect();
        for (offset, id) in unmentioned.into_iter().enumerate() {
            tree.require_mut(id)?.order = placed_count + offset as i64;
        }
    }

    let mut report = ReorderReport {
        placed: placements.iter().map(|placement| placement.id).collect(),
        ..ReorderReport::default()
    };
    let mut outcome = Outcome::new(());

    for placement in &placements {
        if previous_parents.get(&placement.id) == Some(&placement.parent) {
            continue;
        }
        report.reparented.push(placement.id);
        let current = match tree.get(placement.id) {
            Some(page) => page.slug.clone(),
            None => continue,
        };
        if !tree.sibling_slug_taken(placement.parent, &current, Some(placement.id)) {
            continue;
        }
        let renamed = {
            let view: &PageTree = tree;
            let check =
                |slug: &str| view.sibling_slug_taken(placement.parent, slug, Some(placement.id));
            allocate_unique(&current, max_attempts, &check)?
        };
        debug!(
            "Page {} renamed from '{}' to '{}' after moving",
            placement.id, current, renamed
        );
        tree.require_mut(placement.id)?.slug = renamed.clone();
        report.renamed.push(placement.id);
        outcome.push_notice(Notice::SlugRenamed {
            page_id: placement.id,
            from: current,
            to: renamed,
        });
    }

    let ids: Vec<PageId> = mentioned.iter().copied().collect();
    report.rebuilt = lookup::rebuild_batch(tree, &ids)?;

    let top_level: Vec<PageId> = batch.iter().map(|node| node.id).collect();
    outcome.push_effect(Effect::Invalidate(CacheNamespace::Pages));
    outcome.push_effect(Effect::Invalidate(CacheNamespace::Navigation));
    for (position, id) in top_level.iter().enumerate() {
        if let Some(entry) = tree.get(*id).and_then(|page| page.entry.clone()) {
            outcome.push_effect(Effect::SyncEntryOrdering {
                entry,
                order: position as i64,
            });
        }
    }
    outcome.push_effect(Effect::Emit(PageEvent::PageOrdered {
        order: top_level,
        root_pages: batch.to_vec(),
    }));

    info!(
        "Reordered {} pages ({} moved, {} renamed)",
        report.placed.len(),
        report.reparented.len(),
        report.renamed.len()
    );
    Ok(outcome.map(|_| report))
}

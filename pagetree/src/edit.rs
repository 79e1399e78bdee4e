// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::collab::NavigationLinkRequest;
use crate::effects::{CacheNamespace, Effect, Outcome, PageEvent};
use crate::errors::{PageError, PageResult};
use crate::lookup::{self, child_uri};
use crate::page::{
    EntryRef, Page, PageId, PageMeta, PageStatus, normalize_keywords, validate_title,
};
use crate::slug::{allocate_unique, canonicalize_slug, slugify_title};
use crate::tree::PageTree;
use chrono::{DateTime, Utc};
use log::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatePage {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub parent_id: Option<PageId>,
    pub type_id: Option<u64>,
    pub entry: Option<EntryRef>,
    pub status: PageStatus,
    pub is_home: bool,
    pub meta: PageMeta,
    pub navigation_group_ids: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub status: Option<PageStatus>,
    /// `true` makes the page the home page; `false` leaves the flag alone.
    pub is_home: bool,
    pub meta: Option<PageMeta>,
}

fn validate_meta(mut meta: PageMeta) -> PageResult<PageMeta> {
    meta.meta_keywords =
        normalize_keywords(&meta.meta_keywords.join(",")).map_err(PageError::validation)?;
    meta.restricted_to.sort_unstable();
    meta.restricted_to.dedup();
    Ok(meta)
}

fn parent_uri(tree: &PageTree, parent: Option<PageId>) -> PageResult<String> {
    match parent {
        Some(parent) => lookup::full_uri_for(tree, parent),
        None => Ok(String::new()),
    }
}

/// Allocates a slug unique among the siblings under `parent` whose URI is
/// not routed to any other page.
fn unique_slug(
    tree: &PageTree,
    parent: Option<PageId>,
    candidate: &str,
    exclude: Option<PageId>,
    max_attempts: u32,
) -> PageResult<String> {
    let base_uri = parent_uri(tree, parent)?;
    let check = |slug: &str| {
        tree.sibling_slug_taken(parent, slug, exclude)
            || tree.lookup().is_taken(&child_uri(&base_uri, slug), exclude)
    };
    allocate_unique(candidate, max_attempts, &check)
}

pub fn create_page(
    tree: &mut PageTree,
    input: CreatePage,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> PageResult<Outcome<PageId>> {
    let title = validate_title(&input.title).map_err(PageError::validation)?;
    if let Some(parent) = input.parent_id
        && !tree.contains(parent)
    {
        return Err(PageError::not_found(parent));
    }
    let candidate = match input.slug.as_deref() {
        Some(raw) if !raw.trim().is_empty() => canonicalize_slug(raw)?,
        _ => slugify_title(&title)?,
    };
    let slug = unique_slug(tree, input.parent_id, &candidate, None, max_attempts)?;
    let meta = validate_meta(input.meta)?;

    let id = tree.allocate_id();
    let order = tree.next_sibling_order(input.parent_id);
    tree.insert(Page {
        id,
        parent_id: input.parent_id,
        title: title.clone(),
        slug,
        uri: String::new(),
        order,
        type_id: input.type_id,
        entry: input.entry,
        is_home: false,
        status: input.status,
        meta,
        created_on: now,
        updated_on: None,
    });
    let uri = lookup::build_lookup(tree, id)?;
    if input.is_home {
        set_home(tree, id)?;
    }
    info!("Created page {} at '{}'", id, uri);

    let mut outcome = Outcome::new(id);
    for group_id in input.navigation_group_ids {
        outcome.push_effect(Effect::CreateNavigationLink(NavigationLinkRequest {
            title: title.clone(),
            page_id: id,
            group_id,
        }));
    }
    outcome.push_effect(Effect::Emit(PageEvent::PageCreated { id }));
    outcome.push_effect(Effect::Invalidate(CacheNamespace::Pages));
    Ok(outcome)
}

pub fn update_page(
    tree: &mut PageTree,
    id: PageId,
    update: PageUpdate,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> PageResult<Outcome<Page>> {
    let current = tree.get(id).cloned().ok_or_else(|| PageError::not_found(id))?;

    let title = match update.title.as_deref() {
        Some(raw) => Some(validate_title(raw).map_err(|err| PageError::validation(err).with_page(id))?),
        None => None,
    };
    let slug = match update.slug.as_deref() {
        Some(raw) => {
            let candidate = canonicalize_slug(raw).map_err(|err| PageError::from(err).with_page(id))?;
            if candidate == current.slug {
                None
            } else {
                Some(unique_slug(tree, current.parent_id, &candidate, Some(id), max_attempts)?)
            }
        }
        None => None,
    };
    let meta = match update.meta {
        Some(meta) => Some(validate_meta(meta)?),
        None => None,
    };

    let slug_changed = slug.is_some();
    {
        let page = tree.require_mut(id)?;
        if let Some(title) = title {
            page.title = title;
        }
        if let Some(slug) = slug {
            page.slug = slug;
        }
        if let Some(status) = update.status {
            page.status = status;
        }
        if let Some(meta) = meta {
            page.meta = meta;
        }
        page.updated_on = Some(now);
    }
    if slug_changed {
        let rebuilt = lookup::rebuild_subtree(tree, id)?;
        info!("Page {} moved to a new slug; {} routes rebuilt", id, rebuilt);
    } else {
        lookup::build_lookup(tree, id)?;
    }
    if update.is_home {
        set_home(tree, id)?;
    }

    let page = tree.get(id).cloned().ok_or_else(|| PageError::not_found(id))?;
    Ok(Outcome::new(page)
        .with_effect(Effect::Emit(PageEvent::PageUpdated { id }))
        .with_effect(Effect::Invalidate(CacheNamespace::Pages))
        .with_effect(Effect::Invalidate(CacheNamespace::Navigation)))
}

/// Makes `id` the only home page.
pub fn set_home(tree: &mut PageTree, id: PageId) -> PageResult<()> {
    if !tree.contains(id) {
        return Err(PageError::not_found(id));
    }
    for other in tree.ids() {
        if let Some(page) = tree.get_mut(other) {
            page.is_home = other == id;
        }
    }
    Ok(())
}

/// Links an entry saved by the entry subsystem; returns the one it replaced.
pub fn associate_entry(
    tree: &mut PageTree,
    id: PageId,
    entry: EntryRef,
) -> PageResult<Outcome<Option<EntryRef>>> {
    let page = tree.require_mut(id)?;
    let previous = page.entry.replace(entry);
    Ok(Outcome::new(previous).with_effect(Effect::Invalidate(CacheNamespace::Pages)))
}

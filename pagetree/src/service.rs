// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Request-level entry point: permission check, one store transaction,
//! then the effects of the committed change.

use crate::collab::{
    CommentStore, EntryStore, MemoryCommentStore, MemoryEntryStore, MemoryNavigationLinks,
    NavigationLinks,
};
use crate::config::ValidatedConfig;
use crate::context::RequestContext;
use crate::delete::{ChildPolicy, DeleteReport, delete_pages};
use crate::duplicate::{DuplicateReport, apply_plan, plan_duplicate};
use crate::edit::{CreatePage, PageUpdate, associate_entry, create_page, update_page};
use crate::effects::{
    CacheGenerations, CacheInvalidator, DispatchReport, EffectDispatcher, EventSink,
    LogEventSink, Notice, NoticeLevel, Outcome,
};
use crate::errors::{PageError, PageResult};
use crate::lookup::{self, LookupMismatch};
use crate::page::{EntryRef, Page, PageId, PageStatus};
use crate::permissions::{Capability, PermissionGate};
use crate::reorder::{OrderNode, ReorderReport, reorder};
use crate::store::PageStore;
use crate::tree::PageNode;
use chrono::Utc;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// External subsystems the service hands effects to.
#[derive(Clone)]
pub struct Collaborators {
    pub events: Arc<dyn EventSink>,
    pub caches: Arc<dyn CacheInvalidator>,
    pub navigation: Arc<dyn NavigationLinks>,
    pub entries: Arc<dyn EntryStore>,
    pub comments: Arc<dyn CommentStore>,
}

impl Collaborators {
    pub fn in_memory() -> Self {
        Self {
            events: Arc::new(LogEventSink),
            caches: Arc::new(CacheGenerations::new()),
            navigation: Arc::new(MemoryNavigationLinks::new()),
            entries: Arc::new(MemoryEntryStore::new()),
            comments: Arc::new(MemoryCommentStore::new()),
        }
    }
}

/// A committed operation: its value, the messages for the user and how the
/// follow-up effects went.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<T> {
    pub value: T,
    pub notices: Vec<Notice>,
    pub dispatch: DispatchReport,
}

pub struct PageService {
    store: PageStore,
    gate: Arc<dyn PermissionGate>,
    entries: Arc<dyn EntryStore>,
    dispatcher: EffectDispatcher,
    max_suffix_attempts: u32,
    delete_children: ChildPolicy,
}

impl PageService {
    pub fn new(
        store: PageStore,
        config: &ValidatedConfig,
        gate: Arc<dyn PermissionGate>,
        collaborators: Collaborators,
    ) -> Self {
        let dispatcher = EffectDispatcher::new(
            collaborators.events,
            collaborators.caches,
            collaborators.navigation,
            collaborators.entries.clone(),
            collaborators.comments,
        );
        Self {
            store,
            gate,
            entries: collaborators.entries,
            dispatcher,
            max_suffix_attempts: config.max_suffix_attempts,
            delete_children: config.delete_children,
        }
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn tree(&self) -> PageResult<Vec<PageNode>> {
        self.store.read(|tree| tree.forest())
    }

    pub fn page(&self, id: PageId) -> PageResult<Page> {
        self.store
            .read(|tree| tree.get(id).cloned())?
            .ok_or_else(|| PageError::not_found(id))
    }

    pub fn resolve(&self, path: &str) -> PageResult<Option<Page>> {
        self.store.read(|tree| tree.resolve_route(path).cloned())
    }

    pub fn create(&self, ctx: &RequestContext, input: CreatePage) -> PageResult<Completed<PageId>> {
        if input.status == PageStatus::Live {
            self.gate.require(&ctx.actor, Capability::PutLive)?;
        }
        let attempts = self.max_suffix_attempts;
        let now = Utc::now();
        let outcome = self
            .store
            .transaction(|tree| create_page(tree, input, now, attempts))
            .inspect_err(|err| warn!("[{}] Create failed: {}", ctx.short_id(), err))?;
        info!("[{}] {} created page {}", ctx.short_id(), ctx.actor.id, outcome.value);
        Ok(self.finish(ctx, outcome))
    }

    pub fn update(
        &self,
        ctx: &RequestContext,
        id: PageId,
        update: PageUpdate,
    ) -> PageResult<Completed<Page>> {
        self.gate.require(&ctx.actor, Capability::EditLive)?;
        if update.status == Some(PageStatus::Live) {
            self.gate.require(&ctx.actor, Capability::PutLive)?;
        }
        let attempts = self.max_suffix_attempts;
        let now = Utc::now();
        let outcome = self
            .store
            .transaction(|tree| update_page(tree, id, update, now, attempts))?;
        info!("[{}] {} updated page {}", ctx.short_id(), ctx.actor.id, id);
        Ok(self.finish(ctx, outcome))
    }

    pub fn reorder(
        &self,
        ctx: &RequestContext,
        batch: &[OrderNode],
    ) -> PageResult<Completed<ReorderReport>> {
        self.gate.require(&ctx.actor, Capability::EditLive)?;
        let attempts = self.max_suffix_attempts;
        let outcome = self
            .store
            .transaction(|tree| reorder(tree, batch, attempts))
            .inspect_err(|err| warn!("[{}] Reorder rolled back: {}", ctx.short_id(), err))?;
        Ok(self.finish(ctx, outcome))
    }

    /// Copies `id` with its subtree. Unknown ids complete with `None`.
    /// Copying any live page, the source or one below it, needs `put_live`.
    pub fn duplicate(
        &self,
        ctx: &RequestContext,
        id: PageId,
    ) -> PageResult<Completed<Option<DuplicateReport>>> {
        let attempts = self.max_suffix_attempts;
        let now = Utc::now();
        let mut cloned_entries: Vec<EntryRef> = Vec::new();
        let result = self.store.transaction(|tree| {
            let Some(plan) = plan_duplicate(tree, id, attempts)? else {
                return Ok(None);
            };
            if plan.creates_live() {
                self.gate.require(&ctx.actor, Capability::PutLive)?;
            }
            let mut clones = BTreeMap::new();
            for (index, entry) in plan.entry_clones() {
                let copy = self.entries.clone_entry(entry)?;
                cloned_entries.push(copy.clone());
                clones.insert(index, copy);
            }
            apply_plan(tree, &plan, &clones, now).map(Some)
        });

        match result {
            Ok(Some(outcome)) => Ok(self.finish(ctx, outcome).map_value(Some)),
            Ok(None) => {
                warn!("[{}] Duplicate of unknown page {} skipped", ctx.short_id(), id);
                Ok(Completed {
                    value: None,
                    notices: Vec::new(),
                    dispatch: DispatchReport::default(),
                })
            }
            Err(err) => {
                for entry in &cloned_entries {
                    if let Err(cleanup) = self.entries.delete_entry(entry) {
                        error!(
                            "[{}] Could not remove cloned entry {}: {}",
                            ctx.short_id(),
                            entry,
                            cleanup
                        );
                    }
                }
                warn!(
                    "[{}] Duplicate of page {} rolled back ({} entry copies removed): {}",
                    ctx.short_id(),
                    id,
                    cloned_entries.len(),
                    err
                );
                Err(err)
            }
        }
    }

    pub fn delete(&self, ctx: &RequestContext, ids: &[PageId]) -> PageResult<Completed<DeleteReport>> {
        self.gate.require(&ctx.actor, Capability::DeleteLive)?;
        let policy = self.delete_children;
        let attempts = self.max_suffix_attempts;
        let outcome = self
            .store
            .transaction(|tree| delete_pages(tree, ids, policy, attempts))?;
        Ok(self.finish(ctx, outcome))
    }

    pub fn associate_entry(
        &self,
        ctx: &RequestContext,
        id: PageId,
        entry: EntryRef,
    ) -> PageResult<Completed<Option<EntryRef>>> {
        self.gate.require(&ctx.actor, Capability::EditLive)?;
        let outcome = self
            .store
            .transaction(|tree| associate_entry(tree, id, entry))?;
        Ok(self.finish(ctx, outcome))
    }

    pub fn check(&self) -> PageResult<Vec<LookupMismatch>> {
        self.store.read(lookup::verify)
    }

    /// Rebuilds every route record; returns how many were written.
    pub fn repair(&self, ctx: &RequestContext) -> PageResult<usize> {
        self.gate.require(&ctx.actor, Capability::EditLive)?;
        let rebuilt = self.store.transaction(lookup::rebuild_all)?;
        info!("[{}] Rebuilt {} route records", ctx.short_id(), rebuilt);
        Ok(rebuilt)
    }

    fn finish<T>(&self, ctx: &RequestContext, outcome: Outcome<T>) -> Completed<T> {
        for notice in &outcome.notices {
            match notice.level() {
                NoticeLevel::Error => warn!("[{}] {}", ctx.short_id(), notice),
                _ => info!("[{}] {}", ctx.short_id(), notice),
            }
        }
        let dispatch = self.dispatcher.dispatch(outcome.effects);
        Completed {
            value: outcome.value,
            notices: outcome.notices,
            dispatch,
        }
    }
}

impl<T> Completed<T> {
    pub fn map_value<U>(self, f: impl FnOnce(T) -> U) -> Completed<U> {
        Completed {
            value: f(self.value),
            notices: self.notices,
            dispatch: self.dispatch,
        }
    }
}

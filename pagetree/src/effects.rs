// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Side effects produced by tree operations.
//!
//! Core operations never call collaborators directly. They return an
//! [`Outcome`] carrying the effects to run once the mutation has been
//! committed; the [`EffectDispatcher`] executes them and only logs failures.

use crate::collab::{CommentStore, EntryStore, NavigationLinkRequest, NavigationLinks};
use crate::errors::{PageError, PageResult};
use crate::page::{EntryRef, PageId};
use crate::reorder::OrderNode;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheNamespace {
    Pages,
    Navigation,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Pages => "pages",
            CacheNamespace::Navigation => "navigation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEvent {
    PageCreated {
        id: PageId,
    },
    PageUpdated {
        id: PageId,
    },
    PageOrdered {
        order: Vec<PageId>,
        root_pages: Vec<OrderNode>,
    },
    PageDuplicated {
        source: PageId,
        created: Vec<PageId>,
    },
    PageDeleted {
        ids: Vec<PageId>,
        cascaded: Vec<PageId>,
    },
    PostNavigationCreate {
        link_id: u64,
        page_id: PageId,
        group_id: u64,
    },
}

impl PageEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PageEvent::PageCreated { .. } => "page_created",
            PageEvent::PageUpdated { .. } => "page_updated",
            PageEvent::PageOrdered { .. } => "page_ordered",
            PageEvent::PageDuplicated { .. } => "page_duplicated",
            PageEvent::PageDeleted { .. } => "page_deleted",
            PageEvent::PostNavigationCreate { .. } => "post_navigation_create",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(PageEvent),
    Invalidate(CacheNamespace),
    CreateNavigationLink(NavigationLinkRequest),
    SyncEntryOrdering { entry: EntryRef, order: i64 },
    DeleteEntry(EntryRef),
    DeleteComments { module: String, page_id: PageId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Notice,
    Error,
}

/// User-facing messages collected while an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    RootProtected { page_id: PageId },
    ContainsRoot { page_id: PageId },
    HasChildren { page_id: PageId },
    SlugRenamed { page_id: PageId, from: String, to: String },
    Deleted { count: usize, first: PageId },
    NothingDeleted,
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Notice::RootProtected { .. }
            | Notice::ContainsRoot { .. }
            | Notice::HasChildren { .. } => NoticeLevel::Error,
            Notice::SlugRenamed { .. } | Notice::NothingDeleted => NoticeLevel::Notice,
            Notice::Deleted { .. } => NoticeLevel::Success,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::RootProtected { page_id } => {
                write!(f, "Page {} is the root page and cannot be deleted", page_id)
            }
            Notice::ContainsRoot { page_id } => write!(
                f,
                "Page {} contains the root page and cannot be deleted with its children",
                page_id
            ),
            Notice::HasChildren { page_id } => {
                write!(f, "Page {} still has child pages and was not deleted", page_id)
            }
            Notice::SlugRenamed { page_id, from, to } => write!(
                f,
                "Page {} was renamed from '{}' to '{}' to keep sibling slugs unique",
                page_id, from, to
            ),
            Notice::Deleted { count: 1, first } => write!(f, "Page {} has been deleted", first),
            Notice::Deleted { count, .. } => write!(f, "{} pages have been deleted", count),
            Notice::NothingDeleted => write!(f, "No pages were deleted"),
        }
    }
}

/// Result of a core operation plus the work it leaves for after the commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<Effect>,
    pub notices: Vec<Notice>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            effects: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn push_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            effects: self.effects,
            notices: self.notices,
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &PageEvent> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Emit(event) => Some(event),
            _ => None,
        })
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PageEvent) -> PageResult<()>;
}

pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, namespace: CacheNamespace) -> PageResult<()>;
}

/// Writes every event to the log as a JSON line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &PageEvent) -> PageResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|err| PageError::internal(format!("Failed to encode event: {}", err)))?;
        info!("📣 {}: {}", event.name(), payload);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PageEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn named(&self, name: &str) -> Vec<PageEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.name() == name)
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &PageEvent) -> PageResult<()> {
        self.events
            .lock()
            .map_err(|_| PageError::internal("Event recorder lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Per-namespace generation counters; readers compare generations to know
/// whether anything they cached is stale.
#[derive(Debug, Clone, Default)]
pub struct CacheGenerations {
    pages: Arc<AtomicU64>,
    navigation: Arc<AtomicU64>,
}

impl CacheGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, namespace: CacheNamespace) -> u64 {
        self.counter(namespace).load(Ordering::SeqCst)
    }

    fn counter(&self, namespace: CacheNamespace) -> &AtomicU64 {
        match namespace {
            CacheNamespace::Pages => &self.pages,
            CacheNamespace::Navigation => &self.navigation,
        }
    }
}

impl CacheInvalidator for CacheGenerations {
    fn invalidate(&self, namespace: CacheNamespace) -> PageResult<()> {
        let counter = self.counter(namespace);
        let mut previous = counter.load(Ordering::SeqCst);
        loop {
            let next = previous.saturating_add(1);
            match counter.compare_exchange(previous, next, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => {
                    log::debug!("🔁 Cache '{}' moved to generation {}", namespace.as_str(), next);
                    return Ok(());
                }
                Err(observed) => previous = observed,
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub executed: usize,
    pub failed: usize,
}

/// Runs effects against the collaborators after a commit.
#[derive(Clone)]
pub struct EffectDispatcher {
    events: Arc<dyn EventSink>,
    caches: Arc<dyn CacheInvalidator>,
    navigation: Arc<dyn NavigationLinks>,
    entries: Arc<dyn EntryStore>,
    comments: Arc<dyn CommentStore>,
}

impl EffectDispatcher {
    pub fn new(
        events: Arc<dyn EventSink>,
        caches: Arc<dyn CacheInvalidator>,
        navigation: Arc<dyn NavigationLinks>,
        entries: Arc<dyn EntryStore>,
        comments: Arc<dyn CommentStore>,
    ) -> Self {
        Self {
            events,
            caches,
            navigation,
            entries,
            comments,
        }
    }

    /// Executes every effect in order. Repeated invalidations of the same
    /// namespace within one batch collapse into one.
    pub fn dispatch(&self, effects: Vec<Effect>) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut invalidated = BTreeSet::new();
        let mut queue: std::collections::VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            if let Effect::Invalidate(namespace) = &effect
                && !invalidated.insert(*namespace)
            {
                continue;
            }
            match self.run(&effect) {
                Ok(follow_up) => {
                    report.executed += 1;
                    queue.extend(follow_up);
                }
                Err(err) => {
                    report.failed += 1;
                    error!("Effect {:?} failed: {}", effect, err);
                }
            }
        }

        if report.failed > 0 {
            warn!(
                "{} of {} effects failed after commit",
                report.failed,
                report.failed + report.executed
            );
        }
        report
    }

    fn run(&self, effect: &Effect) -> PageResult<Vec<Effect>> {
        match effect {
            Effect::Emit(event) => self.events.emit(event).map(|_| Vec::new()),
            Effect::Invalidate(namespace) => {
                self.caches.invalidate(*namespace).map(|_| Vec::new())
            }
            Effect::CreateNavigationLink(link) => {
                let link_id = self.navigation.create_link(link)?;
                Ok(vec![
                    Effect::Emit(PageEvent::PostNavigationCreate {
                        link_id,
                        page_id: link.page_id,
                        group_id: link.group_id,
                    }),
                    Effect::Invalidate(CacheNamespace::Navigation),
                ])
            }
            Effect::SyncEntryOrdering { entry, order } => self
                .entries
                .update_ordering(entry, *order)
                .map(|_| Vec::new()),
            Effect::DeleteEntry(entry) => self.entries.delete_entry(entry).map(|_| Vec::new()),
            Effect::DeleteComments { module, page_id } => {
                let removed = self.comments.delete_where(module, page_id.0)?;
                if removed > 0 {
                    log::debug!("Removed {} comments of page {}", removed, page_id);
                }
                Ok(Vec::new())
            }
        }
    }
}

// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod common;

use common::{EDITOR_ROLE, TestHarness};
use pagetree::collab::{COMMENTS_MODULE, EntryStore, MemoryEntryStore};
use pagetree::config::ValidatedConfig;
use pagetree::delete::ChildPolicy;
use pagetree::edit::{CreatePage, PageUpdate};
use pagetree::effects::{CacheNamespace, EventSink, Notice, PageEvent, RecordingEventSink};
use pagetree::page::EntryRef;
use pagetree::permissions::AllowAll;
use pagetree::reorder::{OrderNode, parse_order_payload};
use pagetree::store::PageStore;
use pagetree::{Collaborators, PageErrorKind, PageId, PageResult, PageService, PageStatus};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn leaf(id: PageId) -> OrderNode {
    OrderNode {
        id,
        children: Vec::new(),
    }
}

#[test]
fn editor_cannot_publish_or_delete() {
    let harness = TestHarness::new();
    let seed = harness.seed();
    let editor = harness.ctx(&[EDITOR_ROLE]);

    let draft = harness
        .service
        .create(
            &editor,
            CreatePage {
                title: "Draft".to_string(),
                ..CreatePage::default()
            },
        )
        .expect("editor creates drafts");
    assert_eq!(harness.service.page(draft.value).expect("page").status, PageStatus::Draft);

    let live = harness.service.create(
        &editor,
        CreatePage {
            title: "Live".to_string(),
            status: PageStatus::Live,
            ..CreatePage::default()
        },
    );
    assert_eq!(live.unwrap_err().kind(), PageErrorKind::PermissionDenied);

    let publish = harness.service.update(
        &editor,
        seed.about,
        PageUpdate {
            status: Some(PageStatus::Live),
            ..PageUpdate::default()
        },
    );
    assert_eq!(publish.unwrap_err().kind(), PageErrorKind::PermissionDenied);

    let delete = harness.service.delete(&editor, &[seed.contact]);
    assert_eq!(delete.unwrap_err().kind(), PageErrorKind::PermissionDenied);
    assert!(harness.service.page(seed.contact).is_ok());

    harness
        .service
        .reorder(&editor, &[leaf(seed.contact), leaf(seed.home)])
        .expect("editor may reorder");
}

#[test]
fn editor_cannot_copy_live_pages_below_a_draft() {
    let harness = TestHarness::new();
    let seed = harness.seed();
    harness
        .service
        .update(
            &harness.admin(),
            seed.team,
            PageUpdate {
                status: Some(PageStatus::Live),
                ..PageUpdate::default()
            },
        )
        .expect("publish team");
    let before = harness.service.store().snapshot().expect("snapshot");
    let editor = harness.ctx(&[EDITOR_ROLE]);

    let err = harness.service.duplicate(&editor, seed.about).unwrap_err();
    assert_eq!(err.kind(), PageErrorKind::PermissionDenied);
    assert!(err.message().contains("put_live"));
    assert_eq!(harness.service.store().snapshot().expect("snapshot"), before);
    assert!(harness.events.named("page_duplicated").is_empty());

    let copy = harness
        .service
        .duplicate(&editor, seed.contact)
        .expect("draft pages copy without put_live")
        .value
        .expect("report");
    assert_eq!(harness.service.page(copy.top).expect("copy").status, PageStatus::Draft);

    let report = harness
        .service
        .duplicate(&harness.admin(), seed.about)
        .expect("admin copies live pages")
        .value
        .expect("report");
    let statuses: Vec<_> = report
        .created
        .iter()
        .map(|id| harness.service.page(*id).expect("page").status)
        .collect();
    assert_eq!(statuses, vec![PageStatus::Draft, PageStatus::Live, PageStatus::Draft]);
}

#[test]
fn unknown_role_cannot_edit() {
    let harness = TestHarness::new();
    let seed = harness.seed();
    let visitor = harness.ctx(&["visitor"]);
    let err = harness
        .service
        .update(
            &visitor,
            seed.about,
            PageUpdate {
                title: Some("Renamed".to_string()),
                ..PageUpdate::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), PageErrorKind::PermissionDenied);
    assert!(err.message().contains("edit_live"));
    assert_eq!(harness.service.page(seed.about).expect("page").title, "About");
}

#[test]
fn navigation_groups_get_links_after_create() {
    let harness = TestHarness::new();
    let completed = harness
        .service
        .create(
            &harness.admin(),
            CreatePage {
                title: "Pricing".to_string(),
                navigation_group_ids: vec![1, 4],
                ..CreatePage::default()
            },
        )
        .expect("create");

    let links = harness.navigation.links();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|(_, link)| link.page_id == completed.value));
    assert_eq!(harness.events.named("post_navigation_create").len(), 2);
    assert_eq!(harness.events.named("page_created").len(), 1);
    assert_eq!(completed.dispatch.failed, 0);
    assert_eq!(harness.caches.current(CacheNamespace::Pages), 1);
    assert_eq!(harness.caches.current(CacheNamespace::Navigation), 1);
}

#[test]
fn edits_and_reorders_invalidate_both_caches() {
    let harness = TestHarness::new();
    let seed = harness.seed();
    let pages_before = harness.caches.current(CacheNamespace::Pages);
    let nav_before = harness.caches.current(CacheNamespace::Navigation);

    harness
        .service
        .update(
            &harness.admin(),
            seed.contact,
            PageUpdate {
                title: Some("Reach us".to_string()),
                ..PageUpdate::default()
            },
        )
        .expect("update");
    harness
        .service
        .reorder(&harness.admin(), &[leaf(seed.contact), leaf(seed.about)])
        .expect("reorder");

    assert_eq!(harness.caches.current(CacheNamespace::Pages), pages_before + 2);
    assert_eq!(harness.caches.current(CacheNamespace::Navigation), nav_before + 2);
}

#[test]
fn reorder_syncs_entry_ordering_for_top_level_pages() {
    let harness = TestHarness::new();
    let entry = harness.entries.create("pages.default").expect("entry");
    let home = harness.create("Home", None);
    let blog = harness
        .service
        .create(
            &harness.admin(),
            CreatePage {
                title: "Blog".to_string(),
                entry: Some(entry.clone()),
                ..CreatePage::default()
            },
        )
        .expect("create")
        .value;

    let batch = parse_order_payload(&format!(r#"[{{"id":{}}},{{"id":{}}}]"#, blog, home))
        .expect("payload");
    harness.service.reorder(&harness.admin(), &batch).expect("reorder");

    let stored = harness.entries.get(entry.entry_id).expect("entry");
    assert_eq!(stored.ordering_count, Some(0));
    let ordered = harness.events.named("page_ordered");
    assert!(matches!(
        ordered.as_slice(),
        [PageEvent::PageOrdered { order, .. }] if order == &vec![blog, home]
    ));
}

#[test]
fn failed_reorder_leaves_tree_untouched() {
    let harness = TestHarness::new();
    let seed = harness.seed();
    let before = harness.service.store().snapshot().expect("snapshot");

    let err = harness
        .service
        .reorder(
            &harness.admin(),
            &[
                OrderNode {
                    id: seed.contact,
                    children: vec![leaf(seed.about)],
                },
                leaf(PageId(999)),
            ],
        )
        .unwrap_err();
    assert_eq!(err.kind(), PageErrorKind::NotFound);
    assert_eq!(harness.service.store().snapshot().expect("snapshot"), before);
    assert!(harness.events.named("page_ordered").is_empty());

    let reopened = PageStore::open(&harness.config.store_file).expect("reopen");
    assert_eq!(reopened.snapshot().expect("snapshot"), before);
}

#[test]
fn delete_removes_comments_and_entries() {
    let harness = TestHarness::new();
    let seed = harness.seed();
    let entry = harness.entries.create("pages.default").expect("entry");
    harness
        .service
        .associate_entry(&harness.admin(), seed.history, entry.clone())
        .expect("associate");
    harness
        .comments
        .add(COMMENTS_MODULE, seed.team.0, "Nice team")
        .expect("comment");
    harness
        .comments
        .add(COMMENTS_MODULE, seed.contact.0, "Kept")
        .expect("comment");

    let completed = harness
        .service
        .delete(&harness.admin(), &[seed.about])
        .expect("delete");
    assert_eq!(completed.value.deleted, vec![seed.about]);
    assert_eq!(completed.value.removed_count(), 3);
    assert!(harness.entries.get(entry.entry_id).is_none());
    assert_eq!(harness.comments.count_for(COMMENTS_MODULE, seed.team.0), 0);
    assert_eq!(harness.comments.count_for(COMMENTS_MODULE, seed.contact.0), 1);
    assert!(harness.service.resolve("about/team").expect("resolve").is_none());
}

#[test]
fn reparent_policy_moves_children_up() {
    let harness = TestHarness::with_policy(ChildPolicy::Reparent);
    let seed = harness.seed();
    harness.create("Team", None);

    let completed = harness
        .service
        .delete(&harness.admin(), &[seed.about])
        .expect("delete");
    assert_eq!(completed.value.reparented.len(), 2);

    let team = harness.service.page(seed.team).expect("team");
    assert_eq!(team.parent_id, None);
    assert_eq!(team.uri, "team-2");
    assert_eq!(harness.uri(seed.history), "history");
}

#[test]
fn reject_policy_keeps_pages_with_children() {
    let harness = TestHarness::with_policy(ChildPolicy::Reject);
    let seed = harness.seed();

    let completed = harness
        .service
        .delete(&harness.admin(), &[seed.about, seed.contact])
        .expect("delete");
    assert_eq!(completed.value.deleted, vec![seed.contact]);
    assert!(completed.notices.contains(&Notice::HasChildren { page_id: seed.about }));
    assert!(harness.service.page(seed.about).is_ok());
}

#[test]
fn changes_survive_reopening_the_store() {
    let harness = TestHarness::new();
    let seed = harness.seed();
    harness.service.duplicate(&harness.admin(), seed.about).expect("duplicate");
    harness
        .service
        .delete(&harness.admin(), &[seed.contact])
        .expect("delete");

    let live = harness.service.store().snapshot().expect("snapshot");
    let reopened = PageStore::open(&harness.config.store_file).expect("reopen");
    assert_eq!(reopened.snapshot().expect("snapshot"), live);
    assert!(harness.service.check().expect("check").is_empty());
}

#[test]
fn duplicate_of_unknown_page_is_a_no_op() {
    let harness = TestHarness::new();
    harness.seed();
    let completed = harness
        .service
        .duplicate(&harness.admin(), PageId(404))
        .expect("duplicate");
    assert!(completed.value.is_none());
    assert!(harness.events.named("page_duplicated").is_empty());
    assert_eq!(completed.dispatch.executed, 0);
}

/// Entry store that refuses clones after a set number of successes.
struct LimitedClones {
    inner: MemoryEntryStore,
    remaining: AtomicUsize,
}

impl EntryStore for LimitedClones {
    fn clone_entry(&self, entry: &EntryRef) -> PageResult<EntryRef> {
        let left = self.remaining.load(Ordering::SeqCst);
        if left == 0 {
            return Err(pagetree::PageError::collaborator("entry backend unavailable"));
        }
        self.remaining.store(left - 1, Ordering::SeqCst);
        self.inner.clone_entry(entry)
    }

    fn delete_entry(&self, entry: &EntryRef) -> PageResult<()> {
        self.inner.delete_entry(entry)
    }

    fn update_ordering(&self, entry: &EntryRef, order: i64) -> PageResult<()> {
        self.inner.update_ordering(entry, order)
    }
}

#[test]
fn failed_duplicate_removes_cloned_entries() {
    let entries = Arc::new(LimitedClones {
        inner: MemoryEntryStore::new(),
        remaining: AtomicUsize::new(1),
    });
    let first = entries.inner.create("pages.default").expect("entry");
    let second = entries.inner.create("pages.default").expect("entry");

    let events = Arc::new(RecordingEventSink::new());
    let entry_store: Arc<dyn EntryStore> = entries.clone();
    let event_sink: Arc<dyn EventSink> = events.clone();
    let mut collaborators = Collaborators::in_memory();
    collaborators.entries = entry_store;
    collaborators.events = event_sink;
    let config = ValidatedConfig::defaults_at(Path::new("."));
    let service = PageService::new(
        PageStore::in_memory(),
        &config,
        Arc::new(AllowAll),
        collaborators,
    );
    let ctx = pagetree::context::RequestContext::new(pagetree::context::Actor::new(
        "tester",
        vec!["admin".to_string()],
    ));

    let parent = service
        .create(
            &ctx,
            CreatePage {
                title: "Docs".to_string(),
                entry: Some(first),
                ..CreatePage::default()
            },
        )
        .expect("parent")
        .value;
    service
        .create(
            &ctx,
            CreatePage {
                title: "Guide".to_string(),
                parent_id: Some(parent),
                entry: Some(second),
                ..CreatePage::default()
            },
        )
        .expect("child");
    let before = service.store().snapshot().expect("snapshot");

    let err = service.duplicate(&ctx, parent).unwrap_err();
    assert_eq!(err.kind(), PageErrorKind::Collaborator);
    assert_eq!(entries.inner.len(), 2);
    assert_eq!(service.store().snapshot().expect("snapshot"), before);
    assert!(events.named("page_duplicated").is_empty());
}

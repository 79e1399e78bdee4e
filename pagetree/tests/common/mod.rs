// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use pagetree::collab::{MemoryCommentStore, MemoryEntryStore, MemoryNavigationLinks};
use pagetree::config::ValidatedConfig;
use pagetree::context::{Actor, RequestContext};
use pagetree::delete::ChildPolicy;
use pagetree::edit::CreatePage;
use pagetree::effects::{CacheGenerations, RecordingEventSink};
use pagetree::permissions::{Capability, RoleTable};
use pagetree::store::PageStore;
use pagetree::util::test_fixtures::TestFixtureRoot;
use pagetree::{Collaborators, PageId, PageService};
use std::sync::Arc;

pub const EDITOR_ROLE: &str = "editor";

pub struct TestHarness {
    pub fixture: TestFixtureRoot,
    pub config: ValidatedConfig,
    pub service: PageService,
    pub events: Arc<RecordingEventSink>,
    pub caches: Arc<CacheGenerations>,
    pub navigation: Arc<MemoryNavigationLinks>,
    pub entries: Arc<MemoryEntryStore>,
    pub comments: Arc<MemoryCommentStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_policy(ChildPolicy::Cascade)
    }

    pub fn with_policy(policy: ChildPolicy) -> Self {
        let fixture = TestFixtureRoot::new_unique("pagetree").expect("fixture root");
        let mut config = ValidatedConfig::defaults_at(fixture.path());
        config.delete_children = policy;
        config.max_suffix_attempts = 50;
        let mut roles = RoleTable::default();
        roles
            .grant(EDITOR_ROLE, Capability::EditLive)
            .expect("editor role");
        config.roles = roles;

        let store = PageStore::open(&config.store_file).expect("open page store");
        let events = Arc::new(RecordingEventSink::new());
        let caches = Arc::new(CacheGenerations::new());
        let navigation = Arc::new(MemoryNavigationLinks::new());
        let entries = Arc::new(MemoryEntryStore::new());
        let comments = Arc::new(MemoryCommentStore::new());
        let collaborators = Collaborators {
            events: events.clone(),
            caches: caches.clone(),
            navigation: navigation.clone(),
            entries: entries.clone(),
            comments: comments.clone(),
        };
        let service = PageService::new(
            store,
            &config,
            Arc::new(config.roles.clone()),
            collaborators,
        );

        Self {
            fixture,
            config,
            service,
            events,
            caches,
            navigation,
            entries,
            comments,
        }
    }

    pub fn admin(&self) -> RequestContext {
        self.ctx(&["admin"])
    }

    pub fn ctx(&self, roles: &[&str]) -> RequestContext {
        RequestContext::new(Actor::new(
            "tester",
            roles.iter().map(|role| role.to_string()).collect(),
        ))
    }

    pub fn create(&self, title: &str, parent: Option<PageId>) -> PageId {
        self.service
            .create(
                &self.admin(),
                CreatePage {
                    title: title.to_string(),
                    parent_id: parent,
                    ..CreatePage::default()
                },
            )
            .expect("create page")
            .value
    }

    /// Creates the root page plus `About` (with `Team` and `History`) and `Contact`.
    pub fn seed(&self) -> Seed {
        let home = self.create("Home", None);
        let about = self.create("About", None);
        let team = self.create("Team", Some(about));
        let history = self.create("History", Some(about));
        let contact = self.create("Contact", None);
        Seed {
            home,
            about,
            team,
            history,
            contact,
        }
    }

    pub fn slug(&self, id: PageId) -> String {
        self.service.page(id).expect("page").slug
    }

    pub fn uri(&self, id: PageId) -> String {
        self.service.page(id).expect("page").uri
    }
}

pub struct Seed {
    pub home: PageId,
    pub about: PageId,
    pub team: PageId,
    pub history: PageId,
    pub contact: PageId,
}

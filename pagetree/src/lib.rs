// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

pub mod collab;
pub mod config;
pub mod context;
pub mod delete;
pub mod duplicate;
pub mod edit;
pub mod effects;
pub mod errors;
pub mod lookup;
pub mod page;
pub mod permissions;
pub mod records;
pub mod reorder;
pub mod service;
pub mod slug;
pub mod store;
pub mod tree;
pub mod util;
pub mod yaml_store;

pub use errors::{PageError, PageErrorKind, PageResult};
pub use page::{Page, PageId, PageStatus, ROOT_PAGE_ID};
pub use service::{Collaborators, Completed, PageService};
pub use tree::PageTree;

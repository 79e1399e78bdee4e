// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::page::PageId;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageErrorKind {
    NotFound,
    Validation,
    PermissionDenied,
    SlugExhausted,
    Storage,
    Collaborator,
    Internal,
}

#[derive(Debug, Clone)]
pub struct PageError {
    kind: PageErrorKind,
    page_id: Option<PageId>,
    message: String,
}

impl PageError {
    pub fn new(kind: PageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            page_id: None,
            message: message.into(),
        }
    }

    pub fn not_found(id: PageId) -> Self {
        Self::new(PageErrorKind::NotFound, "Page not found").with_page(id)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(PageErrorKind::Validation, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(PageErrorKind::PermissionDenied, message)
    }

    pub fn slug_exhausted(candidate: &str, attempts: u32) -> Self {
        Self::new(
            PageErrorKind::SlugExhausted,
            format!(
                "Could not allocate unique slug for '{}' after {} attempts",
                candidate, attempts
            ),
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(PageErrorKind::Storage, message)
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::new(PageErrorKind::Collaborator, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(PageErrorKind::Internal, message)
    }

    pub fn with_page(mut self, id: PageId) -> Self {
        self.page_id = Some(id);
        self
    }

    pub fn kind(&self) -> PageErrorKind {
        self.kind
    }

    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page_id {
            Some(id) => write!(f, "{:?} error for page {}: {}", self.kind, id, self.message),
            None => write!(f, "{:?} error: {}", self.kind, self.message),
        }
    }
}

impl Error for PageError {}

pub type PageResult<T> = Result<T, PageError>;

// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The distinguished page that can never be deleted.
pub const ROOT_PAGE_ID: PageId = PageId(1);

pub const MAX_TITLE_CHARS: usize = 256;
pub const MAX_KEYWORD_COUNT: usize = 64;
pub const MAX_KEYWORD_CHARS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageId {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("Page ID is required".to_string());
        }
        trimmed
            .parse::<u64>()
            .map(PageId)
            .map_err(|_| format!("Invalid page id '{}'", trimmed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Draft,
    Live,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Draft => "draft",
            PageStatus::Live => "live",
        }
    }
}

impl FromStr for PageStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(PageStatus::Draft),
            "live" => Ok(PageStatus::Live),
            other => Err(format!("Unknown page status '{}'", other)),
        }
    }
}

/// Reference to a typed content record owned by the entry subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRef {
    pub entry_type: String,
    pub entry_id: u64,
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entry_type, self.entry_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub js: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_keywords: Vec<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub rss_enabled: bool,
    #[serde(default)]
    pub comments_enabled: bool,
    #[serde(default)]
    pub restricted_to: Vec<u64>,
    #[serde(default)]
    pub strict_uri: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    #[serde(default)]
    pub parent_id: Option<PageId>,
    pub title: String,
    pub slug: String,
    pub uri: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub type_id: Option<u64>,
    #[serde(default)]
    pub entry: Option<EntryRef>,
    #[serde(default)]
    pub is_home: bool,
    #[serde(default)]
    pub status: PageStatus,
    #[serde(default)]
    pub meta: PageMeta,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

impl Page {
    pub fn is_root(&self) -> bool {
        self.id == ROOT_PAGE_ID
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

pub fn validate_title(title: &str) -> Result<String, String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Title is required".to_string());
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(format!(
            "Title must be at most {} characters",
            MAX_TITLE_CHARS
        ));
    }
    if trimmed.chars().any(|ch| ch.is_control()) {
        return Err("Title contains control characters".to_string());
    }
    Ok(trimmed.to_string())
}

/// Splits a comma separated keyword string into a deduplicated, lowercased list.
pub fn normalize_keywords(raw: &str) -> Result<Vec<String>, String> {
    let mut keywords: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let keyword = part.trim().to_lowercase();
        if keyword.is_empty() || keywords.contains(&keyword) {
            continue;
        }
        if keyword.chars().count() > MAX_KEYWORD_CHARS {
            return Err(format!(
                "Keyword must be at most {} characters",
                MAX_KEYWORD_CHARS
            ));
        }
        keywords.push(keyword);
    }
    if keywords.len() > MAX_KEYWORD_COUNT {
        return Err(format!(
            "At most {} keywords are allowed",
            MAX_KEYWORD_COUNT
        ));
    }
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_id_parses_trimmed_numbers() {
        assert_eq!(" 12 ".parse::<PageId>().unwrap(), PageId(12));
        assert!("".parse::<PageId>().is_err());
        assert!("abc".parse::<PageId>().is_err());
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("LIVE".parse::<PageStatus>().unwrap(), PageStatus::Live);
        assert_eq!("draft".parse::<PageStatus>().unwrap(), PageStatus::Draft);
        assert!("archived".parse::<PageStatus>().is_err());
    }

    #[test]
    fn validate_title_trims_and_rejects_empty() {
        assert_eq!(validate_title("  About  ").unwrap(), "About");
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_CHARS + 1)).is_err());
    }

    #[test]
    fn keywords_are_lowercased_and_deduplicated() {
        let keywords = normalize_keywords("Rust, CMS, rust,, pages ").unwrap();
        assert_eq!(keywords, vec!["rust", "cms", "pages"]);
    }

    #[test]
    fn status_serializes_lowercase() {
        let yaml = serde_yaml::to_string(&PageStatus::Live).unwrap();
        assert_eq!(yaml.trim(), "live");
    }
}

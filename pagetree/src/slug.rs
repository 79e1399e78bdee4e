// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::errors::{PageError, PageResult};
use crate::page::MAX_TITLE_CHARS;
use std::fmt;

pub const MAX_SLUG_CHARS: usize = 128;
pub const SLUG_SEPARATOR: &str = "-";
pub const TITLE_SEPARATOR: &str = " ";
pub const FIRST_SUFFIX: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    Empty,
    TooLong,
    ContainsControl,
    ContainsSeparator,
    ContainsDotSegment,
    ContainsInvalidCharacter,
}

impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlugError::Empty => write!(f, "slug must not be empty"),
            SlugError::TooLong => write!(f, "slug must be at most {} characters", MAX_SLUG_CHARS),
            SlugError::ContainsControl => write!(f, "slug contains control characters"),
            SlugError::ContainsSeparator => write!(f, "slug must be a single path segment"),
            SlugError::ContainsDotSegment => write!(f, "slug must not be '.' or '..'"),
            SlugError::ContainsInvalidCharacter => {
                write!(f, "slug contains invalid URL characters")
            }
        }
    }
}

impl std::error::Error for SlugError {}

impl From<SlugError> for PageError {
    fn from(err: SlugError) -> Self {
        PageError::validation(format!("Invalid slug: {}", err))
    }
}

/// Answers whether a candidate slug or URI is already in use within some scope.
pub trait UniquenessCheck {
    fn is_taken(&self, candidate: &str) -> bool;
}

impl<F> UniquenessCheck for F
where
    F: Fn(&str) -> bool,
{
    fn is_taken(&self, candidate: &str) -> bool {
        self(candidate)
    }
}

pub fn canonicalize_slug(raw: &str) -> Result<String, SlugError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SlugError::Empty);
    }
    if trimmed.chars().any(|ch| ch.is_control()) {
        return Err(SlugError::ContainsControl);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(SlugError::ContainsSeparator);
    }
    if trimmed == "." || trimmed == ".." {
        return Err(SlugError::ContainsDotSegment);
    }
    if !trimmed.chars().all(is_slug_char) {
        return Err(SlugError::ContainsInvalidCharacter);
    }
    if trimmed.chars().count() > MAX_SLUG_CHARS {
        return Err(SlugError::TooLong);
    }
    Ok(trimmed.to_ascii_lowercase())
}

fn is_slug_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~')
}

/// Derives a slug from a page title, e.g. `"About Us!"` becomes `"about-us"`.
pub fn slugify_title(title: &str) -> Result<String, SlugError> {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        return Err(SlugError::Empty);
    }
    Ok(slug)
}

/// Increments a trailing numeric suffix, or appends `first` when there is none.
///
/// `increment_string("foo", "-", 2)` is `"foo-2"`, `increment_string("foo-2", "-", 2)` is
/// `"foo-3"` and `increment_string("About", " ", 2)` is `"About 2"`.
pub fn increment_string(value: &str, separator: &str, first: u64) -> String {
    if let Some((prefix, suffix)) = value.rsplit_once(separator)
        && !prefix.is_empty()
        && !suffix.is_empty()
        && suffix.chars().all(|ch| ch.is_ascii_digit())
        && let Ok(number) = suffix.parse::<u64>()
        && let Some(next) = number.checked_add(1)
    {
        return format!("{}{}{}", prefix, separator, next);
    }
    format!("{}{}{}", value, separator, first)
}

/// [`increment_string`] capped at `limit` characters. When the suffix would
/// overflow, the base is shortened so the number still fits.
pub fn increment_within(value: &str, separator: &str, first: u64, limit: usize) -> String {
    let next = increment_string(value, separator, first);
    if next.chars().count() <= limit {
        return next;
    }
    let Some((prefix, number)) = next.rsplit_once(separator) else {
        return next.chars().take(limit).collect();
    };
    let room = limit.saturating_sub(separator.chars().count() + number.chars().count());
    let base: String = prefix.chars().take(room).collect();
    let base = base.trim_end_matches(|ch: char| ch == '-' || ch.is_whitespace());
    if base.is_empty() {
        return number.to_string();
    }
    format!("{}{}{}", base, separator, number)
}

/// Returns `candidate` when free, otherwise the first free `-N` increment of it.
pub fn allocate_unique(
    candidate: &str,
    max_attempts: u32,
    check: &dyn UniquenessCheck,
) -> PageResult<String> {
    if !check.is_taken(candidate) {
        return Ok(candidate.to_string());
    }
    let mut current = candidate.to_string();
    for _ in 0..max_attempts {
        current = increment_within(&current, SLUG_SEPARATOR, FIRST_SUFFIX, MAX_SLUG_CHARS);
        if !check.is_taken(&current) {
            return Ok(current);
        }
    }
    Err(PageError::slug_exhausted(candidate, max_attempts))
}

/// Like [`allocate_unique`] but never returns the source value itself.
pub fn allocate_incremented(
    source: &str,
    max_attempts: u32,
    check: &dyn UniquenessCheck,
) -> PageResult<String> {
    if max_attempts == 0 {
        return Err(PageError::slug_exhausted(source, max_attempts));
    }
    let first = increment_within(source, SLUG_SEPARATOR, FIRST_SUFFIX, MAX_SLUG_CHARS);
    allocate_unique(&first, max_attempts.saturating_sub(1), check)
        .map_err(|_| PageError::slug_exhausted(source, max_attempts))
}

pub fn next_title(title: &str) -> String {
    increment_within(title, TITLE_SEPARATOR, FIRST_SUFFIX, MAX_TITLE_CHARS)
}

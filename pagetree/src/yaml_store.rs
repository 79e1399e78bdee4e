// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Whole-file YAML persistence. Writes go to a sibling temp file which is
//! synced and renamed over the target, so a crash leaves either the old or
//! the new document on disk.

use crate::errors::PageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_TEMP_ATTEMPTS: u32 = 100;

#[derive(Debug)]
pub struct YamlStoreError {
    path: PathBuf,
    message: String,
}

impl YamlStoreError {
    fn new(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for YamlStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.path.display())
    }
}

impl Error for YamlStoreError {}

impl From<YamlStoreError> for PageError {
    fn from(err: YamlStoreError) -> Self {
        PageError::storage(err.to_string())
    }
}

/// Reads and decodes `path`. A missing or blank file is `Ok(None)`.
pub fn read_yaml_file<T: DeserializeOwned>(
    path: &Path,
    label: &str,
) -> Result<Option<T>, YamlStoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|err| YamlStoreError::new(path, format!("Failed to read {} file: {}", label, err)))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&content)
        .map(Some)
        .map_err(|err| YamlStoreError::new(path, format!("Failed to parse {} file: {}", label, err)))
}

pub fn write_yaml_file<T: Serialize>(
    path: &Path,
    label: &str,
    value: &T,
) -> Result<(), YamlStoreError> {
    let content = serde_yaml::to_string(value)
        .map_err(|err| YamlStoreError::new(path, format!("Failed to serialize {}: {}", label, err)))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| YamlStoreError::new(path, format!("{} file path has no usable file name", label)))?;
    fs::create_dir_all(&parent).map_err(|err| {
        YamlStoreError::new(path, format!("Failed to create {} directory: {}", label, err))
    })?;

    let (mut file, temp_path) = create_temp_file(path, &parent, file_name, label)?;
    let discard = |message: String| {
        let _ = fs::remove_file(&temp_path);
        YamlStoreError::new(path, message)
    };

    #[cfg(unix)]
    if let Ok(metadata) = fs::metadata(path)
        && let Err(err) = fs::set_permissions(&temp_path, metadata.permissions())
    {
        return Err(discard(format!(
            "Failed to set temp {} file permissions: {}",
            label, err
        )));
    }

    file.write_all(content.as_bytes())
        .map_err(|err| discard(format!("Failed to write {} temp file: {}", label, err)))?;
    file.sync_all()
        .map_err(|err| discard(format!("Failed to sync {} temp file: {}", label, err)))?;
    drop(file);
    fs::rename(&temp_path, path)
        .map_err(|err| discard(format!("Failed to replace {} file: {}", label, err)))?;

    #[cfg(unix)]
    if let Err(err) = fs::File::open(&parent).and_then(|dir| dir.sync_all()) {
        log::warn!("Directory sync after writing {} failed: {}", label, err);
    }

    Ok(())
}

fn create_temp_file(
    path: &Path,
    parent: &Path,
    file_name: &str,
    label: &str,
) -> Result<(fs::File, PathBuf), YamlStoreError> {
    for attempt in 0..MAX_TEMP_ATTEMPTS {
        let temp_path = parent.join(format!(".{}.tmp.{}.{}", file_name, std::process::id(), attempt));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(file) => return Ok((file, temp_path)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(YamlStoreError::new(
                    path,
                    format!("Failed to create temp {} file: {}", label, err),
                ));
            }
        }
    }
    Err(YamlStoreError::new(
        path,
        format!("Failed to create temp {} file after {} attempts", label, MAX_TEMP_ATTEMPTS),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_fixtures::TestFixtureRoot;
    use std::collections::BTreeMap;

    #[test]
    fn missing_and_blank_files_read_as_none() {
        let fixture = TestFixtureRoot::new_unique("yaml-store-missing").unwrap();
        let path = fixture.store_file();
        let missing: Option<BTreeMap<String, u64>> = read_yaml_file(&path, "pages").unwrap();
        assert!(missing.is_none());

        fs::write(&path, "  \n").unwrap();
        let blank: Option<BTreeMap<String, u64>> = read_yaml_file(&path, "pages").unwrap();
        assert!(blank.is_none());
    }

    #[test]
    fn write_creates_parent_and_leaves_no_temp_files() {
        let fixture = TestFixtureRoot::new_unique("yaml-store-write").unwrap();
        let path = fixture.path().join("state").join("pages.yaml");
        let value = BTreeMap::from([("about".to_string(), 2u64)]);
        write_yaml_file(&path, "pages", &value).unwrap();

        let read: BTreeMap<String, u64> = read_yaml_file(&path, "pages").unwrap().unwrap();
        assert_eq!(read, value);
        let leftovers = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let fixture = TestFixtureRoot::new_unique("yaml-store-parse").unwrap();
        let path = fixture.store_file();
        fs::write(&path, "about: [unterminated").unwrap();
        let err = read_yaml_file::<BTreeMap<String, u64>>(&path, "pages").unwrap_err();
        assert!(err.to_string().contains("Failed to parse pages file"));
        assert_eq!(err.path(), path.as_path());
    }
}

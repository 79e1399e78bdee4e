// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::delete::ChildPolicy;
use crate::permissions::{Capability, RoleTable};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE_NAME: &str = "pagetree.yaml";
pub const MAX_SUFFIX_ATTEMPTS_LIMIT: u32 = 100_000;

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Page store file, relative to the site root unless absolute.
    #[serde(default = "default_store_file")]
    pub file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            file: default_store_file(),
        }
    }
}

pub const DEFAULT_STORE_FILE: &str = "pages.yaml";

fn default_store_file() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_FILE)
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TreeConfig {
    #[serde(default = "default_max_suffix_attempts")]
    pub max_suffix_attempts: u32,
    #[serde(default)]
    pub delete_children: ChildPolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_suffix_attempts: default_max_suffix_attempts(),
            delete_children: ChildPolicy::default(),
        }
    }
}

fn default_max_suffix_attempts() -> u32 {
    1000
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<Capability>>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub store_file: PathBuf,
    pub max_suffix_attempts: u32,
    pub delete_children: ChildPolicy,
    pub log_level: LevelFilter,
    pub roles: RoleTable,
}

impl ValidatedConfig {
    /// Defaults for embedding and tests, with the store file under `root`.
    pub fn defaults_at(root: &Path) -> Self {
        let config = Config::default();
        Self {
            store_file: root.join(&config.store.file),
            max_suffix_attempts: config.tree.max_suffix_attempts,
            delete_children: config.tree.delete_children,
            log_level: LevelFilter::Info,
            roles: RoleTable::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join(CONFIG_FILE_NAME);
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        if config_content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&config_content).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to parse config file '{}': {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Like [`Config::load`], but a missing file means all defaults.
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        if !root.join(CONFIG_FILE_NAME).exists() {
            warn!(
                "No {} in {}; using default configuration",
                CONFIG_FILE_NAME,
                root.display()
            );
            return Ok(Config::default());
        }
        Self::load(root)
    }

    /// Loads and validates the configuration. Callers should refuse to run on error.
    pub fn load_and_validate(root: &Path) -> Result<ValidatedConfig, ConfigError> {
        Self::load_or_default(root)?.validate(root)
    }

    pub fn validate(self, root: &Path) -> Result<ValidatedConfig, ConfigError> {
        Self::validate_tree(&self.tree)?;
        let log_level = Self::validate_logging(&self.logging)?;
        let roles = RoleTable::from_config(&self.permissions.roles).map_err(|err| {
            ConfigError::ValidationError(format!("Invalid permissions.roles: {}", err))
        })?;
        if self.store.file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.file cannot be empty".to_string(),
            ));
        }
        let store_file = if self.store.file.is_absolute() {
            self.store.file.clone()
        } else {
            root.join(&self.store.file)
        };

        Ok(ValidatedConfig {
            store_file,
            max_suffix_attempts: self.tree.max_suffix_attempts,
            delete_children: self.tree.delete_children,
            log_level,
            roles,
        })
    }

    fn validate_tree(tree: &TreeConfig) -> Result<(), ConfigError> {
        if !(1..=MAX_SUFFIX_ATTEMPTS_LIMIT).contains(&tree.max_suffix_attempts) {
            return Err(ConfigError::ValidationError(format!(
                "tree.max_suffix_attempts must be between 1 and {}, got: {}",
                MAX_SUFFIX_ATTEMPTS_LIMIT, tree.max_suffix_attempts
            )));
        }
        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(logging.level.trim()).map_err(|_| {
            ConfigError::ValidationError(format!(
                "logging.level must be one of off, error, warn, info, debug, trace; got: {}",
                logging.level
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Actor;
    use crate::permissions::PermissionGate;
    use crate::util::test_fixtures::TestFixtureRoot;

    #[test]
    fn missing_file_yields_defaults() {
        let fixture = TestFixtureRoot::new_unique("config-missing").unwrap();
        let validated = Config::load_and_validate(fixture.path()).unwrap();
        assert_eq!(validated.max_suffix_attempts, 1000);
        assert_eq!(validated.delete_children, ChildPolicy::Cascade);
        assert_eq!(validated.store_file, fixture.store_file());
        assert_eq!(validated.log_level, LevelFilter::Info);
    }

    #[test]
    fn load_reads_all_sections() {
        let fixture = TestFixtureRoot::new_unique("config-full").unwrap();
        fs::write(
            fixture.path().join(CONFIG_FILE_NAME),
            "store:\n  file: data/site-pages.yaml\n\
             tree:\n  max_suffix_attempts: 50\n  delete_children: reparent\n\
             logging:\n  level: debug\n\
             permissions:\n  roles:\n    editor: [edit_live]\n",
        )
        .unwrap();
        let validated = Config::load_and_validate(fixture.path()).unwrap();
        assert_eq!(validated.max_suffix_attempts, 50);
        assert_eq!(validated.delete_children, ChildPolicy::Reparent);
        assert_eq!(validated.log_level, LevelFilter::Debug);
        assert_eq!(
            validated.store_file,
            fixture.path().join("data").join("site-pages.yaml")
        );
        let editor = Actor::new("e", vec!["editor".to_string()]);
        assert!(validated.roles.allows(&editor, Capability::EditLive));
        assert!(!validated.roles.allows(&editor, Capability::PutLive));
    }

    #[test]
    fn validation_rejects_out_of_range_attempts() {
        let mut config = Config::default();
        config.tree.max_suffix_attempts = 0;
        let err = config.validate(Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("max_suffix_attempts"));
    }

    #[test]
    fn validation_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate(Path::new("/tmp")).is_err());
    }

    #[test]
    fn unknown_capability_fails_to_load() {
        let fixture = TestFixtureRoot::new_unique("config-capability").unwrap();
        fs::write(
            fixture.path().join(CONFIG_FILE_NAME),
            "permissions:\n  roles:\n    editor: [fly]\n",
        )
        .unwrap();
        let err = Config::load(fixture.path()).unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}

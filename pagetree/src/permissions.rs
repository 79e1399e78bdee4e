// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::context::Actor;
use crate::errors::{PageError, PageResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

pub const ADMIN_ROLE: &str = "admin";
pub const MAX_ROLE_COUNT: usize = 64;
pub const MAX_ROLE_CHARS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Publish a page as live.
    PutLive,
    /// Edit any page.
    EditLive,
    DeleteLive,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::PutLive,
        Capability::EditLive,
        Capability::DeleteLive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::PutLive => "put_live",
            Capability::EditLive => "edit_live",
            Capability::DeleteLive => "delete_live",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "put_live" => Ok(Capability::PutLive),
            "edit_live" => Ok(Capability::EditLive),
            "delete_live" => Ok(Capability::DeleteLive),
            other => Err(format!("Unknown capability '{}'", other)),
        }
    }
}

pub trait PermissionGate: Send + Sync {
    fn allows(&self, actor: &Actor, capability: Capability) -> bool;

    fn require(&self, actor: &Actor, capability: Capability) -> PageResult<()> {
        if self.allows(actor, capability) {
            Ok(())
        } else {
            Err(PageError::permission_denied(format!(
                "Actor '{}' lacks the '{}' permission",
                actor.id, capability
            )))
        }
    }
}

#[derive(Debug)]
pub struct RoleValidationError {
    message: String,
}

impl RoleValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RoleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for RoleValidationError {}

pub fn normalize_role(role: &str) -> Result<String, RoleValidationError> {
    let trimmed = role.trim();
    if trimmed.is_empty() {
        return Err(RoleValidationError::new("Role is required"));
    }
    if trimmed.chars().count() > MAX_ROLE_CHARS {
        return Err(RoleValidationError::new(format!(
            "Role must be at most {} characters",
            MAX_ROLE_CHARS
        )));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(RoleValidationError::new(format!(
            "Role '{}' contains invalid characters",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Role to capability grants. The admin role holds every capability
/// whether or not it is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable {
    grants: BTreeMap<String, BTreeSet<Capability>>,
}

impl RoleTable {
    pub fn from_config(
        roles: &BTreeMap<String, Vec<Capability>>,
    ) -> Result<Self, RoleValidationError> {
        if roles.len() > MAX_ROLE_COUNT {
            return Err(RoleValidationError::new(format!(
                "Roles must be at most {} entries",
                MAX_ROLE_COUNT
            )));
        }
        let mut grants = BTreeMap::new();
        for (role, capabilities) in roles {
            let role = normalize_role(role)?;
            grants.insert(role, capabilities.iter().copied().collect());
        }
        Ok(Self { grants })
    }

    pub fn grant(&mut self, role: &str, capability: Capability) -> Result<(), RoleValidationError> {
        let role = normalize_role(role)?;
        self.grants.entry(role).or_default().insert(capability);
        Ok(())
    }

    pub fn capabilities_of(&self, role: &str) -> BTreeSet<Capability> {
        if role == ADMIN_ROLE {
            return Capability::ALL.into_iter().collect();
        }
        self.grants.get(role).cloned().unwrap_or_default()
    }
}

impl PermissionGate for RoleTable {
    fn allows(&self, actor: &Actor, capability: Capability) -> bool {
        actor
            .roles
            .iter()
            .any(|role| self.capabilities_of(role).contains(&capability))
    }
}

/// Grants everything; for embedding applications that check permissions
/// before calling in.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn allows(&self, _actor: &Actor, _capability: Capability) -> bool {
        true
    }
}

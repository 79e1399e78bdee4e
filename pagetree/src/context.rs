// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: String,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|candidate| candidate == role)
    }
}

/// Who is asking, passed explicitly into every service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub actor: Actor,
}

impl RequestContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            actor,
        }
    }

    /// Short form of the request id for log lines.
    pub fn short_id(&self) -> String {
        self.request_id.simple().to_string()[..8].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_context_gets_its_own_request_id() {
        let actor = Actor::new("alice", vec!["editor".to_string()]);
        let first = RequestContext::new(actor.clone());
        let second = RequestContext::new(actor);
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(first.short_id().len(), 8);
        assert!(first.actor.has_role("editor"));
    }
}

//! Audit trail for authorization-affecting changes.
//!
//! Every mutating operation appends an entry: role-level binds, override
//! add/remove, node requirement changes, auto-configuration runs, and guild
//! resets. Entries are append-only and never mutated or deleted by normal
//! operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// The kind of change an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A role was bound to a permission level
    BindRoleLevel,
    /// A role's level binding was removed
    UnbindRole,
    /// A permission override was created
    AddOverride,
    /// A permission override was removed
    RemoveOverride,
    /// A guild-level node requirement was set
    SetNodeRequirement,
    /// A guild-level node requirement was cleared
    ClearNodeRequirement,
    /// An auto-configuration run completed
    AutoConfigure,
    /// A guild's permission configuration was reset
    ResetGuild,
}

impl AuditAction {
    /// Returns the action name used in stored entries.
    #[must_use]
    pub const fn action_name(self) -> &'static str {
        match self {
            Self::BindRoleLevel => "bind_role_level",
            Self::UnbindRole => "unbind_role",
            Self::AddOverride => "add_override",
            Self::RemoveOverride => "remove_override",
            Self::SetNodeRequirement => "set_node_requirement",
            Self::ClearNodeRequirement => "clear_node_requirement",
            Self::AutoConfigure => "auto_configure",
            Self::ResetGuild => "reset_guild",
        }
    }

    /// Returns all actions as a slice.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::BindRoleLevel,
            Self::UnbindRole,
            Self::AddOverride,
            Self::RemoveOverride,
            Self::SetNodeRequirement,
            Self::ClearNodeRequirement,
            Self::AutoConfigure,
            Self::ResetGuild,
        ]
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action_name())
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub guild_id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    /// What the action targeted: a role id, override description, node
    /// name, or the guild itself.
    pub subject: String,
    /// State before the change, when meaningful.
    pub before: Option<JsonValue>,
    /// State after the change, when meaningful.
    pub after: Option<JsonValue>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(
        guild_id: Uuid,
        actor_id: Uuid,
        action: AuditAction,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            guild_id,
            actor_id,
            action,
            subject: subject.into(),
            before: None,
            after: None,
            reason: None,
            created_at: Utc::now(),
        }
    }

    /// Attach before-state.
    #[must_use]
    pub fn with_before(mut self, before: JsonValue) -> Self {
        self.before = Some(before);
        self
    }

    /// Attach after-state.
    #[must_use]
    pub fn with_after(mut self, after: JsonValue) -> Self {
        self.after = Some(after);
        self
    }

    /// Attach a reason supplied by the acting user.
    #[must_use]
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

//! Core data types shared across the permission system.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::level::PermissionLevel;

bitflags! {
    /// Platform capability flags carried by a role, as observed in the
    /// guild's own permission configuration.
    ///
    /// These are inputs to classification only; the engine never grants or
    /// revokes platform capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct RoleCapabilities: u32 {
        // === Administrative ===
        /// Full administrative access to the guild
        const ADMINISTRATOR     = 1 << 0;
        /// Permission to modify guild settings
        const MANAGE_GUILD      = 1 << 1;
        /// Permission to create, edit, and delete roles
        const MANAGE_ROLES      = 1 << 2;
        /// Permission to create, edit, and delete channels
        const MANAGE_CHANNELS   = 1 << 3;

        // === Moderation ===
        /// Permission to kick members from the guild
        const KICK_MEMBERS      = 1 << 4;
        /// Permission to ban members from the guild
        const BAN_MEMBERS       = 1 << 5;
        /// Permission to timeout members (temporary mute)
        const TIMEOUT_MEMBERS   = 1 << 6;
        /// Permission to delete messages from other members
        const MANAGE_MESSAGES   = 1 << 7;
        /// Permission to change other members' nicknames
        const MANAGE_NICKNAMES  = 1 << 8;
        /// Permission to mute members in voice channels
        const MUTE_MEMBERS      = 1 << 9;
        /// Permission to move members between voice channels
        const MOVE_MEMBERS      = 1 << 10;

        // === Trusted member ===
        /// Permission to create threads
        const CREATE_THREADS    = 1 << 11;
        /// Permission to use emoji from other guilds
        const EXTERNAL_EMOJI    = 1 << 12;
        /// Permission to attach files to messages
        const ATTACH_FILES      = 1 << 13;
        /// Permission to embed links in messages
        const EMBED_LINKS       = 1 << 14;
    }
}

impl RoleCapabilities {
    /// Capabilities that indicate administrative authority.
    pub const ADMINISTRATIVE: Self = Self::ADMINISTRATOR
        .union(Self::MANAGE_GUILD)
        .union(Self::MANAGE_ROLES)
        .union(Self::MANAGE_CHANNELS);

    /// Capabilities that indicate moderation authority.
    pub const MODERATION: Self = Self::KICK_MEMBERS
        .union(Self::BAN_MEMBERS)
        .union(Self::TIMEOUT_MEMBERS)
        .union(Self::MANAGE_MESSAGES)
        .union(Self::MANAGE_NICKNAMES)
        .union(Self::MUTE_MEMBERS)
        .union(Self::MOVE_MEMBERS);

    /// Capabilities typically granted to trusted members but carrying no
    /// authority over other members.
    pub const TRUSTED: Self = Self::CREATE_THREADS
        .union(Self::EXTERNAL_EMOJI)
        .union(Self::ATTACH_FILES)
        .union(Self::EMBED_LINKS);

    /// Whether any administrative capability is present.
    #[must_use]
    pub const fn is_administrative(self) -> bool {
        self.intersects(Self::ADMINISTRATIVE)
    }

    /// Whether any moderation capability is present.
    #[must_use]
    pub const fn is_moderation(self) -> bool {
        self.intersects(Self::MODERATION)
    }

    /// Whether the role carries only trusted-member capabilities (or none).
    #[must_use]
    pub const fn is_cosmetic_only(self) -> bool {
        !self.intersects(Self::ADMINISTRATIVE.union(Self::MODERATION))
    }
}

/// Point-in-time view of one role in a guild, passed to the classifier.
///
/// Snapshots are supplied by the dispatch layer; the engine never fetches
/// platform state itself. `position` follows the platform convention of
/// lower number = higher rank (position 0 is the top of the role list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSnapshot {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
    pub capabilities: RoleCapabilities,
    pub member_count: u32,
    /// Managed by a platform integration (premium subscriptions, external
    /// services); never bound to a level.
    pub managed_by_integration: bool,
    /// Owned by a bot account rather than created by guild staff.
    pub bot_owned: bool,
}

impl RoleSnapshot {
    /// Convenience constructor for a plain role with no capabilities.
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, position: i32) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            capabilities: RoleCapabilities::empty(),
            member_count: 0,
            managed_by_integration: false,
            bot_owned: false,
        }
    }
}

/// The acting user being authorized: identity plus currently held roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role_ids: Vec<Uuid>,
}

impl Principal {
    #[must_use]
    pub fn new(user_id: Uuid, role_ids: Vec<Uuid>) -> Self {
        Self { user_id, role_ids }
    }

    /// A principal holding no roles.
    #[must_use]
    pub fn roleless(user_id: Uuid) -> Self {
        Self {
            user_id,
            role_ids: Vec::new(),
        }
    }
}

/// A (guild, role) → level assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub guild_id: Uuid,
    pub role_id: Uuid,
    pub level: PermissionLevel,
    pub bound_by: Option<Uuid>,
    pub bound_at: DateTime<Utc>,
}

/// Per-guild override of the required level for one permission node.
///
/// Consulted before the registry default during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRequirement {
    pub guild_id: Uuid,
    pub node: String,
    pub level: PermissionLevel,
    pub set_by: Option<Uuid>,
    pub set_at: DateTime<Utc>,
}

/// Per-guild configuration metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfigMeta {
    pub guild_id: Uuid,
    pub auto_configured: bool,
    pub configured_by: Option<Uuid>,
    pub configured_at: Option<DateTime<Utc>>,
}

impl GuildConfigMeta {
    /// Metadata for a guild that has never been configured.
    #[must_use]
    pub const fn unconfigured(guild_id: Uuid) -> Self {
        Self {
            guild_id,
            auto_configured: false,
            configured_by: None,
            configured_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_administrative_detection() {
        assert!(RoleCapabilities::ADMINISTRATOR.is_administrative());
        assert!(RoleCapabilities::MANAGE_ROLES.is_administrative());
        assert!(!RoleCapabilities::KICK_MEMBERS.is_administrative());
        assert!(!RoleCapabilities::empty().is_administrative());
    }

    #[test]
    fn test_moderation_detection() {
        assert!(RoleCapabilities::KICK_MEMBERS.is_moderation());
        assert!(RoleCapabilities::BAN_MEMBERS.is_moderation());
        assert!(RoleCapabilities::TIMEOUT_MEMBERS.is_moderation());
        assert!(!RoleCapabilities::ATTACH_FILES.is_moderation());
    }

    #[test]
    fn test_cosmetic_only() {
        assert!(RoleCapabilities::empty().is_cosmetic_only());
        assert!(RoleCapabilities::TRUSTED.is_cosmetic_only());
        assert!(!(RoleCapabilities::TRUSTED | RoleCapabilities::KICK_MEMBERS).is_cosmetic_only());
        assert!(!RoleCapabilities::ADMINISTRATOR.is_cosmetic_only());
    }

    #[test]
    fn test_capabilities_serde_transparent() {
        let caps = RoleCapabilities::KICK_MEMBERS | RoleCapabilities::BAN_MEMBERS;
        let json = serde_json::to_string(&caps).unwrap();
        let restored: RoleCapabilities = serde_json::from_str(&json).unwrap();
        assert_eq!(caps, restored);
    }

    #[test]
    fn test_role_snapshot_new_defaults() {
        let id = Uuid::new_v4();
        let snapshot = RoleSnapshot::new(id, "Helper", 3);
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.name, "Helper");
        assert_eq!(snapshot.position, 3);
        assert!(snapshot.capabilities.is_empty());
        assert!(!snapshot.managed_by_integration);
        assert!(!snapshot.bot_owned);
    }

    #[test]
    fn test_principal_roleless() {
        let principal = Principal::roleless(Uuid::new_v4());
        assert!(principal.role_ids.is_empty());
    }

    #[test]
    fn test_unconfigured_meta() {
        let guild_id = Uuid::new_v4();
        let meta = GuildConfigMeta::unconfigured(guild_id);
        assert_eq!(meta.guild_id, guild_id);
        assert!(!meta.auto_configured);
        assert!(meta.configured_by.is_none());
        assert!(meta.configured_at.is_none());
    }
}

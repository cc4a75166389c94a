//! Permission level hierarchy.
//!
//! A fixed, totally ordered scale of authority levels. All other modules
//! compare levels through this type rather than hard-coding numeric
//! thresholds, so the scale can change without touching resolution logic.

use serde::{Deserialize, Serialize};

/// Universal permission level on a fixed numeric hierarchy.
///
/// Levels apply across all guilds regardless of local role names. The
/// numeric spacing leaves room for future tiers without renumbering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Explicitly banned from using any command
    Banned,
    /// Default level, no special roles needed
    Everyone,
    /// Verified/trusted members, VIPs, supporters
    Member,
    /// Basic moderation (warn, mute, kick)
    Moderator,
    /// Senior/lead moderators (advanced moderation)
    LeadMod,
    /// Basic administration
    Admin,
    /// Senior/lead administrators (advanced admin)
    LeadAdmin,
    /// Full guild authority
    Owner,
    /// Bot administrators (cross-guild)
    BotAdmin,
    /// Bot owner (highest level)
    BotOwner,
}

impl PermissionLevel {
    /// Returns the numeric value backing this level.
    ///
    /// Comparisons via `Ord` agree with these values; the numbers exist for
    /// storage and display, not for arithmetic elsewhere in the crate.
    #[must_use]
    pub const fn value(self) -> i16 {
        match self {
            Self::Banned => -1,
            Self::Everyone => 0,
            Self::Member => 10,
            Self::Moderator => 50,
            Self::LeadMod => 65,
            Self::Admin => 80,
            Self::LeadAdmin => 90,
            Self::Owner => 100,
            Self::BotAdmin => 150,
            Self::BotOwner => 200,
        }
    }

    /// Look up a level by its numeric value.
    #[must_use]
    pub const fn from_value(value: i16) -> Option<Self> {
        match value {
            -1 => Some(Self::Banned),
            0 => Some(Self::Everyone),
            10 => Some(Self::Member),
            50 => Some(Self::Moderator),
            65 => Some(Self::LeadMod),
            80 => Some(Self::Admin),
            90 => Some(Self::LeadAdmin),
            100 => Some(Self::Owner),
            150 => Some(Self::BotAdmin),
            200 => Some(Self::BotOwner),
            _ => None,
        }
    }

    /// Whether this level meets or exceeds `threshold`.
    #[must_use]
    pub fn at_least(self, threshold: Self) -> bool {
        self >= threshold
    }

    /// Returns the snake_case name used in audit entries and serialization.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Banned => "banned",
            Self::Everyone => "everyone",
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::LeadMod => "lead_mod",
            Self::Admin => "admin",
            Self::LeadAdmin => "lead_admin",
            Self::Owner => "owner",
            Self::BotAdmin => "bot_admin",
            Self::BotOwner => "bot_owner",
        }
    }

    /// Returns all levels in ascending order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Banned,
            Self::Everyone,
            Self::Member,
            Self::Moderator,
            Self::LeadMod,
            Self::Admin,
            Self::LeadAdmin,
            Self::Owner,
            Self::BotAdmin,
            Self::BotOwner,
        ]
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

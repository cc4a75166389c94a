//! Scoped, time-bounded permission overrides.
//!
//! An override grants or denies one node for one user or role, at global,
//! guild, or channel scope, optionally until an expiry instant. Expiry is
//! lazy: an expired override is treated as absent at read time whether or
//! not it has been purged from storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PermissionError;
use crate::registry::PermissionRegistry;

/// Who an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OverrideTarget {
    User(Uuid),
    Role(Uuid),
}

impl std::fmt::Display for OverrideTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Role(id) => write!(f, "role:{id}"),
        }
    }
}

/// Where an override applies.
///
/// Variants are ordered from least to most specific; resolution scans
/// candidates most-specific-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OverrideScope {
    Global,
    Guild(Uuid),
    Channel(Uuid),
}

impl OverrideScope {
    /// Specificity rank; higher wins during resolution.
    #[must_use]
    pub const fn specificity(self) -> u8 {
        match self {
            Self::Global => 0,
            Self::Guild(_) => 1,
            Self::Channel(_) => 2,
        }
    }

    /// Candidate scopes for a resolution context, most specific first.
    #[must_use]
    pub fn candidates(guild_id: Uuid, channel_id: Option<Uuid>) -> Vec<Self> {
        let mut scopes = Vec::with_capacity(3);
        if let Some(channel_id) = channel_id {
            scopes.push(Self::Channel(channel_id));
        }
        scopes.push(Self::Guild(guild_id));
        scopes.push(Self::Global);
        scopes
    }
}

/// A grant/deny record for (target, node, scope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    pub id: Uuid,
    /// Owning guild; global-scoped overrides are still stored under the
    /// guild whose staff created them.
    pub guild_id: Uuid,
    pub target: OverrideTarget,
    pub node: String,
    /// `true` grants the node, `false` denies it.
    pub granted: bool,
    pub scope: OverrideScope,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for OverrideScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Guild(id) => write!(f, "guild:{id}"),
            Self::Channel(id) => write!(f, "channel:{id}"),
        }
    }
}

impl PermissionOverride {
    /// Build an override with a fresh id, stamped now, no expiry.
    #[must_use]
    pub fn new(
        guild_id: Uuid,
        target: OverrideTarget,
        node: impl Into<String>,
        granted: bool,
        scope: OverrideScope,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            guild_id,
            target,
            node: node.into(),
            granted,
            scope,
            expires_at: None,
            reason: None,
            created_by,
            created_at: Utc::now(),
        }
    }

    /// Attach an expiry instant.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Attach a reason supplied by the acting user.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether this override has lapsed as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// Validate an override at creation time.
    ///
    /// Checks that the node is registered, that a guild-scoped override
    /// names its owning guild, and that any expiry lies strictly in the
    /// future.
    pub fn validate(
        &self,
        registry: &PermissionRegistry,
        now: DateTime<Utc>,
    ) -> Result<(), PermissionError> {
        if !registry.contains(&self.node) {
            return Err(PermissionError::UnknownNode(self.node.clone()));
        }

        if let OverrideScope::Guild(scope_guild) = self.scope {
            if scope_guild != self.guild_id {
                return Err(PermissionError::InvalidOverride(format!(
                    "guild scope {scope_guild} does not match owning guild {}",
                    self.guild_id
                )));
            }
        }

        if let Some(expiry) = self.expires_at {
            if expiry <= now {
                return Err(PermissionError::InvalidOverride(format!(
                    "expiry {expiry} is not in the future"
                )));
            }
        }

        Ok(())
    }
}

/// Resolve the effective override for a single target.
///
/// Scans `scopes` in the given order (callers pass most-specific-first via
/// [`OverrideScope::candidates`]); within one scope the most recently
/// created non-expired match wins. Returns `None` when nothing applies.
#[must_use]
pub fn resolve_for_target<'a>(
    overrides: &'a [PermissionOverride],
    target: OverrideTarget,
    node: &str,
    scopes: &[OverrideScope],
    now: DateTime<Utc>,
) -> Option<&'a PermissionOverride> {
    for scope in scopes {
        let winner = overrides
            .iter()
            .filter(|ov| {
                ov.target == target && ov.node == node && ov.scope == *scope && !ov.is_expired(now)
            })
            .max_by_key(|ov| ov.created_at);
        if winner.is_some() {
            return winner;
        }
    }
    None
}

/// Resolve the effective grant across role-targeted overrides.
///
/// At the most specific scope where any held role has a match, all matching
/// overrides must agree to grant; a single deny wins (fail-safe default).
/// Returns `None` when no held role has an applicable override.
#[must_use]
pub fn resolve_for_roles(
    overrides: &[PermissionOverride],
    role_ids: &[Uuid],
    node: &str,
    scopes: &[OverrideScope],
    now: DateTime<Utc>,
) -> Option<bool> {
    for scope in scopes {
        let mut any = false;
        let mut all_granted = true;

        for ov in overrides {
            let OverrideTarget::Role(role_id) = ov.target else {
                continue;
            };
            if ov.node == node
                && ov.scope == *scope
                && !ov.is_expired(now)
                && role_ids.contains(&role_id)
            {
                any = true;
                all_granted &= ov.granted;
            }
        }

        if any {
            return Some(all_granted);
        }
    }
    None
}

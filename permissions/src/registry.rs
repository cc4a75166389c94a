//! Process-wide permission node registry.
//!
//! Maps dotted node names (e.g. `moderation.kick`) to a default required
//! level and description. Read-mostly after startup; registration is
//! idempotent for identical definitions so components can re-register their
//! nodes on every boot.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PermissionError;
use crate::level::PermissionLevel;

/// A permission node: one guarded action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionNode {
    /// Dotted node name, e.g. `moderation.kick`.
    pub name: String,
    /// Level required when no guild requirement or override applies.
    pub default_level: PermissionLevel,
    /// Human-readable description for configuration surfaces.
    pub description: String,
}

impl PermissionNode {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        default_level: PermissionLevel,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            default_level,
            description: description.into(),
        }
    }
}

/// Thread-safe registry of permission nodes.
///
/// Unknown nodes are an error on lookup; callers treat that error as denial
/// to avoid silent privilege grants.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    nodes: DashMap<String, PermissionNode>,
}

impl PermissionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the stock node set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Register a node.
    ///
    /// Re-registering an identical definition is a no-op; a conflicting
    /// definition is rejected with [`PermissionError::DuplicateNode`].
    pub fn register(&self, node: PermissionNode) -> Result<(), PermissionError> {
        if let Some(existing) = self.nodes.get(&node.name) {
            if *existing == node {
                return Ok(());
            }
            return Err(PermissionError::DuplicateNode(node.name));
        }

        debug!(node = %node.name, level = %node.default_level, "registered permission node");
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    /// Look up a node by name.
    pub fn lookup(&self, name: &str) -> Result<PermissionNode, PermissionError> {
        self.nodes
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| PermissionError::UnknownNode(name.to_string()))
    }

    /// Whether a node is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// All registered nodes, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<PermissionNode> {
        let mut nodes: Vec<_> = self.nodes.iter().map(|entry| entry.clone()).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Register the stock node set shared by all bot deployments.
    ///
    /// Safe to call repeatedly; the stock definitions never conflict with
    /// themselves.
    pub fn register_defaults(&self) {
        use PermissionLevel as L;

        let defaults = [
            // Basic commands, available to anyone
            ("basic.ping", L::Everyone, "Use the ping command"),
            ("basic.info", L::Everyone, "View bot information"),
            ("basic.help", L::Everyone, "View the help system"),
            ("basic.avatar", L::Everyone, "View user avatars"),
            ("basic.uptime", L::Everyone, "View bot uptime"),
            // Utility commands for trusted members
            ("utility.userinfo", L::Member, "View user information"),
            ("utility.serverinfo", L::Member, "View guild information"),
            ("utility.roleinfo", L::Member, "View role information"),
            // Basic moderation
            ("moderation.warn", L::Moderator, "Warn members"),
            ("moderation.mute", L::Moderator, "Mute members"),
            ("moderation.kick", L::Moderator, "Kick members"),
            ("moderation.ban", L::Moderator, "Ban members"),
            // Advanced moderation
            ("moderation.mass_ban", L::LeadMod, "Mass ban members"),
            ("moderation.lockdown", L::LeadMod, "Lock down channels"),
            ("moderation.purge", L::LeadMod, "Purge messages"),
            // Basic administration
            ("admin.settings", L::Admin, "Modify bot settings"),
            ("admin.permissions", L::Admin, "View permission configuration"),
            ("admin.reload", L::Admin, "Reload bot components"),
            // Advanced administration
            ("admin.server_config", L::LeadAdmin, "Configure guild settings"),
            ("admin.audit_logs", L::LeadAdmin, "View audit logs"),
            (
                "admin.permission_management",
                L::LeadAdmin,
                "Manage the permission system",
            ),
            // Owner commands
            ("owner.shutdown", L::Owner, "Shut down the bot"),
            ("owner.eval", L::BotOwner, "Execute code"),
        ];

        for (name, level, description) in defaults {
            // Stock definitions are internally consistent; a conflict here
            // means a caller registered one of these names first.
            if let Err(err) = self.register(PermissionNode::new(name, level, description)) {
                tracing::warn!(node = name, %err, "stock node registration skipped");
            }
        }
    }
}

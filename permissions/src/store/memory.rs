//! In-memory store implementation.
//!
//! Backs the engine when no durable store is configured. State is held in
//! per-table `DashMap`s keyed by guild, so operations on different guilds
//! never contend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::level::PermissionLevel;
use crate::models::{GuildConfigMeta, NodeRequirement, RoleBinding};
use crate::overrides::{OverrideScope, OverrideTarget, PermissionOverride};

use super::{PermissionStore, StoreResult};

/// Volatile [`PermissionStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bindings: DashMap<Uuid, HashMap<Uuid, RoleBinding>>,
    requirements: DashMap<Uuid, HashMap<String, NodeRequirement>>,
    overrides: DashMap<Uuid, Vec<PermissionOverride>>,
    meta: DashMap<Uuid, GuildConfigMeta>,
    audit: DashMap<Uuid, Vec<AuditEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn upsert_role_binding(
        &self,
        binding: RoleBinding,
    ) -> StoreResult<Option<PermissionLevel>> {
        let mut guild = self.bindings.entry(binding.guild_id).or_default();
        let previous = guild.insert(binding.role_id, binding).map(|b| b.level);
        Ok(previous)
    }

    async fn remove_role_binding(
        &self,
        guild_id: Uuid,
        role_id: Uuid,
    ) -> StoreResult<Option<PermissionLevel>> {
        let removed = self
            .bindings
            .get_mut(&guild_id)
            .and_then(|mut guild| guild.remove(&role_id))
            .map(|b| b.level);
        Ok(removed)
    }

    async fn list_role_bindings(&self, guild_id: Uuid) -> StoreResult<Vec<RoleBinding>> {
        Ok(self
            .bindings
            .get(&guild_id)
            .map(|guild| guild.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_node_requirement(
        &self,
        requirement: NodeRequirement,
    ) -> StoreResult<Option<PermissionLevel>> {
        let mut guild = self.requirements.entry(requirement.guild_id).or_default();
        let previous = guild
            .insert(requirement.node.clone(), requirement)
            .map(|r| r.level);
        Ok(previous)
    }

    async fn remove_node_requirement(
        &self,
        guild_id: Uuid,
        node: &str,
    ) -> StoreResult<Option<PermissionLevel>> {
        let removed = self
            .requirements
            .get_mut(&guild_id)
            .and_then(|mut guild| guild.remove(node))
            .map(|r| r.level);
        Ok(removed)
    }

    async fn list_node_requirements(&self, guild_id: Uuid) -> StoreResult<Vec<NodeRequirement>> {
        Ok(self
            .requirements
            .get(&guild_id)
            .map(|guild| guild.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_override(&self, ov: PermissionOverride) -> StoreResult<()> {
        self.overrides.entry(ov.guild_id).or_default().push(ov);
        Ok(())
    }

    async fn remove_overrides(
        &self,
        guild_id: Uuid,
        target: OverrideTarget,
        node: &str,
        scope: Option<OverrideScope>,
    ) -> StoreResult<u64> {
        let Some(mut guild) = self.overrides.get_mut(&guild_id) else {
            return Ok(0);
        };

        let before = guild.len();
        guild.retain(|ov| {
            !(ov.target == target
                && ov.node == node
                && scope.is_none_or(|scope| ov.scope == scope))
        });
        Ok((before - guild.len()) as u64)
    }

    async fn list_overrides(&self, guild_id: Uuid) -> StoreResult<Vec<PermissionOverride>> {
        Ok(self
            .overrides
            .get(&guild_id)
            .map(|guild| guild.clone())
            .unwrap_or_default())
    }

    async fn list_active_overrides(
        &self,
        guild_id: Uuid,
        targets: &[OverrideTarget],
        scopes: &[OverrideScope],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PermissionOverride>> {
        Ok(self
            .overrides
            .get(&guild_id)
            .map(|guild| {
                guild
                    .iter()
                    .filter(|ov| {
                        !ov.is_expired(now)
                            && targets.contains(&ov.target)
                            && scopes.contains(&ov.scope)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn purge_expired_overrides(
        &self,
        guild_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let Some(mut guild) = self.overrides.get_mut(&guild_id) else {
            return Ok(0);
        };

        let before = guild.len();
        guild.retain(|ov| !ov.is_expired(now));
        Ok((before - guild.len()) as u64)
    }

    async fn get_guild_meta(&self, guild_id: Uuid) -> StoreResult<Option<GuildConfigMeta>> {
        Ok(self.meta.get(&guild_id).map(|meta| meta.clone()))
    }

    async fn put_guild_meta(&self, meta: GuildConfigMeta) -> StoreResult<()> {
        self.meta.insert(meta.guild_id, meta);
        Ok(())
    }

    async fn append_audit_entry(&self, entry: AuditEntry) -> StoreResult<()> {
        self.audit.entry(entry.guild_id).or_default().push(entry);
        Ok(())
    }

    async fn list_audit_entries(
        &self,
        guild_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<AuditEntry>> {
        Ok(self
            .audit
            .get(&guild_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn reset_guild(&self, guild_id: Uuid) -> StoreResult<()> {
        self.bindings.remove(&guild_id);
        self.requirements.remove(&guild_id);
        self.overrides.remove(&guild_id);
        self.meta.remove(&guild_id);
        // Audit entries are retained: the reset itself is part of history.
        Ok(())
    }
}

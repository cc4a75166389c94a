//! Mutation API: bind/unbind roles, overrides, node requirements,
//! auto-configuration, and guild reset.
//!
//! Every mutation follows the same discipline: take the guild's mutation
//! lock, write through the persistence port, invalidate the guild's cached
//! state, then append an audit entry. Audit writes happen last so a failed
//! audit can never roll back a durable state change.

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEntry};
use crate::classifier::{analyze_roles, RoleClassification};
use crate::error::PermissionError;
use crate::level::PermissionLevel;
use crate::models::{GuildConfigMeta, NodeRequirement, RoleBinding, RoleSnapshot};
use crate::overrides::{OverrideScope, OverrideTarget, PermissionOverride};

use super::PermissionEngine;

/// Why auto-configuration skipped a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Managed by a platform integration
    Integration,
    /// Owned by a bot account
    BotManaged,
    /// Display-only role
    Cosmetic,
    /// Event/temporary role
    Temporary,
    /// Classified for binding but with no usable level suggestion
    NoSuggestion,
}

/// One binding applied by auto-configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedBinding {
    pub role_id: Uuid,
    pub name: String,
    pub level: PermissionLevel,
    pub previous: Option<PermissionLevel>,
}

/// One role skipped by auto-configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRole {
    pub role_id: Uuid,
    pub name: String,
    pub reason: SkipReason,
}

/// Structured result of one auto-configuration run.
#[derive(Debug, Clone, Serialize)]
pub struct AutoConfigureReport {
    pub applied: Vec<AppliedBinding>,
    /// Roles whose existing binding already matched the suggestion.
    pub already_configured: Vec<AppliedBinding>,
    pub skipped: Vec<SkippedRole>,
}

impl AutoConfigureReport {
    /// Counts for summaries and audit entries.
    #[must_use]
    pub fn summary(&self) -> JsonValue {
        json!({
            "applied": self.applied.len(),
            "already_configured": self.already_configured.len(),
            "skipped": self.skipped.len(),
        })
    }
}

impl PermissionEngine {
    /// Bind a role to a permission level.
    #[tracing::instrument(skip(self, reason))]
    pub async fn bind_role_level(
        &self,
        guild_id: Uuid,
        role_id: Uuid,
        level: PermissionLevel,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), PermissionError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let binding = RoleBinding {
            guild_id,
            role_id,
            level,
            bound_by: Some(actor_id),
            bound_at: Utc::now(),
        };
        let previous = self
            .store_call(self.store.upsert_role_binding(binding))
            .await?;
        self.cache.invalidate(guild_id);

        info!(%guild_id, %role_id, %level, "bound role level");
        self.record_audit(
            AuditEntry::new(guild_id, actor_id, AuditAction::BindRoleLevel, format!("role:{role_id}"))
                .with_before(json!({ "level": previous }))
                .with_after(json!({ "level": level }))
                .with_reason(reason),
        )
        .await;

        Ok(())
    }

    /// Remove a role's level binding. Returns whether a binding existed.
    #[tracing::instrument(skip(self, reason))]
    pub async fn unbind_role(
        &self,
        guild_id: Uuid,
        role_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<bool, PermissionError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let removed = self
            .store_call(self.store.remove_role_binding(guild_id, role_id))
            .await?;
        let Some(previous) = removed else {
            return Ok(false);
        };
        self.cache.invalidate(guild_id);

        info!(%guild_id, %role_id, "unbound role level");
        self.record_audit(
            AuditEntry::new(guild_id, actor_id, AuditAction::UnbindRole, format!("role:{role_id}"))
                .with_before(json!({ "level": previous }))
                .with_reason(reason),
        )
        .await;

        Ok(true)
    }

    /// Set the required level for a node in one guild, superseding the
    /// registry default.
    #[tracing::instrument(skip(self))]
    pub async fn set_node_requirement(
        &self,
        guild_id: Uuid,
        node: &str,
        level: PermissionLevel,
        actor_id: Uuid,
    ) -> Result<(), PermissionError> {
        // Unknown nodes cannot be required; surface the same error lookups do.
        self.registry.lookup(node)?;

        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let requirement = NodeRequirement {
            guild_id,
            node: node.to_string(),
            level,
            set_by: Some(actor_id),
            set_at: Utc::now(),
        };
        let previous = self
            .store_call(self.store.upsert_node_requirement(requirement))
            .await?;
        self.cache.invalidate(guild_id);

        info!(%guild_id, node, %level, "set node requirement");
        self.record_audit(
            AuditEntry::new(guild_id, actor_id, AuditAction::SetNodeRequirement, node)
                .with_before(json!({ "level": previous }))
                .with_after(json!({ "level": level })),
        )
        .await;

        Ok(())
    }

    /// Clear a guild's node requirement, restoring the registry default.
    /// Returns whether a requirement existed.
    #[tracing::instrument(skip(self))]
    pub async fn clear_node_requirement(
        &self,
        guild_id: Uuid,
        node: &str,
        actor_id: Uuid,
    ) -> Result<bool, PermissionError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let removed = self
            .store_call(self.store.remove_node_requirement(guild_id, node))
            .await?;
        let Some(previous) = removed else {
            return Ok(false);
        };
        self.cache.invalidate(guild_id);

        self.record_audit(
            AuditEntry::new(guild_id, actor_id, AuditAction::ClearNodeRequirement, node)
                .with_before(json!({ "level": previous })),
        )
        .await;

        Ok(true)
    }

    /// Add a validated override.
    #[tracing::instrument(skip(self, ov), fields(guild = %ov.guild_id, node = %ov.node))]
    pub async fn add_override(&self, ov: PermissionOverride) -> Result<(), PermissionError> {
        ov.validate(&self.registry, Utc::now())?;

        let guild_id = ov.guild_id;
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let actor_id = ov.created_by;
        let subject = format!("{}:{}", ov.target, ov.node);
        let reason = ov.reason.clone();
        let after = serde_json::to_value(&ov).unwrap_or(JsonValue::Null);

        self.store_call(self.store.insert_override(ov)).await?;
        self.cache.invalidate(guild_id);

        info!(%guild_id, %subject, "added override");
        self.record_audit(
            AuditEntry::new(guild_id, actor_id, AuditAction::AddOverride, subject)
                .with_after(after)
                .with_reason(reason),
        )
        .await;

        Ok(())
    }

    /// Add an override that expires `ttl` from now.
    pub async fn add_temporary_override(
        &self,
        mut ov: PermissionOverride,
        ttl: Duration,
    ) -> Result<(), PermissionError> {
        ov.expires_at = Some(Utc::now() + ttl);
        self.add_override(ov).await
    }

    /// Remove overrides for (target, node), optionally narrowed to one
    /// scope. Returns the number removed.
    #[tracing::instrument(skip(self))]
    pub async fn remove_override(
        &self,
        guild_id: Uuid,
        target: OverrideTarget,
        node: &str,
        scope: Option<OverrideScope>,
        actor_id: Uuid,
    ) -> Result<u64, PermissionError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let removed = self
            .store_call(self.store.remove_overrides(guild_id, target, node, scope))
            .await?;
        if removed == 0 {
            return Ok(0);
        }
        self.cache.invalidate(guild_id);

        info!(%guild_id, %target, node, removed, "removed overrides");
        self.record_audit(
            AuditEntry::new(
                guild_id,
                actor_id,
                AuditAction::RemoveOverride,
                format!("{target}:{node}"),
            )
            .with_before(json!({ "removed": removed })),
        )
        .await;

        Ok(removed)
    }

    /// Delete expired override rows.
    ///
    /// Storage hygiene only: resolution already treats expired overrides as
    /// absent, so this never changes observable behavior and is not
    /// audited.
    pub async fn purge_expired_overrides(&self, guild_id: Uuid) -> Result<u64, PermissionError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        self.store_call(self.store.purge_expired_overrides(guild_id, Utc::now()))
            .await
    }

    /// Classify the guild's roles and bind every Authority/Functional role
    /// with a non-trivial suggested level.
    ///
    /// Safe to re-run: an unchanged role set applies nothing, reports
    /// everything as already configured, and appends no per-binding audit
    /// entries. One summary entry records each run.
    #[tracing::instrument(skip(self, roles), fields(roles = roles.len()))]
    pub async fn auto_configure_guild(
        &self,
        guild_id: Uuid,
        roles: &[RoleSnapshot],
        actor_id: Uuid,
    ) -> Result<AutoConfigureReport, PermissionError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let analyses = analyze_roles(self.classifier_limits(), roles);
        let current: std::collections::HashMap<Uuid, PermissionLevel> = self
            .store_call(self.store.list_role_bindings(guild_id))
            .await?
            .into_iter()
            .map(|b| (b.role_id, b.level))
            .collect();

        let mut report = AutoConfigureReport {
            applied: Vec::new(),
            already_configured: Vec::new(),
            skipped: Vec::new(),
        };

        for analysis in analyses {
            let bindable = matches!(
                analysis.classification,
                RoleClassification::Authority | RoleClassification::Functional
            );
            let level = analysis
                .suggested_level
                .filter(|level| *level > PermissionLevel::Everyone);

            let (reason, level) = match (bindable, level) {
                (true, Some(level)) => (None, level),
                (true, None) => (Some(SkipReason::NoSuggestion), PermissionLevel::Everyone),
                (false, _) => {
                    let reason = match analysis.classification {
                        RoleClassification::Integration => SkipReason::Integration,
                        RoleClassification::BotManaged => SkipReason::BotManaged,
                        RoleClassification::Temporary => SkipReason::Temporary,
                        _ => SkipReason::Cosmetic,
                    };
                    (Some(reason), PermissionLevel::Everyone)
                }
            };

            if let Some(reason) = reason {
                report.skipped.push(SkippedRole {
                    role_id: analysis.role_id,
                    name: analysis.name,
                    reason,
                });
                continue;
            }

            let previous = current.get(&analysis.role_id).copied();
            if previous == Some(level) {
                report.already_configured.push(AppliedBinding {
                    role_id: analysis.role_id,
                    name: analysis.name,
                    level,
                    previous,
                });
                continue;
            }

            let binding = RoleBinding {
                guild_id,
                role_id: analysis.role_id,
                level,
                bound_by: Some(actor_id),
                bound_at: Utc::now(),
            };
            self.store_call(self.store.upsert_role_binding(binding))
                .await?;
            self.record_audit(
                AuditEntry::new(
                    guild_id,
                    actor_id,
                    AuditAction::BindRoleLevel,
                    format!("role:{}", analysis.role_id),
                )
                .with_before(json!({ "level": previous }))
                .with_after(json!({ "level": level }))
                .with_reason(Some(analysis.rationale.clone())),
            )
            .await;

            report.applied.push(AppliedBinding {
                role_id: analysis.role_id,
                name: analysis.name,
                level,
                previous,
            });
        }

        self.store_call(self.store.put_guild_meta(GuildConfigMeta {
            guild_id,
            auto_configured: true,
            configured_by: Some(actor_id),
            configured_at: Some(Utc::now()),
        }))
        .await?;
        self.cache.invalidate(guild_id);

        info!(
            %guild_id,
            applied = report.applied.len(),
            already = report.already_configured.len(),
            skipped = report.skipped.len(),
            "auto-configuration complete"
        );
        self.record_audit(
            AuditEntry::new(guild_id, actor_id, AuditAction::AutoConfigure, "guild")
                .with_after(report.summary()),
        )
        .await;

        Ok(report)
    }

    /// Clear a guild's bindings, overrides, and node requirements. Audit
    /// history is retained.
    #[tracing::instrument(skip(self, reason))]
    pub async fn reset_guild(
        &self,
        guild_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), PermissionError> {
        let lock = self.guild_lock(guild_id);
        let _guard = lock.lock().await;

        let bindings = self
            .store_call(self.store.list_role_bindings(guild_id))
            .await?;
        let overrides = self.store_call(self.store.list_overrides(guild_id)).await?;
        let requirements = self
            .store_call(self.store.list_node_requirements(guild_id))
            .await?;

        self.store_call(self.store.reset_guild(guild_id)).await?;
        self.cache.invalidate(guild_id);

        info!(%guild_id, "reset guild permission configuration");
        self.record_audit(
            AuditEntry::new(guild_id, actor_id, AuditAction::ResetGuild, "guild")
                .with_before(json!({
                    "bindings": bindings.len(),
                    "overrides": overrides.len(),
                    "requirements": requirements.len(),
                }))
                .with_reason(reason),
        )
        .await;

        Ok(())
    }
}

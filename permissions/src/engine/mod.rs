//! Permission resolution engine.
//!
//! Combines role bindings, registry defaults, and overrides into
//! authorization decisions, and exposes the companion mutation API (see
//! [`mutations`]). Queries run concurrently against cached per-guild state;
//! mutations are serialized per guild and write through the persistence
//! port.
//!
//! Resolution order for one (principal, node, guild, channel?) query:
//! 1. A user-targeted override (channel → guild → global scope) decides
//!    outright; user overrides always beat role-derived state.
//! 2. A principal whose effective level is `Banned` is denied; role
//!    overrides cannot rescue a banned principal, only step 1 can.
//! 3. Role-targeted overrides for held roles, same scope precedence;
//!    conflicting grants within the deciding scope fail safe to deny.
//! 4. Effective level (max over held role bindings, default `Everyone`)
//!    compared against the required level: the guild's node requirement if
//!    set, else the registry default.

mod cache;
mod mutations;

pub use cache::{CacheStats, GuildState};
pub use mutations::{AppliedBinding, AutoConfigureReport, SkipReason, SkippedRole};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::classifier::ClassifierLimits;
use crate::config::EngineConfig;
use crate::error::PermissionError;
use crate::level::PermissionLevel;
use crate::models::{NodeRequirement, Principal, RoleBinding};
use crate::overrides::{
    resolve_for_roles, resolve_for_target, OverrideScope, OverrideTarget, PermissionOverride,
};
use crate::registry::{PermissionNode, PermissionRegistry};
use crate::store::{MemoryStore, PermissionStore, StoreResult};

use cache::GuildCache;

/// Which input supplied the answer for a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidingFactor {
    /// An explicit user-targeted override
    UserOverride,
    /// An explicit role-targeted override
    RoleOverride,
    /// The principal's effective level is banned
    Banned,
    /// Effective level compared against the required level
    Level,
}

/// Outcome of one permission query. Returned, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub allowed: bool,
    pub effective_level: PermissionLevel,
    pub required_level: PermissionLevel,
    pub deciding_factor: DecidingFactor,
}

/// The authorization engine.
///
/// Cheap to share behind an `Arc`; queries never block each other and
/// mutations only serialize within one guild.
pub struct PermissionEngine {
    config: EngineConfig,
    registry: Arc<PermissionRegistry>,
    store: Arc<dyn PermissionStore>,
    cache: GuildCache,
    guild_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    audit_failures: AtomicU64,
}

impl PermissionEngine {
    /// Create an engine over the given registry and store.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        registry: Arc<PermissionRegistry>,
        store: Arc<dyn PermissionStore>,
    ) -> Self {
        let cache = GuildCache::new(config.cache_ttl);
        Self {
            config,
            registry,
            store,
            cache,
            guild_locks: DashMap::new(),
            audit_failures: AtomicU64::new(0),
        }
    }

    /// Engine with stock nodes and a volatile in-memory store. The usual
    /// starting point for tests and single-process deployments.
    #[must_use]
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            config,
            Arc::new(PermissionRegistry::with_defaults()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// The node registry backing this engine.
    #[must_use]
    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Register a permission node.
    pub fn register_node(
        &self,
        name: impl Into<String>,
        default_level: PermissionLevel,
        description: impl Into<String>,
    ) -> Result<(), PermissionError> {
        self.registry
            .register(PermissionNode::new(name, default_level, description))
    }

    // === Queries ===

    /// Full resolution for one (principal, node, guild, channel?) query.
    #[tracing::instrument(skip(self, principal), fields(user = %principal.user_id))]
    pub async fn check_permission(
        &self,
        principal: &Principal,
        node: &str,
        guild_id: Uuid,
        channel_id: Option<Uuid>,
    ) -> Result<ResolutionResult, PermissionError> {
        let node_def = self.registry.lookup(node)?;
        let state = self.guild_state(guild_id).await?;

        let now = Utc::now();
        let scopes = OverrideScope::candidates(guild_id, channel_id);
        let effective = effective_level(&state, principal);
        let required = state
            .requirements
            .get(node)
            .copied()
            .unwrap_or(node_def.default_level);

        if let Some(ov) = resolve_for_target(
            &state.overrides,
            OverrideTarget::User(principal.user_id),
            node,
            &scopes,
            now,
        ) {
            return Ok(ResolutionResult {
                allowed: ov.granted,
                effective_level: effective,
                required_level: required,
                deciding_factor: DecidingFactor::UserOverride,
            });
        }

        if effective == PermissionLevel::Banned {
            return Ok(ResolutionResult {
                allowed: false,
                effective_level: effective,
                required_level: required,
                deciding_factor: DecidingFactor::Banned,
            });
        }

        if let Some(granted) =
            resolve_for_roles(&state.overrides, &principal.role_ids, node, &scopes, now)
        {
            return Ok(ResolutionResult {
                allowed: granted,
                effective_level: effective,
                required_level: required,
                deciding_factor: DecidingFactor::RoleOverride,
            });
        }

        Ok(ResolutionResult {
            allowed: effective.at_least(required),
            effective_level: effective,
            required_level: required,
            deciding_factor: DecidingFactor::Level,
        })
    }

    /// Boolean form of [`Self::check_permission`].
    ///
    /// Errors (unknown node, store unavailable with a cold cache) must be
    /// treated as denial by callers.
    pub async fn has_permission(
        &self,
        principal: &Principal,
        node: &str,
        guild_id: Uuid,
        channel_id: Option<Uuid>,
    ) -> Result<bool, PermissionError> {
        self.check_permission(principal, node, guild_id, channel_id)
            .await
            .map(|result| result.allowed)
    }

    /// The principal's effective level: the maximum bound level among held
    /// roles, `Everyone` when none are bound.
    #[tracing::instrument(skip(self, principal), fields(user = %principal.user_id))]
    pub async fn user_permission_level(
        &self,
        principal: &Principal,
        guild_id: Uuid,
    ) -> Result<PermissionLevel, PermissionError> {
        let state = self.guild_state(guild_id).await?;
        Ok(effective_level(&state, principal))
    }

    /// All role bindings for a guild.
    pub async fn list_role_bindings(
        &self,
        guild_id: Uuid,
    ) -> Result<Vec<RoleBinding>, PermissionError> {
        self.store_call(self.store.list_role_bindings(guild_id))
            .await
    }

    /// All overrides for a guild, including expired rows not yet purged.
    pub async fn list_overrides(
        &self,
        guild_id: Uuid,
    ) -> Result<Vec<PermissionOverride>, PermissionError> {
        self.store_call(self.store.list_overrides(guild_id)).await
    }

    /// Non-expired overrides that could affect a principal right now,
    /// ordered most specific scope first. Intended for staff review
    /// surfaces.
    pub async fn list_active_overrides_for(
        &self,
        principal: &Principal,
        guild_id: Uuid,
        channel_id: Option<Uuid>,
    ) -> Result<Vec<PermissionOverride>, PermissionError> {
        let mut targets = vec![OverrideTarget::User(principal.user_id)];
        targets.extend(principal.role_ids.iter().copied().map(OverrideTarget::Role));
        let scopes = OverrideScope::candidates(guild_id, channel_id);

        let mut overrides = self
            .store_call(
                self.store
                    .list_active_overrides(guild_id, &targets, &scopes, Utc::now()),
            )
            .await?;
        overrides.sort_by_key(|ov| std::cmp::Reverse(ov.scope.specificity()));
        Ok(overrides)
    }

    /// All node requirements for a guild.
    pub async fn list_node_requirements(
        &self,
        guild_id: Uuid,
    ) -> Result<Vec<NodeRequirement>, PermissionError> {
        self.store_call(self.store.list_node_requirements(guild_id))
            .await
    }

    /// Most recent audit entries for a guild, newest first. `limit` falls
    /// back to the configured default.
    pub async fn list_audit_entries(
        &self,
        guild_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<AuditEntry>, PermissionError> {
        let limit = limit.unwrap_or(self.config.audit_list_limit);
        self.store_call(self.store.list_audit_entries(guild_id, limit))
            .await
    }

    /// Cache read/hit counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of audit writes that failed without failing their mutation.
    #[must_use]
    pub fn audit_failure_count(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    // === Internals ===

    fn classifier_limits(&self) -> ClassifierLimits {
        ClassifierLimits {
            max_deep_analysis: self.config.max_deep_analysis,
            large_guild_threshold: self.config.large_guild_threshold,
        }
    }

    /// Per-guild mutation lock; mutations to different guilds proceed
    /// independently.
    fn guild_lock(&self, guild_id: Uuid) -> Arc<Mutex<()>> {
        self.guild_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run a store call under the configured timeout.
    async fn store_call<T>(
        &self,
        fut: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, PermissionError> {
        match tokio::time::timeout(self.config.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(PermissionError::StoreUnavailable(
                "store call timed out".into(),
            )),
        }
    }

    /// Cached guild state, loading from the store on miss.
    ///
    /// When the store is unavailable, falls back to last-known-good cached
    /// state; with a cold cache the error propagates and callers deny.
    async fn guild_state(&self, guild_id: Uuid) -> Result<Arc<GuildState>, PermissionError> {
        if let Some(state) = self.cache.get_fresh(guild_id) {
            return Ok(state);
        }

        let gen_before = self.cache.begin_load(guild_id);
        match self.load_guild_state(guild_id).await {
            Ok(state) => {
                let state = Arc::new(state);
                self.cache
                    .store_if_current(guild_id, gen_before, Arc::clone(&state));
                Ok(state)
            }
            Err(err) => {
                if let Some(stale) = self.cache.peek_stale(guild_id) {
                    warn!(%guild_id, %err, "store unavailable; serving last-known-good state");
                    return Ok(stale);
                }
                Err(err)
            }
        }
    }

    async fn load_guild_state(&self, guild_id: Uuid) -> Result<GuildState, PermissionError> {
        let bindings = self
            .store_call(self.store.list_role_bindings(guild_id))
            .await?;
        let requirements = self
            .store_call(self.store.list_node_requirements(guild_id))
            .await?;
        let overrides = self.store_call(self.store.list_overrides(guild_id)).await?;
        let meta = self.store_call(self.store.get_guild_meta(guild_id)).await?;

        Ok(GuildState {
            bindings: bindings.into_iter().map(|b| (b.role_id, b.level)).collect(),
            requirements: requirements
                .into_iter()
                .map(|r| (r.node, r.level))
                .collect(),
            overrides,
            meta,
        })
    }

    /// Append an audit entry; failure is reported, never raised.
    ///
    /// The primary state change is already durable by the time this runs,
    /// so an audit-write failure must not fail or roll back the mutation.
    async fn record_audit(&self, entry: AuditEntry) {
        let action = entry.action;
        let guild_id = entry.guild_id;
        match tokio::time::timeout(
            self.config.store_timeout,
            self.store.append_audit_entry(entry),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.audit_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%guild_id, %action, %err, "audit write failed; mutation already durable");
            }
            Err(_) => {
                self.audit_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%guild_id, %action, "audit write timed out; mutation already durable");
            }
        }
    }
}

/// Max bound level across the principal's roles, `Everyone` when unbound.
fn effective_level(state: &GuildState, principal: &Principal) -> PermissionLevel {
    principal
        .role_ids
        .iter()
        .filter_map(|role_id| state.bindings.get(role_id))
        .copied()
        .max()
        .unwrap_or(PermissionLevel::Everyone)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_level_defaults_to_everyone() {
        let state = GuildState::default();
        let principal = Principal::roleless(Uuid::new_v4());
        assert_eq!(
            effective_level(&state, &principal),
            PermissionLevel::Everyone
        );
    }

    #[test]
    fn test_effective_level_takes_max() {
        let mut state = GuildState::default();
        let mod_role = Uuid::new_v4();
        let admin_role = Uuid::new_v4();
        state.bindings.insert(mod_role, PermissionLevel::Moderator);
        state.bindings.insert(admin_role, PermissionLevel::Admin);

        let principal = Principal::new(Uuid::new_v4(), vec![mod_role, admin_role]);
        assert_eq!(effective_level(&state, &principal), PermissionLevel::Admin);
    }

    #[test]
    fn test_effective_level_ignores_unheld_bindings() {
        let mut state = GuildState::default();
        state
            .bindings
            .insert(Uuid::new_v4(), PermissionLevel::Owner);

        let principal = Principal::roleless(Uuid::new_v4());
        assert_eq!(
            effective_level(&state, &principal),
            PermissionLevel::Everyone
        );
    }

    #[test]
    fn test_banned_only_when_max_is_banned() {
        let mut state = GuildState::default();
        let banned_role = Uuid::new_v4();
        let member_role = Uuid::new_v4();
        state.bindings.insert(banned_role, PermissionLevel::Banned);
        state.bindings.insert(member_role, PermissionLevel::Member);

        let only_banned = Principal::new(Uuid::new_v4(), vec![banned_role]);
        assert_eq!(
            effective_level(&state, &only_banned),
            PermissionLevel::Banned
        );

        let both = Principal::new(Uuid::new_v4(), vec![banned_role, member_role]);
        assert_eq!(effective_level(&state, &both), PermissionLevel::Member);
    }
}

//! Persistence port.
//!
//! All durable state flows through the [`PermissionStore`] contract; the
//! engine is the only caller and wraps every call in a timeout. The
//! in-memory [`MemoryStore`] is the stand-in used when no durable backend
//! is wired up, and doubles as the reference implementation for tests.
//!
//! When multiple processes share one durable store, serializing concurrent
//! mutations is the store's job (transactions); the engine treats a write
//! rejection as recoverable, never fatal.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::level::PermissionLevel;
use crate::models::{GuildConfigMeta, NodeRequirement, RoleBinding};
use crate::overrides::{OverrideScope, OverrideTarget, PermissionOverride};

/// Errors a store implementation may surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store is unreachable or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the write (e.g. a transaction conflict).
    #[error("store rejected the operation: {0}")]
    Rejected(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Contract for durable permission state, keyed by guild.
///
/// Implementations must be safe for concurrent use; the engine serializes
/// mutations per guild above this layer but issues reads freely.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    // === Role bindings ===

    /// Insert or replace a role binding. Returns the previous level, if any.
    async fn upsert_role_binding(
        &self,
        binding: RoleBinding,
    ) -> StoreResult<Option<PermissionLevel>>;

    /// Remove a role binding. Returns the removed level, if any.
    async fn remove_role_binding(
        &self,
        guild_id: Uuid,
        role_id: Uuid,
    ) -> StoreResult<Option<PermissionLevel>>;

    /// All role bindings for a guild.
    async fn list_role_bindings(&self, guild_id: Uuid) -> StoreResult<Vec<RoleBinding>>;

    // === Node requirements ===

    /// Insert or replace a guild node requirement. Returns the previous
    /// level, if any.
    async fn upsert_node_requirement(
        &self,
        requirement: NodeRequirement,
    ) -> StoreResult<Option<PermissionLevel>>;

    /// Remove a guild node requirement. Returns the removed level, if any.
    async fn remove_node_requirement(
        &self,
        guild_id: Uuid,
        node: &str,
    ) -> StoreResult<Option<PermissionLevel>>;

    /// All node requirements for a guild.
    async fn list_node_requirements(&self, guild_id: Uuid) -> StoreResult<Vec<NodeRequirement>>;

    // === Overrides ===

    /// Insert an override.
    async fn insert_override(&self, ov: PermissionOverride) -> StoreResult<()>;

    /// Remove overrides matching (target, node) and, when given, scope.
    /// Returns the number removed.
    async fn remove_overrides(
        &self,
        guild_id: Uuid,
        target: OverrideTarget,
        node: &str,
        scope: Option<OverrideScope>,
    ) -> StoreResult<u64>;

    /// All overrides for a guild, including expired rows not yet purged.
    async fn list_overrides(&self, guild_id: Uuid) -> StoreResult<Vec<PermissionOverride>>;

    /// Non-expired overrides for the given targets within the given scopes.
    ///
    /// This is the hot query shape for resolution; implementations should
    /// make it cheap.
    async fn list_active_overrides(
        &self,
        guild_id: Uuid,
        targets: &[OverrideTarget],
        scopes: &[OverrideScope],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PermissionOverride>>;

    /// Delete expired override rows. Storage hygiene only; resolution
    /// already ignores expired rows. Returns the number purged.
    async fn purge_expired_overrides(&self, guild_id: Uuid, now: DateTime<Utc>)
        -> StoreResult<u64>;

    // === Guild config meta ===

    /// Configuration metadata for a guild, if any has been written.
    async fn get_guild_meta(&self, guild_id: Uuid) -> StoreResult<Option<GuildConfigMeta>>;

    /// Write configuration metadata for a guild.
    async fn put_guild_meta(&self, meta: GuildConfigMeta) -> StoreResult<()>;

    // === Audit ===

    /// Append an audit entry.
    async fn append_audit_entry(&self, entry: AuditEntry) -> StoreResult<()>;

    /// Most recent audit entries for a guild, newest first.
    async fn list_audit_entries(&self, guild_id: Uuid, limit: usize)
        -> StoreResult<Vec<AuditEntry>>;

    // === Lifecycle ===

    /// Remove a guild's bindings, overrides, requirements, and config meta.
    /// Audit entries are retained.
    async fn reset_guild(&self, guild_id: Uuid) -> StoreResult<()>;
}

//! Shared test fixtures.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use magpie_permissions::audit::AuditEntry;
use magpie_permissions::models::{GuildConfigMeta, NodeRequirement, RoleBinding};
use magpie_permissions::{
    EngineConfig, MemoryStore, OverrideScope, OverrideTarget, PermissionEngine, PermissionLevel,
    PermissionOverride, PermissionStore, Principal, StoreError, StoreResult,
};

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Engine over stock nodes and a fresh in-memory store.
pub fn engine() -> PermissionEngine {
    init_tracing();
    PermissionEngine::in_memory(EngineConfig::default())
}

/// A principal holding exactly one role.
pub fn principal_with_role(role_id: Uuid) -> Principal {
    Principal::new(Uuid::new_v4(), vec![role_id])
}

/// Bind a single role at `level` and return a principal holding it.
pub async fn member_at_level(
    engine: &PermissionEngine,
    guild_id: Uuid,
    level: PermissionLevel,
) -> Principal {
    let role_id = Uuid::new_v4();
    engine
        .bind_role_level(guild_id, role_id, level, Uuid::new_v4(), None)
        .await
        .expect("binding succeeds");
    principal_with_role(role_id)
}

/// Store wrapper with injectable failures, for exercising the
/// availability-over-completeness contracts.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    /// Fail only audit appends.
    pub fail_audit: AtomicBool,
    /// Fail every operation.
    pub fail_all: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    fn outage<T>(&self) -> Option<StoreResult<T>> {
        if self.fail_all.load(Ordering::SeqCst) {
            Some(Err(StoreError::Unavailable("injected outage".into())))
        } else {
            None
        }
    }
}

#[async_trait]
impl PermissionStore for FlakyStore {
    async fn upsert_role_binding(
        &self,
        binding: RoleBinding,
    ) -> StoreResult<Option<PermissionLevel>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.upsert_role_binding(binding).await
    }

    async fn remove_role_binding(
        &self,
        guild_id: Uuid,
        role_id: Uuid,
    ) -> StoreResult<Option<PermissionLevel>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.remove_role_binding(guild_id, role_id).await
    }

    async fn list_role_bindings(&self, guild_id: Uuid) -> StoreResult<Vec<RoleBinding>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.list_role_bindings(guild_id).await
    }

    async fn upsert_node_requirement(
        &self,
        requirement: NodeRequirement,
    ) -> StoreResult<Option<PermissionLevel>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.upsert_node_requirement(requirement).await
    }

    async fn remove_node_requirement(
        &self,
        guild_id: Uuid,
        node: &str,
    ) -> StoreResult<Option<PermissionLevel>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.remove_node_requirement(guild_id, node).await
    }

    async fn list_node_requirements(&self, guild_id: Uuid) -> StoreResult<Vec<NodeRequirement>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.list_node_requirements(guild_id).await
    }

    async fn insert_override(&self, ov: PermissionOverride) -> StoreResult<()> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.insert_override(ov).await
    }

    async fn remove_overrides(
        &self,
        guild_id: Uuid,
        target: OverrideTarget,
        node: &str,
        scope: Option<OverrideScope>,
    ) -> StoreResult<u64> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner
            .remove_overrides(guild_id, target, node, scope)
            .await
    }

    async fn list_overrides(&self, guild_id: Uuid) -> StoreResult<Vec<PermissionOverride>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.list_overrides(guild_id).await
    }

    async fn list_active_overrides(
        &self,
        guild_id: Uuid,
        targets: &[OverrideTarget],
        scopes: &[OverrideScope],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<PermissionOverride>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner
            .list_active_overrides(guild_id, targets, scopes, now)
            .await
    }

    async fn purge_expired_overrides(
        &self,
        guild_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.purge_expired_overrides(guild_id, now).await
    }

    async fn get_guild_meta(&self, guild_id: Uuid) -> StoreResult<Option<GuildConfigMeta>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.get_guild_meta(guild_id).await
    }

    async fn put_guild_meta(&self, meta: GuildConfigMeta) -> StoreResult<()> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.put_guild_meta(meta).await
    }

    async fn append_audit_entry(&self, entry: AuditEntry) -> StoreResult<()> {
        if let Some(err) = self.outage() {
            return err;
        }
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected audit failure".into()));
        }
        self.inner.append_audit_entry(entry).await
    }

    async fn list_audit_entries(
        &self,
        guild_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<AuditEntry>> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.list_audit_entries(guild_id, limit).await
    }

    async fn reset_guild(&self, guild_id: Uuid) -> StoreResult<()> {
        if let Some(err) = self.outage() {
            return err;
        }
        self.inner.reset_guild(guild_id).await
    }
}

/// Engine wired over a shared [`FlakyStore`].
pub fn engine_with_flaky_store(config: EngineConfig) -> (PermissionEngine, Arc<FlakyStore>) {
    init_tracing();
    let store = Arc::new(FlakyStore::new());
    let engine = PermissionEngine::new(
        config,
        Arc::new(magpie_permissions::PermissionRegistry::with_defaults()),
        Arc::clone(&store) as Arc<dyn PermissionStore>,
    );
    (engine, store)
}

//! Per-guild permission state cache.
//!
//! Caches each guild's bindings, node requirements, and overrides in a
//! `DashMap` for lock-free concurrent reads. State is lazily loaded on
//! first query and invalidated on every mutation of that guild.
//!
//! Per-guild generation counters prevent stale loads from overwriting
//! fresh invalidations (TOCTOU protection) without causing cross-guild
//! cache misses. Entries past the TTL are not served as fresh but are
//! retained as last-known-good fallback for store outages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::level::PermissionLevel;
use crate::models::GuildConfigMeta;
use crate::overrides::PermissionOverride;

/// Snapshot of one guild's authorization-relevant state.
#[derive(Debug, Default)]
pub struct GuildState {
    /// role id → bound level
    pub bindings: HashMap<Uuid, PermissionLevel>,
    /// node name → guild-required level
    pub requirements: HashMap<String, PermissionLevel>,
    /// All overrides, including expired rows not yet purged; expiry is
    /// applied at resolution time.
    pub overrides: Vec<PermissionOverride>,
    pub meta: Option<GuildConfigMeta>,
}

/// Cached state paired with its load instant and generation.
struct CachedState {
    state: Arc<GuildState>,
    loaded_at: Instant,
    _generation: u64,
}

/// Cache read/hit counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub checks: u64,
    pub hits: u64,
    pub hit_rate: f32,
}

/// Thread-safe cache of per-guild permission state.
pub struct GuildCache {
    states: DashMap<Uuid, CachedState>,
    /// Per-guild generation counters. Incremented on invalidation so
    /// in-flight loads from stale data are discarded on insert.
    generations: DashMap<Uuid, Arc<AtomicU64>>,
    ttl: Duration,
    checks: AtomicU64,
    hits: AtomicU64,
}

impl GuildCache {
    /// Create an empty cache with the given freshness TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            states: DashMap::new(),
            generations: DashMap::new(),
            ttl,
            checks: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    /// Get or create the generation counter for a guild.
    fn guild_generation(&self, guild_id: Uuid) -> Arc<AtomicU64> {
        self.generations
            .entry(guild_id)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    /// Fresh cached state for a guild, if present and within TTL.
    ///
    /// Counts toward hit statistics.
    pub fn get_fresh(&self, guild_id: Uuid) -> Option<Arc<GuildState>> {
        self.checks.fetch_add(1, Ordering::Relaxed);

        let entry = self.states.get(&guild_id)?;
        if entry.loaded_at.elapsed() > self.ttl {
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(Arc::clone(&entry.state))
    }

    /// Last-known-good state regardless of TTL, for store outages.
    pub fn peek_stale(&self, guild_id: Uuid) -> Option<Arc<GuildState>> {
        self.states
            .get(&guild_id)
            .map(|entry| Arc::clone(&entry.state))
    }

    /// Capture the guild's generation before a load begins.
    pub fn begin_load(&self, guild_id: Uuid) -> u64 {
        self.guild_generation(guild_id).load(Ordering::Acquire)
    }

    /// Insert freshly loaded state unless the guild was invalidated since
    /// [`Self::begin_load`].
    pub fn store_if_current(&self, guild_id: Uuid, gen_before: u64, state: Arc<GuildState>) {
        let gen_after = self.guild_generation(guild_id).load(Ordering::Acquire);
        if gen_before == gen_after {
            self.states.insert(
                guild_id,
                CachedState {
                    state,
                    loaded_at: Instant::now(),
                    _generation: gen_before,
                },
            );
        }
    }

    /// Invalidate the cached state for a guild.
    ///
    /// Increments the guild's generation counter so in-flight loads from
    /// stale data will not overwrite the invalidation.
    pub fn invalidate(&self, guild_id: Uuid) {
        self.guild_generation(guild_id)
            .fetch_add(1, Ordering::Release);
        self.states.remove(&guild_id);
    }

    /// Read/hit counters.
    pub fn stats(&self) -> CacheStats {
        let checks = self.checks.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        let hit_rate = if checks == 0 {
            0.0
        } else {
            hits as f32 / checks as f32
        };
        CacheStats {
            checks,
            hits,
            hit_rate,
        }
    }
}

//! Heuristic role classification.
//!
//! Analyzes a guild's role snapshot and suggests a permission level per
//! role. Classification is a pure function of the snapshot: no side
//! effects, no platform calls, identical output for identical input. Rules
//! are evaluated in a fixed priority order, first match wins, so behavior
//! stays auditable.
//!
//! Guilds with very large, dynamically generated role sets (ticket-per-user
//! patterns) are classified by position only; deep name/capability analysis
//! is capped per pass.

pub mod normalize;
pub mod rules;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::level::PermissionLevel;
use crate::models::RoleSnapshot;

use normalize::{normalize_name, symbol_ratio};
use rules::{match_tier_name, matches_demographic, matches_integration, matches_temporary};

/// Fraction of graphemes above which a name counts as symbol-dominated.
const SYMBOL_DOMINANCE: f32 = 0.7;

/// Member count above which a capability-free role is assumed cosmetic.
const COSMETIC_MEMBER_FLOOR: u32 = 5;

/// What kind of role the classifier believes it is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleClassification {
    /// Human hierarchy role; candidate for a level binding
    Authority,
    /// Owned by a bot account
    BotManaged,
    /// Managed by a platform integration
    Integration,
    /// Display-only; excluded from level suggestions
    Cosmetic,
    /// Carries member-tier access but no authority over others
    Functional,
    /// Event or otherwise short-lived
    Temporary,
}

/// Per-role classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAnalysis {
    pub role_id: Uuid,
    pub name: String,
    pub classification: RoleClassification,
    /// Suggested binding level; `None` when the role should not be bound.
    pub suggested_level: Option<PermissionLevel>,
    /// Heuristic confidence in [0.0, 1.0].
    pub confidence: f32,
    /// Which rule decided, for operator review surfaces.
    pub rationale: String,
}

/// Cost limits for one classification pass.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierLimits {
    /// Roles beyond this many get position-only analysis.
    pub max_deep_analysis: usize,
    /// Role-set size beyond which the whole pass is position-only.
    pub large_guild_threshold: usize,
}

impl Default for ClassifierLimits {
    fn default() -> Self {
        Self {
            max_deep_analysis: 75,
            large_guild_threshold: 200,
        }
    }
}

/// Classify every role in a guild snapshot.
///
/// Results are returned in rank order (position ascending, id as
/// tie-break). Deterministic and idempotent for a given snapshot.
#[must_use]
pub fn analyze_roles(limits: ClassifierLimits, roles: &[RoleSnapshot]) -> Vec<RoleAnalysis> {
    let mut ordered: Vec<&RoleSnapshot> = roles.iter().collect();
    ordered.sort_by_key(|role| (role.position, role.id));

    let total = ordered.len();
    let position_only_pass = total > limits.large_guild_threshold;

    ordered
        .iter()
        .enumerate()
        .map(|(rank, role)| {
            let deep = !position_only_pass && rank < limits.max_deep_analysis;
            classify_role(role, rank, total, deep)
        })
        .collect()
}

/// Classify one role. `rank` is the role's index in rank order (0 = top).
fn classify_role(role: &RoleSnapshot, rank: usize, total: usize, deep: bool) -> RoleAnalysis {
    // Flags are authoritative regardless of analysis depth: binding an
    // integration or bot role is never correct.
    if role.managed_by_integration {
        return analysis(
            role,
            RoleClassification::Integration,
            None,
            1.0,
            "managed by a platform integration",
        );
    }
    if role.bot_owned {
        return analysis(
            role,
            RoleClassification::BotManaged,
            None,
            1.0,
            "owned by a bot account",
        );
    }

    if deep {
        if let Some(result) = classify_deep(role) {
            return result;
        }
    }

    classify_by_position(role, rank, total)
}

/// Name- and capability-based rules, in priority order. Returns `None` when
/// nothing matched and position fallback should decide.
fn classify_deep(role: &RoleSnapshot) -> Option<RoleAnalysis> {
    let normalized = normalize_name(&role.name);

    if matches_integration(&normalized) {
        return Some(analysis(
            role,
            RoleClassification::Integration,
            None,
            0.85,
            "integration name pattern",
        ));
    }

    if let Some(hit) = match_tier_name(&normalized) {
        let rationale = format!("name keyword '{}'", hit.keyword);
        let floor = capability_floor(role);
        // Member-tier names describe access, not authority over others,
        // unless the role's capabilities say otherwise.
        if hit.level == PermissionLevel::Member && floor.is_none() {
            return Some(analysis(
                role,
                RoleClassification::Functional,
                Some(PermissionLevel::Member),
                hit.confidence,
                &rationale,
            ));
        }
        // A named tier below what the capabilities imply is raised to the
        // capability floor.
        let level = floor.map_or(hit.level, |floor| hit.level.max(floor));
        return Some(analysis(
            role,
            RoleClassification::Authority,
            Some(level),
            hit.confidence,
            &rationale,
        ));
    }

    if let Some(floor) = capability_floor(role) {
        let rationale = if role.capabilities.is_administrative() {
            "administrative capability"
        } else {
            "moderation capability"
        };
        let confidence = if role.capabilities.is_administrative() {
            0.8
        } else {
            0.7
        };
        return Some(analysis(
            role,
            RoleClassification::Authority,
            Some(floor),
            confidence,
            rationale,
        ));
    }

    if matches_temporary(&normalized) {
        return Some(analysis(
            role,
            RoleClassification::Temporary,
            None,
            0.6,
            "event/temporary name pattern",
        ));
    }

    // Cosmetic detection only applies to roles with no authority
    // capabilities; anything with real capabilities fell through above.
    if symbol_ratio(&role.name) >= SYMBOL_DOMINANCE || normalized.is_empty() {
        return Some(analysis(
            role,
            RoleClassification::Cosmetic,
            None,
            0.8,
            "symbol-dominated name",
        ));
    }
    if matches_demographic(&normalized) {
        return Some(analysis(
            role,
            RoleClassification::Cosmetic,
            None,
            0.75,
            "demographic/reaction name pattern",
        ));
    }
    if role.capabilities.is_empty() && role.member_count > COSMETIC_MEMBER_FLOOR {
        return Some(analysis(
            role,
            RoleClassification::Cosmetic,
            None,
            0.6,
            "no capabilities, broad membership",
        ));
    }

    None
}

/// Position-based fallback: top decile is treated as senior administration,
/// the next band as moderation, the remainder as plain membership.
fn classify_by_position(role: &RoleSnapshot, rank: usize, total: usize) -> RoleAnalysis {
    let percentile = if total <= 1 {
        0.0
    } else {
        rank as f32 / total as f32
    };

    if percentile <= 0.10 {
        return analysis(
            role,
            RoleClassification::Authority,
            Some(PermissionLevel::LeadAdmin),
            0.4,
            "top decile of role ordering",
        );
    }
    if percentile <= 0.30 {
        return analysis(
            role,
            RoleClassification::Authority,
            Some(PermissionLevel::Moderator),
            0.35,
            "upper band of role ordering",
        );
    }
    if !role.capabilities.is_empty() {
        return analysis(
            role,
            RoleClassification::Functional,
            Some(PermissionLevel::Member),
            0.3,
            "lower ordering with some capabilities",
        );
    }
    analysis(
        role,
        RoleClassification::Cosmetic,
        None,
        0.25,
        "lower ordering, no capabilities",
    )
}

/// Minimum level implied by a role's capabilities, if any.
fn capability_floor(role: &RoleSnapshot) -> Option<PermissionLevel> {
    if role.capabilities.is_administrative() {
        Some(PermissionLevel::Admin)
    } else if role.capabilities.is_moderation() {
        Some(PermissionLevel::Moderator)
    } else {
        None
    }
}

fn analysis(
    role: &RoleSnapshot,
    classification: RoleClassification,
    suggested_level: Option<PermissionLevel>,
    confidence: f32,
    rationale: &str,
) -> RoleAnalysis {
    RoleAnalysis {
        role_id: role.id,
        name: role.name.clone(),
        classification,
        suggested_level,
        confidence,
        rationale: rationale.to_string(),
    }
}

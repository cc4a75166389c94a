//! End-to-end resolution scenarios against the in-memory store.

mod helpers;

use chrono::{Duration, Utc};
use uuid::Uuid;

use magpie_permissions::{
    DecidingFactor, OverrideScope, OverrideTarget, PermissionError, PermissionLevel,
    PermissionOverride, Principal,
};

use helpers::{engine, member_at_level};

#[tokio::test]
async fn moderator_can_kick_by_default() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Moderator).await;

    let allowed = engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();
    assert!(allowed);
}

#[tokio::test]
async fn member_cannot_kick_by_default() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Member).await;

    let result = engine
        .check_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.deciding_factor, DecidingFactor::Level);
    assert_eq!(result.effective_level, PermissionLevel::Member);
    assert_eq!(result.required_level, PermissionLevel::Moderator);
}

#[tokio::test]
async fn deny_override_flips_default_allow() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Moderator).await;

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::User(principal.user_id),
            "moderation.kick",
            false,
            OverrideScope::Guild(guild_id),
            Uuid::new_v4(),
        ))
        .await
        .unwrap();

    let result = engine
        .check_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.deciding_factor, DecidingFactor::UserOverride);
}

#[tokio::test]
async fn user_override_beats_bot_owner_level() {
    // Even a principal at the top of the hierarchy is bound by an explicit
    // deny override targeting them.
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::BotOwner).await;

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::User(principal.user_id),
            "basic.ping",
            false,
            OverrideScope::Guild(guild_id),
            Uuid::new_v4(),
        ))
        .await
        .unwrap();

    let allowed = engine
        .has_permission(&principal, "basic.ping", guild_id, None)
        .await
        .unwrap();
    assert!(!allowed);
}

#[tokio::test]
async fn expired_override_is_never_honored() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Moderator).await;

    // Write an already-expired deny directly through the store path by
    // adding a short-lived override and letting it lapse.
    engine
        .add_temporary_override(
            PermissionOverride::new(
                guild_id,
                OverrideTarget::User(principal.user_id),
                "moderation.kick",
                false,
                OverrideScope::Guild(guild_id),
                Uuid::new_v4(),
            ),
            Duration::milliseconds(10),
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    // The row is still stored, but resolution ignores it.
    assert_eq!(engine.list_overrides(guild_id).await.unwrap().len(), 1);
    let result = engine
        .check_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();
    assert!(result.allowed);
    assert_eq!(result.deciding_factor, DecidingFactor::Level);
}

#[tokio::test]
async fn override_with_past_expiry_is_rejected_at_creation() {
    let engine = engine();
    let guild_id = Uuid::new_v4();

    let err = engine
        .add_override(
            PermissionOverride::new(
                guild_id,
                OverrideTarget::User(Uuid::new_v4()),
                "moderation.kick",
                true,
                OverrideScope::Guild(guild_id),
                Uuid::new_v4(),
            )
            .with_expiry(Utc::now() - Duration::seconds(1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PermissionError::InvalidOverride(_)));
}

#[tokio::test]
async fn channel_scope_beats_guild_scope_beats_global() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let channel_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Member).await;
    let actor = Uuid::new_v4();

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::User(principal.user_id),
            "moderation.kick",
            false,
            OverrideScope::Global,
            actor,
        ))
        .await
        .unwrap();
    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::User(principal.user_id),
            "moderation.kick",
            false,
            OverrideScope::Guild(guild_id),
            actor,
        ))
        .await
        .unwrap();
    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::User(principal.user_id),
            "moderation.kick",
            true,
            OverrideScope::Channel(channel_id),
            actor,
        ))
        .await
        .unwrap();

    // In the channel, the channel-scoped grant wins.
    assert!(engine
        .has_permission(&principal, "moderation.kick", guild_id, Some(channel_id))
        .await
        .unwrap());

    // Outside it, the guild-scoped deny wins.
    assert!(!engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap());

    // In some other channel the guild deny still applies.
    assert!(!engine
        .has_permission(
            &principal,
            "moderation.kick",
            guild_id,
            Some(Uuid::new_v4())
        )
        .await
        .unwrap());
}

#[tokio::test]
async fn banned_principal_is_denied_everything() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Banned).await;

    for node in ["basic.ping", "basic.help", "moderation.kick"] {
        let result = engine
            .check_permission(&principal, node, guild_id, None)
            .await
            .unwrap();
        assert!(!result.allowed, "banned principal allowed {node}");
        assert_eq!(result.deciding_factor, DecidingFactor::Banned);
    }
}

#[tokio::test]
async fn role_override_cannot_rescue_banned_principal() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let role_id = Uuid::new_v4();
    engine
        .bind_role_level(
            guild_id,
            role_id,
            PermissionLevel::Banned,
            Uuid::new_v4(),
            None,
        )
        .await
        .unwrap();
    let principal = Principal::new(Uuid::new_v4(), vec![role_id]);

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::Role(role_id),
            "basic.ping",
            true,
            OverrideScope::Guild(guild_id),
            Uuid::new_v4(),
        ))
        .await
        .unwrap();

    assert!(!engine
        .has_permission(&principal, "basic.ping", guild_id, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn user_grant_override_repermits_banned_principal() {
    // The designed escape hatch: an explicit user-targeted grant re-permits
    // a specific node for a banned principal.
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Banned).await;

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::User(principal.user_id),
            "basic.ping",
            true,
            OverrideScope::Guild(guild_id),
            Uuid::new_v4(),
        ))
        .await
        .unwrap();

    assert!(engine
        .has_permission(&principal, "basic.ping", guild_id, None)
        .await
        .unwrap());
    // Other nodes stay denied.
    assert!(!engine
        .has_permission(&principal, "basic.help", guild_id, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn conflicting_role_overrides_deny_wins() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let grant_role = Uuid::new_v4();
    let deny_role = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let principal = Principal::new(Uuid::new_v4(), vec![grant_role, deny_role]);

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::Role(grant_role),
            "moderation.kick",
            true,
            OverrideScope::Guild(guild_id),
            actor,
        ))
        .await
        .unwrap();
    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::Role(deny_role),
            "moderation.kick",
            false,
            OverrideScope::Guild(guild_id),
            actor,
        ))
        .await
        .unwrap();

    let result = engine
        .check_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.deciding_factor, DecidingFactor::RoleOverride);
}

#[tokio::test]
async fn agreeing_role_overrides_grant() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let role_id = Uuid::new_v4();
    let principal = Principal::new(Uuid::new_v4(), vec![role_id]);

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::Role(role_id),
            "moderation.kick",
            true,
            OverrideScope::Guild(guild_id),
            Uuid::new_v4(),
        ))
        .await
        .unwrap();

    // An everyone-level principal gains kick through the role override.
    assert!(engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn unknown_node_raises_and_caller_denies() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = Principal::roleless(Uuid::new_v4());

    let err = engine
        .has_permission(&principal, "no.such.node", guild_id, None)
        .await
        .unwrap_err();
    assert_eq!(err, PermissionError::UnknownNode("no.such.node".into()));

    // A deny-on-error caller yields false, never true.
    let allowed = engine
        .has_permission(&principal, "no.such.node", guild_id, None)
        .await
        .unwrap_or(false);
    assert!(!allowed);
}

#[tokio::test]
async fn node_requirement_supersedes_registry_default() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Moderator).await;

    // Raise the kick requirement to Admin for this guild only.
    engine
        .set_node_requirement(guild_id, "moderation.kick", PermissionLevel::Admin, actor)
        .await
        .unwrap();

    let result = engine
        .check_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.required_level, PermissionLevel::Admin);

    // Other guilds keep the registry default.
    let other_guild = Uuid::new_v4();
    let other_principal = member_at_level(&engine, other_guild, PermissionLevel::Moderator).await;
    assert!(engine
        .has_permission(&other_principal, "moderation.kick", other_guild, None)
        .await
        .unwrap());

    // Clearing restores the default.
    assert!(engine
        .clear_node_requirement(guild_id, "moderation.kick", actor)
        .await
        .unwrap());
    assert!(engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn user_permission_level_reports_max_binding() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let mod_role = Uuid::new_v4();
    let admin_role = Uuid::new_v4();
    engine
        .bind_role_level(guild_id, mod_role, PermissionLevel::Moderator, actor, None)
        .await
        .unwrap();
    engine
        .bind_role_level(guild_id, admin_role, PermissionLevel::Admin, actor, None)
        .await
        .unwrap();

    let principal = Principal::new(Uuid::new_v4(), vec![mod_role, admin_role]);
    let level = engine
        .user_permission_level(&principal, guild_id)
        .await
        .unwrap();
    assert_eq!(level, PermissionLevel::Admin);

    let stranger = Principal::roleless(Uuid::new_v4());
    let level = engine
        .user_permission_level(&stranger, guild_id)
        .await
        .unwrap();
    assert_eq!(level, PermissionLevel::Everyone);
}

#[tokio::test]
async fn unbind_returns_principal_to_everyone() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let role_id = Uuid::new_v4();

    engine
        .bind_role_level(guild_id, role_id, PermissionLevel::Moderator, actor, None)
        .await
        .unwrap();
    let principal = Principal::new(Uuid::new_v4(), vec![role_id]);
    assert!(engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap());

    assert!(engine.unbind_role(guild_id, role_id, actor, None).await.unwrap());
    assert!(!engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn remove_override_restores_default_decision() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Moderator).await;
    let target = OverrideTarget::User(principal.user_id);

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            target,
            "moderation.kick",
            false,
            OverrideScope::Guild(guild_id),
            actor,
        ))
        .await
        .unwrap();
    assert!(!engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap());

    let removed = engine
        .remove_override(guild_id, target, "moderation.kick", None, actor)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn active_overrides_review_lists_most_specific_first() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let channel_id = Uuid::new_v4();
    let role_id = Uuid::new_v4();
    let actor = Uuid::new_v4();
    let principal = Principal::new(Uuid::new_v4(), vec![role_id]);

    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::User(principal.user_id),
            "moderation.kick",
            false,
            OverrideScope::Guild(guild_id),
            actor,
        ))
        .await
        .unwrap();
    engine
        .add_override(PermissionOverride::new(
            guild_id,
            OverrideTarget::Role(role_id),
            "moderation.mute",
            true,
            OverrideScope::Channel(channel_id),
            actor,
        ))
        .await
        .unwrap();
    // Expired entries are filtered out of the review listing.
    engine
        .add_temporary_override(
            PermissionOverride::new(
                guild_id,
                OverrideTarget::User(principal.user_id),
                "moderation.ban",
                false,
                OverrideScope::Guild(guild_id),
                actor,
            ),
            Duration::milliseconds(10),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let listed = engine
        .list_active_overrides_for(&principal, guild_id, Some(channel_id))
        .await
        .unwrap();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].scope, OverrideScope::Channel(channel_id));
    assert_eq!(listed[0].node, "moderation.mute");
    assert_eq!(listed[1].scope, OverrideScope::Guild(guild_id));
    assert_eq!(listed[1].node, "moderation.kick");

    // Overrides targeting strangers are not listed.
    let stranger = Principal::roleless(Uuid::new_v4());
    let listed = engine
        .list_active_overrides_for(&stranger, guild_id, Some(channel_id))
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn purge_does_not_change_decisions() {
    let engine = engine();
    let guild_id = Uuid::new_v4();
    let principal = member_at_level(&engine, guild_id, PermissionLevel::Moderator).await;

    engine
        .add_temporary_override(
            PermissionOverride::new(
                guild_id,
                OverrideTarget::User(principal.user_id),
                "moderation.kick",
                false,
                OverrideScope::Guild(guild_id),
                Uuid::new_v4(),
            ),
            Duration::milliseconds(10),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let before = engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();
    let purged = engine.purge_expired_overrides(guild_id).await.unwrap();
    assert_eq!(purged, 1);
    let after = engine
        .has_permission(&principal, "moderation.kick", guild_id, None)
        .await
        .unwrap();

    assert_eq!(before, after);
    assert!(engine.list_overrides(guild_id).await.unwrap().is_empty());
}

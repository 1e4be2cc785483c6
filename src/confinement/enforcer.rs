//! Voice-state enforcement.
//!
//! Whenever a locked user shows up somewhere other than their prison channel,
//! they are moved back. Moves go through the [`VoiceMover`] seam so the logic
//! can be exercised without a live gateway.

use crate::confinement::{ConfinementError, ConfinementResult, LockRegistry};
use poise::serenity_prelude::{ChannelId, EditMember, GuildId, Http, UserId};
use tracing::{debug, error, info};

/// Audit-log reason attached to enforcement moves.
pub const ENFORCEMENT_REASON: &str = "Locked user left the prison channel";
/// Audit-log reason attached to the move performed when a lock is issued.
pub const INITIAL_MOVE_REASON: &str = "Voice lock (prison)";

/// What a single enforcement pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementOutcome {
    /// The user has no lock record.
    NotLocked,
    /// The user disconnected from voice entirely; they are left alone.
    Disconnected,
    /// The user is already in the prison channel; no move was attempted.
    AlreadyConfined,
    /// The user was moved back to the prison channel.
    Returned,
    /// The move was rejected by Discord; the lock record stays and the next
    /// move attempt retries enforcement.
    MoveFailed,
}

/// The one external operation enforcement needs: move a member to a voice
/// channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VoiceMover: Send + Sync {
    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
        reason: &'static str,
    ) -> ConfinementResult<()>;
}

#[async_trait::async_trait]
impl VoiceMover for Http {
    async fn move_member(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
        reason: &'static str,
    ) -> ConfinementResult<()> {
        guild_id
            .edit_member(
                self,
                user_id,
                EditMember::new()
                    .voice_channel(channel_id)
                    .audit_log_reason(reason),
            )
            .await
            .map(|_| ())
            .map_err(ConfinementError::from)
    }
}

/// React to a user's voice location change.
///
/// Looks the user up in the registry and moves them back to their prison
/// channel when their new location is a real channel other than it. A
/// disconnect is left alone. Idempotent: a user already in the prison channel
/// causes no external call. A rejected move is logged and the record is left
/// in place.
pub async fn enforce_movement<M: VoiceMover + ?Sized>(
    mover: &M,
    registry: &LockRegistry,
    guild_id: GuildId,
    user_id: UserId,
    new_channel: Option<ChannelId>,
) -> EnforcementOutcome {
    let Some(record) = registry.get(user_id) else {
        return EnforcementOutcome::NotLocked;
    };
    let Some(new_channel) = new_channel else {
        debug!(
            target: crate::EVENT_TARGET,
            user_id = %user_id,
            "locked user disconnected from voice, not forcing a reconnect"
        );
        return EnforcementOutcome::Disconnected;
    };
    if new_channel == record.channel_id {
        return EnforcementOutcome::AlreadyConfined;
    }

    match mover
        .move_member(guild_id, user_id, record.channel_id, ENFORCEMENT_REASON)
        .await
    {
        Ok(()) => {
            info!(
                target: crate::EVENT_TARGET,
                user_id = %user_id,
                from = %new_channel,
                to = %record.channel_id,
                "returned locked user to the prison channel"
            );
            EnforcementOutcome::Returned
        }
        Err(err) => {
            // The user stays locked; the next move event retries.
            error!(
                target: crate::EVENT_TARGET,
                user_id = %user_id,
                error = %err,
                "failed to return locked user to the prison channel"
            );
            EnforcementOutcome::MoveFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    const GUILD: GuildId = GuildId::new(10);
    const USER: UserId = UserId::new(100);
    const PRISON: ChannelId = ChannelId::new(200);
    const ELSEWHERE: ChannelId = ChannelId::new(300);

    #[tokio::test]
    async fn test_unlocked_user_is_ignored() {
        let registry = LockRegistry::new();
        // No expectations set: any move call would panic.
        let mover = MockVoiceMover::new();

        let outcome = enforce_movement(&mover, &registry, GUILD, USER, Some(ELSEWHERE)).await;
        assert_eq!(outcome, EnforcementOutcome::NotLocked);
    }

    #[tokio::test]
    async fn test_disconnect_is_left_alone() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, None);
        let mover = MockVoiceMover::new();

        let outcome = enforce_movement(&mover, &registry, GUILD, USER, None).await;
        assert_eq!(outcome, EnforcementOutcome::Disconnected);
        assert!(registry.is_locked(USER));
    }

    #[tokio::test]
    async fn test_already_in_prison_makes_no_external_call() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, None);
        let mover = MockVoiceMover::new();

        let outcome = enforce_movement(&mover, &registry, GUILD, USER, Some(PRISON)).await;
        assert_eq!(outcome, EnforcementOutcome::AlreadyConfined);
    }

    #[tokio::test]
    async fn test_escaped_user_is_moved_back_exactly_once() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, None);

        let mut mover = MockVoiceMover::new();
        mover
            .expect_move_member()
            .with(eq(GUILD), eq(USER), eq(PRISON), eq(ENFORCEMENT_REASON))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outcome = enforce_movement(&mover, &registry, GUILD, USER, Some(ELSEWHERE)).await;
        assert_eq!(outcome, EnforcementOutcome::Returned);
    }

    #[tokio::test]
    async fn test_failed_move_keeps_the_lock_record() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, None);

        let mut mover = MockVoiceMover::new();
        mover.expect_move_member().times(1).returning(|_, _, _, _| {
            Err(ConfinementError::GuildOrMemberNotFound(
                "user not connected".to_string(),
            ))
        });

        let outcome = enforce_movement(&mover, &registry, GUILD, USER, Some(ELSEWHERE)).await;
        assert_eq!(outcome, EnforcementOutcome::MoveFailed);
        assert!(registry.is_locked(USER));
    }
}

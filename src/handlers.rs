use crate::config::BotConfig;
use crate::confinement::{EnforcementOutcome, LockRegistry, enforce_movement};
use crate::dispatcher;
use poise::serenity_prelude::{
    self as serenity, Context, EventHandler, GuildId, Message, Ready, VoiceState,
};
use tracing::{error, info, warn};

/// Gateway event handler: prefix commands and voice-state enforcement.
pub struct Handler {
    registry: LockRegistry,
    config: BotConfig,
}

impl Handler {
    #[must_use]
    pub fn new(registry: LockRegistry, config: BotConfig) -> Self {
        Self { registry, config }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!("Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!("Cache ready! The bot is in {guild_count} guild(s)");
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild_id) = msg.guild_id else {
            return;
        };
        let Some(command) = dispatcher::parse_command(&msg.content) else {
            return;
        };

        // A failure here drops this one event; the bot keeps serving.
        if let Err(err) =
            dispatcher::handle_command(&ctx, &msg, guild_id, command, &self.registry, &self.config)
                .await
        {
            error!(
                target: crate::ERROR_TARGET,
                user_id = %msg.author.id,
                guild_id = %guild_id,
                error = %err,
                "prison command failed"
            );
        }
    }

    async fn voice_state_update(&self, ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let outcome = enforce_movement(
            ctx.http.as_ref(),
            &self.registry,
            guild_id,
            new.user_id,
            new.channel_id,
        )
        .await;
        if outcome == EnforcementOutcome::Returned {
            info!(
                target: crate::EVENT_TARGET,
                user_id = %new.user_id,
                guild_id = %guild_id,
                "enforcement move completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_implements_event_handler() {
        // This test verifies at compile time that Handler implements EventHandler
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }
}

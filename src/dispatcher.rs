//! Prefix command dispatch for the prison commands.
//!
//! Inbound messages are parsed into a [`PrisonCommand`], authorized against
//! the configured roles, and applied to the [`LockRegistry`]. Unrecognized
//! leading tokens fail closed and are ignored. Authorization and validation
//! failures are replies to the invoker, never registry mutations.

use crate::config::BotConfig;
use crate::confinement::{
    INITIAL_MOVE_REASON, LockRegistry, LockStatus, VoiceMover, format_remaining, parse_duration,
};
use crate::{COMMAND_TARGET, ERROR_TARGET, Error};
use poise::serenity_prelude::{
    self as serenity, Channel, ChannelId, ChannelType, GuildId, Member, Mentionable, Message, Role,
    RoleId, UserId,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info};

pub const MISSING_ROLE_REPLY: &str = "You don't have the required role to use this command.";
pub const OWNER_ONLY_REPLY: &str = "Only the owner role can use `.unlockall`.";
const LOCK_USAGE: &str = "Usage: `.lock @user`, `.lock @user 10m`, or `.lock help`.";
const UNLOCK_USAGE: &str = "Usage: `.unlock @user` or `.unlock <id>`.";
const LOCKINFO_USAGE: &str = "Usage: `.lockinfo @user` or `.lockinfo <id>`.";
const TARGET_NOT_FOUND_REPLY: &str = "I can't find that user on this server.";
const SELF_LOCK_REPLY: &str = "You can't lock yourself.";
const GUILD_OWNER_REPLY: &str = "You can't lock the server owner.";
const RANK_REPLY: &str = "You can't lock someone with a role equal to or higher than yours.";
const PRISON_CHANNEL_REPLY: &str = "The prison channel is missing or is not a voice channel.";
const INVALID_DURATION_REPLY: &str = "Invalid duration. Examples: `30s`, `10m`, `2h`, `1d`.";
const MOVE_FAILED_REPLY: &str =
    "I couldn't move that user. Check that I have permission to move members and that they are connected to voice.";
const HELP_TEXT: &str = "\
Prison bot commands:
`.lock @user` → locks until `.unlock` (requires the prison role)
`.lock @user 10m` → locks for a duration (s = seconds, m = minutes, h = hours, d = days)
`.unlock @user` → releases the user
`.unlockall` → releases everyone (owner role only)
`.lockinfo @user` → shows the remaining time or whether the user is free
`/ping` → basic slash command liveness check";

/// A recognized prison command, before argument validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrisonCommand {
    Lock {
        target: Option<String>,
        duration: Option<String>,
    },
    LockHelp,
    Unlock {
        target: Option<String>,
    },
    UnlockAll,
    LockInfo {
        target: Option<String>,
    },
}

/// Parse message content into a command. The leading token is matched
/// case-insensitively; anything unrecognized yields `None`.
#[must_use]
pub fn parse_command(content: &str) -> Option<PrisonCommand> {
    let mut parts = content.split_whitespace();
    let head = parts.next()?.to_ascii_lowercase();
    let arg1 = parts.next().map(str::to_owned);
    let arg2 = parts.next().map(str::to_owned);

    match head.as_str() {
        ".lock" => {
            if arg1.as_deref().is_some_and(|a| a.eq_ignore_ascii_case("help")) {
                Some(PrisonCommand::LockHelp)
            } else {
                Some(PrisonCommand::Lock {
                    target: arg1,
                    duration: arg2,
                })
            }
        }
        ".unlock" => Some(PrisonCommand::Unlock { target: arg1 }),
        ".unlockall" => Some(PrisonCommand::UnlockAll),
        ".lockinfo" => Some(PrisonCommand::LockInfo { target: arg1 }),
        _ => None,
    }
}

/// Authorize and execute a parsed command, replying to the invoker.
///
/// # Errors
/// Returns an error only for unexpected platform failures (member fetch,
/// reply delivery); those are logged by the caller and the event is dropped.
pub async fn handle_command(
    ctx: &serenity::Context,
    msg: &Message,
    guild_id: GuildId,
    command: PrisonCommand,
    registry: &LockRegistry,
    config: &BotConfig,
) -> Result<(), Error> {
    let invoker = guild_id.member(ctx, msg.author.id).await?;

    if matches!(command, PrisonCommand::UnlockAll) {
        if !has_owner_capability(&invoker.roles, config) {
            msg.reply(ctx, OWNER_ONLY_REPLY).await?;
            return Ok(());
        }
    } else if !has_prison_capability(&invoker.roles, config) {
        msg.reply(ctx, MISSING_ROLE_REPLY).await?;
        return Ok(());
    }

    match command {
        PrisonCommand::LockHelp => {
            msg.reply(ctx, HELP_TEXT).await?;
        }
        PrisonCommand::Lock { target, duration } => {
            handle_lock(ctx, msg, guild_id, &invoker, target, duration, registry, config).await?;
        }
        PrisonCommand::Unlock { target } => {
            handle_unlock(ctx, msg, guild_id, target, registry).await?;
        }
        PrisonCommand::UnlockAll => {
            let released = registry.unlock_all();
            info!(
                target: COMMAND_TARGET,
                issuer_id = %invoker.user.id,
                guild_id = %guild_id,
                released,
                "unlockall issued"
            );
            let reply = if released == 0 {
                "No one is locked right now.".to_string()
            } else {
                format!("Released {released} user(s) from prison 🔓")
            };
            msg.reply(ctx, reply).await?;
        }
        PrisonCommand::LockInfo { target } => {
            handle_lockinfo(ctx, msg, guild_id, target, registry).await?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_lock(
    ctx: &serenity::Context,
    msg: &Message,
    guild_id: GuildId,
    invoker: &Member,
    target: Option<String>,
    duration: Option<String>,
    registry: &LockRegistry,
    config: &BotConfig,
) -> Result<(), Error> {
    let Some(target_token) = target else {
        msg.reply(ctx, LOCK_USAGE).await?;
        return Ok(());
    };
    let Some(target) = resolve_member(ctx, msg, guild_id, &target_token).await else {
        msg.reply(ctx, TARGET_NOT_FOUND_REPLY).await?;
        return Ok(());
    };

    let guild = guild_id.to_partial_guild(&ctx.http).await?;
    let verdict = validate_lock_target(
        invoker.user.id,
        target.user.id,
        guild.owner_id,
        highest_role_position(&guild.roles, &invoker.roles),
        highest_role_position(&guild.roles, &target.roles),
        has_owner_capability(&invoker.roles, config),
    );
    if let Err(refusal) = verdict {
        msg.reply(ctx, refusal).await?;
        return Ok(());
    }

    let prison_channel = config.prison_channel();
    if !is_guild_voice_channel(ctx, prison_channel).await {
        msg.reply(ctx, PRISON_CHANNEL_REPLY).await?;
        return Ok(());
    }

    let (lock_duration, expires_text) = match &duration {
        None => (None, "until manually unlocked".to_string()),
        Some(token) => match parse_duration(token) {
            Some(ms) => (Some(Duration::from_millis(ms)), format!("for {token}")),
            None => {
                msg.reply(ctx, INVALID_DURATION_REPLY).await?;
                return Ok(());
            }
        },
    };

    registry.lock(target.user.id, prison_channel, lock_duration);
    info!(
        target: COMMAND_TARGET,
        user_id = %target.user.id,
        issuer_id = %invoker.user.id,
        guild_id = %guild_id,
        duration = ?lock_duration,
        "lock issued"
    );

    // Confinement takes effect immediately when the target is already in
    // voice somewhere else. A rejected move leaves the record in place.
    let current = current_voice_channel(ctx, guild_id, target.user.id);
    if current.is_some_and(|channel| channel != prison_channel) {
        let moved = VoiceMover::move_member(
            ctx.http.as_ref(),
            guild_id,
            target.user.id,
            prison_channel,
            INITIAL_MOVE_REASON,
        )
        .await;
        if let Err(err) = moved {
            error!(
                target: ERROR_TARGET,
                user_id = %target.user.id,
                error = %err,
                "failed to move freshly locked user to the prison channel"
            );
            msg.reply(ctx, MOVE_FAILED_REPLY).await?;
            return Ok(());
        }
    }

    msg.reply(
        ctx,
        format!(
            "{} is now locked in {} {expires_text} 🔒",
            target.mention(),
            prison_channel.mention()
        ),
    )
    .await?;
    Ok(())
}

async fn handle_unlock(
    ctx: &serenity::Context,
    msg: &Message,
    guild_id: GuildId,
    target: Option<String>,
    registry: &LockRegistry,
) -> Result<(), Error> {
    let Some(target_token) = target else {
        msg.reply(ctx, UNLOCK_USAGE).await?;
        return Ok(());
    };
    let Some(target) = resolve_member(ctx, msg, guild_id, &target_token).await else {
        msg.reply(ctx, TARGET_NOT_FOUND_REPLY).await?;
        return Ok(());
    };

    let reply = if registry.unlock(target.user.id) {
        info!(
            target: COMMAND_TARGET,
            user_id = %target.user.id,
            guild_id = %guild_id,
            "unlock issued"
        );
        format!("{} has been released from prison 🔓", target.mention())
    } else {
        format!("{} is not locked.", target.mention())
    };
    msg.reply(ctx, reply).await?;
    Ok(())
}

async fn handle_lockinfo(
    ctx: &serenity::Context,
    msg: &Message,
    guild_id: GuildId,
    target: Option<String>,
    registry: &LockRegistry,
) -> Result<(), Error> {
    let Some(target_token) = target else {
        msg.reply(ctx, LOCKINFO_USAGE).await?;
        return Ok(());
    };
    let Some(target) = resolve_member(ctx, msg, guild_id, &target_token).await else {
        msg.reply(ctx, TARGET_NOT_FOUND_REPLY).await?;
        return Ok(());
    };

    let reply = match registry.status(target.user.id) {
        LockStatus::NotLocked => format!("{} is not currently confined.", target.mention()),
        LockStatus::Indefinite => format!(
            "{} is locked with no time limit (until `.unlock`).",
            target.mention()
        ),
        LockStatus::Remaining(ms) => format!(
            "{} is still locked for ~{}.",
            target.mention(),
            format_remaining(ms)
        ),
        LockStatus::Overdue => format!(
            "{} was due for release, but the timer is overdue.",
            target.mention()
        ),
    };
    msg.reply(ctx, reply).await?;
    Ok(())
}

/// Resolve a target from the first structured mention on the message, or from
/// the raw token as a `<@id>` / `<@!id>` mention or a bare id. `None` covers
/// both an unparseable token and a member that cannot be fetched.
async fn resolve_member(
    ctx: &serenity::Context,
    msg: &Message,
    guild_id: GuildId,
    token: &str,
) -> Option<Member> {
    let user_id = msg
        .mentions
        .first()
        .map(|user| user.id)
        .or_else(|| parse_user_id(token))?;
    guild_id.member(ctx, user_id).await.ok()
}

fn parse_user_id(token: &str) -> Option<UserId> {
    let raw = token
        .strip_prefix("<@")
        .map(|rest| rest.strip_prefix('!').unwrap_or(rest))
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(token);
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(UserId::new)
}

fn has_prison_capability(roles: &[RoleId], config: &BotConfig) -> bool {
    roles.contains(&config.owner_role()) || roles.contains(&config.prison_role())
}

fn has_owner_capability(roles: &[RoleId], config: &BotConfig) -> bool {
    roles.contains(&config.owner_role())
}

/// Highest role position held by a member, with the implicit @everyone
/// baseline of 0 for members holding no roles.
fn highest_role_position(roles: &HashMap<RoleId, Role>, member_roles: &[RoleId]) -> u16 {
    member_roles
        .iter()
        .filter_map(|id| roles.get(id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

/// Lock-target rules: no self-locks, never the guild owner, and no target
/// ranked at-or-above the invoker unless the invoker holds the owner role.
fn validate_lock_target(
    invoker_id: UserId,
    target_id: UserId,
    guild_owner_id: UserId,
    invoker_top: u16,
    target_top: u16,
    invoker_is_owner: bool,
) -> Result<(), &'static str> {
    if target_id == invoker_id {
        return Err(SELF_LOCK_REPLY);
    }
    if target_id == guild_owner_id {
        return Err(GUILD_OWNER_REPLY);
    }
    if target_top >= invoker_top && !invoker_is_owner {
        return Err(RANK_REPLY);
    }
    Ok(())
}

/// Cached voice location of a user, if the guild is in cache and the user is
/// connected.
fn current_voice_channel(
    ctx: &serenity::Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    ctx.cache.guild(guild_id).and_then(|guild| {
        guild
            .voice_states
            .get(&user_id)
            .and_then(|state| state.channel_id)
    })
}

async fn is_guild_voice_channel(ctx: &serenity::Context, channel_id: ChannelId) -> bool {
    match channel_id.to_channel(ctx).await {
        Ok(Channel::Guild(channel)) => channel.kind == ChannelType::Voice,
        _ => false,
    }
}

//! Voice-channel music playback: commands, the track resolver and the
//! per-guild player.

pub mod audio_sources;
pub mod utils;

pub mod join;
pub mod leave;
pub mod pause;
pub mod play;
pub mod queue;
pub mod resume;
pub mod skip;
pub mod stop;
pub mod volume;

use ::serenity::all::{ChannelId, GuildId, ReactionType};
use poise::CreateReply;

use crate::{CommandResult, Context};
use utils::embedded_messages;
use utils::music_manager::{MusicError, MusicManager};

fn require_guild(ctx: Context<'_>) -> Result<GuildId, MusicError> {
    ctx.guild_id().ok_or(MusicError::NotInGuild)
}

/// The voice channel the invoking member sits in
fn author_voice_channel(ctx: Context<'_>, guild_id: GuildId) -> Option<ChannelId> {
    MusicManager::get_user_voice_channel(ctx.serenity_context(), guild_id, ctx.author().id)
}

/// Short acknowledgment: a reaction on prefix invocations, the reply otherwise.
async fn acknowledge(ctx: Context<'_>, emoji: &str, reply: CreateReply) -> CommandResult {
    match ctx {
        poise::Context::Prefix(prefix) => {
            prefix
                .msg
                .react(ctx.serenity_context(), ReactionType::Unicode(emoji.to_string()))
                .await?;
        }
        poise::Context::Application(_) => {
            ctx.send(reply).await?;
        }
    }
    Ok(())
}

async fn report(ctx: Context<'_>, err: &MusicError) -> CommandResult {
    ctx.send(embedded_messages::music_error(err)).await?;
    Ok(())
}

use super::*;
use crate::commands::music::utils::guild_player::JoinOutcome;

/// Join your voice channel, or move to it
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    aliases("connect", "j"),
    category = "Music"
)]
pub async fn join(ctx: Context<'_>) -> CommandResult {
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };
    let user_channel = author_voice_channel(ctx, guild_id);

    match ctx.data().music.join(guild_id, user_channel).await {
        Ok(JoinOutcome::AlreadyHere) => {
            ctx.send(embedded_messages::success(
                "🔊 Already Here",
                "I'm already in your voice channel.",
            ))
            .await?;
        }
        Ok(outcome) => {
            let channel = user_channel.map(|c| format!("<#{}>", c)).unwrap_or_default();
            let title = if outcome == JoinOutcome::Moved {
                "🔀 Moved"
            } else {
                "🔊 Joined"
            };
            acknowledge(
                ctx,
                "👋",
                embedded_messages::success(title, format!("Connected to {}", channel)),
            )
            .await?;
        }
        Err(e) => report(ctx, &e).await?,
    }

    Ok(())
}
